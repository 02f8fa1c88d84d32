//! Typed primary keys.
//!
//! Every table uses a serial `INTEGER` key. Wrapping each one in its own type
//! keeps an order id from being passed where a product id is expected.

/// Declare `i32` newtypes that serialize as bare numbers and bind as `INTEGER`.
macro_rules! serial_ids {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {$(
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        #[cfg_attr(feature = "postgres", derive(sqlx::Type))]
        #[cfg_attr(feature = "postgres", sqlx(transparent))]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            #[must_use]
            pub const fn new(raw: i32) -> Self {
                Self(raw)
            }

            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i32> for $name {
            fn from(raw: i32) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    )+};
}

serial_ids! {
    UserId,
    ProductId,
    CategoryId,
    OrderId,
    SurpriseGiftId,
    /// Group purchase; participants and their shares hang off it.
    CollaborativePurchaseId,
    ParticipantId,
    GiftContributionId,
    /// Offline sale record written when stock is committed.
    OrderSummaryId,
    NotificationId,
    FeedbackId,
    CustomizationId,
    QuoteId,
    EventId,
    ReminderId,
}

impl OrderId {
    /// Customer-facing order reference, zero-padded to six digits.
    ///
    /// ```
    /// # use best_wishes_core::OrderId;
    /// assert_eq!(OrderId::new(42).reference(), "000042");
    /// ```
    #[must_use]
    pub fn reference(&self) -> String {
        format!("{:06}", self.0)
    }
}

impl CollaborativePurchaseId {
    /// Reference printed on packing slips for group purchases.
    #[must_use]
    pub fn print_reference(&self) -> String {
        format!("{:08}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_transparently() {
        let id = ProductId::new(17);
        assert_eq!(serde_json::to_string(&id).ok().as_deref(), Some("17"));
    }

    #[test]
    fn test_order_reference_padding() {
        assert_eq!(OrderId::new(7).reference(), "000007");
        assert_eq!(OrderId::new(1_234_567).reference(), "1234567");
    }

    #[test]
    fn test_print_reference_padding() {
        assert_eq!(CollaborativePurchaseId::new(31).print_reference(), "00000031");
    }

    #[test]
    fn test_conversions() {
        let id: UserId = 5.into();
        let raw: i32 = id.into();
        assert_eq!(raw, 5);
        assert_eq!(id.to_string(), "5");
    }
}
