//! Status enums and their transition rules.
//!
//! Orders and surprise gifts move forward through a fixed pipeline and may
//! drop out to `Cancelled` until they reach a terminal state. Entering
//! `Packing` is the point where stock is committed.

labeled_enum! {
    /// Order lifecycle status.
    #[derive(Default)]
    pub enum OrderStatus as "order_status" {
        #[default]
        Pending => "Pending",
        Processing => "Processing",
        Packing => "Packing",
        Shipped => "Shipped",
        Delivered => "Delivered",
        Cancelled => "Cancelled",
    }
}

impl OrderStatus {
    const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Packing => 2,
            Self::Shipped => 3,
            Self::Delivered => 4,
            Self::Cancelled => 5,
        }
    }

    /// `Delivered` and `Cancelled` accept no further changes.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether moving from `self` to `next` is allowed.
    ///
    /// Re-applying the current status is allowed (it only appends history).
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        if self.rank() == next.rank() {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        matches!(next, Self::Cancelled) || next.rank() > self.rank()
    }

    /// Entering this status decrements stock and writes order summaries.
    #[must_use]
    pub const fn commits_stock(self) -> bool {
        matches!(self, Self::Packing)
    }
}

labeled_enum! {
    /// Surprise gift lifecycle status.
    #[derive(Default)]
    pub enum SurpriseGiftStatus as "surprise_gift_status" {
        #[default]
        Pending => "Pending",
        Confirmed => "Confirmed",
        AwaitingPayment => "AwaitingPayment",
        Paid => "Paid",
        Packing => "Packing",
        OutForDelivery => "OutForDelivery",
        Delivered => "Delivered",
        Cancelled => "Cancelled",
    }
}

impl SurpriseGiftStatus {
    const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Confirmed => 1,
            Self::AwaitingPayment => 2,
            Self::Paid => 3,
            Self::Packing => 4,
            Self::OutForDelivery => 5,
            Self::Delivered => 6,
            Self::Cancelled => 7,
        }
    }

    /// `Delivered` and `Cancelled` accept no further changes.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Same rule as [`OrderStatus::can_transition_to`].
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        if self.rank() == next.rank() {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        matches!(next, Self::Cancelled) || next.rank() > self.rank()
    }

    /// Entering this status decrements stock and writes order summaries.
    #[must_use]
    pub const fn commits_stock(self) -> bool {
        matches!(self, Self::Packing)
    }
}

labeled_enum! {
    /// Surprise gift payment state.
    #[derive(Default)]
    pub enum PaymentStatus as "payment_status" {
        #[default]
        Pending => "pending",
        Paid => "paid",
        Failed => "failed",
    }
}

labeled_enum! {
    /// Collaborative purchase status.
    ///
    /// `packing`, `outfordelivery` and `delivered` are set by staff after
    /// every share has been paid.
    #[derive(Default)]
    pub enum CollaborativeStatus as "collaborative_status" {
        #[default]
        Pending => "pending",
        Completed => "completed",
        Cancelled => "cancelled",
        Expired => "expired",
        Refunded => "refunded",
        Packing => "packing",
        OutForDelivery => "outfordelivery",
        Delivered => "delivered",
    }
}

impl CollaborativeStatus {
    /// Payments, declines and cancellation are only accepted while active.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Completed)
    }

    /// Whether a staff member may move a purchase from `self` to `next`.
    ///
    /// Packing is reached only through the stock commit, and finished
    /// purchases never move again.
    #[must_use]
    pub const fn admin_can_move_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Pending | Self::Completed | Self::Packing | Self::OutForDelivery,
                Self::Cancelled
            ) | (Self::Packing, Self::OutForDelivery)
                | (Self::Packing | Self::OutForDelivery, Self::Delivered)
        )
    }

    /// Map the labels used by the staff dashboard.
    #[must_use]
    pub fn from_admin_label(label: &str) -> Option<Self> {
        match label {
            "Pending" => Some(Self::Pending),
            "Completed" => Some(Self::Completed),
            "Packing" => Some(Self::Packing),
            "OutForDelivery" => Some(Self::OutForDelivery),
            "Delivered" => Some(Self::Delivered),
            "Cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

labeled_enum! {
    /// Payment state of one participant in a collaborative purchase.
    #[derive(Default)]
    pub enum ParticipantPaymentStatus as "participant_payment_status" {
        #[default]
        Pending => "pending",
        Paid => "paid",
        Failed => "failed",
        Declined => "declined",
        Refunded => "refunded",
    }
}

labeled_enum! {
    /// Gift contribution status.
    #[derive(Default)]
    pub enum GiftContributionStatus as "gift_contribution_status" {
        #[default]
        Pending => "pending",
        Completed => "completed",
        Cancelled => "cancelled",
        Expired => "expired",
    }
}

labeled_enum! {
    /// Notification category.
    #[derive(Default)]
    pub enum NotificationType as "notification_type" {
        Order => "order",
        #[default]
        System => "system",
        Promotion => "promotion",
        Reminder => "reminder",
        Gift => "gift",
    }
}

labeled_enum! {
    /// Notification priority.
    #[derive(Default)]
    pub enum NotificationPriority as "notification_priority" {
        Low => "low",
        #[default]
        Medium => "medium",
        High => "high",
    }
}

labeled_enum! {
    /// Moderation state of a review. Only `active` reviews are public.
    #[derive(Default)]
    pub enum FeedbackStatus as "feedback_status" {
        #[default]
        Active => "active",
        Hidden => "hidden",
        Reported => "reported",
    }
}

labeled_enum! {
    /// Production state of a customization.
    #[derive(Default)]
    pub enum CustomizationStatus as "customization_status" {
        #[default]
        Draft => "draft",
        Confirmed => "confirmed",
        InProduction => "in-production",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

labeled_enum! {
    /// What kind of sale an order summary row was written for.
    pub enum OrderSummaryKind as "order_summary_kind" {
        Order => "order",
        SurpriseGift => "surprisegift",
        Collaborative => "collaborative",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_pipeline_moves_forward() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Packing));
        assert!(OrderStatus::Packing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
    }

    #[test]
    fn test_order_pipeline_rejects_backwards() {
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Packing));
        assert!(!OrderStatus::Packing.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_order_terminal_states() {
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Delivered.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_order_cancel_from_any_open_state() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Packing,
            OrderStatus::Shipped,
        ] {
            assert!(status.can_transition_to(OrderStatus::Cancelled), "{status}");
        }
    }

    #[test]
    fn test_only_packing_commits_stock() {
        let committing: Vec<_> = OrderStatus::ALL
            .iter()
            .filter(|s| s.commits_stock())
            .collect();
        assert_eq!(committing, vec![&OrderStatus::Packing]);
        assert!(SurpriseGiftStatus::Packing.commits_stock());
        assert!(!SurpriseGiftStatus::OutForDelivery.commits_stock());
    }

    #[test]
    fn test_surprise_gift_transitions() {
        assert!(SurpriseGiftStatus::Paid.can_transition_to(SurpriseGiftStatus::Packing));
        assert!(
            SurpriseGiftStatus::Packing.can_transition_to(SurpriseGiftStatus::OutForDelivery)
        );
        assert!(!SurpriseGiftStatus::Delivered.can_transition_to(SurpriseGiftStatus::Pending));
        assert!(
            SurpriseGiftStatus::OutForDelivery.can_transition_to(SurpriseGiftStatus::Cancelled)
        );
    }

    #[test]
    fn test_status_labels_round_trip_through_from_str() {
        for status in CustomizationStatus::ALL {
            assert_eq!(status.as_str().parse::<CustomizationStatus>().unwrap(), *status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_status_serde_uses_labels() {
        let json = serde_json::to_string(&SurpriseGiftStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"OutForDelivery\"");
        let json = serde_json::to_string(&CustomizationStatus::InProduction).unwrap();
        assert_eq!(json, "\"in-production\"");
        let kind: OrderSummaryKind = serde_json::from_str("\"surprisegift\"").unwrap();
        assert_eq!(kind, OrderSummaryKind::SurpriseGift);
    }

    #[test]
    fn test_collaborative_active_states() {
        assert!(CollaborativeStatus::Pending.is_active());
        assert!(CollaborativeStatus::Completed.is_active());
        assert!(!CollaborativeStatus::Expired.is_active());
        assert!(!CollaborativeStatus::Packing.is_active());
    }

    #[test]
    fn test_collaborative_admin_moves() {
        use CollaborativeStatus as S;
        assert!(S::Packing.admin_can_move_to(S::OutForDelivery));
        assert!(S::OutForDelivery.admin_can_move_to(S::Delivered));
        assert!(S::Pending.admin_can_move_to(S::Cancelled));
        // stock is committed by start-packing only
        assert!(!S::Completed.admin_can_move_to(S::Packing));
        assert!(!S::Completed.admin_can_move_to(S::OutForDelivery));
        for finished in [S::Delivered, S::Cancelled, S::Refunded, S::Expired] {
            for next in S::ALL {
                assert!(!finished.admin_can_move_to(*next), "{finished} -> {next}");
            }
        }
    }

    #[test]
    fn test_collaborative_admin_labels() {
        assert_eq!(
            CollaborativeStatus::from_admin_label("OutForDelivery"),
            Some(CollaborativeStatus::OutForDelivery)
        );
        assert_eq!(CollaborativeStatus::from_admin_label("outfordelivery"), None);
        assert_eq!(CollaborativeStatus::from_admin_label("Refunded"), None);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(NotificationType::default(), NotificationType::System);
        assert_eq!(NotificationPriority::default(), NotificationPriority::Medium);
    }
}
