//! Catalog enums: product classification, customization, and occasions.

labeled_enum! {
    /// Stock availability, derived from the stock count.
    #[derive(Default)]
    pub enum StockStatus as "stock_status" {
        #[default]
        InStock => "in-stock",
        LowStock => "low-stock",
        OutOfStock => "out-of-stock",
        Backordered => "backordered",
    }
}

impl StockStatus {
    /// Stock at or below this count is reported as low.
    pub const LOW_STOCK_THRESHOLD: i32 = 10;

    /// Derive the status for a stock count.
    #[must_use]
    pub const fn for_quantity(stock: i32) -> Self {
        if stock <= 0 {
            Self::OutOfStock
        } else if stock <= Self::LOW_STOCK_THRESHOLD {
            Self::LowStock
        } else {
            Self::InStock
        }
    }
}

labeled_enum! {
    /// Publication status of a product.
    #[derive(Default)]
    pub enum ProductStatus as "product_status" {
        #[default]
        Draft => "draft",
        Active => "active",
        Archived => "archived",
    }
}

labeled_enum! {
    #[derive(Default)]
    pub enum TaxClass as "tax_class" {
        #[default]
        Standard => "standard",
        Reduced => "reduced",
        Zero => "zero",
        Exempt => "exempt",
    }
}

labeled_enum! {
    #[derive(Default)]
    pub enum ShippingClass as "shipping_class" {
        #[default]
        Standard => "standard",
        Express => "express",
        Overnight => "overnight",
        Free => "free",
        Heavy => "heavy",
    }
}

labeled_enum! {
    /// Which printable surface a customizable product offers.
    pub enum CustomizationType as "customization_type" {
        Mug => "mug",
        BirthdayCard => "birthday-card",
        AnniversaryCard => "anniversary-card",
        GeneralCard => "general-card",
    }
}

impl CustomizationType {
    /// The quote surface this customization prints on.
    #[must_use]
    pub const fn quote_type(self) -> QuoteType {
        match self {
            Self::Mug => QuoteType::Mug,
            Self::BirthdayCard | Self::AnniversaryCard | Self::GeneralCard => QuoteType::Card,
        }
    }
}

labeled_enum! {
    pub enum QuoteCategory as "quote_category" {
        Birthday => "birthday",
        Anniversary => "anniversary",
        Love => "love",
        Friendship => "friendship",
        Motivational => "motivational",
        Funny => "funny",
        General => "general",
        Congratulations => "congratulations",
        ThankYou => "thank-you",
    }
}

labeled_enum! {
    /// Surface a quote is written for. `both` fits mugs and cards.
    #[derive(Default)]
    pub enum QuoteType as "quote_type" {
        Mug => "mug",
        Card => "card",
        #[default]
        Both => "both",
    }
}

impl QuoteType {
    /// Whether a quote of this type can be printed on `surface`.
    #[must_use]
    pub const fn fits(self, surface: Self) -> bool {
        matches!(self, Self::Both) || self as u8 == surface as u8
    }
}

labeled_enum! {
    /// Character costume for the surprise gift delivery person.
    #[derive(Default)]
    pub enum Costume as "costume" {
        #[default]
        None => "none",
        Mickey => "mickey",
        TomJerry => "tomjerry",
        Joker => "joker",
    }
}

labeled_enum! {
    /// Occasion attached to an event reminder.
    #[derive(Default)]
    pub enum Occasion as "occasion" {
        Birthday => "birthday",
        Anniversary => "anniversary",
        Wedding => "wedding",
        Graduation => "graduation",
        BabyShower => "baby_shower",
        Housewarming => "housewarming",
        ValentineDay => "valentine_day",
        MotherDay => "mother_day",
        FatherDay => "father_day",
        Christmas => "christmas",
        NewYear => "new_year",
        Thanksgiving => "thanksgiving",
        Engagement => "engagement",
        Retirement => "retirement",
        Promotion => "promotion",
        GetWellSoon => "get_well_soon",
        Sympathy => "sympathy",
        Congratulations => "congratulations",
        ThankYou => "thank_you",
        #[default]
        General => "general",
    }
}

impl Occasion {
    /// Human-readable name for emails and pickers.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Birthday => "Birthday",
            Self::Anniversary => "Anniversary",
            Self::Wedding => "Wedding",
            Self::Graduation => "Graduation",
            Self::BabyShower => "Baby Shower",
            Self::Housewarming => "Housewarming",
            Self::ValentineDay => "Valentine's Day",
            Self::MotherDay => "Mother's Day",
            Self::FatherDay => "Father's Day",
            Self::Christmas => "Christmas",
            Self::NewYear => "New Year",
            Self::Thanksgiving => "Thanksgiving",
            Self::Engagement => "Engagement",
            Self::Retirement => "Retirement",
            Self::Promotion => "Promotion",
            Self::GetWellSoon => "Get Well Soon",
            Self::Sympathy => "Sympathy",
            Self::Congratulations => "Congratulations",
            Self::ThankYou => "Thank You",
            Self::General => "General",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_status_thresholds() {
        assert_eq!(StockStatus::for_quantity(0), StockStatus::OutOfStock);
        assert_eq!(StockStatus::for_quantity(-3), StockStatus::OutOfStock);
        assert_eq!(StockStatus::for_quantity(1), StockStatus::LowStock);
        assert_eq!(StockStatus::for_quantity(10), StockStatus::LowStock);
        assert_eq!(StockStatus::for_quantity(11), StockStatus::InStock);
    }

    #[test]
    fn test_customization_type_quote_surface() {
        assert_eq!(CustomizationType::Mug.quote_type(), QuoteType::Mug);
        assert_eq!(CustomizationType::AnniversaryCard.quote_type(), QuoteType::Card);
    }

    #[test]
    fn test_quote_type_fits() {
        assert!(QuoteType::Both.fits(QuoteType::Mug));
        assert!(QuoteType::Card.fits(QuoteType::Card));
        assert!(!QuoteType::Mug.fits(QuoteType::Card));
    }

    #[test]
    fn test_occasion_count_and_labels() {
        assert_eq!(Occasion::ALL.len(), 20);
        assert_eq!("valentine_day".parse::<Occasion>().unwrap(), Occasion::ValentineDay);
        assert_eq!(Occasion::MotherDay.display_name(), "Mother's Day");
    }

    #[test]
    fn test_hyphenated_labels() {
        assert_eq!(StockStatus::OutOfStock.to_string(), "out-of-stock");
        assert_eq!(
            "birthday-card".parse::<CustomizationType>().unwrap(),
            CustomizationType::BirthdayCard
        );
        assert_eq!(QuoteCategory::ThankYou.as_str(), "thank-you");
    }
}
