//! Personalised mugs and cards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use best_wishes_core::{
    CustomizationId, CustomizationStatus, CustomizationType, OrderId, ProductId, QuoteCategory,
    QuoteId, UserId,
};

pub const MAX_MESSAGE_LEN: usize = 500;
pub const MAX_INSTRUCTIONS_LEN: usize = 1000;

/// The quote a customer picked, copied so later edits to the quote don't
/// change a saved design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedQuote {
    pub id: QuoteId,
    pub text: String,
    pub category: QuoteCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextPosition {
    pub x: f64,
    pub y: f64,
}

impl Default for TextPosition {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalImage {
    pub url: String,
    #[serde(default)]
    pub position: TextPosition,
    #[serde(default)]
    pub size: Option<f64>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Customization {
    pub id: CustomizationId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub order_id: Option<OrderId>,
    pub customization_type: CustomizationType,
    pub selected_quote: Option<Json<SelectedQuote>>,
    pub custom_message: Option<String>,
    pub font_style: String,
    pub font_size: i32,
    pub font_color: String,
    pub text_position: Json<TextPosition>,
    pub background_color: String,
    pub additional_images: Json<Vec<AdditionalImage>>,
    pub preview_image: Option<String>,
    pub price: Decimal,
    pub status: CustomizationStatus,
    pub special_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customization {
    /// The text printed on the product.
    ///
    /// Quote first, then the personal message, separated by a blank line.
    #[must_use]
    pub fn final_text(&self) -> String {
        let quote = self
            .selected_quote
            .as_ref()
            .map(|q| q.text.trim())
            .filter(|t| !t.is_empty());
        let message = self
            .custom_message
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        match (quote, message) {
            (Some(q), Some(m)) => format!("{q}\n\n{m}"),
            (Some(t), None) | (None, Some(t)) => t.to_string(),
            (None, None) => String::new(),
        }
    }
}

/// A customization with its printable text.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationView {
    #[serde(flatten)]
    pub customization: Customization,
    pub final_text: String,
}

impl From<Customization> for CustomizationView {
    fn from(customization: Customization) -> Self {
        Self {
            final_text: customization.final_text(),
            customization,
        }
    }
}

/// Design fields submitted by the customer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationDesign {
    pub selected_quote: Option<SelectedQuote>,
    pub custom_message: Option<String>,
    #[serde(default = "default_font_style")]
    pub font_style: String,
    #[serde(default = "default_font_size")]
    pub font_size: i32,
    #[serde(default = "default_font_color")]
    pub font_color: String,
    #[serde(default)]
    pub text_position: TextPosition,
    #[serde(default = "default_background")]
    pub background_color: String,
    #[serde(default)]
    pub additional_images: Vec<AdditionalImage>,
    pub preview_image: Option<String>,
    pub special_instructions: Option<String>,
}

fn default_font_style() -> String {
    "Arial".to_string()
}

const fn default_font_size() -> i32 {
    14
}

fn default_font_color() -> String {
    "#000000".to_string()
}

fn default_background() -> String {
    "#FFFFFF".to_string()
}

impl CustomizationDesign {
    /// # Errors
    ///
    /// Returns a message suitable for a 400 response.
    pub fn validate(&self) -> Result<(), String> {
        if self
            .custom_message
            .as_ref()
            .is_some_and(|m| m.chars().count() > MAX_MESSAGE_LEN)
        {
            return Err(format!("Custom message cannot exceed {MAX_MESSAGE_LEN} characters"));
        }
        if self
            .special_instructions
            .as_ref()
            .is_some_and(|m| m.chars().count() > MAX_INSTRUCTIONS_LEN)
        {
            return Err(format!(
                "Special instructions cannot exceed {MAX_INSTRUCTIONS_LEN} characters"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customization(quote: Option<&str>, message: Option<&str>) -> Customization {
        let now = Utc::now();
        Customization {
            id: CustomizationId::new(1),
            product_id: ProductId::new(1),
            user_id: UserId::new(1),
            order_id: None,
            customization_type: CustomizationType::Mug,
            selected_quote: quote.map(|text| {
                Json(SelectedQuote {
                    id: QuoteId::new(9),
                    text: text.to_string(),
                    category: QuoteCategory::Birthday,
                })
            }),
            custom_message: message.map(str::to_string),
            font_style: default_font_style(),
            font_size: default_font_size(),
            font_color: default_font_color(),
            text_position: Json(TextPosition::default()),
            background_color: default_background(),
            additional_images: Json(vec![]),
            preview_image: None,
            price: Decimal::from(25),
            status: CustomizationStatus::Draft,
            special_instructions: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_final_text_joins_quote_and_message() {
        let c = customization(Some("Happy birthday!"), Some("Love, Sam"));
        assert_eq!(c.final_text(), "Happy birthday!\n\nLove, Sam");
    }

    #[test]
    fn test_final_text_single_part() {
        assert_eq!(customization(Some("Cheers"), None).final_text(), "Cheers");
        assert_eq!(customization(None, Some("Hi")).final_text(), "Hi");
        assert_eq!(customization(None, Some("   ")).final_text(), "");
    }

    #[test]
    fn test_design_defaults_and_limits() {
        let design: CustomizationDesign =
            serde_json::from_str(r#"{"customMessage": "hello"}"#).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(design.font_style, "Arial");
        assert_eq!(design.font_size, 14);
        assert!(design.validate().is_ok());

        let long = CustomizationDesign {
            custom_message: Some("x".repeat(501)),
            ..design
        };
        assert!(long.validate().is_err());
    }
}
