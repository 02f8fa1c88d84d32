//! Product reviews left against delivered or in-flight orders.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use best_wishes_core::{FeedbackId, FeedbackStatus, OrderId, ProductId, UserId};

/// How long after posting a review its author may still edit it.
pub const EDIT_WINDOW_HOURS: i64 = 24;

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_COMMENT_LEN: usize = 1000;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: FeedbackId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub order_id: OrderId,
    pub rating: i32,
    pub title: String,
    pub comment: String,
    pub images: Vec<String>,
    pub is_verified_purchase: bool,
    pub status: FeedbackStatus,
    pub likes: i32,
    pub dislikes: i32,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Feedback {
    /// Whether the author may still edit this review.
    #[must_use]
    pub fn is_editable(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at <= Duration::hours(EDIT_WINDOW_HOURS)
    }
}

/// A review with its author's display name.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub feedback: Feedback,
    pub author_name: String,
}

/// Fields for a new review, already validated.
#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub product_id: ProductId,
    pub order_id: OrderId,
    pub rating: i32,
    pub title: String,
    pub comment: String,
    pub images: Vec<String>,
}

/// Fields an author may change.
#[derive(Debug, Clone, Default)]
pub struct FeedbackEdit {
    pub rating: Option<i32>,
    pub title: Option<String>,
    pub comment: Option<String>,
    pub images: Option<Vec<String>>,
}

/// Check rating and text lengths.
///
/// # Errors
///
/// Returns a message suitable for a 400 response.
pub fn validate_review(rating: i32, title: &str, comment: &str) -> Result<(), String> {
    if !(1..=5).contains(&rating) {
        return Err("Rating must be between 1 and 5".to_string());
    }
    if title.trim().is_empty() || comment.trim().is_empty() {
        return Err("Title and comment are required".to_string());
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(format!("Title cannot exceed {MAX_TITLE_LEN} characters"));
    }
    if comment.chars().count() > MAX_COMMENT_LEN {
        return Err(format!("Comment cannot exceed {MAX_COMMENT_LEN} characters"));
    }
    Ok(())
}

/// Drop blank image strings.
#[must_use]
pub fn clean_images(images: Vec<String>) -> Vec<String> {
    images
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Average and distribution of ratings for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingStats {
    pub average_rating: Decimal,
    pub total_reviews: i64,
    pub rating_distribution: BTreeMap<u8, i64>,
}

impl Default for RatingStats {
    fn default() -> Self {
        Self {
            average_rating: Decimal::ZERO,
            total_reviews: 0,
            rating_distribution: (1..=5).map(|r| (r, 0)).collect(),
        }
    }
}

impl RatingStats {
    /// Build from `(rating, count)` pairs.
    #[must_use]
    pub fn from_counts(counts: &[(i32, i64)]) -> Self {
        let mut stats = Self::default();
        let mut sum = 0_i64;
        for &(rating, count) in counts {
            let Ok(key) = u8::try_from(rating) else { continue };
            if let Some(slot) = stats.rating_distribution.get_mut(&key) {
                *slot += count;
                stats.total_reviews += count;
                sum += i64::from(rating) * count;
            }
        }
        if stats.total_reviews > 0 {
            stats.average_rating = (Decimal::from(sum) / Decimal::from(stats.total_reviews))
                .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
        }
        stats
    }
}

/// Answer to "may I review this product from this order?".
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub can_provide_feedback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_feedback: Option<Feedback>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feedback(created_at: DateTime<Utc>) -> Feedback {
        Feedback {
            id: FeedbackId::new(1),
            user_id: UserId::new(1),
            product_id: ProductId::new(2),
            order_id: OrderId::new(3),
            rating: 4,
            title: "Lovely".to_string(),
            comment: "Arrived on time".to_string(),
            images: vec![],
            is_verified_purchase: true,
            status: FeedbackStatus::Active,
            likes: 0,
            dislikes: 0,
            is_edited: false,
            edited_at: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_edit_window() {
        let now = Utc::now();
        assert!(feedback(now - Duration::hours(23)).is_editable(now));
        assert!(!feedback(now - Duration::hours(25)).is_editable(now));
    }

    #[test]
    fn test_validate_review() {
        assert!(validate_review(5, "Great", "Loved it").is_ok());
        assert!(validate_review(0, "Great", "Loved it").is_err());
        assert!(validate_review(6, "Great", "Loved it").is_err());
        assert!(validate_review(3, "", "Loved it").is_err());
        assert!(validate_review(3, &"t".repeat(101), "ok").is_err());
        assert!(validate_review(3, "ok", &"c".repeat(1001)).is_err());
    }

    #[test]
    fn test_clean_images_drops_blanks() {
        let images = vec![" a.png ".to_string(), "  ".to_string(), String::new()];
        assert_eq!(clean_images(images), vec!["a.png".to_string()]);
    }

    #[test]
    fn test_rating_stats() {
        let stats = RatingStats::from_counts(&[(5, 2), (4, 1), (1, 1)]);
        assert_eq!(stats.total_reviews, 4);
        // (10 + 4 + 1) / 4 = 3.75
        assert_eq!(stats.average_rating, Decimal::new(38, 1));
        assert_eq!(stats.rating_distribution.get(&5), Some(&2));
        assert_eq!(stats.rating_distribution.get(&2), Some(&0));
    }

    #[test]
    fn test_rating_stats_empty() {
        let stats = RatingStats::from_counts(&[]);
        assert_eq!(stats.total_reviews, 0);
        assert_eq!(stats.average_rating, Decimal::ZERO);
        assert_eq!(stats.rating_distribution.len(), 5);
    }
}
