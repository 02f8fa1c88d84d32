//! Product review routes (`/api/feedback`).

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use best_wishes_core::{FeedbackId, OrderId, ProductId};

use crate::db::Page;
use crate::db::feedback::{FeedbackQuery, FeedbackRepository, FeedbackSort};
use crate::db::orders::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::feedback::{
    Eligibility, FeedbackEdit, NewFeedback, clean_images, validate_review,
};
use crate::models::user::User;
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/product/{product_id}", get(for_product))
        .route("/products/summary", post(summary))
        .route("/my-feedback", get(mine))
        .route("/eligibility/{product_id}/{order_id}", get(eligibility))
        .route("/{id}", put(update).delete(remove))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFeedbackQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub rating: Option<String>,
    pub verified: Option<bool>,
}

impl ProductFeedbackQuery {
    /// Split into repository filters and a page. `rating=all` means any.
    fn into_parts(self) -> (FeedbackQuery, Page) {
        let rating = self
            .rating
            .as_deref()
            .filter(|r| *r != "all")
            .and_then(|r| r.parse::<i32>().ok())
            .filter(|r| (1..=5).contains(r));
        let query = FeedbackQuery {
            rating,
            verified: self.verified,
            sort: self.sort_by.as_deref().map(FeedbackSort::parse).unwrap_or_default(),
            descending: self.sort_order.as_deref() != Some("asc"),
        };
        (query, Page::new(self.page, self.limit, DEFAULT_LIMIT))
    }
}

fn pagination(page: Page, total: i64) -> serde_json::Value {
    let total_pages = page.total_pages(total);
    json!({
        "currentPage": page.page,
        "totalPages": total_pages,
        "totalFeedbacks": total,
        "hasNextPage": page.page < total_pages,
        "hasPreviousPage": page.page > 1,
    })
}

pub async fn for_product(
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<ProductId>,
    ApiQuery(query): ApiQuery<ProductFeedbackQuery>,
) -> Result<Json<serde_json::Value>> {
    let (filter, page) = query.into_parts();
    let repo = FeedbackRepository::new(state.pool());
    let (feedbacks, total) = repo.list_for_product(product_id, &filter, page).await?;
    let stats = repo.rating_stats(product_id).await?;

    Ok(Json(json!({
        "success": true,
        "feedbacks": feedbacks,
        "pagination": pagination(page, total),
        "ratingStats": stats,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    #[serde(default)]
    pub product_ids: Vec<ProductId>,
}

pub async fn summary(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SummaryRequest>,
) -> Result<Json<serde_json::Value>> {
    if body.product_ids.is_empty() {
        return Err(AppError::BadRequest("Product IDs array is required".to_string()));
    }
    let stats = FeedbackRepository::new(state.pool())
        .rating_stats_many(&body.product_ids)
        .await?;
    Ok(Json(json!({ "success": true, "data": stats })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFeedbackRequest {
    pub product_id: Option<ProductId>,
    pub order_id: Option<OrderId>,
    pub rating: Option<i32>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub images: Vec<String>,
}

impl CreateFeedbackRequest {
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for missing ids or an invalid review.
    pub fn validate(self) -> Result<NewFeedback> {
        let (Some(product_id), Some(order_id), Some(rating)) = (self.product_id, self.order_id, self.rating)
        else {
            return Err(AppError::BadRequest(
                "Product ID, order ID, rating, title and comment are required".to_string(),
            ));
        };
        validate_review(rating, &self.title, &self.comment).map_err(AppError::BadRequest)?;
        Ok(NewFeedback {
            product_id,
            order_id,
            rating,
            title: self.title.trim().to_string(),
            comment: self.comment.trim().to_string(),
            images: clean_images(self.images),
        })
    }
}

/// Check that `user` may review `product_id` from `order_id`.
async fn check_reviewable(
    state: &AppState,
    user: &User,
    product_id: ProductId,
    order_id: OrderId,
) -> Result<()> {
    let orders = OrderRepository::new(state.pool());
    if orders.reviewable(order_id, user.id).await?.is_none() {
        return Err(AppError::NotFound(
            "Order not found or not eligible for feedback".to_string(),
        ));
    }
    if !orders.contains_product(order_id, product_id).await? {
        return Err(AppError::BadRequest("Product not found in this order".to_string()));
    }
    Ok(())
}

#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<CreateFeedbackRequest>,
) -> Result<impl IntoResponse> {
    let new = body.validate()?;
    check_reviewable(&state, &user, new.product_id, new.order_id).await?;

    let feedback = FeedbackRepository::new(state.pool())
        .create(user.id, &new)
        .await
        .map_err(AppError::conflict_as_bad_request)?;
    tracing::info!(feedback_id = %feedback.id, product_id = %new.product_id, user_id = %user.id, "Feedback submitted");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Feedback submitted successfully",
            "feedback": feedback,
        })),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct MyFeedbackQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn mine(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiQuery(query): ApiQuery<MyFeedbackQuery>,
) -> Result<Json<serde_json::Value>> {
    let page = Page::new(query.page, query.limit, DEFAULT_LIMIT);
    let (feedbacks, total) = FeedbackRepository::new(state.pool())
        .for_user(user.id, page)
        .await?;
    Ok(Json(json!({
        "success": true,
        "feedbacks": feedbacks,
        "pagination": pagination(page, total),
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateFeedbackRequest {
    pub rating: Option<i32>,
    pub title: Option<String>,
    pub comment: Option<String>,
    pub images: Option<Vec<String>>,
}

impl UpdateFeedbackRequest {
    /// Validate the provided fields against the stored review.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the merged review is invalid.
    pub fn into_edit(self, rating: i32, title: &str, comment: &str) -> Result<FeedbackEdit> {
        let title_new = self.title.map(|t| t.trim().to_string());
        let comment_new = self.comment.map(|c| c.trim().to_string());
        validate_review(
            self.rating.unwrap_or(rating),
            title_new.as_deref().unwrap_or(title),
            comment_new.as_deref().unwrap_or(comment),
        )
        .map_err(AppError::BadRequest)?;
        Ok(FeedbackEdit {
            rating: self.rating,
            title: title_new,
            comment: comment_new,
            images: self.images.map(clean_images),
        })
    }
}

#[instrument(skip_all, fields(feedback_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<FeedbackId>,
    ApiJson(body): ApiJson<UpdateFeedbackRequest>,
) -> Result<Json<serde_json::Value>> {
    let repo = FeedbackRepository::new(state.pool());
    let existing = repo
        .get(id)
        .await?
        .filter(|f| f.user_id == user.id)
        .ok_or_else(|| AppError::not_found("Feedback"))?;
    if !existing.is_editable(Utc::now()) {
        return Err(AppError::BadRequest(
            "Feedback can only be edited within 24 hours of submission".to_string(),
        ));
    }

    let edit = body.into_edit(existing.rating, &existing.title, &existing.comment)?;
    let feedback = repo.update(id, &edit).await.map_err(AppError::missing("Feedback"))?;
    Ok(Json(json!({
        "success": true,
        "message": "Feedback updated successfully",
        "feedback": feedback,
    })))
}

pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<FeedbackId>,
) -> Result<Json<serde_json::Value>> {
    let repo = FeedbackRepository::new(state.pool());
    repo.get(id)
        .await?
        .filter(|f| f.user_id == user.id)
        .ok_or_else(|| AppError::not_found("Feedback"))?;
    repo.delete(id).await.map_err(AppError::missing("Feedback"))?;
    tracing::info!(feedback_id = %id, user_id = %user.id, "Feedback deleted");
    Ok(Json(json!({ "success": true, "message": "Feedback deleted successfully" })))
}

pub async fn eligibility(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath((product_id, order_id)): ApiPath<(ProductId, OrderId)>,
) -> Result<Json<serde_json::Value>> {
    let existing = FeedbackRepository::new(state.pool())
        .find_existing(user.id, product_id, order_id)
        .await?;

    let result = if let Some(feedback) = existing {
        Eligibility {
            can_provide_feedback: false,
            reason: Some("Feedback already provided".to_string()),
            existing_feedback: Some(feedback),
        }
    } else {
        match check_reviewable(&state, &user, product_id, order_id).await {
            Ok(()) => Eligibility {
                can_provide_feedback: true,
                reason: None,
                existing_feedback: None,
            },
            Err(AppError::NotFound(reason) | AppError::BadRequest(reason)) => Eligibility {
                can_provide_feedback: false,
                reason: Some(reason),
                existing_feedback: None,
            },
            Err(other) => return Err(other),
        }
    };

    Ok(Json(json!({ "success": true, "data": result })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn query(value: serde_json::Value) -> ProductFeedbackQuery {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_rating_all_means_any() {
        let (filter, page) = query(json!({ "rating": "all" })).into_parts();
        assert_eq!(filter.rating, None);
        assert!(filter.descending);
        assert_eq!(filter.sort, FeedbackSort::CreatedAt);
        assert_eq!(page.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_rating_and_sort() {
        let (filter, _) =
            query(json!({ "rating": "4", "sortBy": "likes", "sortOrder": "asc" })).into_parts();
        assert_eq!(filter.rating, Some(4));
        assert_eq!(filter.sort, FeedbackSort::Likes);
        assert!(!filter.descending);
    }

    #[test]
    fn test_pagination_flags() {
        let page = Page::new(Some(2), Some(10), DEFAULT_LIMIT);
        let value = pagination(page, 25);
        assert_eq!(value["totalPages"], 3);
        assert_eq!(value["hasNextPage"], true);
        assert_eq!(value["hasPreviousPage"], true);
    }

    #[test]
    fn test_create_drops_blank_images() {
        let body: CreateFeedbackRequest = serde_json::from_value(json!({
            "productId": 1,
            "orderId": 2,
            "rating": 5,
            "title": " Lovely ",
            "comment": "Arrived on time",
            "images": ["a.png", " "],
        }))
        .unwrap();
        let new = body.validate().unwrap();
        assert_eq!(new.title, "Lovely");
        assert_eq!(new.images, vec!["a.png".to_string()]);
    }

    #[test]
    fn test_create_requires_ids() {
        let body: CreateFeedbackRequest =
            serde_json::from_value(json!({ "rating": 5, "title": "t", "comment": "c" })).unwrap();
        assert!(matches!(body.validate(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_edit_validates_merged_review() {
        let edit = UpdateFeedbackRequest {
            rating: Some(6),
            ..UpdateFeedbackRequest::default()
        };
        assert!(edit.into_edit(4, "t", "c").is_err());

        let edit = UpdateFeedbackRequest {
            title: Some(" New ".to_string()),
            ..UpdateFeedbackRequest::default()
        }
        .into_edit(4, "t", "c")
        .unwrap();
        assert_eq!(edit.title.as_deref(), Some("New"));
        assert_eq!(edit.rating, None);
    }
}
