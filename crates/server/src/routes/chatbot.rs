//! Gift-finder chatbot routes (`/api/chatbot`).
//!
//! The conversation is stateless on the server: every request carries the
//! current state and the answers gathered so far.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;

use crate::error::Result;
use crate::routes::extract::ApiJson;
use crate::services::chatbot::{self, Answer, ConversationData};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start))
        .route("/reset", post(start))
        .route("/process", post(process))
        .route("/state", get(state_catalog))
}

pub async fn start() -> Json<serde_json::Value> {
    Json(json!({ "success": true, "data": chatbot::welcome() }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub user_input: Option<Answer>,
    pub current_state: Option<String>,
    #[serde(default)]
    pub conversation_data: ConversationData,
}

pub async fn process(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ProcessRequest>,
) -> Result<Json<serde_json::Value>> {
    let reply = chatbot::process(
        state.pool(),
        body.current_state.as_deref(),
        body.user_input,
        body.conversation_data,
    )
    .await?;
    Ok(Json(json!({ "success": true, "data": reply })))
}

pub async fn state_catalog() -> Json<serde_json::Value> {
    Json(chatbot::state_catalog())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_process_request_accepts_budget_object() {
        let body: ProcessRequest = serde_json::from_value(json!({
            "userInput": { "label": "$25 - $50", "min": "25", "max": "50" },
            "currentState": "budget",
            "conversationData": { "occasion": "Birthday", "recipient": "Friend" },
        }))
        .unwrap();
        assert!(matches!(body.user_input, Some(Answer::Budget(_))));
        assert_eq!(body.conversation_data.occasion.as_deref(), Some("Birthday"));
    }

    #[test]
    fn test_process_request_allows_missing_data() {
        let body: ProcessRequest =
            serde_json::from_value(json!({ "userInput": "Birthday", "currentState": "occasion" })).unwrap();
        assert_eq!(body.user_input, Some(Answer::Text("Birthday".to_string())));
        assert_eq!(body.conversation_data, ConversationData::default());
    }
}
