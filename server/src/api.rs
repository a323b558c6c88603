//! # REST API Endpoints
//!
//! Lets an operator drive connected studios by hand:
//! - `GET /api/studios` — connected studios
//! - `POST /api/requests` — push a request to one or every studio
//! - `GET /api/responses` — recent acknowledgements

use crate::state::{AppState, ResponseRecord};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use remote_protocol::Request;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

/// One row of `GET /api/studios`.
#[derive(Debug, Serialize)]
pub struct StudioListItem {
    /// ID to pass as `studio_id` when submitting a request.
    pub studio_id: String,
    /// Remote address of the studio's socket.
    pub peer: String,
    /// When the studio connected.
    pub connected_at: DateTime<Utc>,
}

/// `GET /api/studios`
pub async fn list_studios(State(state): State<AppState>) -> Json<Vec<StudioListItem>> {
    let mut studios: Vec<StudioListItem> = state
        .studios
        .iter()
        .map(|entry| StudioListItem {
            studio_id: entry.key().clone(),
            peer: entry.peer.to_string(),
            connected_at: entry.connected_at,
        })
        .collect();
    studios.sort_by(|a, b| a.connected_at.cmp(&b.connected_at));
    Json(studios)
}

/// Body of `POST /api/requests`. Every field besides `studio_id` and
/// `action` is forwarded as the request payload.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub studio_id: Option<String>,
    pub action: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResult {
    /// Studios whose outbound queue accepted the request.
    pub delivered_to: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ApiError {
    EmptyAction,
    UnknownStudio(String),
    /// The studio is still registered but its socket writer has stopped.
    StudioGone(String),
    NoStudios,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::EmptyAction => (StatusCode::BAD_REQUEST, "action must not be empty".to_string()),
            ApiError::UnknownStudio(id) => (StatusCode::NOT_FOUND, format!("studio '{}' not found", id)),
            ApiError::StudioGone(id) => (StatusCode::GONE, format!("studio '{}' is disconnecting", id)),
            ApiError::NoStudios => (StatusCode::NOT_FOUND, "no studios connected".to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// `POST /api/requests` — forwards a request to the named studio, or to all
/// studios when `studio_id` is absent.
pub async fn submit_request(
    State(state): State<AppState>,
    Json(body): Json<SubmitRequest>,
) -> Result<Json<SubmitResult>, ApiError> {
    if body.action.is_empty() {
        return Err(ApiError::EmptyAction);
    }
    let text = Request::new(body.action.clone(), body.payload).encode();

    let delivered_to = match body.studio_id {
        Some(id) => {
            let studio = state
                .studios
                .get(&id)
                .ok_or_else(|| ApiError::UnknownStudio(id.clone()))?;
            if studio.tx.send(text).is_err() {
                return Err(ApiError::StudioGone(id));
            }
            vec![id]
        }
        None => {
            let ids: Vec<String> = state
                .studios
                .iter()
                .filter(|entry| entry.tx.send(text.clone()).is_ok())
                .map(|entry| entry.key().clone())
                .collect();
            if ids.is_empty() {
                return Err(ApiError::NoStudios);
            }
            ids
        }
    };

    info!("Sent `{}` to {}", body.action, delivered_to.join(", "));
    Ok(Json(SubmitResult { delivered_to }))
}

/// `GET /api/responses`
pub async fn list_responses(State(state): State<AppState>) -> Json<Vec<ResponseRecord>> {
    Json(state.responses())
}
