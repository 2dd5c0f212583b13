use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::Number;
use uuid::Uuid;

use crate::engine::feedback::{self, FeedbackSummary};
use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::feedback::Feedback;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders/:id/feedback", post(submit_feedback).get(get_order_feedback))
        .route("/feedback", get(list_feedback))
        .route("/feedback/:id/respond", post(respond_to_feedback))
}

#[derive(Deserialize)]
pub struct SubmitFeedbackRequest {
    /// Kept as a raw number so fractional ratings get a proper `invalid_rating`.
    pub rating: Number,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Deserialize)]
pub struct RespondRequest {
    pub response: String,
}

async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<SubmitFeedbackRequest>,
) -> Result<Json<Feedback>, AppError> {
    feedback::submit(&state, order_id, &actor, payload.rating, payload.comment).map(Json)
}

async fn get_order_feedback(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Option<Feedback>>, AppError> {
    feedback::feedback_for_order(&state, order_id, &actor).map(Json)
}

async fn list_feedback(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<FeedbackSummary>, AppError> {
    actor.require_staff("read all feedback")?;
    Ok(Json(feedback::list_feedback(&state)))
}

async fn respond_to_feedback(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(feedback_id): Path<Uuid>,
    Json(payload): Json<RespondRequest>,
) -> Result<Json<Feedback>, AppError> {
    feedback::respond(&state, feedback_id, &actor, &payload.response).map(Json)
}
