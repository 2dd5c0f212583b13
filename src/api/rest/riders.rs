use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::assignment::{self, NewRider};
use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::rider::Rider;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/riders", post(register_rider).get(list_riders))
        .route("/riders/available", get(list_available_riders))
        .route("/riders/:id/availability", patch(update_availability))
}

#[derive(Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub available: bool,
}

async fn register_rider(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<NewRider>,
) -> Result<Json<Rider>, AppError> {
    assignment::register_rider(&state, &actor, payload).map(Json)
}

async fn list_riders(State(state): State<Arc<AppState>>, _actor: Actor) -> Json<Vec<Rider>> {
    Json(assignment::list_riders(&state))
}

async fn list_available_riders(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
) -> Json<Vec<Rider>> {
    Json(assignment::list_available_riders(&state))
}

async fn update_availability(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Rider>, AppError> {
    assignment::set_availability(&state, id, payload.available, &actor).map(Json)
}
