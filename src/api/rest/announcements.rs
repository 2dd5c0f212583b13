use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Json;
use axum::Router;

use crate::engine::announcements::{self, NewAnnouncement};
use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::announcement::Announcement;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/announcements",
        get(list_announcements).post(publish_announcement),
    )
}

async fn list_announcements(State(state): State<Arc<AppState>>) -> Json<Vec<Announcement>> {
    Json(announcements::list(&state))
}

async fn publish_announcement(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<NewAnnouncement>,
) -> Result<Json<Announcement>, AppError> {
    announcements::publish(&state, &actor, payload).map(Json)
}
