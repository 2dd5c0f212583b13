use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::stats::{self, LandingStats, StatsSummary, StatsWindow};
use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::state::AppState;
use crate::views::customer::CustomerView;
use crate::views::rider::RiderView;
use crate::views::staff::StaffView;
use crate::views::{self, Snapshot};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard/staff", get(staff_dashboard))
        .route("/dashboard/rider", get(rider_dashboard))
        .route("/dashboard/customer", get(customer_dashboard))
        .route("/stats", get(stats_summary))
        .route("/stats/landing", get(landing_stats))
}

/// Lets staff open another user's dashboard; everyone else gets their own.
#[derive(Deserialize, Default)]
pub struct SubjectQuery {
    pub id: Option<Uuid>,
}

#[derive(Deserialize, Default)]
pub struct StatsQuery {
    #[serde(default)]
    pub window: StatsWindow,
}

fn subject(actor: &Actor, role: Role, requested: Option<Uuid>) -> Result<Uuid, AppError> {
    if actor.is_staff() {
        return requested.ok_or_else(|| {
            AppError::BadRequest(format!("id is required to view a {role} dashboard"))
        });
    }
    actor.require_role(role, &format!("view the {role} dashboard"))?;
    match requested {
        Some(id) if id != actor.id => Err(AppError::Forbidden(format!(
            "cannot view another {role}'s dashboard"
        ))),
        _ => Ok(actor.id),
    }
}

async fn staff_dashboard(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<StaffView>, AppError> {
    actor.require_staff("view the staff dashboard")?;
    let snapshot = Snapshot::capture(&state);
    Ok(Json(views::staff::build(&snapshot, &state.settings, Utc::now())))
}

async fn rider_dashboard(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<SubjectQuery>,
) -> Result<Json<RiderView>, AppError> {
    let rider_id = subject(&actor, Role::Rider, query.id)?;
    views::rider::build(&Snapshot::capture(&state), rider_id).map(Json)
}

async fn customer_dashboard(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<SubjectQuery>,
) -> Result<Json<CustomerView>, AppError> {
    let customer_id = subject(&actor, Role::Customer, query.id)?;
    Ok(Json(views::customer::build(&Snapshot::capture(&state), customer_id)))
}

async fn stats_summary(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsSummary>, AppError> {
    actor.require_staff("view statistics")?;
    Ok(Json(stats::summarize(&Snapshot::capture(&state), query.window, Utc::now())))
}

async fn landing_stats(State(state): State<Arc<AppState>>) -> Json<LandingStats> {
    Json(stats::landing(&Snapshot::capture(&state)))
}
