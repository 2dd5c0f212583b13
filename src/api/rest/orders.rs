use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::assignment;
use crate::engine::lifecycle::{self, NewOrder, OrderFilter};
use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::assignment::Assignment;
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", patch(update_status))
        .route("/orders/:id/assign", patch(assign_rider))
        .route("/orders/:id/reassign", patch(reassign_rider))
        .route("/orders/:id/auto-assign", post(auto_assign))
        .route("/orders/:id/accept", post(accept_delivery))
        .route("/orders/:id/complete", post(complete_delivery))
}

#[derive(Deserialize, Default)]
pub struct ListOrdersQuery {
    /// Comma separated, e.g. `assigned,on the way`.
    pub status: Option<String>,
    pub customer_id: Option<Uuid>,
    pub rider_id: Option<Uuid>,
}

impl ListOrdersQuery {
    fn into_filter(self) -> Result<OrderFilter, AppError> {
        let mut statuses = Vec::new();
        for raw in self.status.iter().flat_map(|s| s.split(',')) {
            if raw.trim().is_empty() {
                continue;
            }
            let status = raw.parse::<OrderStatus>().map_err(AppError::BadRequest)?;
            if !statuses.contains(&status) {
                statuses.push(status);
            }
        }

        Ok(OrderFilter {
            statuses,
            customer_id: self.customer_id,
            rider_id: self.rider_id,
        })
    }
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Deserialize)]
pub struct AssignRiderRequest {
    pub rider_id: Uuid,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<NewOrder>,
) -> Result<Json<Order>, AppError> {
    lifecycle::create_order(&state, actor, payload).map(Json)
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let filter = query.into_filter()?.scoped_to(&actor);
    Ok(Json(lifecycle::list_orders(&state, &filter)))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    lifecycle::get_order(&state, id, &actor).map(Json)
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, AppError> {
    lifecycle::transition(&state, id, payload.status, actor).map(Json)
}

async fn assign_rider(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRiderRequest>,
) -> Result<Json<Assignment>, AppError> {
    assignment::assign(&state, id, payload.rider_id, &actor).map(Json)
}

async fn reassign_rider(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRiderRequest>,
) -> Result<Json<Assignment>, AppError> {
    assignment::reassign(&state, id, payload.rider_id, &actor).map(Json)
}

async fn auto_assign(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Assignment>, AppError> {
    actor.require_staff("trigger auto-dispatch")?;
    assignment::auto_assign(&state, id, actor.id).map(Json)
}

async fn accept_delivery(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    actor.require_role(Role::Rider, "accept deliveries")?;
    assignment::accept(&state, id, actor.id).map(Json)
}

async fn complete_delivery(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    actor.require_role(Role::Rider, "complete deliveries")?;
    assignment::complete(&state, id, actor.id).map(Json)
}

#[cfg(test)]
mod tests {
    use super::ListOrdersQuery;
    use crate::models::order::OrderStatus;

    #[test]
    fn status_list_is_parsed_and_deduplicated() {
        let query = ListOrdersQuery {
            status: Some("assigned,on the way, assigned,".to_string()),
            ..ListOrdersQuery::default()
        };
        let filter = query.into_filter().unwrap();
        assert_eq!(filter.statuses, vec![OrderStatus::Assigned, OrderStatus::OnTheWay]);
    }

    #[test]
    fn unknown_status_is_a_bad_request() {
        let query = ListOrdersQuery {
            status: Some("lost".to_string()),
            ..ListOrdersQuery::default()
        };
        assert!(query.into_filter().is_err());
    }
}
