//! Rider assignment service: binds ready orders to riders and walks the
//! delivery half of the lifecycle.

use std::time::Instant;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::lifecycle::{order_event, order_not_found};
use crate::engine::scoring::pick_best;
use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::assignment::{Assignment, AssignmentState};
use crate::models::event::OrderEventKind;
use crate::models::order::{Order, OrderStatus};
use crate::models::rider::Rider;
use crate::state::AppState;

/// Actor id recorded in order history for bindings made by the dispatcher.
pub const SYSTEM_ACTOR_ID: Uuid = Uuid::nil();

#[derive(Debug, Clone, Deserialize)]
pub struct NewRider {
    pub name: String,
    #[serde(default)]
    pub phone: String,
}

fn rider_not_found(rider_id: Uuid) -> AppError {
    AppError::NotFound(format!("rider {rider_id} not found"))
}

pub fn register_rider(state: &AppState, actor: &Actor, request: NewRider) -> Result<Rider, AppError> {
    actor.require_staff("register riders")?;

    if request.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    let rider = Rider::new(
        request.name.trim().to_string(),
        request.phone.trim().to_string(),
        Utc::now(),
    );
    state.riders.insert(rider.id, rider.clone());

    info!(rider_id = %rider.id, name = %rider.name, "rider registered");
    Ok(rider)
}

pub fn list_riders(state: &AppState) -> Vec<Rider> {
    let mut riders: Vec<Rider> = state.riders.iter().map(|entry| entry.value().clone()).collect();
    riders.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    riders
}

/// Riders that can take another order right now under the capacity policy.
pub fn list_available_riders(state: &AppState) -> Vec<Rider> {
    let capacity = state.settings.rider_capacity;
    let mut riders = list_riders(state);
    riders.retain(|rider| rider.can_take_order(capacity));
    riders
}

/// On/off duty toggle. Riders flip their own flag; staff may flip anyone's.
pub fn set_availability(
    state: &AppState,
    rider_id: Uuid,
    available: bool,
    actor: &Actor,
) -> Result<Rider, AppError> {
    let own = actor.role == Role::Rider && actor.id == rider_id;
    if !own {
        actor.require_staff("change another rider's availability")?;
    }

    let capacity = state.settings.rider_capacity;
    let mut rider = state
        .riders
        .get_mut(&rider_id)
        .ok_or_else(|| rider_not_found(rider_id))?;

    if available && capacity.is_full(rider.active_deliveries) {
        return Err(AppError::RiderUnavailable(format!(
            "{rider_id} is at capacity with {} active deliveries",
            rider.active_deliveries
        )));
    }

    rider.available = available;
    rider.updated_at = Utc::now();
    info!(rider_id = %rider_id, available, "rider availability changed");

    Ok(rider.clone())
}

/// Staff binds a ready order to a specific rider.
pub fn assign(
    state: &AppState,
    order_id: Uuid,
    rider_id: Uuid,
    actor: &Actor,
) -> Result<Assignment, AppError> {
    actor.require_staff("assign riders")?;
    let result = bind(state, order_id, rider_id, actor.id);
    record_outcome(state, "manual", &result);
    result
}

/// Binds a ready order to the best-scoring eligible rider.
pub fn auto_assign(state: &AppState, order_id: Uuid, actor_id: Uuid) -> Result<Assignment, AppError> {
    let now = Utc::now();
    let candidates = list_available_riders(state);

    let result = match pick_best(&candidates, state.settings.rider_capacity, now) {
        Some((rider, score, breakdown)) => {
            info!(
                order_id = %order_id,
                rider_id = %rider.id,
                score,
                load_score = breakdown.load_score,
                rating_score = breakdown.rating_score,
                idle_score = breakdown.idle_score,
                "auto-dispatch picked rider"
            );
            bind(state, order_id, rider.id, actor_id)
        }
        None => Err(AppError::RiderUnavailable("no rider can take the order".to_string())),
    };

    record_outcome(state, "auto", &result);
    result
}

fn record_outcome(state: &AppState, mode: &str, result: &Result<Assignment, AppError>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(err) => err.code(),
    };
    state
        .metrics
        .assignments_total
        .with_label_values(&[outcome])
        .inc();
    if let Err(err) = result {
        warn!(mode, error = %err, "assignment rejected");
    }
}

/// Check-and-set of `ready -> assigned`, performed under the order's entry
/// guard so only one of several concurrent callers can win.
fn bind(
    state: &AppState,
    order_id: Uuid,
    rider_id: Uuid,
    actor_id: Uuid,
) -> Result<Assignment, AppError> {
    let started = Instant::now();
    let capacity = state.settings.rider_capacity;
    let now = Utc::now();

    let (order, assignment) = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| order_not_found(order_id))?;

        if order.status.is_out_for_delivery() || state.active_assignments.contains_key(&order_id) {
            return Err(AppError::AlreadyAssigned(order_id.to_string()));
        }
        if order.status != OrderStatus::Ready {
            return Err(AppError::OrderNotReady(format!("{order_id} (status {})", order.status)));
        }

        let mut rider = state
            .riders
            .get_mut(&rider_id)
            .ok_or_else(|| rider_not_found(rider_id))?;
        if !rider.can_take_order(capacity) {
            return Err(AppError::RiderUnavailable(rider_id.to_string()));
        }

        rider.take_delivery(capacity, now);
        update_utilization(state, &rider);
        drop(rider);

        order.advance(OrderStatus::Assigned, actor_id, now);
        order.rider_id = Some(rider_id);

        let assignment = Assignment::new(order_id, rider_id, now);
        state.assignments.insert(assignment.id, assignment.clone());
        state.active_assignments.insert(order_id, assignment.id);

        (order.clone(), assignment)
    };

    state
        .metrics
        .order_transitions_total
        .with_label_values(&[OrderStatus::Assigned.as_label()])
        .inc();
    state.metrics.observe_operation("assign", started);
    state.publish(order_event(OrderEventKind::Assigned, &order));

    info!(
        order_id = %order_id,
        rider_id = %rider_id,
        assignment_id = %assignment.id,
        "order assigned"
    );

    Ok(assignment)
}

/// Moves an assigned order to another rider before the first one accepted it.
pub fn reassign(
    state: &AppState,
    order_id: Uuid,
    rider_id: Uuid,
    actor: &Actor,
) -> Result<Assignment, AppError> {
    actor.require_staff("reassign riders")?;

    let started = Instant::now();
    let capacity = state.settings.rider_capacity;
    let now = Utc::now();

    let (order, previous_rider, assignment) = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| order_not_found(order_id))?;

        match order.status {
            OrderStatus::Assigned => {}
            OrderStatus::Pending | OrderStatus::Preparing | OrderStatus::Ready => {
                return Err(AppError::OrderNotReady(format!(
                    "{order_id} has no rider to replace (status {})",
                    order.status
                )));
            }
            OrderStatus::OnTheWay | OrderStatus::Delivered => {
                return Err(AppError::InvalidTransition {
                    from: order.status,
                    to: OrderStatus::Assigned,
                });
            }
        }

        let previous_rider = order
            .rider_id
            .ok_or_else(|| AppError::Internal(format!("assigned order {order_id} has no rider")))?;
        if previous_rider == rider_id {
            return Err(AppError::AlreadyAssigned(format!("{order_id} to rider {rider_id}")));
        }

        {
            let mut rider = state
                .riders
                .get_mut(&rider_id)
                .ok_or_else(|| rider_not_found(rider_id))?;
            if !rider.can_take_order(capacity) {
                return Err(AppError::RiderUnavailable(rider_id.to_string()));
            }
            rider.take_delivery(capacity, now);
            update_utilization(state, &rider);
        }

        if let Some(mut rider) = state.riders.get_mut(&previous_rider) {
            rider.release_delivery(capacity, now);
            update_utilization(state, &rider);
        }

        if let Some((_, previous_id)) = state.active_assignments.remove(&order_id) {
            if let Some(mut previous) = state.assignments.get_mut(&previous_id) {
                previous.state = AssignmentState::Released;
                previous.released_at = Some(now);
            }
        }

        let assignment = Assignment::new(order_id, rider_id, now);
        state.assignments.insert(assignment.id, assignment.clone());
        state.active_assignments.insert(order_id, assignment.id);

        order.rider_id = Some(rider_id);
        order.updated_at = now;

        (order.clone(), previous_rider, assignment)
    };

    state.metrics.observe_operation("reassign", started);
    state.publish(order_event(OrderEventKind::Reassigned, &order));

    info!(
        order_id = %order_id,
        from_rider = %previous_rider,
        to_rider = %rider_id,
        "order reassigned"
    );

    Ok(assignment)
}

/// The bound rider picks the order up: `assigned -> on the way`.
pub fn accept(state: &AppState, order_id: Uuid, rider_id: Uuid) -> Result<Order, AppError> {
    let started = Instant::now();
    let now = Utc::now();

    let order = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| order_not_found(order_id))?;

        if order.status != OrderStatus::Assigned {
            return Err(AppError::InvalidTransition {
                from: order.status,
                to: OrderStatus::OnTheWay,
            });
        }
        ensure_bound(&order, rider_id)?;

        order.advance(OrderStatus::OnTheWay, rider_id, now);
        if let Some(assignment_id) = state.active_assignments.get(&order_id).map(|id| *id) {
            if let Some(mut assignment) = state.assignments.get_mut(&assignment_id) {
                assignment.accepted_at = Some(now);
            }
        }

        order.clone()
    };

    state
        .metrics
        .order_transitions_total
        .with_label_values(&[OrderStatus::OnTheWay.as_label()])
        .inc();
    state.metrics.observe_operation("accept", started);
    state.publish(order_event(OrderEventKind::StatusChanged, &order));

    info!(order_id = %order_id, rider_id = %rider_id, "delivery accepted");
    Ok(order)
}

/// The bound rider hands the order over: `on the way -> delivered`. The
/// rider's totals move together with the status while the order is locked.
pub fn complete(state: &AppState, order_id: Uuid, rider_id: Uuid) -> Result<Order, AppError> {
    let started = Instant::now();
    let capacity = state.settings.rider_capacity;
    let now = Utc::now();

    let order = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| order_not_found(order_id))?;

        if order.status != OrderStatus::OnTheWay {
            return Err(AppError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Delivered,
            });
        }
        ensure_bound(&order, rider_id)?;

        {
            let mut rider = state
                .riders
                .get_mut(&rider_id)
                .ok_or_else(|| rider_not_found(rider_id))?;
            rider.finish_delivery(capacity, order.total_amount, now);
            update_utilization(state, &rider);
        }

        order.advance(OrderStatus::Delivered, rider_id, now);
        if let Some((_, assignment_id)) = state.active_assignments.remove(&order_id) {
            if let Some(mut assignment) = state.assignments.get_mut(&assignment_id) {
                assignment.state = AssignmentState::Completed;
                assignment.completed_at = Some(now);
            }
        }

        order.clone()
    };

    state
        .metrics
        .order_transitions_total
        .with_label_values(&[OrderStatus::Delivered.as_label()])
        .inc();
    state.metrics.observe_operation("complete", started);
    state.publish(order_event(OrderEventKind::StatusChanged, &order));

    info!(
        order_id = %order_id,
        rider_id = %rider_id,
        amount = %order.total_amount,
        "delivery completed"
    );
    Ok(order)
}

fn ensure_bound(order: &Order, rider_id: Uuid) -> Result<(), AppError> {
    if order.rider_id == Some(rider_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "order {} is not assigned to rider {rider_id}",
            order.id
        )))
    }
}

fn update_utilization(state: &AppState, rider: &Rider) {
    state
        .metrics
        .rider_utilization
        .with_label_values(&[&rider.id.to_string()])
        .set(state.settings.rider_capacity.utilization(rider.active_deliveries));
}
