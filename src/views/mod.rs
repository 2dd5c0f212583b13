//! Role-scoped read projections. Everything here is computed from a
//! [`Snapshot`] plus an explicit instant and never writes to the store.

pub mod customer;
pub mod rider;
pub mod staff;

use std::collections::HashMap;

use uuid::Uuid;

use crate::models::assignment::Assignment;
use crate::models::feedback::Feedback;
use crate::models::order::Order;
use crate::models::rider::Rider;
use crate::state::AppState;

/// Detached copy of the store, in a stable order.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub orders: Vec<Order>,
    pub riders: Vec<Rider>,
    pub assignments: Vec<Assignment>,
    pub feedback: Vec<Feedback>,
}

impl Snapshot {
    pub fn capture(state: &AppState) -> Self {
        Self::from_parts(
            state.orders.iter().map(|e| e.value().clone()).collect(),
            state.riders.iter().map(|e| e.value().clone()).collect(),
            state.assignments.iter().map(|e| e.value().clone()).collect(),
            state.feedback.iter().map(|e| e.value().clone()).collect(),
        )
    }

    pub fn from_parts(
        mut orders: Vec<Order>,
        mut riders: Vec<Rider>,
        mut assignments: Vec<Assignment>,
        mut feedback: Vec<Feedback>,
    ) -> Self {
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        riders.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        assignments.sort_by(|a, b| a.assigned_at.cmp(&b.assigned_at).then(a.id.cmp(&b.id)));
        feedback.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Self {
            orders,
            riders,
            assignments,
            feedback,
        }
    }

    pub fn rider(&self, rider_id: Uuid) -> Option<&Rider> {
        self.riders.iter().find(|rider| rider.id == rider_id)
    }

    pub fn feedback_by_order(&self) -> HashMap<Uuid, &Feedback> {
        self.feedback.iter().map(|f| (f.order_id, f)).collect()
    }
}
