use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::assignment::{Assignment, AssignmentState};
use crate::models::order::{OrderStatus, PaymentMethod};
use crate::views::Snapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveDelivery {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub customer_id: Uuid,
    pub delivery_address: String,
    pub delivery_instructions: Option<String>,
    pub payment_method: PaymentMethod,
    pub total_amount: Decimal,
    pub items: usize,
    pub assigned_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedDelivery {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub items: usize,
    pub completed_at: Option<DateTime<Utc>>,
    pub rating: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiderTotals {
    pub available: bool,
    pub active_deliveries: u32,
    pub total_deliveries: u64,
    pub total_earnings: Decimal,
    pub average_rating: f64,
    pub review_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiderView {
    pub rider_id: Uuid,
    pub name: String,
    pub totals: RiderTotals,
    pub active: Vec<ActiveDelivery>,
    pub history: Vec<CompletedDelivery>,
}

/// Deliveries bound to `rider_id`: running ones oldest first, finished ones
/// newest first. Bindings the rider lost through reassignment are left out.
pub fn build(snapshot: &Snapshot, rider_id: Uuid) -> Result<RiderView, AppError> {
    let rider = snapshot
        .rider(rider_id)
        .ok_or_else(|| AppError::NotFound(format!("rider {rider_id} not found")))?;

    let bindings: HashMap<Uuid, &Assignment> = snapshot
        .assignments
        .iter()
        .filter(|a| a.rider_id == rider_id && a.state != AssignmentState::Released)
        .map(|a| (a.order_id, a))
        .collect();
    let feedback = snapshot.feedback_by_order();

    let mut active = Vec::new();
    let mut history = Vec::new();
    for order in &snapshot.orders {
        let Some(binding) = bindings.get(&order.id) else {
            continue;
        };

        if order.status.is_out_for_delivery() {
            active.push(ActiveDelivery {
                order_id: order.id,
                status: order.status,
                customer_id: order.customer_id,
                delivery_address: order.delivery_address.clone(),
                delivery_instructions: order.delivery_instructions.clone(),
                payment_method: order.payment_method,
                total_amount: order.total_amount,
                items: order.item_count(),
                assigned_at: binding.assigned_at,
                accepted_at: binding.accepted_at,
            });
        } else if order.status.is_terminal() {
            history.push(CompletedDelivery {
                order_id: order.id,
                customer_id: order.customer_id,
                amount: order.total_amount,
                items: order.item_count(),
                completed_at: order.completed_at,
                rating: feedback.get(&order.id).map(|f| f.rating),
            });
        }
    }
    history.sort_by(|a, b| b.completed_at.cmp(&a.completed_at).then(a.order_id.cmp(&b.order_id)));

    Ok(RiderView {
        rider_id,
        name: rider.name.clone(),
        totals: RiderTotals {
            available: rider.available,
            active_deliveries: rider.active_deliveries,
            total_deliveries: rider.total_deliveries,
            total_earnings: rider.total_earnings,
            average_rating: rider.average_rating,
            review_count: rider.review_count,
        },
        active,
        history,
    })
}
