use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::feedback::Feedback;
use crate::models::order::{LineItem, Order, OrderStatus, PaymentMethod};
use crate::views::Snapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerOrder {
    pub id: Uuid,
    pub status: OrderStatus,
    pub items: Vec<LineItem>,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub delivery_address: String,
    pub rider_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Order> for CustomerOrder {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            status: order.status,
            items: order.items.clone(),
            total_amount: order.total_amount,
            payment_method: order.payment_method,
            delivery_address: order.delivery_address.clone(),
            rider_id: order.rider_id,
            created_at: order.created_at,
            completed_at: order.completed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub order: CustomerOrder,
    pub feedback: Option<Feedback>,
    pub can_leave_feedback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerView {
    pub customer_id: Uuid,
    pub recent: Vec<CustomerOrder>,
    pub history: Vec<HistoryEntry>,
    pub total_orders: usize,
    pub total_spent: Decimal,
}

/// The customer's own orders, newest first. Delivered orders offer a
/// feedback form until feedback exists.
pub fn build(snapshot: &Snapshot, customer_id: Uuid) -> CustomerView {
    let feedback = snapshot.feedback_by_order();

    let mut recent = Vec::new();
    let mut history = Vec::new();
    let mut total_orders = 0;
    let mut total_spent = Decimal::ZERO;

    for order in snapshot.orders.iter().rev().filter(|o| o.customer_id == customer_id) {
        total_orders += 1;
        if order.status.is_terminal() {
            total_spent += order.total_amount;
            let existing = feedback.get(&order.id).map(|f| (*f).clone());
            history.push(HistoryEntry {
                order: CustomerOrder::from(order),
                can_leave_feedback: existing.is_none(),
                feedback: existing,
            });
        } else {
            recent.push(CustomerOrder::from(order));
        }
    }

    CustomerView {
        customer_id,
        recent,
        history,
        total_orders,
        total_spent,
    }
}
