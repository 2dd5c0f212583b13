use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::OrderStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEventKind {
    Created,
    StatusChanged,
    Assigned,
    Reassigned,
    FeedbackSubmitted,
    FeedbackResponded,
}

/// Pushed to dashboard subscribers after every mutation of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub kind: OrderEventKind,
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub customer_id: Uuid,
    pub rider_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}
