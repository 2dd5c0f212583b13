use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffResponse {
    pub responder_id: Uuid,
    pub text: String,
    pub responded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: Uuid,
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub rider_id: Option<Uuid>,
    pub rating: u8,
    pub comment: Option<String>,
    pub response: Option<StaffResponse>,
    pub created_at: DateTime<Utc>,
}

pub fn is_valid_rating(rating: i64) -> bool {
    (i64::from(MIN_RATING)..=i64::from(MAX_RATING)).contains(&rating)
}
