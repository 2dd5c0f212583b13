use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::RiderCapacity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rider {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub available: bool,
    pub active_deliveries: u32,
    pub total_deliveries: u64,
    pub total_earnings: Decimal,
    pub average_rating: f64,
    pub review_count: u64,
    pub last_assigned_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Rider {
    pub fn new(name: String, phone: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            phone,
            available: true,
            active_deliveries: 0,
            total_deliveries: 0,
            total_earnings: Decimal::ZERO,
            average_rating: 0.0,
            review_count: 0,
            last_assigned_at: None,
            updated_at: now,
        }
    }

    pub fn can_take_order(&self, capacity: RiderCapacity) -> bool {
        self.available && !capacity.is_full(self.active_deliveries)
    }

    pub fn take_delivery(&mut self, capacity: RiderCapacity, now: DateTime<Utc>) {
        self.active_deliveries = self.active_deliveries.saturating_add(1);
        if capacity.is_full(self.active_deliveries) {
            self.available = false;
        }
        self.last_assigned_at = Some(now);
        self.updated_at = now;
    }

    /// Drops one active delivery. A rider that was only busy because of the
    /// capacity limit becomes available again; one that went off duty stays off.
    pub fn release_delivery(&mut self, capacity: RiderCapacity, now: DateTime<Utc>) {
        let was_full = capacity.is_full(self.active_deliveries);
        self.active_deliveries = self.active_deliveries.saturating_sub(1);
        if was_full && !capacity.is_full(self.active_deliveries) {
            self.available = true;
        }
        self.updated_at = now;
    }

    pub fn finish_delivery(&mut self, capacity: RiderCapacity, earnings: Decimal, now: DateTime<Utc>) {
        self.release_delivery(capacity, now);
        self.total_deliveries += 1;
        self.total_earnings += earnings;
    }

    pub fn record_rating(&mut self, rating: u8, now: DateTime<Utc>) {
        let total = self.average_rating * self.review_count as f64 + f64::from(rating);
        self.review_count += 1;
        self.average_rating = total / self.review_count as f64;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::Rider;
    use crate::config::RiderCapacity;

    fn rider() -> Rider {
        Rider::new("Rina".to_string(), "0917".to_string(), Utc::now())
    }

    #[test]
    fn single_capacity_rider_flips_busy_and_back() {
        let capacity = RiderCapacity::Limited(1);
        let mut rider = rider();

        rider.take_delivery(capacity, Utc::now());
        assert!(!rider.available);
        assert!(!rider.can_take_order(capacity));

        rider.finish_delivery(capacity, Decimal::new(35050, 2), Utc::now());
        assert!(rider.available);
        assert_eq!(rider.active_deliveries, 0);
        assert_eq!(rider.total_deliveries, 1);
        assert_eq!(rider.total_earnings, Decimal::new(35050, 2));
    }

    #[test]
    fn unlimited_rider_never_flips_busy() {
        let mut rider = rider();
        for _ in 0..10 {
            rider.take_delivery(RiderCapacity::Unlimited, Utc::now());
        }
        assert!(rider.available);
        assert_eq!(rider.active_deliveries, 10);
    }

    #[test]
    fn off_duty_rider_stays_off_after_release() {
        let capacity = RiderCapacity::Limited(3);
        let mut rider = rider();
        rider.take_delivery(capacity, Utc::now());
        rider.available = false;

        rider.release_delivery(capacity, Utc::now());
        assert!(!rider.available);
    }

    #[test]
    fn rating_average_is_running_mean() {
        let mut rider = rider();
        rider.record_rating(5, Utc::now());
        rider.record_rating(4, Utc::now());
        rider.record_rating(3, Utc::now());
        assert_eq!(rider.review_count, 3);
        assert!((rider.average_rating - 4.0).abs() < 1e-12);
    }
}
