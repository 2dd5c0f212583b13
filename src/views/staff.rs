use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Settings;
use crate::models::order::{OrderStatus, PaymentMethod};
use crate::models::rider::Rider;
use crate::views::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

pub fn priority_for(age: chrono::Duration, settings: &Settings) -> Priority {
    if age >= settings.priority_high_after {
        Priority::High
    } else if age >= settings.priority_medium_after {
        Priority::Medium
    } else {
        Priority::Low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffOrderRow {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub priority: Priority,
    pub age_minutes: i64,
    pub items: usize,
    pub item_summary: String,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub delivery_address: String,
    pub delivery_instructions: Option<String>,
    pub rider_id: Option<Uuid>,
    pub rider_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffCounters {
    pub pending: usize,
    pub preparing: usize,
    pub ready: usize,
    pub available_riders: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffView {
    pub as_of: DateTime<Utc>,
    pub counters: StaffCounters,
    pub orders: Vec<StaffOrderRow>,
    pub available_riders: Vec<Rider>,
}

/// Every order not yet delivered, oldest first, with its age-based priority.
pub fn build(snapshot: &Snapshot, settings: &Settings, as_of: DateTime<Utc>) -> StaffView {
    let available_riders: Vec<Rider> = snapshot
        .riders
        .iter()
        .filter(|rider| rider.can_take_order(settings.rider_capacity))
        .cloned()
        .collect();

    let orders: Vec<StaffOrderRow> = snapshot
        .orders
        .iter()
        .filter(|order| !order.status.is_terminal())
        .map(|order| {
            let age = (as_of - order.created_at).max(chrono::Duration::zero());
            let rider_name = order
                .rider_id
                .and_then(|id| snapshot.rider(id))
                .map(|rider| rider.name.clone());

            StaffOrderRow {
                id: order.id,
                customer_id: order.customer_id,
                status: order.status,
                priority: priority_for(age, settings),
                age_minutes: age.num_minutes(),
                items: order.item_count(),
                item_summary: order
                    .items
                    .iter()
                    .map(|item| format!("{}x {}", item.quantity, item.name))
                    .collect::<Vec<_>>()
                    .join(", "),
                total_amount: order.total_amount,
                payment_method: order.payment_method,
                delivery_address: order.delivery_address.clone(),
                delivery_instructions: order.delivery_instructions.clone(),
                rider_id: order.rider_id,
                rider_name,
                created_at: order.created_at,
            }
        })
        .collect();

    let count = |status: OrderStatus| orders.iter().filter(|row| row.status == status).count();
    let counters = StaffCounters {
        pending: count(OrderStatus::Pending),
        preparing: count(OrderStatus::Preparing),
        ready: count(OrderStatus::Ready),
        available_riders: available_riders.len(),
    };

    StaffView {
        as_of,
        counters,
        orders,
        available_riders,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{build, priority_for, Priority};
    use crate::config::Settings;
    use crate::engine::assignment::{assign, register_rider, NewRider};
    use crate::engine::feedback::tests::deliver;
    use crate::engine::lifecycle::tests::{place, place_ready, staff, state_with};
    use crate::models::order::OrderStatus;
    use crate::views::Snapshot;

    #[test]
    fn priority_follows_order_age() {
        let settings = Settings::default();
        assert_eq!(priority_for(Duration::minutes(0), &settings), Priority::Low);
        assert_eq!(priority_for(Duration::minutes(9), &settings), Priority::Low);
        assert_eq!(priority_for(Duration::minutes(10), &settings), Priority::Medium);
        assert_eq!(priority_for(Duration::minutes(45), &settings), Priority::High);
    }

    #[test]
    fn staff_view_lists_open_orders_with_counters() {
        let state = state_with(Settings::default());
        place(&state, "10");
        place(&state, "11");
        let ready = place_ready(&state, "12");
        let assigned = place_ready(&state, "13");
        deliver(&state, "14");

        let rider = register_rider(
            &state,
            &staff(),
            NewRider {
                name: "Rina".to_string(),
                phone: String::new(),
            },
        )
        .unwrap();
        assign(&state, assigned.id, rider.id, &staff()).unwrap();

        let view = build(&Snapshot::capture(&state), &state.settings, Utc::now());

        assert_eq!(view.orders.len(), 4);
        assert!(view.orders.iter().all(|row| row.status != OrderStatus::Delivered));
        assert_eq!(view.counters.pending, 2);
        assert_eq!(view.counters.preparing, 0);
        assert_eq!(view.counters.ready, 1);
        assert!(view.orders.iter().any(|row| row.id == ready.id));

        let assigned_row = view.orders.iter().find(|row| row.id == assigned.id).unwrap();
        assert_eq!(assigned_row.rider_name.as_deref(), Some("Rina"));
        assert_eq!(assigned_row.items, 2);
        assert_eq!(assigned_row.item_summary, "1x Chicken Adobo, 2x Garlic Rice");
    }

    #[test]
    fn rebuilding_without_mutation_is_identical() {
        let state = state_with(Settings::default());
        place(&state, "10");
        place_ready(&state, "12");
        let as_of = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();

        let first = build(&Snapshot::capture(&state), &state.settings, as_of);
        let second = build(&Snapshot::capture(&state), &state.settings, as_of);
        assert_eq!(first, second);
        assert!(first.orders.iter().all(|row| row.priority == Priority::High));
    }
}
