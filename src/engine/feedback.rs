//! Post-delivery ratings and staff responses.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use serde_json::Number;
use tracing::info;
use uuid::Uuid;

use crate::engine::lifecycle::{self, order_not_found};
use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::event::{OrderEvent, OrderEventKind};
use crate::models::feedback::{is_valid_rating, Feedback, StaffResponse};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackSummary {
    pub feedback: Vec<Feedback>,
    pub average_rating: f64,
}

fn feedback_not_found(feedback_id: Uuid) -> AppError {
    AppError::NotFound(format!("feedback {feedback_id} not found"))
}

/// Records the customer's rating for a delivered order. One per order.
/// The rating arrives as a raw JSON number; anything but a whole number in
/// `1..=5` is `InvalidRating`.
pub fn submit(
    state: &AppState,
    order_id: Uuid,
    actor: &Actor,
    rating: impl Into<Number>,
    comment: Option<String>,
) -> Result<Feedback, AppError> {
    let rating: Number = rating.into();
    let (customer_id, rider_id, status) = {
        let order = state.orders.get(&order_id).ok_or_else(|| order_not_found(order_id))?;
        (order.customer_id, order.rider_id, order.status)
    };

    let rating = rating
        .as_i64()
        .filter(|value| is_valid_rating(*value))
        .ok_or_else(|| AppError::InvalidRating(rating.to_string()))?;
    if !status.is_terminal() {
        return Err(AppError::OrderNotCompleted(format!("{order_id} (status {status})")));
    }
    if actor.role != Role::Customer || actor.id != customer_id {
        return Err(AppError::Forbidden(format!(
            "only the customer who placed order {order_id} may rate it"
        )));
    }

    let now = Utc::now();
    let feedback = match state.feedback_by_order.entry(order_id) {
        Entry::Occupied(_) => return Err(AppError::DuplicateFeedback(order_id.to_string())),
        Entry::Vacant(slot) => {
            let feedback = Feedback {
                id: Uuid::new_v4(),
                order_id,
                customer_id,
                rider_id,
                rating: rating as u8,
                comment: comment
                    .map(|text| text.trim().to_string())
                    .filter(|text| !text.is_empty()),
                response: None,
                created_at: now,
            };
            state.feedback.insert(feedback.id, feedback.clone());
            slot.insert(feedback.id);
            feedback
        }
    };

    if let Some(rider_id) = rider_id {
        if let Some(mut rider) = state.riders.get_mut(&rider_id) {
            rider.record_rating(feedback.rating, now);
        }
    }

    state.metrics.feedback_submitted_total.inc();
    state.publish(OrderEvent {
        kind: OrderEventKind::FeedbackSubmitted,
        order_id,
        status,
        customer_id,
        rider_id,
        at: now,
    });

    info!(
        order_id = %order_id,
        feedback_id = %feedback.id,
        rating = feedback.rating,
        "feedback submitted"
    );

    Ok(feedback)
}

/// Staff reply to a piece of feedback. Overwrites any earlier reply.
pub fn respond(
    state: &AppState,
    feedback_id: Uuid,
    actor: &Actor,
    text: &str,
) -> Result<Feedback, AppError> {
    actor.require_staff("respond to feedback")?;

    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::EmptyResponse);
    }

    let now = Utc::now();
    let updated = {
        let mut feedback = state
            .feedback
            .get_mut(&feedback_id)
            .ok_or_else(|| feedback_not_found(feedback_id))?;
        feedback.response = Some(StaffResponse {
            responder_id: actor.id,
            text: text.to_string(),
            responded_at: now,
        });
        feedback.clone()
    };

    if let Some(order) = state.orders.get(&updated.order_id).map(|order| order.clone()) {
        state.publish(OrderEvent {
            kind: OrderEventKind::FeedbackResponded,
            order_id: order.id,
            status: order.status,
            customer_id: order.customer_id,
            rider_id: order.rider_id,
            at: now,
        });
    }

    info!(feedback_id = %feedback_id, responder_id = %actor.id, "feedback answered");
    Ok(updated)
}

/// Arithmetic mean of every stored rating, `0.0` when there are none.
pub fn average_rating(state: &AppState) -> f64 {
    let (sum, count) = state
        .feedback
        .iter()
        .fold((0u64, 0u64), |(sum, count), entry| {
            (sum + u64::from(entry.rating), count + 1)
        });
    mean(sum, count)
}

pub(crate) fn mean(sum: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

/// Every piece of feedback, newest first, with the overall average.
pub fn list_feedback(state: &AppState) -> FeedbackSummary {
    let mut feedback: Vec<Feedback> = state
        .feedback
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    feedback.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

    let sum: u64 = feedback.iter().map(|f| u64::from(f.rating)).sum();
    let average_rating = mean(sum, feedback.len() as u64);

    FeedbackSummary {
        feedback,
        average_rating,
    }
}

/// Feedback left on one order. Visible to whoever may see the order itself.
pub fn feedback_for_order(
    state: &AppState,
    order_id: Uuid,
    actor: &Actor,
) -> Result<Option<Feedback>, AppError> {
    lifecycle::get_order(state, order_id, actor)?;

    let feedback_id = state.feedback_by_order.get(&order_id).map(|id| *id);
    Ok(feedback_id.and_then(|id| state.feedback.get(&id).map(|f| f.clone())))
}

#[cfg(test)]
pub(crate) mod tests {
    use uuid::Uuid;

    use super::{average_rating, feedback_for_order, list_feedback, respond, submit};
    use crate::config::Settings;
    use crate::engine::assignment::{accept, assign, complete, register_rider, NewRider};
    use crate::engine::lifecycle::tests::{customer, place, place_ready, staff, state_with};
    use crate::error::AppError;
    use crate::models::actor::{Actor, Role};
    use crate::models::order::Order;
    use crate::state::AppState;

    pub(crate) fn deliver(state: &AppState, price: &str) -> (Order, Actor) {
        let order = place_ready(state, price);
        let rider = register_rider(
            state,
            &staff(),
            NewRider {
                name: format!("rider-{}", order.id),
                phone: String::new(),
            },
        )
        .unwrap();
        assign(state, order.id, rider.id, &staff()).unwrap();
        accept(state, order.id, rider.id).unwrap();
        let order = complete(state, order.id, rider.id).unwrap();
        (order, Actor::new(rider.id, Role::Rider))
    }

    #[test]
    fn feedback_is_accepted_once_per_order() {
        let state = state_with(Settings::default());
        let (order, _) = deliver(&state, "10");

        let feedback = submit(&state, order.id, &customer(), 5, Some("great".to_string())).unwrap();
        assert_eq!(feedback.rating, 5);
        assert_eq!(feedback.comment.as_deref(), Some("great"));

        let err = submit(&state, order.id, &customer(), 4, Some("x".to_string())).unwrap_err();
        assert!(matches!(err, AppError::DuplicateFeedback(_)));
        assert_eq!(state.feedback.len(), 1);
    }

    #[test]
    fn undelivered_orders_cannot_be_rated() {
        let state = state_with(Settings::default());
        let order = place(&state, "10");

        let err = submit(&state, order.id, &customer(), 5, None).unwrap_err();
        assert!(matches!(err, AppError::OrderNotCompleted(_)));
    }

    #[test]
    fn ratings_outside_one_to_five_are_rejected() {
        let state = state_with(Settings::default());
        let (order, _) = deliver(&state, "10");

        for rating in [0, 6, -1, 100] {
            let err = submit(&state, order.id, &customer(), rating, None).unwrap_err();
            assert_eq!(err, AppError::InvalidRating(rating.to_string()));
        }
        for fractional in [4.5, 1.0] {
            let number = serde_json::Number::from_f64(fractional).unwrap();
            let err = submit(&state, order.id, &customer(), number, None).unwrap_err();
            assert!(matches!(err, AppError::InvalidRating(_)));
        }
        assert!(submit(&state, order.id, &customer(), 1, None).is_ok());
    }

    #[test]
    fn only_the_ordering_customer_rates() {
        let state = state_with(Settings::default());
        let (order, rider) = deliver(&state, "10");
        let stranger = Actor::new(Uuid::new_v4(), Role::Customer);

        assert!(matches!(submit(&state, order.id, &stranger, 5, None), Err(AppError::Forbidden(_))));
        assert!(matches!(submit(&state, order.id, &rider, 5, None), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn rating_feeds_the_delivering_rider() {
        let state = state_with(Settings::default());
        let (order, rider) = deliver(&state, "10");

        submit(&state, order.id, &customer(), 4, None).unwrap();
        let stored = state.riders.get(&rider.id).unwrap().clone();
        assert_eq!(stored.review_count, 1);
        assert_eq!(stored.average_rating, 4.0);
    }

    #[test]
    fn staff_response_overwrites_and_rejects_blank_text() {
        let state = state_with(Settings::default());
        let (order, _) = deliver(&state, "10");
        let feedback = submit(&state, order.id, &customer(), 5, None).unwrap();

        assert_eq!(respond(&state, feedback.id, &staff(), ""), Err(AppError::EmptyResponse));
        assert_eq!(respond(&state, feedback.id, &staff(), "   "), Err(AppError::EmptyResponse));

        respond(&state, feedback.id, &staff(), "Thank you!").unwrap();
        let updated = respond(&state, feedback.id, &staff(), " See you again ").unwrap();
        let response = updated.response.unwrap();
        assert_eq!(response.text, "See you again");
        assert_eq!(response.responder_id, staff().id);

        assert!(matches!(
            respond(&state, Uuid::new_v4(), &staff(), "hello"),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            respond(&state, feedback.id, &customer(), "hello"),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn average_is_the_exact_mean() {
        let state = state_with(Settings::default());
        assert_eq!(average_rating(&state), 0.0);

        for rating in [5, 4, 5] {
            let (order, _) = deliver(&state, "10");
            submit(&state, order.id, &customer(), rating, None).unwrap();
        }

        assert_eq!(average_rating(&state), 14.0 / 3.0);
        assert_eq!(list_feedback(&state).average_rating, 14.0 / 3.0);
        assert_eq!(list_feedback(&state).feedback.len(), 3);
    }

    #[test]
    fn feedback_lookup_by_order() {
        let state = state_with(Settings::default());
        let (order, _) = deliver(&state, "10");
        assert_eq!(feedback_for_order(&state, order.id, &customer()).unwrap(), None);

        let feedback = submit(&state, order.id, &customer(), 3, None).unwrap();
        assert_eq!(
            feedback_for_order(&state, order.id, &customer()).unwrap(),
            Some(feedback)
        );
        assert!(matches!(
            feedback_for_order(&state, Uuid::new_v4(), &staff()),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn feedback_is_visible_only_to_those_who_see_the_order() {
        let state = state_with(Settings::default());
        let (order, rider) = deliver(&state, "10");
        let feedback =
            submit(&state, order.id, &customer(), 2, Some("cold soup".to_string())).unwrap();

        for allowed in [customer(), rider, staff()] {
            assert_eq!(
                feedback_for_order(&state, order.id, &allowed).unwrap(),
                Some(feedback.clone())
            );
        }

        let stranger = Actor::new(Uuid::new_v4(), Role::Customer);
        let other_rider = Actor::new(Uuid::new_v4(), Role::Rider);
        for denied in [stranger, other_rider] {
            assert!(matches!(
                feedback_for_order(&state, order.id, &denied),
                Err(AppError::Forbidden(_))
            ));
        }
    }
}
