use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::RiderCapacity;
use crate::models::rider::Rider;

const LOAD_WEIGHT: f64 = 0.50;
const RATING_WEIGHT: f64 = 0.30;
const IDLE_WEIGHT: f64 = 0.20;

/// Rating assumed for riders nobody has reviewed yet (3 of 5 stars).
const UNRATED_SCORE: f64 = 0.6;
/// Minutes of idleness at which the idle component reaches one half.
const IDLE_HALF_MINUTES: f64 = 15.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub load_score: f64,
    pub rating_score: f64,
    pub idle_score: f64,
}

pub fn compute_score(
    rider: &Rider,
    capacity: RiderCapacity,
    now: DateTime<Utc>,
) -> (f64, ScoreBreakdown) {
    let breakdown = ScoreBreakdown {
        load_score: load_score(rider.active_deliveries, capacity),
        rating_score: rating_score(rider),
        idle_score: idle_score(rider.last_assigned_at, now),
    };

    let score = weighted_score(&breakdown);
    (score, breakdown)
}

pub fn weighted_score(breakdown: &ScoreBreakdown) -> f64 {
    (breakdown.load_score * LOAD_WEIGHT)
        + (breakdown.rating_score * RATING_WEIGHT)
        + (breakdown.idle_score * IDLE_WEIGHT)
}

/// Picks the rider to hand an order to. Highest score wins; ties go to the
/// rider who has waited longest (never assigned first), then the smallest id.
pub fn pick_best<'a>(
    candidates: &'a [Rider],
    capacity: RiderCapacity,
    now: DateTime<Utc>,
) -> Option<(&'a Rider, f64, ScoreBreakdown)> {
    candidates
        .iter()
        .map(|rider| {
            let (score, breakdown) = compute_score(rider, capacity, now);
            (rider, score, breakdown)
        })
        .min_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| longest_waiting_first(a.0, b.0))
                .then_with(|| a.0.id.cmp(&b.0.id))
        })
}

fn longest_waiting_first(a: &Rider, b: &Rider) -> Ordering {
    match (a.last_assigned_at, b.last_assigned_at) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.cmp(&b),
    }
}

fn load_score(active: u32, capacity: RiderCapacity) -> f64 {
    match capacity {
        RiderCapacity::Unlimited => 1.0 / (1.0 + f64::from(active)),
        RiderCapacity::Limited(_) => (1.0 - capacity.utilization(active)).clamp(0.0, 1.0),
    }
}

fn rating_score(rider: &Rider) -> f64 {
    if rider.review_count == 0 {
        return UNRATED_SCORE;
    }
    (rider.average_rating / 5.0).clamp(0.0, 1.0)
}

fn idle_score(last_assigned_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(last) = last_assigned_at else {
        return 1.0;
    };
    let idle_minutes = (now - last).num_seconds().max(0) as f64 / 60.0;
    idle_minutes / (idle_minutes + IDLE_HALF_MINUTES)
}
