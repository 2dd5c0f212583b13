use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::config::Settings;
use crate::engine::stats::LandingStats;
use crate::models::announcement::Announcement;
use crate::models::assignment::Assignment;
use crate::models::event::OrderEvent;
use crate::models::feedback::Feedback;
use crate::models::order::Order;
use crate::models::rider::Rider;
use crate::observability::metrics::Metrics;

/// Shared store behind every dashboard.
///
/// Writers that touch an order hold its `orders` entry guard for the whole
/// check-and-write, and only then take a rider guard. Nothing takes the two
/// in the opposite order.
pub struct AppState {
    pub settings: Settings,
    pub orders: DashMap<Uuid, Order>,
    pub riders: DashMap<Uuid, Rider>,
    pub assignments: DashMap<Uuid, Assignment>,
    /// order id -> id of its single active assignment
    pub active_assignments: DashMap<Uuid, Uuid>,
    pub feedback: DashMap<Uuid, Feedback>,
    /// order id -> feedback id
    pub feedback_by_order: DashMap<Uuid, Uuid>,
    pub announcements: DashMap<Uuid, Announcement>,
    pub dispatch_tx: mpsc::Sender<Uuid>,
    pub order_events_tx: broadcast::Sender<OrderEvent>,
    pub landing_stats_tx: broadcast::Sender<LandingStats>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        settings: Settings,
        dispatch_queue_size: usize,
        event_buffer_size: usize,
    ) -> (Self, mpsc::Receiver<Uuid>) {
        let (dispatch_tx, dispatch_rx) = mpsc::channel(dispatch_queue_size);
        let (order_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);
        let (landing_stats_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        (
            Self {
                settings,
                orders: DashMap::new(),
                riders: DashMap::new(),
                assignments: DashMap::new(),
                active_assignments: DashMap::new(),
                feedback: DashMap::new(),
                feedback_by_order: DashMap::new(),
                announcements: DashMap::new(),
                dispatch_tx,
                order_events_tx,
                landing_stats_tx,
                metrics: Metrics::new(),
            },
            dispatch_rx,
        )
    }

    /// Nobody listening is fine; dashboards fall back to polling.
    pub fn publish(&self, event: OrderEvent) {
        let _ = self.order_events_tx.send(event);
    }
}
