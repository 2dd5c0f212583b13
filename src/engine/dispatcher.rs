use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::assignment::{auto_assign, SYSTEM_ACTOR_ID};
use crate::engine::queue::enqueue_for_dispatch;
use crate::error::AppError;
use crate::models::order::OrderStatus;
use crate::state::AppState;

/// Auto-dispatch worker. Consumes ready order ids and binds each one to the
/// best available rider; orders nobody can take are retried after a delay.
pub async fn run_dispatcher(state: Arc<AppState>, mut order_rx: mpsc::Receiver<Uuid>) {
    info!("auto-dispatch worker started");

    while let Some(order_id) = order_rx.recv().await {
        state.metrics.dispatch_queue_depth.dec();

        let still_ready = state
            .orders
            .get(&order_id)
            .is_some_and(|order| order.status == OrderStatus::Ready);
        if !still_ready {
            debug!(order_id = %order_id, "order left ready before dispatch; skipping");
            continue;
        }

        match auto_assign(&state, order_id, SYSTEM_ACTOR_ID) {
            Ok(assignment) => {
                debug!(order_id = %order_id, rider_id = %assignment.rider_id, "auto-dispatched");
            }
            Err(AppError::RiderUnavailable(_)) => {
                warn!(order_id = %order_id, "no eligible riders; re-queueing order");
                let state = state.clone();
                let delay = state.settings.auto_assign_retry;
                tokio::spawn(async move {
                    sleep(delay).await;
                    if let Err(err) = enqueue_for_dispatch(&state, order_id) {
                        error!(order_id = %order_id, error = %err, "failed to re-queue order");
                    }
                });
            }
            Err(AppError::AlreadyAssigned(_)) | Err(AppError::OrderNotReady(_)) => {
                debug!(order_id = %order_id, "order was bound by someone else");
            }
            Err(err) => {
                error!(order_id = %order_id, error = %err, "auto-dispatch failed");
            }
        }
    }

    warn!("auto-dispatch worker stopped: queue channel closed");
}
