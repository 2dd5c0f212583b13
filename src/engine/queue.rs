use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Hands a ready order to the auto-dispatch worker without blocking the caller.
pub fn enqueue_for_dispatch(state: &AppState, order_id: Uuid) -> Result<(), AppError> {
    // Counted before the send so the worker never decrements below zero.
    state.metrics.dispatch_queue_depth.inc();

    state.dispatch_tx.try_send(order_id).map_err(|err| {
        state.metrics.dispatch_queue_depth.dec();
        match err {
            TrySendError::Full(_) => AppError::Transient("dispatch queue is full".to_string()),
            TrySendError::Closed(_) => AppError::Internal("dispatch queue is closed".to_string()),
        }
    })
}
