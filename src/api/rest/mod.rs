pub mod actor;
pub mod announcements;
pub mod dashboard;
pub mod feedback;
pub mod orders;
pub mod riders;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::BoxError;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower::ServiceBuilder;

use crate::error::AppError;
use crate::state::AppState;

/// Every request is bounded by `request_timeout`; callers that hit it get a
/// retryable `Transient` error.
pub fn router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    let app = Router::new()
        .merge(orders::router())
        .merge(riders::router())
        .merge(feedback::router())
        .merge(dashboard::router())
        .merge(announcements::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::order_events_handler))
        .route("/ws/landing", get(ws::landing_stats_handler))
        .with_state(state);

    with_request_timeout(app, request_timeout)
}

fn with_request_timeout(app: Router, request_timeout: Duration) -> Router {
    app.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_middleware_error))
            .timeout(request_timeout),
    )
}

async fn handle_middleware_error(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        AppError::Transient("request timed out".to_string())
    } else {
        AppError::Internal(format!("unhandled middleware error: {err}"))
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    orders: usize,
    riders: usize,
    active_assignments: usize,
    feedback: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        orders: state.orders.len(),
        riders: state.riders.len(),
        active_assignments: state.active_assignments.len(),
        feedback: state.feedback.len(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    use super::with_request_timeout;

    async fn slow() -> &'static str {
        tokio::time::sleep(Duration::from_millis(200)).await;
        "done"
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn slow_requests_time_out_as_transient() {
        let app = with_request_timeout(
            Router::new().route("/slow", get(slow)),
            Duration::from_millis(1),
        );

        let response = app.oneshot(get_request("/slow")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "transient");
    }

    #[tokio::test]
    async fn fast_requests_pass_through() {
        let app = with_request_timeout(
            Router::new().route("/fast", get(|| async { "ok" })),
            Duration::from_secs(5),
        );

        let response = app.oneshot(get_request("/fast")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
