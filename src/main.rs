use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing_subscriber::EnvFilter;

use kitchen_dispatch::api;
use kitchen_dispatch::config::{Config, LogFormat};
use kitchen_dispatch::engine;
use kitchen_dispatch::error::AppError;
use kitchen_dispatch::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Compact => subscriber.compact().init(),
        LogFormat::Json => subscriber.json().init(),
    }

    let (app_state, dispatch_rx) = AppState::new(
        config.settings.clone(),
        config.dispatch_queue_size,
        config.event_buffer_size,
    );
    let shared_state = Arc::new(app_state);

    if config.settings.auto_assign {
        tokio::spawn(engine::dispatcher::run_dispatcher(
            shared_state.clone(),
            dispatch_rx,
        ));
    } else {
        drop(dispatch_rx);
    }

    tokio::spawn(engine::stats::run_landing_publisher(
        shared_state.clone(),
        config.landing_stats_interval,
    ));

    let app = api::rest::router(shared_state.clone(), config.request_timeout)
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(CorsLayer::permissive());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        rider_capacity = ?config.settings.rider_capacity,
        auto_assign = config.settings.auto_assign,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
