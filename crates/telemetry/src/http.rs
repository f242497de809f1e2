use axum::{
    body::Bytes,
    error_handling::HandleErrorLayer,
    http::{header::CONTENT_TYPE, HeaderName, StatusCode},
    routing::get,
    Router,
};
use prometheus::{Encoder, TextEncoder};
use std::{net::SocketAddr, time::Duration};
use tokio::signal;
use tower::{BoxError, ServiceBuilder};
use tower_http::trace::TraceLayer;

async fn metrics_handler() -> ([(HeaderName, String); 1], Bytes) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buf = Vec::with_capacity(1 << 16);
    if let Err(e) = encoder.encode(&metric_families, &mut buf) {
        tracing::error!(error = %e, "failed to encode prometheus metrics");
    }
    (
        [(CONTENT_TYPE, encoder.format_type().to_string())],
        buf.into(),
    )
}

async fn healthz_handler() -> &'static str {
    "OK"
}

/// Readiness is distinct from liveness here: a node can be alive (the
/// process is up and answering HTTP) while not yet ready (it hasn't won
/// its first lock, or the store hasn't finished opening).
async fn readyz_handler() -> &'static str {
    "OK"
}

async fn handle_service_error(err: BoxError) -> (StatusCode, String) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (StatusCode::REQUEST_TIMEOUT, "request timed out".to_string())
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("unhandled internal error: {err}"),
        )
    }
}

/// Serves `/metrics`, `/healthz`, and `/readyz` until a `Ctrl-C`/SIGTERM is
/// received, then shuts down gracefully.
pub async fn run_server(addr: SocketAddr) {
    let app = Router::new()
    .route("/metrics", get(metrics_handler))
    .route("/healthz", get(healthz_handler))
    .route("/readyz", get(readyz_handler))
    .layer(
        ServiceBuilder::new()
        .layer(HandleErrorLayer::new(handle_service_error))
        .layer(TraceLayer::new_for_http())
        .load_shed()
        .concurrency_limit(8)
        .timeout(Duration::from_secs(2)),
    );

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(target = "telemetry", error = %e, "failed to bind telemetry http server");
            return;
        }
    };
    tracing::info!(target = "telemetry", addr = %listener.local_addr().unwrap(), "listening");

    let graceful = axum::serve(listener, app.into_make_service()).with_graceful_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!(target = "telemetry", error = %e, "failed to install ctrl-c handler");
            }
            tracing::info!(target = "telemetry", "shutting down gracefully");
    });

    if let Err(e) = graceful.await {
        tracing::error!(target = "telemetry", error = %e, "server error");
    }
}
