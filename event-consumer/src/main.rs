use std::env;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{error, info};

use event_consumer::{serve, ConsumerMetrics, EventHub};

#[derive(Clone)]
struct AppState {
    hub: Arc<EventHub>,
    metrics: Arc<ConsumerMetrics>,
}

#[derive(Deserialize)]
struct RecentParams {
    limit: Option<usize>,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "event-consumer" }))
}

async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.render().map_err(|err| {
        error!(error = %err, "failed to render metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn recent_events(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Json<Value> {
    let limit = params.limit.unwrap_or(10);
    Json(json!({ "events": state.hub.recent(limit) }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let hub = Arc::new(EventHub::new());
    let metrics = Arc::new(ConsumerMetrics::new()?);

    // Notification-style subscriber; other processes register their own.
    hub.add_subscriber(Box::new(|kind, data| {
        let email = data["email"].as_str().unwrap_or_default();
        match kind {
            "signup" => info!(email, "sending welcome email"),
            "login" => info!(email, "user logged in"),
            other => info!(kind = other, "event received"),
        }
    }));

    let listen_addr =
        env::var("EVENT_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:50051".to_string());
    let listener = TcpListener::bind(&listen_addr).await?;
    info!(%listen_addr, "event consumer listening");

    // Side HTTP listener for probes and inspection.
    let http_addr = env::var("EVENT_HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:50052".to_string());
    let http_state = AppState {
        hub: hub.clone(),
        metrics: metrics.clone(),
    };
    tokio::spawn(async move {
        let app = Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics_handler))
            .route("/events/recent", get(recent_events))
            .with_state(http_state);

        match TcpListener::bind(&http_addr).await {
            Ok(listener) => {
                info!(%http_addr, "event consumer http listening");
                if let Err(err) = axum::serve(listener, app).await {
                    error!(error = %err, "http listener failed");
                }
            }
            Err(err) => error!(error = %err, %http_addr, "failed to bind http listener"),
        }
    });

    serve(listener, hub, metrics).await
}
