use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use common_auth::{TokenCodec, TokenConfig};
use serde_json::{json, Value};
use tracing::error;

use crate::auth_handlers;
use crate::chat_handlers;
use crate::config::GatewayConfig;
use crate::conversations::ConversationStore;
use crate::deployment_handlers;
use crate::events::AuthEventClient;
use crate::github::GithubClient;
use crate::guard::require_auth;
use crate::idp::IdentityProvider;
use crate::llm::LlmClient;
use crate::metrics::GatewayMetrics;
use crate::queue::TaskQueue;
use crate::request_id::request_id_middleware;
use crate::verifier::AuthVerifier;

/// Shared application state. Everything here is either read-only after
/// startup or internally synchronized; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub codec: Arc<TokenCodec>,
    pub idp: Arc<IdentityProvider>,
    pub verifier: Arc<AuthVerifier>,
    pub events: Arc<AuthEventClient>,
    pub conversations: Arc<ConversationStore>,
    pub llm: Arc<LlmClient>,
    pub github: Arc<GithubClient>,
    pub queue: TaskQueue,
    pub metrics: Arc<GatewayMetrics>,
}

impl AppState {
    /// Wire every component from config. The queue is injected so binaries
    /// can use Redis while tests use the in-memory engine.
    pub fn new(
        config: Arc<GatewayConfig>,
        queue: TaskQueue,
        http_client: reqwest::Client,
    ) -> Result<Self> {
        let codec = Arc::new(TokenCodec::new(
            TokenConfig::new(config.jwt_secret.as_str())
                .with_access_ttl(config.access_ttl_seconds),
        ));
        let idp = Arc::new(IdentityProvider::new(
            http_client.clone(),
            config.idp_base_url.as_str(),
            config.idp_service_key.as_str(),
        ));
        let verifier = Arc::new(AuthVerifier::new(codec.clone(), idp.clone()));
        let events = Arc::new(AuthEventClient::new(config.event_consumer_addr.as_str()));
        let llm = Arc::new(LlmClient::new(
            http_client.clone(),
            config.llm_endpoint.as_str(),
            config.llm_api_key.as_str(),
            config.llm_deployment.as_str(),
            config.llm_api_version.as_str(),
        ));
        let github = Arc::new(GithubClient::new(
            http_client,
            config.github_api_url.as_str(),
        ));
        let metrics = Arc::new(GatewayMetrics::new()?);

        Ok(Self {
            config,
            codec,
            idp,
            verifier,
            events,
            conversations: Arc::new(ConversationStore::new()),
            llm,
            github,
            queue,
            metrics,
        })
    }
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Agent gateway is running" }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "version": env!("CARGO_PKG_VERSION") }))
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

const DOCS_PAGE: &str = "<!doctype html>\n<html>\n<head><title>Agent Gateway</title></head>\n<body>\n<h1>Agent Gateway</h1>\n<p>See <a href=\"/openapi.json\">/openapi.json</a> for the endpoint listing.</p>\n</body>\n</html>\n";

async fn docs() -> Html<&'static str> {
    Html(DOCS_PAGE)
}

async fn openapi() -> Json<Value> {
    Json(json!({
        "openapi": "3.0.0",
        "info": {
            "title": "Agent Gateway",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": {
            "/auth/signup": { "post": { "summary": "Create an account" } },
            "/auth/login": { "post": { "summary": "Password login" } },
            "/auth/profile/{user_id}": { "get": { "summary": "Fetch a profile" } },
            "/api/v1/chat/": { "post": { "summary": "Chat with the assistant" } },
            "/deployments/repo-info": { "post": { "summary": "Validate a repository" } },
            "/deployments/repo-check": { "post": { "summary": "Queue a repository check" } },
        },
    }))
}

/// Assemble the full route table with the front-door layers. Request-id
/// runs outermost so even rejected requests carry the header.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .route("/docs", get(docs))
        .route("/openapi.json", get(openapi))
        .route("/auth/signup", post(auth_handlers::signup))
        .route("/auth/login", post(auth_handlers::login))
        .route("/auth/profile/:user_id", get(auth_handlers::profile))
        .route("/api/v1/chat/", post(chat_handlers::chat))
        .route("/api/v1/chat/health", get(chat_handlers::chat_health))
        .route("/deployments/repo-info", post(deployment_handlers::repo_info))
        .route("/deployments/repo-check", post(deployment_handlers::repo_check))
        .route(
            "/deployments/repo-check/:task_id",
            get(deployment_handlers::repo_check_result),
        )
        .route("/deployments/health", get(deployment_handlers::deployments_health))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}
