use anyhow::{Context, Result};
use std::env;

/// Process-wide configuration, loaded once at startup and passed by
/// reference into every component that needs it. No globals.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub allowed_origins: Vec<String>,
    /// Base URL of the identity/BaaS provider (auth + profile REST).
    pub idp_base_url: String,
    pub idp_service_key: String,
    /// HMAC secret for gateway-minted session tokens.
    pub jwt_secret: String,
    pub access_ttl_seconds: i64,
    pub llm_endpoint: String,
    pub llm_api_key: String,
    pub llm_deployment: String,
    pub llm_api_version: String,
    /// TCP address of the auth event consumer.
    pub event_consumer_addr: String,
    pub redis_url: String,
    pub github_api_url: String,
}

pub fn load_gateway_config() -> Result<GatewayConfig> {
    let allowed_origins = env::var("ALLOWED_ORIGINS")
        .ok()
        .map(|value| parse_origins(&value))
        .unwrap_or_else(default_origins);

    let idp_base_url = env::var("IDP_BASE_URL").context("IDP_BASE_URL must be set")?;
    let idp_service_key = env::var("IDP_SERVICE_KEY").context("IDP_SERVICE_KEY must be set")?;
    let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;

    let access_ttl_seconds = env::var("ACCESS_TTL_SECONDS")
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(3600);

    let llm_endpoint = env::var("LLM_ENDPOINT").context("LLM_ENDPOINT must be set")?;
    let llm_api_key = env::var("LLM_API_KEY").context("LLM_API_KEY must be set")?;
    let llm_deployment =
        env::var("LLM_DEPLOYMENT_NAME").unwrap_or_else(|_| "gpt-4-mini".to_string());
    let llm_api_version =
        env::var("LLM_API_VERSION").unwrap_or_else(|_| "2024-10-01-preview".to_string());

    let event_consumer_addr = env::var("EVENT_CONSUMER_ADDR")
        .unwrap_or_else(|_| common_events::DEFAULT_CONSUMER_ADDR.to_string());

    let redis_url =
        env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string());

    let github_api_url =
        env::var("GITHUB_API_URL").unwrap_or_else(|_| "https://api.github.com".to_string());

    Ok(GatewayConfig {
        allowed_origins,
        idp_base_url,
        idp_service_key,
        jwt_secret,
        access_ttl_seconds,
        llm_endpoint,
        llm_api_key,
        llm_deployment,
        llm_api_version,
        event_consumer_addr,
        redis_url,
        github_api_url,
    })
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter_map(|item| {
            let origin = item.trim();
            if origin.is_empty() {
                None
            } else {
                Some(origin.to_string())
            }
        })
        .collect()
}

fn default_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}
