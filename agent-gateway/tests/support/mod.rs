#![allow(dead_code)]

use std::sync::Arc;

use agent_gateway::app::AppState;
use agent_gateway::config::GatewayConfig;
use agent_gateway::queue::TaskQueue;

/// Unroutable endpoints for collaborators a test does not exercise.
const UNREACHABLE: &str = "http://127.0.0.1:1";

pub struct TestBackends<'a> {
    pub idp: &'a str,
    pub github: &'a str,
    pub llm: &'a str,
    pub events: &'a str,
}

impl Default for TestBackends<'_> {
    fn default() -> Self {
        Self {
            idp: UNREACHABLE,
            github: UNREACHABLE,
            llm: UNREACHABLE,
            events: "127.0.0.1:1",
        }
    }
}

pub fn test_config(backends: &TestBackends<'_>) -> Arc<GatewayConfig> {
    Arc::new(GatewayConfig {
        allowed_origins: vec!["http://localhost:3000".to_string()],
        idp_base_url: backends.idp.to_string(),
        idp_service_key: "test-service-key".to_string(),
        jwt_secret: "test-secret-please-rotate".to_string(),
        access_ttl_seconds: 3600,
        llm_endpoint: backends.llm.to_string(),
        llm_api_key: "test-llm-key".to_string(),
        llm_deployment: "gpt-4-mini".to_string(),
        llm_api_version: "2024-10-01-preview".to_string(),
        event_consumer_addr: backends.events.to_string(),
        redis_url: "redis://127.0.0.1:1/0".to_string(),
        github_api_url: backends.github.to_string(),
    })
}

/// Full application state over an in-memory queue; collaborators point
/// wherever the test says.
pub fn test_state(backends: &TestBackends<'_>) -> AppState {
    AppState::new(
        test_config(backends),
        TaskQueue::memory(),
        reqwest::Client::new(),
    )
    .expect("test state")
}
