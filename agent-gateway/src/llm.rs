use std::time::Duration;

use axum::http::StatusCode;
use common_problem::ApiError;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

use crate::conversations::ChatTurn;

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_COMPLETION_TOKENS: u32 = 800;
const TEMPERATURE: f64 = 0.1;

/// System prompt scoping the assistant to DevOps and cloud engineering.
pub const SYSTEM_PROMPT: &str = "You are an expert DevOps and Cloud Engineering AI Assistant. You help engineers with:\n\
\n\
- Cloud platforms (AWS, Azure, GCP)\n\
- Infrastructure as Code (Terraform, ARM templates, CloudFormation)\n\
- Container orchestration (Docker, Kubernetes)\n\
- CI/CD pipelines (Jenkins, GitHub Actions, Azure DevOps)\n\
- Monitoring and observability\n\
- Security best practices\n\
- Configuration management\n\
- Site reliability engineering (SRE)\n\
\n\
Provide practical, actionable advice with code examples when helpful. Be concise but thorough.";

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

/// Client for the hosted chat-completions deployment.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    endpoint: String,
    api_key: String,
    deployment: String,
    api_version: String,
}

impl LlmClient {
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            client,
            endpoint,
            api_key: api_key.into(),
            deployment: deployment.into(),
            api_version: api_version.into(),
        }
    }

    /// Send one completion request; returns the assistant's text.
    pub async fn chat_completion(&self, messages: &[ChatTurn]) -> Result<String, ApiError> {
        let url = format!(
            "{}/openai/deployments/{}/chat/completions",
            self.endpoint, self.deployment
        );

        let payload = serde_json::json!({
            "messages": messages,
            "max_completion_tokens": MAX_COMPLETION_TOKENS,
            "temperature": TEMPERATURE,
            "model": self.deployment,
        });

        debug!(url = %url, turns = messages.len(), "sending chat completion request");

        let response = self
            .client
            .post(&url)
            .query(&[("api-version", self.api_version.as_str())])
            .header("api-key", &self.api_key)
            .timeout(COMPLETION_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                error!(error = %err, "LLM request failed");
                ApiError::upstream(
                    "llm/upstream-error",
                    StatusCode::BAD_GATEWAY,
                    "The assistant backend is unavailable. Please try again.",
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(status = %status, "LLM backend returned an error");
            return Err(ApiError::upstream(
                "llm/upstream-error",
                StatusCode::BAD_GATEWAY,
                "The assistant backend rejected the request. Please try again.",
            ));
        }

        let completion: CompletionResponse = response.json().await.map_err(|err| {
            error!(error = %err, "failed to decode LLM response");
            ApiError::upstream(
                "llm/upstream-error",
                StatusCode::BAD_GATEWAY,
                "The assistant backend returned an unexpected response.",
            )
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                ApiError::upstream(
                    "llm/upstream-error",
                    StatusCode::BAD_GATEWAY,
                    "The assistant backend returned no completion.",
                )
            })
    }
}
