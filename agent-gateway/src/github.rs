use std::time::Duration;

use axum::http::StatusCode;
use common_problem::ApiError;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const GATEWAY_USER_AGENT: &str = "agent-gateway";

static RE_OWNER_REPO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9\-_]*[a-zA-Z0-9])?/[a-zA-Z0-9]([a-zA-Z0-9\-_\.]*[a-zA-Z0-9])?$")
        .expect("owner/repo pattern is valid")
});

/// Repository metadata returned by the code host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoInfo {
    pub full_name: String,
    pub description: String,
    pub stars: i64,
    pub forks: i64,
    pub private: bool,
    pub clone_url: String,
    pub default_branch: String,
}

#[derive(Debug, Deserialize)]
struct RepoPayload {
    full_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    stargazers_count: i64,
    #[serde(default)]
    forks_count: i64,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    clone_url: String,
    #[serde(default = "default_branch")]
    default_branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}

fn invalid_identifier(message: &str) -> ApiError {
    ApiError::validation("github/invalid-identifier", message)
}

/// Normalize a repository identifier to `owner/repo`.
///
/// Accepts `owner/repo`, `https://github.com/owner/repo[.git]`, and
/// `git@github.com:owner/repo[.git]`. Anything pointing at another host is
/// rejected rather than silently retargeted.
pub fn normalize_identifier(raw: &str) -> Result<String, ApiError> {
    let mut normalized = raw.trim().to_string();
    if normalized.is_empty() {
        return Err(invalid_identifier("Repository identifier cannot be empty"));
    }

    if normalized.starts_with("http://") || normalized.starts_with("https://") {
        let rest = normalized
            .splitn(2, "://")
            .nth(1)
            .unwrap_or_default()
            .to_string();
        let (host, path) = match rest.split_once('/') {
            Some((host, path)) => (host, path),
            None => (rest.as_str(), ""),
        };
        if host != "github.com" && host != "www.github.com" {
            return Err(invalid_identifier(
                "Only GitHub.com repositories are supported",
            ));
        }
        normalized = path.trim_start_matches('/').to_string();
    } else if normalized.starts_with("git@") {
        match normalized.strip_prefix("git@github.com:") {
            Some(path) => normalized = path.to_string(),
            None => {
                return Err(invalid_identifier(
                    "Only GitHub.com SSH URLs are supported",
                ));
            }
        }
    }

    if let Some(stripped) = normalized.strip_suffix(".git") {
        normalized = stripped.to_string();
    }

    if !RE_OWNER_REPO.is_match(&normalized) {
        return Err(invalid_identifier(
            "Repository identifier must be in 'owner/repo' format or a valid GitHub URL",
        ));
    }

    Ok(normalized)
}

/// Minimal code-host client: validate that a repository exists and pull its
/// metadata. Domain failures map straight onto the error taxonomy.
#[derive(Clone)]
pub struct GithubClient {
    client: Client,
    api_base: String,
}

impl GithubClient {
    pub fn new(client: Client, api_base: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self { client, api_base }
    }

    pub async fn fetch_repo(&self, identifier: &str, token: &str) -> Result<RepoInfo, ApiError> {
        if token.trim().is_empty() {
            return Err(ApiError::validation(
                "github/missing-token",
                "GitHub token is required",
            ));
        }

        let owner_repo = normalize_identifier(identifier)?;
        info!(repo = %owner_repo, "checking GitHub repository");

        let response = self
            .client
            .get(format!("{}/repos/{}", self.api_base, owner_repo))
            .header(USER_AGENT, GATEWAY_USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|err| {
                warn!(repo = %owner_repo, error = %err, "GitHub API request failed");
                ApiError::upstream(
                    "github/api-error",
                    StatusCode::BAD_GATEWAY,
                    "Unexpected error while contacting the GitHub API",
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::map_failure(status, &response, &owner_repo));
        }

        let payload: RepoPayload = response.json().await.map_err(|err| {
            warn!(repo = %owner_repo, error = %err, "invalid GitHub API response");
            ApiError::upstream(
                "github/api-error",
                StatusCode::BAD_GATEWAY,
                "Invalid repository response from the GitHub API",
            )
        })?;

        let info = RepoInfo {
            full_name: payload.full_name,
            description: payload.description.unwrap_or_default(),
            stars: payload.stargazers_count,
            forks: payload.forks_count,
            private: payload.private,
            clone_url: payload.clone_url,
            default_branch: payload.default_branch,
        };

        info!(repo = %info.full_name, stars = info.stars, private = info.private, "repository validated");
        Ok(info)
    }

    fn map_failure(status: StatusCode, response: &reqwest::Response, repo: &str) -> ApiError {
        let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
            || (status == StatusCode::FORBIDDEN
                && response
                    .headers()
                    .get("x-ratelimit-remaining")
                    .and_then(|value| value.to_str().ok())
                    == Some("0"));

        if rate_limited {
            warn!(repo, "GitHub rate limit exceeded");
            return ApiError::upstream(
                "github/rate-limit-exceeded",
                StatusCode::TOO_MANY_REQUESTS,
                "GitHub API rate limit exceeded. Please try again later.",
            );
        }

        match status {
            StatusCode::UNAUTHORIZED => ApiError::upstream(
                "github/bad-credentials",
                StatusCode::UNAUTHORIZED,
                "Invalid or expired GitHub token",
            ),
            StatusCode::NOT_FOUND => ApiError::upstream(
                "github/repo-not-found",
                StatusCode::NOT_FOUND,
                format!("Repository '{repo}' does not exist or is private"),
            ),
            other => {
                warn!(repo, status = %other, "GitHub API error");
                ApiError::upstream(
                    "github/api-error",
                    StatusCode::BAD_GATEWAY,
                    "Unexpected error while contacting the GitHub API",
                )
            }
        }
    }
}
