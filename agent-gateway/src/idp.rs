use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub type IdpResult<T> = Result<T, IdpError>;

#[derive(Debug, Error)]
pub enum IdpError {
    #[error("identity provider request failed: {0}")]
    Transport(String),
    #[error("identity provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected identity provider response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for IdpError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

/// Profile row as stored by the profile collaborator, keyed by opaque id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub full_name: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "developer".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
}

/// Session handed back by the provider on a successful password login.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: SessionUser,
}

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: String,
}

/// REST client for the external identity/BaaS provider: account
/// signup/login, token introspection, and the profile table.
#[derive(Clone)]
pub struct IdentityProvider {
    client: Client,
    base_url: String,
    service_key: String,
}

impl IdentityProvider {
    pub fn new(client: Client, base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            service_key: service_key.into(),
        }
    }

    /// Create an account; returns the provider-assigned user id.
    pub async fn sign_up(&self, email: &str, password: &str) -> IdpResult<String> {
        let response = self
            .client
            .post(format!("{}/auth/v1/signup", self.base_url))
            .header("apikey", &self.service_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let user: ProviderUser = response
            .json()
            .await
            .map_err(|err| IdpError::Decode(err.to_string()))?;
        debug!(user_id = %user.id, "provider account created");
        Ok(user.id)
    }

    /// Password login against the provider.
    pub async fn sign_in(&self, email: &str, password: &str) -> IdpResult<ProviderSession> {
        let response = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.service_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|err| IdpError::Decode(err.to_string()))
    }

    /// Ask the provider who a token belongs to. Used as the fallback path
    /// for tokens the local codec does not recognise.
    pub async fn introspect(&self, token: &str) -> IdpResult<String> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.service_key)
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let user: ProviderUser = response
            .json()
            .await
            .map_err(|err| IdpError::Decode(err.to_string()))?;
        Ok(user.id)
    }

    /// Fetch a profile row by subject id. `Ok(None)` means the row does not
    /// exist, which callers treat differently from a transport failure.
    pub async fn fetch_profile(&self, user_id: &str) -> IdpResult<Option<Profile>> {
        let response = self
            .client
            .get(format!("{}/rest/v1/profiles", self.base_url))
            .query(&[("id", format!("eq.{user_id}"))])
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let mut rows: Vec<Profile> = response
            .json()
            .await
            .map_err(|err| IdpError::Decode(err.to_string()))?;

        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows.remove(0)))
        }
    }

    /// Insert a profile row. `Ok(false)` signals the provider declined the
    /// insert without a transport failure.
    pub async fn create_profile(&self, profile: &Profile) -> IdpResult<bool> {
        let response = self
            .client
            .post(format!("{}/rest/v1/profiles", self.base_url))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .timeout(REQUEST_TIMEOUT)
            .json(profile)
            .send()
            .await?;

        Ok(response.status().is_success())
    }

    async fn check_status(response: Response) -> IdpResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = Self::error_message(status, response).await;
        Err(IdpError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn error_message(status: StatusCode, response: Response) -> String {
        let body = response.text().await.unwrap_or_default();
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) {
            for key in ["msg", "message", "error_description", "error"] {
                if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                    return text.to_string();
                }
            }
        }
        if body.is_empty() {
            format!("HTTP {status}")
        } else {
            body
        }
    }
}
