use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// RFC 7807 problem payload returned for every domain error.
///
/// `type` is a dotted domain code such as `auth/invalid-token`; `title` is
/// derived from its last segment so clients can branch on the code without
/// parsing prose.
#[derive(Debug, Clone, Serialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub code: String,
    pub title: String,
    pub detail: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

impl Problem {
    pub fn new(code: &str, detail: impl Into<String>, status: StatusCode) -> Self {
        Self {
            code: code.to_owned(),
            title: title_from_code(code),
            detail: detail.into(),
            status: status.as_u16(),
            instance: None,
            extras: None,
        }
    }
}

/// "auth/invalid-token" -> "Invalid Token"
fn title_from_code(code: &str) -> String {
    let last = code.rsplit('/').next().unwrap_or(code);
    last.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Domain error taxonomy. The gateway front door is the only place these
/// become wire responses, via the `IntoResponse` impl below.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Unauthorized {
        code: &'static str,
        message: String,
    },
    #[error("User profile not found")]
    ProfileNotFound,
    #[error("{message}")]
    Validation {
        code: &'static str,
        message: String,
    },
    #[error("{message}")]
    Upstream {
        code: String,
        status: StatusCode,
        message: String,
    },
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Generic credential rejection. Deliberately does not say which
    /// verification path failed.
    pub fn invalid_token() -> Self {
        Self::Unauthorized {
            code: "auth/invalid-token",
            message: "Invalid or expired token".to_owned(),
        }
    }

    pub fn invalid_credentials() -> Self {
        Self::Unauthorized {
            code: "auth/invalid-credentials",
            message: "Invalid email or password".to_owned(),
        }
    }

    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn upstream(code: impl Into<String>, status: StatusCode, message: impl Into<String>) -> Self {
        Self::Upstream {
            code: code.into(),
            status,
            message: message.into(),
        }
    }

    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        Self::Internal(err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::ProfileNotFound => StatusCode::NOT_FOUND,
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Upstream { status, .. } => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            ApiError::Unauthorized { code, .. } => code,
            ApiError::ProfileNotFound => "auth/profile-not-found",
            ApiError::Validation { code, .. } => code,
            ApiError::Upstream { code, .. } => code,
            ApiError::Internal(_) => "internal/error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Internal details stay in the logs; the wire only carries a
        // generic summary.
        let detail = match &self {
            ApiError::Internal(_) => "Internal server error".to_owned(),
            other => other.to_string(),
        };
        let problem = Problem::new(self.code(), detail, status);

        let mut response = (status, Json(problem)).into_response();
        if let Ok(value) = HeaderValue::from_str(self.code()) {
            response.headers_mut().insert("x-error-code", value);
        }
        response
    }
}
