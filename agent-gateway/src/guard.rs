use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{FromRequestParts, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use common_auth::parse_bearer;
use common_problem::ApiError;

use crate::app::AppState;
use crate::verifier::Identity;

/// Paths reachable without a bearer token. Root is matched exactly;
/// everything else by prefix. `/metrics` is open so scrapers do not need
/// credentials.
const PUBLIC_PREFIXES: &[&str] = &[
    "/health",
    "/metrics",
    "/auth/signup",
    "/auth/login",
    "/docs",
    "/openapi.json",
];

pub fn is_public_path(path: &str) -> bool {
    path == "/" || PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Front-door guard: public paths pass straight through; every other path
/// must produce a verified identity before its handler runs. The identity
/// is written once into the request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if is_public_path(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(ApiError::invalid_token)?;
    let token = parse_bearer(header).map_err(|_| ApiError::invalid_token())?;

    let identity = match state.verifier.authenticate(&token).await {
        Ok(identity) => {
            state.metrics.auth_attempt("success");
            identity
        }
        Err(err) => {
            state.metrics.auth_attempt(err.code());
            return Err(err);
        }
    };

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Extractor handing the verified identity to protected handlers.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(ApiError::invalid_token)
    }
}
