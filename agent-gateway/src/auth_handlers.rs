use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use common_problem::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::app::AppState;
use crate::idp::{IdpError, Profile, SessionUser};

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub message: String,
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: SessionUser,
}

fn require_field(value: &str, message: &'static str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation("validation/error", message));
    }
    Ok(())
}

fn require_email(email: &str) -> Result<(), ApiError> {
    require_field(email, "Email is required")?;
    if !email.contains('@') {
        return Err(ApiError::validation(
            "validation/error",
            "Email address is not valid",
        ));
    }
    Ok(())
}

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    require_email(&payload.email)?;
    require_field(&payload.password, "Password is required")?;
    require_field(&payload.full_name, "Full name is required")?;

    let user_id = state
        .idp
        .sign_up(&payload.email, &payload.password)
        .await
        .map_err(map_signup_error)?;

    let profile = Profile {
        id: user_id.clone(),
        email: payload.email.clone(),
        full_name: payload.full_name.clone(),
        role: "developer".to_string(),
    };

    match state.idp.create_profile(&profile).await {
        Ok(true) => {}
        Ok(false) => {
            error!(user_id = %user_id, "provider declined profile insert");
            return Err(ApiError::internal("failed to create user profile"));
        }
        Err(err) => {
            error!(user_id = %user_id, error = %err, "failed to create user profile");
            return Err(ApiError::internal(err));
        }
    }

    spawn_signup_event(&state, profile);
    info!(user_id = %user_id, "signup successful");

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "Signup successful".to_string(),
            user_id,
            email: payload.email,
        }),
    ))
}

fn map_signup_error(err: IdpError) -> ApiError {
    match err {
        IdpError::Rejected { status, message } if status < 500 => {
            ApiError::validation("auth/signup-failed", message)
        }
        other => {
            error!(error = %other, "signup failed at the identity provider");
            ApiError::internal(other)
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    require_email(&payload.email)?;
    require_field(&payload.password, "Password is required")?;

    let session = state
        .idp
        .sign_in(&payload.email, &payload.password)
        .await
        .map_err(|err| match err {
            IdpError::Rejected { status, .. } if status < 500 => ApiError::invalid_credentials(),
            other => {
                error!(error = %other, "login failed at the identity provider");
                ApiError::internal(other)
            }
        })?;

    // Mint a gateway session token for the fast verification path. The
    // provider's refresh token passes through untouched.
    let mut extra = Map::new();
    extra.insert("email".to_string(), Value::String(session.user.email.clone()));
    let access_token = state.codec.issue(&session.user.id, extra).map_err(|err| {
        error!(error = %err, "failed to mint session token");
        ApiError::internal(err)
    })?;
    let expires_in = state.codec.config().access_ttl_seconds;

    spawn_login_event(
        &state,
        session.user.id.clone(),
        session.user.email.clone(),
        access_token.clone(),
    );
    info!(user_id = %session.user.id, "login successful");

    Ok(Json(LoginResponse {
        access_token,
        refresh_token: session.refresh_token,
        token_type: "bearer".to_string(),
        expires_in,
        user: session.user,
    }))
}

pub async fn profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Profile>> {
    let profile = state.idp.fetch_profile(&user_id).await.map_err(|err| {
        error!(user_id = %user_id, error = %err, "failed to fetch profile");
        ApiError::internal(err)
    })?;

    profile.map(Json).ok_or(ApiError::ProfileNotFound)
}

/// The HTTP response never waits for the side channel; emission runs as a
/// detached task with its own timeout.
fn spawn_signup_event(state: &AppState, profile: Profile) {
    let events = state.events.clone();
    let metrics = state.metrics.clone();
    tokio::spawn(async move {
        let delivered = events
            .emit_signup(&profile.id, &profile.email, &profile.full_name, &profile.role)
            .await;
        metrics.event_emission("signup", delivered);
    });
}

fn spawn_login_event(state: &AppState, user_id: String, email: String, token: String) {
    let events = state.events.clone();
    let metrics = state.metrics.clone();
    tokio::spawn(async move {
        let delivered = events.emit_login(&user_id, &email, &token).await;
        metrics.event_emission("login", delivered);
    });
}
