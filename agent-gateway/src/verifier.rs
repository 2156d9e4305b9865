use std::sync::Arc;

use common_auth::TokenCodec;
use common_problem::ApiError;
use serde::Serialize;
use tracing::{error, warn};

use crate::idp::IdentityProvider;

/// Verified per-request identity. Built once by the verifier, stored in the
/// request's extension slot, read-only for the rest of the request.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
}

/// Ordered verification strategies. The chain stops at the first strategy
/// that resolves a subject id.
enum Strategy {
    LocalCodec,
    RemoteIntrospection,
}

const CHAIN: [Strategy; 2] = [Strategy::LocalCodec, Strategy::RemoteIntrospection];

/// Resolves a bearer token to a verified identity.
///
/// Gateway-minted tokens verify locally (fast path, pure CPU); anything the
/// codec rejects is handed to the identity provider's introspection endpoint
/// before the request is refused. Holds no mutable state; safe to share
/// across concurrent requests.
pub struct AuthVerifier {
    codec: Arc<TokenCodec>,
    idp: Arc<IdentityProvider>,
}

impl AuthVerifier {
    pub fn new(codec: Arc<TokenCodec>, idp: Arc<IdentityProvider>) -> Self {
        Self { codec, idp }
    }

    /// `Unauthorized` when no strategy accepts the token, `ProfileNotFound`
    /// when the subject resolves but has no profile row, `Internal` on a
    /// profile-store transport failure.
    pub async fn authenticate(&self, token: &str) -> Result<Identity, ApiError> {
        let subject = self.resolve_subject(token).await?;

        let profile = match self.idp.fetch_profile(&subject).await {
            Ok(profile) => profile,
            Err(err) => {
                error!(error = %err, subject = %subject, "failed to fetch user profile");
                return Err(ApiError::internal(err));
            }
        };

        let Some(profile) = profile else {
            return Err(ApiError::ProfileNotFound);
        };

        Ok(Identity {
            id: profile.id,
            email: profile.email,
            full_name: profile.full_name,
            role: profile.role,
        })
    }

    /// Walk the strategy chain. Individual failures are logged but only the
    /// aggregate outcome reaches the client, as a generic rejection that
    /// does not reveal which path failed.
    async fn resolve_subject(&self, token: &str) -> Result<String, ApiError> {
        for strategy in CHAIN {
            match strategy {
                Strategy::LocalCodec => match self.codec.verify(token) {
                    Ok(claims) => return Ok(claims.sub),
                    Err(err) => {
                        warn!(error = %err, "local token verification failed, falling back to provider");
                    }
                },
                Strategy::RemoteIntrospection => match self.idp.introspect(token).await {
                    Ok(user_id) => return Ok(user_id),
                    Err(err) => {
                        warn!(error = %err, "provider token introspection failed");
                    }
                },
            }
        }

        Err(ApiError::invalid_token())
    }
}
