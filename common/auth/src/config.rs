/// Runtime configuration for session token issuance and verification.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Process-wide HMAC signing secret, fixed after startup.
    pub secret: String,
    /// Default access token lifetime in seconds.
    pub access_ttl_seconds: i64,
}

impl TokenConfig {
    /// Construct config with the default one hour access token lifetime.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl_seconds: 3600,
        }
    }

    /// Adjust the default token lifetime.
    pub fn with_access_ttl(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }
}
