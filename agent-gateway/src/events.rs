use std::time::Duration;

use common_events::{truncate_secret, AuthEvent, EventAck};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{info, warn};

const EMIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Best-effort client for the auth event consumer.
///
/// One TCP connection per call (volume is low), one JSON line out, one ack
/// line back, all under a fixed timeout that is independent of the inbound
/// request's deadline. Every failure mode collapses to `false`; callers in
/// the signup/login flow never observe an error from here.
#[derive(Clone)]
pub struct AuthEventClient {
    addr: String,
    timeout: Duration,
}

impl AuthEventClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: EMIT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn emit_signup(
        &self,
        user_id: &str,
        email: &str,
        full_name: &str,
        role: &str,
    ) -> bool {
        self.emit(AuthEvent::EmitSignup {
            user_id: user_id.to_owned(),
            email: email.to_owned(),
            full_name: full_name.to_owned(),
            role: role.to_owned(),
        })
        .await
    }

    pub async fn emit_login(&self, user_id: &str, email: &str, token: &str) -> bool {
        self.emit(AuthEvent::EmitLogin {
            user_id: user_id.to_owned(),
            email: email.to_owned(),
            token: token.to_owned(),
        })
        .await
    }

    pub async fn emit(&self, event: AuthEvent) -> bool {
        let kind = event.kind();
        match tokio::time::timeout(self.timeout, self.send(&event)).await {
            Ok(Ok(ack)) if ack.success => {
                info!(kind, message = %ack.message, "auth event delivered");
                true
            }
            Ok(Ok(ack)) => {
                warn!(kind, message = %ack.message, "event consumer rejected auth event");
                false
            }
            Ok(Err(err)) => {
                warn!(kind, error = %err, "failed to emit auth event");
                false
            }
            Err(_) => {
                warn!(kind, "auth event emission timed out");
                false
            }
        }
    }

    async fn send(&self, event: &AuthEvent) -> anyhow::Result<EventAck> {
        let stream = TcpStream::connect(&self.addr).await?;
        let (read_half, mut write_half) = stream.into_split();

        // Tokens must not hit the logs in full.
        if let AuthEvent::EmitLogin { user_id, token, .. } = event {
            info!(user_id = %user_id, token = %truncate_secret(token), "emitting login event");
        }

        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        write_half.write_all(line.as_bytes()).await?;

        let mut reader = BufReader::new(read_half);
        let mut response = String::new();
        reader.read_line(&mut response).await?;
        Ok(serde_json::from_str(&response)?)
    }
}
