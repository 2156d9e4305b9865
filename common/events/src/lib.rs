//! Wire types for the auth event side channel.
//!
//! The gateway and the event consumer speak newline-delimited JSON over a
//! plain TCP connection: one event per line out, one ack per line back.

use serde::{Deserialize, Serialize};

/// Default TCP address of the event consumer.
pub const DEFAULT_CONSUMER_ADDR: &str = "127.0.0.1:50051";

/// Auth lifecycle events emitted by the gateway, tagged by operation name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum AuthEvent {
    EmitSignup {
        user_id: String,
        email: String,
        full_name: String,
        role: String,
    },
    EmitLogin {
        user_id: String,
        email: String,
        token: String,
    },
}

impl AuthEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthEvent::EmitSignup { .. } => "signup",
            AuthEvent::EmitLogin { .. } => "login",
        }
    }

    pub fn email(&self) -> &str {
        match self {
            AuthEvent::EmitSignup { email, .. } => email,
            AuthEvent::EmitLogin { email, .. } => email,
        }
    }
}

/// Per-event acknowledgement from the consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventAck {
    pub success: bool,
    pub message: String,
}

impl EventAck {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Truncate a sensitive value before it reaches a log line or a stored
/// event record: at most the first 20 characters plus an ellipsis marker.
pub fn truncate_secret(value: &str) -> String {
    if value.chars().count() > 20 {
        let head: String = value.chars().take(20).collect();
        format!("{head}...")
    } else {
        value.to_owned()
    }
}
