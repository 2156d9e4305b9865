use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use common_events::{truncate_secret, AuthEvent, EventAck};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

/// Only the most recent events are retained.
pub const RING_CAPACITY: usize = 100;

pub type Subscriber = Box<dyn Fn(&str, &Value) + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub kind: String,
    pub data: Value,
    pub received_at: DateTime<Utc>,
}

/// Accepts auth events, fans them out to registered subscriber callbacks,
/// and keeps a bounded window of recent records for inspection. Ordering
/// across subscribers is not guaranteed once fan-out begins.
#[derive(Default)]
pub struct EventHub {
    log: Mutex<VecDeque<EventRecord>>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_subscriber(&self, subscriber: Subscriber) {
        let mut guard = self.subscribers.lock().expect("subscriber lock poisoned");
        guard.push(subscriber);
        info!(total = guard.len(), "subscriber registered");
    }

    /// Record and broadcast one event. Always produces an ack.
    pub fn accept(&self, event: AuthEvent) -> EventAck {
        let kind = event.kind().to_string();
        let email = event.email().to_string();
        let data = record_data(&event);

        {
            let mut log = self.log.lock().expect("event log lock poisoned");
            log.push_back(EventRecord {
                kind: kind.clone(),
                data: data.clone(),
                received_at: Utc::now(),
            });
            while log.len() > RING_CAPACITY {
                log.pop_front();
            }
        }

        info!(kind = %kind, email = %email, "broadcasting auth event");
        let subscribers = self.subscribers.lock().expect("subscriber lock poisoned");
        for subscriber in subscribers.iter() {
            subscriber(&kind, &data);
        }

        EventAck::ok(format!("{kind} event processed successfully for {email}"))
    }

    /// Most recent `limit` records, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<EventRecord> {
        let log = self.log.lock().expect("event log lock poisoned");
        let start = log.len().saturating_sub(limit);
        log.iter().skip(start).cloned().collect()
    }
}

/// Event payload as stored and handed to subscribers. Tokens are truncated
/// before they reach the record or any log line.
fn record_data(event: &AuthEvent) -> Value {
    match event {
        AuthEvent::EmitSignup {
            user_id,
            email,
            full_name,
            role,
        } => json!({
            "user_id": user_id,
            "email": email,
            "full_name": full_name,
            "role": role,
        }),
        AuthEvent::EmitLogin {
            user_id,
            email,
            token,
        } => json!({
            "user_id": user_id,
            "email": email,
            "token": truncate_secret(token),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn signup(n: usize) -> AuthEvent {
        AuthEvent::EmitSignup {
            user_id: format!("u-{n}"),
            email: format!("user{n}@example.com"),
            full_name: "Test User".to_string(),
            role: "developer".to_string(),
        }
    }

    #[test]
    fn ack_names_the_event_and_email() {
        let hub = EventHub::new();
        let ack = hub.accept(signup(1));
        assert!(ack.success);
        assert!(ack.message.contains("signup"));
        assert!(ack.message.contains("user1@example.com"));
    }

    #[test]
    fn ring_keeps_only_the_most_recent_hundred() {
        let hub = EventHub::new();
        for n in 0..150 {
            hub.accept(signup(n));
        }

        let recent = hub.recent(RING_CAPACITY);
        assert_eq!(recent.len(), RING_CAPACITY);
        assert_eq!(recent.first().unwrap().data["user_id"], "u-50");
        assert_eq!(recent.last().unwrap().data["user_id"], "u-149");
    }

    #[test]
    fn recent_returns_tail_when_limit_is_small() {
        let hub = EventHub::new();
        for n in 0..5 {
            hub.accept(signup(n));
        }
        let recent = hub.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].data["user_id"], "u-3");
        assert_eq!(recent[1].data["user_id"], "u-4");
    }

    #[test]
    fn login_tokens_are_truncated_in_records() {
        let hub = EventHub::new();
        hub.accept(AuthEvent::EmitLogin {
            user_id: "u-1".to_string(),
            email: "a@b.com".to_string(),
            token: "a-very-long-access-token-value".to_string(),
        });

        let recent = hub.recent(1);
        let stored = recent[0].data["token"].as_str().unwrap();
        assert!(stored.ends_with("..."));
        assert_eq!(stored.chars().count(), 23);
    }

    #[test]
    fn every_subscriber_sees_every_event() {
        let hub = EventHub::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        hub.add_subscriber(Box::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let counter = second.clone();
        hub.add_subscriber(Box::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        hub.accept(signup(1));
        hub.accept(signup(2));

        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }
}
