use std::sync::Arc;
use std::time::Duration;

use agent_gateway::events::AuthEventClient;
use common_events::{AuthEvent, EventAck};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Minimal stand-in for the event consumer: reads one event line, records
/// it, answers with the given ack.
async fn spawn_consumer(ack: EventAck) -> (std::net::SocketAddr, Arc<Mutex<Vec<AuthEvent>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let seen: Arc<Mutex<Vec<AuthEvent>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = seen.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();
            if let Ok(Some(line)) = lines.next_line().await {
                if let Ok(event) = serde_json::from_str::<AuthEvent>(&line) {
                    sink.lock().await.push(event);
                }
                let mut response = serde_json::to_string(&ack).expect("ack");
                response.push('\n');
                let _ = write_half.write_all(response.as_bytes()).await;
            }
        }
    });

    (addr, seen)
}

#[tokio::test]
async fn emit_returns_true_on_acked_delivery() {
    let (addr, seen) = spawn_consumer(EventAck::ok("processed")).await;
    let client = AuthEventClient::new(addr.to_string());

    let delivered = client
        .emit_signup("u-1", "a@b.com", "A B", "developer")
        .await;

    assert!(delivered);
    let events = seen.lock().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), "signup");
}

#[tokio::test]
async fn emit_returns_false_when_consumer_is_unreachable() {
    let client = AuthEventClient::new("127.0.0.1:1");
    let delivered = client.emit_login("u-1", "a@b.com", "token").await;
    assert!(!delivered);
}

#[tokio::test]
async fn emit_returns_false_on_remote_rejection() {
    let (addr, _) = spawn_consumer(EventAck::rejected("nope")).await;
    let client = AuthEventClient::new(addr.to_string());

    let delivered = client.emit_login("u-1", "a@b.com", "token").await;
    assert!(!delivered);
}

#[tokio::test]
async fn emit_times_out_against_a_silent_peer() {
    // Accepts the connection but never answers.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _held = listener.accept().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    let client =
        AuthEventClient::new(addr.to_string()).with_timeout(Duration::from_millis(200));
    let delivered = client.emit_login("u-1", "a@b.com", "token").await;
    assert!(!delivered);
}
