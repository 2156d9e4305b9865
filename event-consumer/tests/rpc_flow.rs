use std::sync::Arc;

use event_consumer::{serve, ConsumerMetrics, EventHub};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

async fn start_consumer(hub: Arc<EventHub>) -> std::net::SocketAddr {
    let metrics = Arc::new(ConsumerMetrics::new().expect("metrics"));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = serve(listener, hub, metrics).await;
    });
    addr
}

#[tokio::test]
async fn consumer_acks_events_over_tcp() {
    let hub = Arc::new(EventHub::new());
    let addr = start_consumer(hub.clone()).await;

    let stream = TcpStream::connect(addr).await.expect("connect");
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    write_half
        .write_all(
            b"{\"op\":\"EmitSignup\",\"user_id\":\"u1\",\"email\":\"a@b.com\",\"full_name\":\"A B\",\"role\":\"developer\"}\n",
        )
        .await
        .expect("write");

    let mut line = String::new();
    reader.read_line(&mut line).await.expect("read ack");
    let ack: Value = serde_json::from_str(&line).expect("parse ack");
    assert_eq!(ack["success"], true);
    assert!(ack["message"].as_str().unwrap().contains("a@b.com"));

    assert_eq!(hub.recent(10).len(), 1);
}

#[tokio::test]
async fn malformed_payload_is_rejected_not_dropped() {
    let hub = Arc::new(EventHub::new());
    let addr = start_consumer(hub.clone()).await;

    let stream = TcpStream::connect(addr).await.expect("connect");
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    write_half.write_all(b"not json\n").await.expect("write");

    let mut line = String::new();
    reader.read_line(&mut line).await.expect("read ack");
    let ack: Value = serde_json::from_str(&line).expect("parse ack");
    assert_eq!(ack["success"], false);
    assert!(hub.recent(10).is_empty());
}

#[tokio::test]
async fn one_connection_can_carry_multiple_events() {
    let hub = Arc::new(EventHub::new());
    let addr = start_consumer(hub.clone()).await;

    let stream = TcpStream::connect(addr).await.expect("connect");
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    for n in 0..3 {
        let event = format!(
            "{{\"op\":\"EmitLogin\",\"user_id\":\"u{n}\",\"email\":\"u{n}@example.com\",\"token\":\"tok\"}}\n"
        );
        write_half.write_all(event.as_bytes()).await.expect("write");

        let mut line = String::new();
        reader.read_line(&mut line).await.expect("read ack");
        let ack: Value = serde_json::from_str(&line).expect("parse ack");
        assert_eq!(ack["success"], true);
    }

    assert_eq!(hub.recent(10).len(), 3);
}
