use std::sync::Arc;

use anyhow::Result;
use common_events::{AuthEvent, EventAck};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use crate::hub::EventHub;

#[derive(Clone)]
pub struct ConsumerMetrics {
    registry: Registry,
    events_received: IntCounterVec,
}

impl ConsumerMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let events_received = IntCounterVec::new(
            Opts::new(
                "consumer_events_received_total",
                "Count of accepted auth events per kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(events_received.clone()))?;

        Ok(Self {
            registry,
            events_received,
        })
    }

    pub fn event_received(&self, kind: &str) {
        self.events_received.with_label_values(&[kind]).inc();
    }

    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Accept loop for the event channel: one task per connection, one JSON
/// event per line in, one ack line back per event.
pub async fn serve(
    listener: TcpListener,
    hub: Arc<EventHub>,
    metrics: Arc<ConsumerMetrics>,
) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "event channel connection opened");
        let hub = hub.clone();
        let metrics = metrics.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, hub, metrics).await {
                warn!(error = %err, %peer, "event channel connection failed");
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    hub: Arc<EventHub>,
    metrics: Arc<ConsumerMetrics>,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let ack = match serde_json::from_str::<AuthEvent>(&line) {
            Ok(event) => {
                metrics.event_received(event.kind());
                hub.accept(event)
            }
            Err(err) => {
                warn!(error = %err, "malformed event payload");
                EventAck::rejected("malformed event payload")
            }
        };

        let mut response = serde_json::to_string(&ack)?;
        response.push('\n');
        write_half.write_all(response.as_bytes()).await?;
    }

    Ok(())
}
