use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    auth_attempts: IntCounterVec,
    event_emissions: IntCounterVec,
    chat_requests: IntCounterVec,
    tasks_enqueued: IntCounterVec,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let auth_attempts = IntCounterVec::new(
            Opts::new(
                "gateway_auth_attempts_total",
                "Count of bearer verifications grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(auth_attempts.clone()))?;

        let event_emissions = IntCounterVec::new(
            Opts::new(
                "gateway_auth_events_total",
                "Count of auth event emission attempts",
            ),
            &["kind", "outcome"],
        )?;
        registry.register(Box::new(event_emissions.clone()))?;

        let chat_requests = IntCounterVec::new(
            Opts::new(
                "gateway_chat_requests_total",
                "Count of chat completions grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(chat_requests.clone()))?;

        let tasks_enqueued = IntCounterVec::new(
            Opts::new(
                "gateway_tasks_enqueued_total",
                "Count of tasks handed to the queue, per queue name",
            ),
            &["queue"],
        )?;
        registry.register(Box::new(tasks_enqueued.clone()))?;

        Ok(Self {
            registry,
            auth_attempts,
            event_emissions,
            chat_requests,
            tasks_enqueued,
        })
    }

    pub fn auth_attempt(&self, outcome: &str) {
        self.auth_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn event_emission(&self, kind: &str, delivered: bool) {
        let outcome = if delivered { "delivered" } else { "dropped" };
        self.event_emissions
            .with_label_values(&[kind, outcome])
            .inc();
    }

    pub fn chat_request(&self, outcome: &str) {
        self.chat_requests.with_label_values(&[outcome]).inc();
    }

    pub fn task_enqueued(&self, queue: &str) {
        self.tasks_enqueued.with_label_values(&[queue]).inc();
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
