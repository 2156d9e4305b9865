use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation id for one inbound request. Unrelated to identity.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Reuse the caller-supplied `x-request-id` or mint a fresh one, expose it
/// to handlers via extensions, attach it to the request's tracing span, and
/// always echo it back on the response.
pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let rid = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(rid.clone()));

    let span = tracing::info_span!(
        "request",
        request_id = %rid,
        method = %request.method(),
        path = %request.uri().path(),
    );
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&rid) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    response
}
