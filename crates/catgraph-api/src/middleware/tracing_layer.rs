//! # Request Tracing
//!
//! `tower_http::trace::TraceLayer` with one span per request carrying the
//! method, path and request id.

use axum::http::Request;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{MakeSpan, TraceLayer};

/// Header used to correlate a request across services.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, Copy, Default)]
pub struct GatewaySpan;

impl<B> MakeSpan<B> for GatewaySpan {
    fn make_span(&mut self, request: &Request<B>) -> tracing::Span {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        tracing::info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
            request_id
        )
    }
}

/// Build the gateway's `TraceLayer`.
pub fn layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, GatewaySpan> {
    TraceLayer::new_for_http().make_span_with(GatewaySpan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_reads_request_id() {
        let request = Request::builder()
            .uri("/query")
            .header(REQUEST_ID_HEADER, "abc-123")
            .body(())
            .unwrap();
        let span = GatewaySpan.make_span(&request);
        // Disabled without a subscriber; construction must still succeed.
        let _ = span.id();
    }
}
