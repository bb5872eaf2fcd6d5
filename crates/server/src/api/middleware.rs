//! Signature verification and metrics middleware.

use axum::{
    body::{self, Body},
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use diffusion_core::chat::{verify_signature, SignatureError, SIGNATURE_HEADER, TIMESTAMP_HEADER};

use crate::metrics::{
    normalize_path, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION,
    SIGNATURE_FAILURES_TOTAL,
};
use crate::state::AppState;

/// Largest request body accepted for signature verification.
pub const MAX_SIGNED_BODY_BYTES: usize = 64 * 1024;

/// Metrics middleware that tracks HTTP request duration and counts.
///
/// This middleware records:
/// - Request duration (histogram)
/// - Request count (counter)
/// - Requests in flight (gauge)
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or(SignatureError::MissingHeader(name))
}

fn failure_reason(error: &SignatureError) -> &'static str {
    match error {
        SignatureError::MissingHeader(_) => "missing_header",
        SignatureError::InvalidTimestamp(_) => "invalid_timestamp",
        SignatureError::Expired => "expired",
        SignatureError::Malformed => "malformed",
        SignatureError::Mismatch => "mismatch",
    }
}

/// Verify the platform's request signature over the raw body.
///
/// The body is buffered, checked, and handed on unchanged so the handler can
/// still parse it. Unsigned, stale, or tampered requests get 401.
pub async fn signature_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let (parts, body) = request.into_parts();
    let bytes = body::to_bytes(body, MAX_SIGNED_BODY_BYTES)
        .await
        .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE)?;

    let verified = header(&parts.headers, TIMESTAMP_HEADER).and_then(|timestamp| {
        let signature = header(&parts.headers, SIGNATURE_HEADER)?;
        verify_signature(
            state.signing_secret(),
            timestamp,
            &bytes,
            signature,
            chrono::Utc::now().timestamp(),
        )
    });

    if let Err(e) = verified {
        warn!(error = %e, path = %parts.uri.path(), "Rejected unsigned request");
        SIGNATURE_FAILURES_TOTAL
            .with_label_values(&[failure_reason(&e)])
            .inc();
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}
