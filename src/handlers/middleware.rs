use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::{error_response, ApiError};

/// Largest accepted request body
pub const MAX_REQUEST_SIZE: u64 = 1024 * 1024;

/// Reject bodies that are not JSON or exceed [`MAX_REQUEST_SIZE`]
pub async fn request_validation_middleware(
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    validate_request_size(request.headers())?;
    validate_content_type(request.method(), request.headers())?;

    Ok(next.run(request).await)
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

fn has_body(headers: &HeaderMap) -> bool {
    headers.contains_key(header::TRANSFER_ENCODING) || content_length(headers).unwrap_or(0) > 0
}

/// Writes carrying a body must declare JSON; empty POSTs such as setup-tables pass
fn validate_content_type(method: &Method, headers: &HeaderMap) -> Result<(), ApiError> {
    let is_write = matches!(*method, Method::POST | Method::PUT | Method::PATCH);
    if !is_write || !has_body(headers) {
        return Ok(());
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if content_type.starts_with("application/json") {
        Ok(())
    } else {
        warn!(content_type = %content_type, "Invalid content type");
        Err(error_response(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Content-Type must be application/json",
        ))
    }
}

fn validate_request_size(headers: &HeaderMap) -> Result<(), ApiError> {
    match content_length(headers) {
        Some(length) if length > MAX_REQUEST_SIZE => {
            warn!("Request too large: {} bytes", length);
            Err(error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!(
                    "Request size {} bytes exceeds maximum of {} bytes",
                    length, MAX_REQUEST_SIZE
                ),
            ))
        }
        _ => Ok(()),
    }
}

/// CORS middleware for handling cross-origin requests
pub async fn cors_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization, X-Razorpay-Signature"),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("86400"),
    );

    response
}

pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'self'"),
    );

    response
}
