use axum::{
    extract::Request,
    http::{HeaderValue, Method, header},
    middleware::Next,
    response::Response,
};

use crate::app::errors::{ApiError, JSON_REQUESTS_ONLY, JSON_RESPONSES_ONLY};
use crate::context::RequestedVersion;

/// Records the requested API version (first path segment) in request extensions.
pub async fn version_middleware(mut req: Request, next: Next) -> Response {
    let version = {
        let path = req.uri().path();
        let segment = path.trim_start_matches('/').split('/').next().unwrap_or_default();
        RequestedVersion::parse(segment)
    };

    req.extensions_mut().insert(version);
    next.run(req).await
}

/// Rejects clients that cannot read JSON (406) and POST/PUT/PATCH requests
/// whose body is not declared as JSON (415). Runs before routing.
pub async fn require_json(req: Request, next: Next) -> Result<Response, ApiError> {
    if !accepts_json(req.headers().get(header::ACCEPT)) {
        tracing::debug!(method = %req.method(), "client does not accept JSON");
        return Err(ApiError::NotAcceptable(JSON_RESPONSES_ONLY.to_string()));
    }

    let carries_body = matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH);
    if carries_body && !is_json(req.headers().get(header::CONTENT_TYPE)) {
        tracing::debug!(method = %req.method(), "request body is not declared as JSON");
        return Err(ApiError::UnsupportedMediaType(JSON_REQUESTS_ONLY.to_string()));
    }

    Ok(next.run(req).await)
}

/// A missing or empty `Accept` header accepts anything.
fn accepts_json(accept: Option<&HeaderValue>) -> bool {
    let Some(accept) = accept else {
        return true;
    };
    let Ok(accept) = accept.to_str() else {
        return false;
    };
    if accept.trim().is_empty() {
        return true;
    }

    accept.split(',').any(|range| {
        let mut parts = range.split(';').map(str::trim);
        let media = parts.next().unwrap_or_default().to_ascii_lowercase();
        let refused = parts.any(|param| match param.split_once('=') {
            Some((key, q)) if key.trim().eq_ignore_ascii_case("q") => {
                q.trim().parse::<f32>().is_ok_and(|q| q <= 0.0)
            }
            _ => false,
        });
        !refused && matches!(media.as_str(), "application/json" | "application/*" | "*/*")
    })
}

fn is_json(content_type: Option<&HeaderValue>) -> bool {
    content_type
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("application/json"))
}
