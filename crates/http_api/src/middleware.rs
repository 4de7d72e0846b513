use std::time::Instant;

use axum::{
    Json,
    body::Body,
    extract::{MatchedPath, State},
    http::{
        HeaderMap, HeaderValue, Request, StatusCode,
        header::{AUTHORIZATION, RETRY_AFTER},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};

use quitpath_app::ApiError;
use quitpath_core::ApiMetricSample;

use crate::{
    errors::{ErrorMessage, HttpError},
    state::{HttpState, SessionUser},
};

pub async fn require_session(
    State(state): State<HttpState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, HttpError> {
    let token = bearer_token(req.headers()).ok_or_else(|| {
        HttpError::new(
            StatusCode::UNAUTHORIZED,
            "missing bearer token",
            Some("unauthorized".to_string()),
        )
    })?;
    let Some(user_id) = state.sessions.validate(&token) else {
        return Err(HttpError::new(
            StatusCode::UNAUTHORIZED,
            "invalid session token",
            Some("unauthorized".to_string()),
        ));
    };
    req.extensions_mut().insert(SessionUser(user_id.clone()));
    let mut response = next.run(req).await;
    // Surfaced on the response so the metrics middleware can attribute the
    // sample to a requester.
    response.extensions_mut().insert(SessionUser(user_id));
    Ok(response)
}

pub async fn rate_limit(
    State(state): State<HttpState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, HttpError> {
    let route = matched_route(&req);
    let identifier = caller_identifier(req.headers());
    let decision = state.limiter.check(&identifier, &route);

    if !decision.allowed {
        tracing::debug!(identifier = %identifier, route = %route, "rate limit exceeded");
        let body = ApiError {
            status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            message: "rate limit exceeded".to_string(),
            code: Some("rate_limited".to_string()),
        };
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        response
            .extensions_mut()
            .insert(ErrorMessage("rate limit exceeded".to_string()));
        let headers = response.headers_mut();
        headers.insert(RETRY_AFTER, HeaderValue::from(decision.retry_after_secs));
        headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(0u32));
        return Ok(response);
    }

    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    Ok(response)
}

/// Outermost layer: one sample per completed request, including requests
/// rejected by the limiter or the session check.
pub async fn track_metrics(
    State(state): State<HttpState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let endpoint = matched_route(&req);
    let method = req.method().to_string();
    let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let error = if status >= 400 {
        response
            .extensions()
            .get::<ErrorMessage>()
            .map(|message| message.0.clone())
            .or_else(|| {
                response
                    .status()
                    .canonical_reason()
                    .map(|reason| reason.to_string())
            })
    } else {
        None
    };
    let requester_id = response
        .extensions()
        .get::<SessionUser>()
        .map(|user| user.0.clone());

    state.app.services.metrics.record_sample(&ApiMetricSample {
        endpoint,
        method,
        ts,
        latency_ms: started.elapsed().as_millis() as u64,
        status,
        error,
        requester_id,
    });

    response
}

fn matched_route(req: &Request<Body>) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.to_string())
}

/// Identifier for rate limiting: the caller's bearer token when present,
/// else the forwarded client address, else one shared anonymous bucket.
fn caller_identifier(headers: &HeaderMap) -> String {
    if let Some(token) = bearer_token(headers) {
        return token;
    }
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|addr| addr.trim().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}
