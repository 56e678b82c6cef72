//! Rate limiting and request logging middleware.
//!
//! The chat endpoint shares one global governor limiter. Per-IP limits
//! would depend on reverse proxy headers, so they are left to the proxy.

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
};

use crate::error::ServerError;
use crate::state::AppState;

/// Rate limiter type alias (uses default clock).
pub type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create a rate limiter with the specified requests per minute.
///
/// A zero rate is treated as one request per minute.
pub fn create_rate_limiter(requests_per_minute: u32) -> SharedRateLimiter {
    let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(rpm)))
}

/// Rate limiting middleware for the chat endpoint.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(limiter) = state.limiter.as_ref() else {
        return next.run(request).await;
    };

    match limiter.check() {
        Ok(()) => next.run(request).await,
        Err(not_until) => {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            let retry_after_secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            let retry_after_secs = retry_after_secs.max(1);

            tracing::warn!(
                path = %request.uri().path(),
                retry_after_seconds = retry_after_secs,
                "Rate limit exceeded"
            );
            ServerError::RateLimited { retry_after_secs }.into_response()
        }
    }
}

/// Structured request logging middleware.
pub async fn request_logging_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.request_logging {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    let duration_ms = start.elapsed().as_millis();
    let status = response.status();
    if status.is_server_error() {
        tracing::error!(method = %method, path = %path, status = status.as_u16(), duration_ms, "Request completed with server error");
    } else if status.is_client_error() {
        tracing::warn!(method = %method, path = %path, status = status.as_u16(), duration_ms, "Request completed with client error");
    } else {
        // For SSE this is the time to first byte.
        tracing::info!(method = %method, path = %path, status = status.as_u16(), duration_ms, "Request completed");
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limiter_allows_quota_then_rejects() {
        let limiter = create_rate_limiter(2);
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }

    #[test]
    fn test_zero_rpm_still_allows_one() {
        let limiter = create_rate_limiter(0);
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }
}
