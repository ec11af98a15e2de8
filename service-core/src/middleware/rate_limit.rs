use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

/// Rate limiter keyed by client IP address
pub type IpRateLimiter = Arc<RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>>;

fn quota(attempts: u32, window_seconds: u64) -> Quota {
    let attempts = NonZeroU32::new(attempts.max(1)).unwrap_or(NonZeroU32::MIN);
    let period_ms = (window_seconds.max(1) * 1000) / u64::from(attempts.get());
    let period = Duration::from_millis(period_ms.max(1));
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(attempts))
        .allow_burst(attempts)
}

/// Create a rate limiter keyed by client IP, allowing `attempts` per `window_seconds`.
pub fn create_ip_rate_limiter(attempts: u32, window_seconds: u64) -> IpRateLimiter {
    Arc::new(RateLimiter::dashmap(quota(attempts, window_seconds)))
}

fn too_many(wait: Duration) -> AppError {
    AppError::TooManyRequests(
        "Too many requests. Please try again later.".to_string(),
        Some(wait.as_secs().max(1)),
    )
}

/// Middleware for IP-based rate limiting.
///
/// Requests without connection info (e.g. in-process tests using `oneshot`)
/// are not limited.
pub async fn ip_rate_limit_middleware(
    State(limiter): State<IpRateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if let Some(ip) = ip {
        if let Err(negative) = limiter.check_key(&ip) {
            tracing::warn!(client_ip = %ip, "Rate limit exceeded");
            return Err(too_many(
                negative.wait_time_from(DefaultClock::default().now()),
            ));
        }
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_limiter_rejects_after_burst() {
        let limiter = create_ip_rate_limiter(2, 60);
        let ip: IpAddr = "10.1.2.3".parse().unwrap();

        assert!(limiter.check_key(&ip).is_ok());
        assert!(limiter.check_key(&ip).is_ok());
        assert!(limiter.check_key(&ip).is_err());

        let other: IpAddr = "10.1.2.4".parse().unwrap();
        assert!(limiter.check_key(&other).is_ok());
    }

    #[test]
    fn zero_attempts_still_allows_one() {
        let limiter = create_ip_rate_limiter(0, 60);
        let ip: IpAddr = "10.1.2.5".parse().unwrap();
        assert!(limiter.check_key(&ip).is_ok());
        assert!(limiter.check_key(&ip).is_err());
    }
}
