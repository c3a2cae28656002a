use crate::error::AppError;
use axum::{
    extract::{Request, State},
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

/// Create a keyed rate limiter allowing `attempts` requests per IP within `window_seconds`.
pub fn create_ip_rate_limiter(attempts: u32, window_seconds: u64) -> IpRateLimiter {
    let attempts = attempts.max(1);
    let period = Duration::from_millis(window_seconds.saturating_mul(1000) / attempts as u64)
        .max(Duration::from_millis(1));
    let quota = Quota::with_period(period)
        .expect("period is at least one millisecond")
        .allow_burst(NonZeroU32::new(attempts).expect("attempts is guaranteed to be non-zero"));

    Arc::new(RateLimiter::dashmap(quota))
}

/// Limiter plus the policy for finding the client address.
#[derive(Clone)]
pub struct IpRateLimitState {
    pub limiter: IpRateLimiter,
    /// Honour `X-Forwarded-For` only when a trusted proxy sits in front.
    pub trust_proxy: bool,
}

impl IpRateLimitState {
    pub fn new(limiter: IpRateLimiter, trust_proxy: bool) -> Self {
        Self {
            limiter,
            trust_proxy,
        }
    }
}

fn client_ip(request: &Request, trust_proxy: bool) -> Option<IpAddr> {
    let peer_ip = request
        .extensions()
        .get::<axum::extract::ConnectInfo<SocketAddr>>()
        .map(|axum::extract::ConnectInfo(addr)| addr.ip());

    if !trust_proxy {
        return peer_ip;
    }

    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
        .or(peer_ip)
}

/// Middleware for IP-based rate limiting
pub async fn ip_rate_limit_middleware(
    State(state): State<IpRateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match client_ip(&request, state.trust_proxy) {
        Some(ip) => match state.limiter.check_key(&ip) {
            Ok(_) => Ok(next.run(request).await),
            Err(negative) => {
                let wait_time = negative.wait_time_from(DefaultClock::default().now());
                tracing::warn!(client_ip = %ip, "Rate limit exceeded");
                Err(AppError::TooManyRequests(
                    "Too many requests from this IP. Please try again later.".to_string(),
                    Some(wait_time.as_secs()),
                ))
            }
        },
        None => {
            tracing::warn!("Could not determine IP for rate limiting");
            Ok(next.run(request).await)
        }
    }
}
