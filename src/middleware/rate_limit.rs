use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::warn;

use crate::error::{AppError, AppResult};

/// Global limit on how often payment watch sessions may be started
pub struct SessionRateLimiter {
    limiter: DefaultDirectRateLimiter,
}

impl SessionRateLimiter {
    pub fn per_minute(requests: u32) -> Self {
        let burst = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_minute(burst)),
        }
    }

    pub fn check(&self) -> AppResult<()> {
        self.limiter.check().map_err(|_| {
            warn!("🚦 Watch session rate limit exceeded");
            AppError::RateLimited
        })
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<Arc<SessionRateLimiter>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    limiter.check()?;
    Ok(next.run(req).await)
}
