//! Global signal rate limiter (governor GCRA + in-flight bound)
//!
//! Every signal goes through one `SignalRateLimiter`: at most `max_requests`
//! admissions per `period` and at most `max_in_flight` requests outstanding.
//! Waiting for a slot is bounded by `acquire_timeout`; the slot is returned
//! when the `SignalPermit` is dropped.

use crate::errors::RateLimitError;
use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitSettings {
    pub max_requests: usize,
    pub period: Duration,
    pub max_in_flight: usize,
    pub acquire_timeout: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 10,
            period: Duration::from_secs(1),
            max_in_flight: 10,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

/// Held for the duration of one signal request
pub struct SignalPermit {
    _in_flight: OwnedSemaphorePermit,
}

pub struct SignalRateLimiter {
    limiter: GovernorLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>,
    in_flight: Arc<Semaphore>,
    settings: RateLimitSettings,
}

impl SignalRateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        let burst = NonZeroU32::new(settings.max_requests.max(1) as u32).unwrap_or(NonZeroU32::MIN);
        let replenish = settings.period / burst.get();
        // a zero period means "no admission rate limit", only the in-flight bound
        let quota = Quota::with_period(replenish)
            .map(|q| q.allow_burst(burst))
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX));

        Self {
            limiter: GovernorLimiter::direct(quota),
            in_flight: Arc::new(Semaphore::new(settings.max_in_flight.max(1))),
            settings,
        }
    }

    pub fn settings(&self) -> RateLimitSettings {
        self.settings
    }

    /// Requests currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.settings.max_in_flight.max(1) - self.in_flight.available_permits()
    }

    /// Wait (bounded) for an in-flight slot and a rate admission
    pub async fn acquire(&self) -> Result<SignalPermit, RateLimitError> {
        let timeout = self.settings.acquire_timeout;
        let wait = async {
            let permit = self
                .in_flight
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| RateLimitError::Closed)?;
            self.limiter.until_ready().await;
            Ok(SignalPermit {
                _in_flight: permit,
            })
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(RateLimitError::Timeout(timeout)),
        }
    }
}
