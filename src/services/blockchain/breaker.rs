use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Requests left in the provider's window below which we start warning.
const LOW_HEADROOM: u64 = 10;

/// Rate-limit accounting for one provider client.
///
/// Opens after `threshold` consecutive 429 responses and fails calls fast until
/// `cooldown` has passed. Any successful response closes it.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    state: Mutex<BreakerState>,
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_rate_limits: u32,
    opened_at: Option<Instant>,
    remaining: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub remaining: Option<u64>,
    pub consecutive_rate_limits: u32,
    pub circuit_open: bool,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            state: Mutex::new(BreakerState::default()),
        }
    }

    /// Fails with `RateLimited` while the breaker is open.
    pub fn check(&self) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(opened_at) = state.opened_at else {
            return Ok(());
        };

        let elapsed = opened_at.elapsed();
        if elapsed < self.cooldown {
            let left = self.cooldown - elapsed;
            let retry_after = left.as_millis().div_ceil(1000) as u64;
            return Err(ProviderError::RateLimited {
                retry_after: Some(retry_after),
            });
        }

        tracing::info!("Circuit breaker cooldown elapsed, resuming provider requests");
        state.opened_at = None;
        state.consecutive_rate_limits = 0;
        Ok(())
    }

    pub fn record_success(&self, remaining: Option<u64>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.consecutive_rate_limits = 0;
        state.opened_at = None;

        if let Some(remaining) = remaining {
            if remaining <= LOW_HEADROOM {
                tracing::warn!(remaining, "Provider rate limit approaching");
            }
            state.remaining = Some(remaining);
        }
    }

    pub fn record_rate_limited(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.consecutive_rate_limits += 1;
        state.remaining = Some(0);

        if state.opened_at.is_none() && state.consecutive_rate_limits >= self.threshold {
            state.opened_at = Some(Instant::now());
            tracing::error!(
                consecutive = state.consecutive_rate_limits,
                cooldown_secs = self.cooldown.as_secs(),
                "Circuit breaker opened after consecutive rate limits"
            );
        }
    }

    pub fn status(&self) -> RateLimitStatus {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        RateLimitStatus {
            remaining: state.remaining,
            consecutive_rate_limits: state.consecutive_rate_limits,
            circuit_open: state
                .opened_at
                .is_some_and(|opened| opened.elapsed() < self.cooldown),
        }
    }
}
