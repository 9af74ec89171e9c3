//! Per-provider health breaker
//!
//! Only failures that say the provider itself is down count as strikes
//! (see [`ErrorCategory::trips_breaker`]); throttling, rejected prompts and
//! garbled bodies come from a live provider and clear the strike count.
//! After `trip_after` consecutive strikes the provider is benched for
//! `cool_down` and the gateway skips it without an attempt. Once the bench
//! time is up a single trial call goes through, and its outcome decides
//! between healthy and another cool-down.
//!
//! ```text
//! Healthy --[trip_after strikes]--> Tripped
//! Tripped --[cool_down elapsed, next caller]--> Trial
//! Trial --[answer]--> Healthy
//! Trial --[strike]--> Tripped
//! ```

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::constants::breaker as breaker_constants;
use crate::types::ErrorCategory;

/// Reported health of one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    /// Benched; calls are rejected until the cool-down ends
    Tripped,
    /// One trial call is out
    Trial,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Healthy => "HEALTHY",
            Self::Tripped => "TRIPPED",
            Self::Trial => "TRIAL",
        })
    }
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive strikes that bench the provider
    pub trip_after: u32,
    pub cool_down: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            trip_after: breaker_constants::TRIP_AFTER,
            cool_down: Duration::from_secs(breaker_constants::COOL_DOWN_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Healthy { strikes: u32 },
    Tripped { until: Instant },
    Trial { since: Instant },
}

#[derive(Debug)]
struct Ledger {
    phase: Phase,
    trips: u64,
    rejected: u64,
}

/// Point-in-time view for reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub provider: String,
    pub state: HealthState,
    pub strikes: u32,
    /// Times the provider has been benched
    pub trips: u64,
    /// Calls turned away while benched
    pub rejected: u64,
}

#[derive(Debug)]
pub struct ProviderHealth {
    provider: String,
    config: BreakerConfig,
    ledger: Mutex<Ledger>,
}

impl ProviderHealth {
    pub fn new(provider: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            provider: provider.into(),
            config,
            ledger: Mutex::new(Ledger {
                phase: Phase::Healthy { strikes: 0 },
                trips: 0,
                rejected: 0,
            }),
        }
    }

    // The ledger is plain counters; a panic elsewhere cannot leave it torn.
    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> HealthState {
        match self.ledger().phase {
            Phase::Healthy { .. } => HealthState::Healthy,
            Phase::Tripped { .. } => HealthState::Tripped,
            Phase::Trial { .. } => HealthState::Trial,
        }
    }

    /// Whether a call may go out now.
    ///
    /// The first caller after the cool-down gets the trial slot. A trial
    /// that has been out longer than `cool_down` (its caller was cancelled)
    /// is handed to the next caller.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut ledger = self.ledger();
        let phase = ledger.phase;
        match phase {
            Phase::Healthy { .. } => true,
            Phase::Tripped { until } if now >= until => {
                info!(provider = %self.provider, "Cool-down over, sending trial call");
                ledger.phase = Phase::Trial { since: now };
                true
            }
            Phase::Trial { since } if now.duration_since(since) >= self.config.cool_down => {
                ledger.phase = Phase::Trial { since: now };
                true
            }
            Phase::Tripped { .. } | Phase::Trial { .. } => {
                ledger.rejected += 1;
                false
            }
        }
    }

    /// Record how an admitted call ended; `None` is success.
    pub fn record(&self, failure: Option<ErrorCategory>) -> HealthState {
        let strike = failure.is_some_and(|c| c.trips_breaker());
        let trip_after = self.config.trip_after.max(1);
        let mut ledger = self.ledger();

        let current = ledger.phase;
        ledger.phase = match (current, strike) {
            (Phase::Trial { .. }, false) => {
                info!(provider = %self.provider, "Trial call answered, provider healthy");
                Phase::Healthy { strikes: 0 }
            }
            (_, false) => Phase::Healthy { strikes: 0 },
            (Phase::Healthy { strikes }, true) if strikes + 1 < trip_after => Phase::Healthy {
                strikes: strikes + 1,
            },
            // Late strike from a call admitted before the trip
            (tripped @ Phase::Tripped { .. }, true) => tripped,
            (_, true) => {
                ledger.trips += 1;
                warn!(
                    provider = %self.provider,
                    category = ?failure,
                    cool_down_secs = self.config.cool_down.as_secs(),
                    "Provider benched"
                );
                Phase::Tripped {
                    until: Instant::now() + self.config.cool_down,
                }
            }
        };
        drop(ledger);
        self.state()
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let ledger = self.ledger();
        let (state, strikes) = match ledger.phase {
            Phase::Healthy { strikes } => (HealthState::Healthy, strikes),
            Phase::Tripped { .. } => (HealthState::Tripped, 0),
            Phase::Trial { .. } => (HealthState::Trial, 0),
        };
        HealthSnapshot {
            provider: self.provider.clone(),
            state,
            strikes,
            trips: ledger.trips,
            rejected: ledger.rejected,
        }
    }

    pub fn reset(&self) {
        let mut ledger = self.ledger();
        ledger.phase = Phase::Healthy { strikes: 0 };
        ledger.rejected = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn health(trip_after: u32) -> ProviderHealth {
        ProviderHealth::new(
            "ollama",
            BreakerConfig {
                trip_after,
                cool_down: Duration::from_secs(30),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_health_failures_trip() {
        let h = health(3);
        h.record(Some(ErrorCategory::Network));
        h.record(Some(ErrorCategory::Timeout));
        assert_eq!(h.snapshot().strikes, 2);
        assert_eq!(h.record(Some(ErrorCategory::Unavailable)), HealthState::Tripped);

        assert!(!h.try_acquire());
        let snap = h.snapshot();
        assert_eq!(snap.trips, 1);
        assert_eq!(snap.rejected, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_provider_failures_never_trip() {
        let h = health(1);
        for category in [
            ErrorCategory::RateLimit,
            ErrorCategory::BadRequest,
            ErrorCategory::BadResponse,
            ErrorCategory::Unknown,
        ] {
            assert_eq!(h.record(Some(category)), HealthState::Healthy, "{}", category);
        }
        assert_eq!(h.snapshot().trips, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_clears_strikes() {
        let h = health(2);
        h.record(Some(ErrorCategory::Auth));
        h.record(Some(ErrorCategory::RateLimit));
        assert_eq!(h.snapshot().strikes, 0);
        assert_eq!(h.record(Some(ErrorCategory::Auth)), HealthState::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_trial_after_cool_down() {
        let h = health(1);
        h.record(Some(ErrorCategory::Network));

        advance(Duration::from_secs(29)).await;
        assert!(!h.try_acquire());

        advance(Duration::from_secs(1)).await;
        assert!(h.try_acquire());
        assert_eq!(h.state(), HealthState::Trial);
        // Only one trial at a time
        assert!(!h.try_acquire());

        assert_eq!(h.record(None), HealthState::Healthy);
        assert!(h.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_trial_benches_again() {
        let h = health(3);
        for _ in 0..3 {
            h.record(Some(ErrorCategory::Transient));
        }
        advance(Duration::from_secs(30)).await;
        assert!(h.try_acquire());

        // One strike is enough during a trial
        assert_eq!(h.record(Some(ErrorCategory::Timeout)), HealthState::Tripped);
        assert_eq!(h.snapshot().trips, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_trial_is_reissued() {
        let h = health(1);
        h.record(Some(ErrorCategory::Network));
        advance(Duration::from_secs(30)).await;
        assert!(h.try_acquire());

        advance(Duration::from_secs(30)).await;
        assert!(h.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_strike_keeps_original_cool_down() {
        let h = health(1);
        h.record(Some(ErrorCategory::Network));
        advance(Duration::from_secs(20)).await;
        h.record(Some(ErrorCategory::Network));
        assert_eq!(h.snapshot().trips, 1);

        advance(Duration::from_secs(10)).await;
        assert!(h.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset() {
        let h = health(1);
        h.record(Some(ErrorCategory::Auth));
        assert!(!h.try_acquire());
        h.reset();
        assert_eq!(h.state(), HealthState::Healthy);
        let snap = h.snapshot();
        assert_eq!(snap.rejected, 0);
        assert_eq!(snap.trips, 1);
    }
}
