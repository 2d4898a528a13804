//! Per-provider request budget.
//!
//! Each provider owns one `RateLimiter` holding two counters: a sliding
//! one-minute window and a per-UTC-day count. Checking and incrementing
//! happen under a single lock, so concurrent callers can never overshoot
//! either budget.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use log::{debug, warn};

use crate::errors::{LimitScope, MarketDataError};
use crate::provider::RateLimit;

const WINDOW: Duration = Duration::from_secs(60);

/// Counter state for one provider.
#[derive(Debug)]
struct WindowState {
    /// Start times of the requests made in the current window.
    minute: VecDeque<Instant>,
    /// UTC day the daily count refers to.
    day: NaiveDate,
    /// Requests made on `day`.
    daily_count: u32,
}

impl WindowState {
    fn new(today: NaiveDate) -> Self {
        Self {
            minute: VecDeque::new(),
            day: today,
            daily_count: 0,
        }
    }

    /// Drop requests older than the window and reset the day on rollover.
    fn roll(&mut self, now: Instant, today: NaiveDate) {
        while let Some(front) = self.minute.front() {
            if now.duration_since(*front) >= WINDOW {
                self.minute.pop_front();
            } else {
                break;
            }
        }
        if today != self.day {
            self.day = today;
            self.daily_count = 0;
        }
    }
}

/// Snapshot of a limiter's counters.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RateLimitStatus {
    pub minute_used: u32,
    pub minute_limit: u32,
    pub daily_used: u32,
    pub daily_limit: Option<u32>,
}

/// Sliding-window plus daily rate limiter owned by one provider.
pub struct RateLimiter {
    provider: &'static str,
    requests_per_minute: u32,
    daily_limit: Option<u32>,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    pub fn new(provider: &'static str, limit: &RateLimit) -> Self {
        Self {
            provider,
            requests_per_minute: limit.requests_per_minute,
            daily_limit: limit.daily_limit,
            state: Mutex::new(WindowState::new(Utc::now().date_naive())),
        }
    }

    /// Lock the state mutex, recovering from poison if necessary.
    ///
    /// The counters stay meaningful after a panic elsewhere; the worst case
    /// is one miscounted request.
    fn lock_state(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!(
                "Rate limiter state for '{}' was poisoned, recovering",
                self.provider
            );
            poisoned.into_inner()
        })
    }

    /// Reserve one request, or report which budget is exhausted.
    ///
    /// A rejected call does not consume from either budget.
    pub fn try_acquire(&self) -> Result<(), MarketDataError> {
        self.try_acquire_at(Instant::now(), Utc::now().date_naive())
    }

    fn try_acquire_at(&self, now: Instant, today: NaiveDate) -> Result<(), MarketDataError> {
        let mut state = self.lock_state();
        state.roll(now, today);

        if let Some(limit) = self.daily_limit {
            if state.daily_count >= limit {
                debug!(
                    "Rate limiter: daily budget of {} exhausted for '{}'",
                    limit, self.provider
                );
                return Err(self.exceeded(LimitScope::Daily));
            }
        }

        if state.minute.len() as u32 >= self.requests_per_minute {
            debug!(
                "Rate limiter: {} requests in the last minute for '{}'",
                state.minute.len(),
                self.provider
            );
            return Err(self.exceeded(LimitScope::Minute));
        }

        state.minute.push_back(now);
        state.daily_count += 1;
        Ok(())
    }

    fn exceeded(&self, scope: LimitScope) -> MarketDataError {
        MarketDataError::RateLimitExceeded {
            provider: self.provider.to_string(),
            scope,
        }
    }

    /// Current counter values.
    pub fn status(&self) -> RateLimitStatus {
        let mut state = self.lock_state();
        state.roll(Instant::now(), Utc::now().date_naive());
        RateLimitStatus {
            minute_used: state.minute.len() as u32,
            minute_limit: self.requests_per_minute,
            daily_used: state.daily_count,
            daily_limit: self.daily_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    fn limit(per_minute: u32, daily: Option<u32>) -> RateLimit {
        RateLimit {
            requests_per_minute: per_minute,
            daily_limit: daily,
            ..Default::default()
        }
    }

    #[test]
    fn test_minute_window_blocks_then_slides() {
        let limiter = RateLimiter::new("TEST_PROVIDER", &limit(2, None));
        let today = Utc::now().date_naive();
        let start = Instant::now();

        assert!(limiter.try_acquire_at(start, today).is_ok());
        assert!(limiter.try_acquire_at(start, today).is_ok());

        let err = limiter.try_acquire_at(start, today).unwrap_err();
        assert!(matches!(
            err,
            MarketDataError::RateLimitExceeded {
                scope: LimitScope::Minute,
                ..
            }
        ));

        // Both earlier requests have left the window
        let later = start + Duration::from_secs(61);
        assert!(limiter.try_acquire_at(later, today).is_ok());
    }

    #[test]
    fn test_daily_limit_blocks_until_rollover() {
        let limiter = RateLimiter::new("TEST_PROVIDER", &limit(100, Some(2)));
        let today = Utc::now().date_naive();
        let now = Instant::now();

        assert!(limiter.try_acquire_at(now, today).is_ok());
        assert!(limiter.try_acquire_at(now, today).is_ok());

        let err = limiter.try_acquire_at(now, today).unwrap_err();
        assert!(matches!(
            err,
            MarketDataError::RateLimitExceeded {
                scope: LimitScope::Daily,
                ..
            }
        ));

        let tomorrow = today.checked_add_days(Days::new(1)).unwrap();
        assert!(limiter.try_acquire_at(now, tomorrow).is_ok());
    }

    #[test]
    fn test_rejection_does_not_consume() {
        let limiter = RateLimiter::new("TEST_PROVIDER", &limit(1, Some(10)));

        assert!(limiter.try_acquire().is_ok());
        for _ in 0..5 {
            assert!(limiter.try_acquire().is_err());
        }

        let status = limiter.status();
        assert_eq!(status.minute_used, 1);
        assert_eq!(status.daily_used, 1);
        assert_eq!(status.daily_limit, Some(10));
    }

    #[test]
    fn test_zero_daily_limit_rejects_everything() {
        let limiter = RateLimiter::new("TEST_PROVIDER", &limit(100, Some(0)));
        assert!(limiter.try_acquire().unwrap_err().is_local_rate_limit());
    }

    #[test]
    fn test_concurrent_acquire_never_overshoots() {
        use std::sync::Arc;

        let limiter = Arc::new(RateLimiter::new("TEST_PROVIDER", &limit(50, None)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || {
                    (0..20).filter(|_| limiter.try_acquire().is_ok()).count()
                })
            })
            .collect();

        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 50);
    }
}
