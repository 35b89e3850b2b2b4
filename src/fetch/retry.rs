//! Backoff policy shared by archive fetches and store writes.
//!
//! A failed fetch is sorted into a [`FailureClass`]. Archives on the bulk
//! data CDN fail for mostly boring reasons: an overloaded origin (5xx), a
//! stalled transfer, a rate limit. Those are worth another try. A missing
//! file or a bad URL is not.
//!
//! ```
//! use mtgdb_core::fetch::{FetchError, RetryDecision, RetryPolicy, classify_error};
//!
//! let policy = RetryPolicy::default();
//! let error = FetchError::http_status("https://mtgjson.com/api/v5/AllPrintings.json.zip", 503);
//!
//! if let RetryDecision::Retry { delay, attempt } = policy.decide(classify_error(&error), 1) {
//!     println!("attempt {attempt} in {delay:?}");
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::debug;

use super::FetchError;

/// Attempts per archive unless configured otherwise, the first one included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);
const DEFAULT_FACTOR: f32 = 2.0;

/// A 429 never waits less than this.
const RATE_LIMIT_FLOOR: Duration = Duration::from_secs(5);

/// Jitter is drawn from `0..=delay / JITTER_DIVISOR`.
const JITTER_DIVISOR: u32 = 4;

/// Strings in a connect error that point at certificate or handshake trouble.
const TLS_MARKERS: &[&str] = &["certificate", "tls", "ssl", "handshake"];

/// How a failure should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Overloaded server, stalled transfer, dropped connection.
    Transient,
    /// The server asked us to slow down.
    RateLimited,
    /// Retrying cannot help.
    Permanent,
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for `delay`, then make attempt number `attempt`.
    Retry {
        /// Backoff before the next attempt.
        delay: Duration,
        /// 1-based number of the next attempt.
        attempt: u32,
    },
    /// Stop and surface the last error.
    GiveUp {
        /// Why no further attempt is made.
        reason: String,
    },
}

/// Bounded exponential backoff: `min(base * factor^(n-1), max) + jitter`,
/// where jitter is up to a quarter of the capped delay.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    factor: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_BASE_DELAY,
            DEFAULT_MAX_DELAY,
            DEFAULT_FACTOR,
        )
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first attempt; zero is treated as one.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration, factor: f32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
            factor,
        }
    }

    /// Default backoff with a different attempt budget.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self::new(
            max_attempts,
            DEFAULT_BASE_DELAY,
            DEFAULT_MAX_DELAY,
            DEFAULT_FACTOR,
        )
    }

    /// Attempt budget, the first attempt included.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides what follows failed attempt number `failed_attempt` (1-based).
    #[must_use]
    pub fn decide(&self, class: FailureClass, failed_attempt: u32) -> RetryDecision {
        if class == FailureClass::Permanent {
            return RetryDecision::GiveUp {
                reason: "permanent failure".to_string(),
            };
        }
        if failed_attempt >= self.max_attempts {
            return RetryDecision::GiveUp {
                reason: format!("all {} attempts used", self.max_attempts),
            };
        }

        let mut delay = self.backoff(failed_attempt);
        if class == FailureClass::RateLimited {
            delay = delay.max(RATE_LIMIT_FLOOR);
        }
        debug!(failed_attempt, delay_ms = delay.as_millis(), ?class, "backing off");
        RetryDecision::Retry {
            delay,
            attempt: failed_attempt + 1,
        }
    }

    /// Jittered delay to wait after failed attempt number `failed_attempt`.
    #[must_use]
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let capped = self.capped_delay(failed_attempt);
        let spread = capped / JITTER_DIVISOR;
        if spread.is_zero() {
            return capped;
        }
        let extra = rand::thread_rng().gen_range(Duration::ZERO..=spread);
        capped + extra
    }

    fn capped_delay(&self, failed_attempt: u32) -> Duration {
        let exponent = i32::try_from(failed_attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let scale = f64::from(self.factor).powi(exponent);
        let scaled = self.base_delay.as_secs_f64() * scale;
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(scaled.max(0.0))
    }
}

/// Sorts a fetch error for [`RetryPolicy::decide`].
///
/// Timeouts, dropped connections, 408 and 5xx are transient and 429 is rate
/// limiting. Every other status, TLS trouble, local IO, bad URLs and panicked
/// tasks are permanent.
#[must_use]
pub fn classify_error(error: &FetchError) -> FailureClass {
    match error {
        FetchError::HttpStatus { status, .. } => match status {
            408 | 500..=599 => FailureClass::Transient,
            429 => FailureClass::RateLimited,
            _ => FailureClass::Permanent,
        },
        FetchError::Timeout { .. } => FailureClass::Transient,
        FetchError::Network { source, .. } => {
            let text = source.to_string().to_lowercase();
            if TLS_MARKERS.iter().any(|marker| text.contains(marker)) {
                FailureClass::Permanent
            } else {
                FailureClass::Transient
            }
        }
        FetchError::Io { .. } | FetchError::InvalidUrl { .. } | FetchError::TaskPanicked { .. } => {
            FailureClass::Permanent
        }
    }
}
