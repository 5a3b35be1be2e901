//! # Backoff between restarts.
//!
//! The delay before restart `n` (0-based) is `first × factor^n`, clamped to
//! `max`, then jittered. The base is derived from `n` alone, so jitter never
//! feeds back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use modvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(1),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//! assert_eq!(backoff.next(0), Duration::from_millis(100));
//! assert_eq!(backoff.next(2), Duration::from_millis(400));
//! assert_eq!(backoff.next(9), Duration::from_secs(1));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::policies::jitter::JitterPolicy;

/// Restart delay policy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Delay before the first restart.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Growth per restart (`1.0` = constant).
    pub factor: f64,
    pub jitter: JitterPolicy,
}

impl BackoffPolicy {
    /// No delay at all: re-admission happens as soon as the failure is recorded.
    pub const fn immediate() -> Self {
        Self {
            first: Duration::ZERO,
            max: Duration::ZERO,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Delay before restart number `restart` (0-based).
    pub fn next(&self, restart: u32) -> Duration {
        let exp = i32::try_from(restart).unwrap_or(i32::MAX);
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);
        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}

impl Default for BackoffPolicy {
    /// `first = 100ms`, `factor = 2.0`, `max = 30s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_is_always_zero() {
        let p = BackoffPolicy::immediate();
        for n in [0, 1, 5, u32::MAX] {
            assert_eq!(p.next(n), Duration::ZERO);
        }
    }

    #[test]
    fn grows_exponentially_until_cap() {
        let p = BackoffPolicy::default();
        assert_eq!(p.next(0), Duration::from_millis(100));
        assert_eq!(p.next(1), Duration::from_millis(200));
        assert_eq!(p.next(3), Duration::from_millis(800));
        assert_eq!(p.next(20), Duration::from_secs(30));
    }

    #[test]
    fn first_above_max_is_clamped() {
        let p = BackoffPolicy {
            first: Duration::from_secs(10),
            max: Duration::from_secs(2),
            factor: 1.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(p.next(0), Duration::from_secs(2));
    }

    #[test]
    fn overflowing_exponent_clamps_to_max() {
        let p = BackoffPolicy {
            factor: 10.0,
            ..BackoffPolicy::default()
        };
        assert_eq!(p.next(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn jittered_delay_never_exceeds_base() {
        let p = BackoffPolicy {
            jitter: JitterPolicy::Full,
            ..BackoffPolicy::default()
        };
        for n in 0..12 {
            let base = BackoffPolicy::default().next(n);
            assert!(p.next(n) <= base);
        }
    }
}
