//! # System load sources used for throttling.
//!
//! Before every run attempt the scheduler asks its [`LoadSource`] for the
//! current load; above `load_threshold` the attempt waits `throttle_seconds`.

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of a normalized load figure (`1.0` ≈ every core busy).
pub trait LoadSource: Send + Sync + 'static {
    fn load(&self) -> f64;
}

/// Reads the 1-minute load average from `/proc/loadavg`, divided by the number
/// of available cores. Reports `0.0` where the file is unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLoad;

impl SystemLoad {
    fn parse(loadavg: &str, cores: usize) -> Option<f64> {
        let one_minute: f64 = loadavg.split_whitespace().next()?.parse().ok()?;
        Some(one_minute / cores.max(1) as f64)
    }
}

impl LoadSource for SystemLoad {
    fn load(&self) -> f64 {
        let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
        std::fs::read_to_string("/proc/loadavg")
            .ok()
            .and_then(|raw| Self::parse(&raw, cores))
            .unwrap_or(0.0)
    }
}

/// Fixed, externally settable load (tests, hosts with their own metrics).
#[derive(Debug, Default)]
pub struct StaticLoad {
    bits: AtomicU64,
}

impl StaticLoad {
    pub fn new(load: f64) -> Self {
        Self {
            bits: AtomicU64::new(load.to_bits()),
        }
    }

    pub fn set(&self, load: f64) {
        self.bits.store(load.to_bits(), Ordering::Relaxed);
    }
}

impl LoadSource for StaticLoad {
    fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes_loadavg() {
        let raw = "3.00 1.50 0.75 2/345 6789\n";
        assert_eq!(SystemLoad::parse(raw, 4), Some(0.75));
        assert_eq!(SystemLoad::parse(raw, 0), Some(3.0));
        assert_eq!(SystemLoad::parse("garbage", 2), None);
        assert_eq!(SystemLoad::parse("", 2), None);
    }

    #[test]
    fn static_load_can_be_updated() {
        let source = StaticLoad::new(0.2);
        assert_eq!(source.load(), 0.2);
        source.set(1.7);
        assert_eq!(source.load(), 1.7);
        assert!(SystemLoad.load() >= 0.0);
    }
}
