//! Time source abstraction for real and manually driven time.
//!
//! Every "now" the resolver and the cycle driver look at comes from a
//! [`TimeSource`]. Production code uses [`RealTimeSource`]; tests drive a
//! [`ManualTimeSource`] to step across cache lifetimes and sunrise/sunset
//! boundaries without waiting for wall-clock time to pass.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, TimeZone, Utc};
use std::sync::{Arc, Mutex};

/// Trait for abstracting time operations
pub trait TimeSource: Send + Sync {
    /// Get the current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Real-time implementation that uses actual system time
#[derive(Debug, Default)]
pub struct RealTimeSource;

impl TimeSource for RealTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Time source that only moves when told to.
#[derive(Debug)]
pub struct ManualTimeSource {
    current: Mutex<DateTime<Utc>>,
}

impl ManualTimeSource {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = instant;
    }

    /// Move time forward (or backward for negative durations).
    pub fn advance(&self, by: ChronoDuration) {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Shared handle to the real clock.
pub fn real() -> Arc<dyn TimeSource> {
    Arc::new(RealTimeSource)
}

/// Parse a datetime string in a specific timezone.
///
/// Format is "YYYY-MM-DD HH:MM:SS". Handy for building fixtures at a given
/// local wall-clock time.
pub fn parse_datetime_in_tz(s: &str, tz: chrono_tz::Tz) -> Result<DateTime<Utc>, String> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| format!("Invalid datetime format: {e}. Use YYYY-MM-DD HH:MM:SS"))
        .and_then(|naive| {
            tz.from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| format!("Ambiguous or invalid time in timezone {tz}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_time_source_moves_only_when_told() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let clock = ManualTimeSource::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(ChronoDuration::minutes(90));
        assert_eq!(clock.now(), start + ChronoDuration::minutes(90));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_parse_datetime_in_tz() {
        let parsed = parse_datetime_in_tz("2025-01-15 08:00:00", chrono_tz::Europe::Berlin).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 1, 15, 7, 0, 0).unwrap());

        assert!(parse_datetime_in_tz("08:00", chrono_tz::UTC).is_err());
        // Spring-forward gap does not exist in Berlin
        assert!(parse_datetime_in_tz("2025-03-30 02:30:00", chrono_tz::Europe::Berlin).is_err());
    }
}
