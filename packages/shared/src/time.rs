//! Time-related utilities with clock abstraction for testability.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Current wall-clock time in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock at the given instant
    pub fn new(fixed_time: DateTime<Utc>) -> Self {
        Self { fixed_time }
    }

    /// Create a new fixed clock from a Unix timestamp in milliseconds.
    ///
    /// Out-of-range values fall back to the Unix epoch.
    pub fn from_millis(millis: i64) -> Self {
        let fixed_time = Utc
            .timestamp_millis_opt(millis)
            .single()
            .unwrap_or(DateTime::UNIX_EPOCH);
        Self { fixed_time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.fixed_time
    }
}

/// Format a UTC instant as RFC 3339 with millisecond precision
pub fn to_rfc3339(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Format a UTC instant as a short local-display `HH:MM:SS` string
pub fn to_clock_time(time: &DateTime<Utc>) -> String {
    time.format("%H:%M:%S").to_string()
}
