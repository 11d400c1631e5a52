use chrono::{DateTime, Utc};

/// Wall-clock capability injected at construction so day rollover and
/// pipeline deadlines are testable without waiting.
pub trait Clock {
    /// Returns the current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// System clock implementation backed by `chrono::Utc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// UTC-midnight key (`YYYY-MM-DD`) identifying the day a fact belongs to.
pub fn utc_day_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// Milliseconds since the Unix epoch, clamped at zero.
pub fn epoch_ms(now: DateTime<Utc>) -> u64 {
    now.timestamp_millis().max(0) as u64
}
