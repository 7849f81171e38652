//! Wall-clock capture for event records
//!
//! Events are identified by their millisecond timestamp, so a store hands out
//! timestamps through a [`UniqueClock`] that never repeats a value, even when
//! several events are recorded within the same millisecond.

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// The time fields carried by an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTime {
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: i64,
    /// Local hour of day, 0-23
    pub hour: u8,
    /// Local day of week, 0-6 with Sunday as 0
    pub dow: u8,
}

impl EventTime {
    /// Current wall-clock time (not deduplicated)
    pub fn now() -> Self {
        Self::from_local(Local::now())
    }

    /// Derive hour and day-of-week for a timestamp in the local timezone
    pub fn from_timestamp_ms(timestamp_ms: i64) -> Self {
        match Local.timestamp_millis_opt(timestamp_ms).single() {
            Some(local) => Self::from_local(local),
            None => {
                let utc = DateTime::<Utc>::from_timestamp_millis(timestamp_ms).unwrap_or_default();
                Self {
                    timestamp_ms,
                    hour: utc.hour() as u8,
                    dow: utc.weekday().num_days_from_sunday() as u8,
                }
            }
        }
    }

    fn from_local(local: DateTime<Local>) -> Self {
        Self {
            timestamp_ms: local.timestamp_millis(),
            hour: local.hour() as u8,
            dow: local.weekday().num_days_from_sunday() as u8,
        }
    }
}

/// Hands out strictly increasing millisecond timestamps
#[derive(Debug, Default)]
pub struct UniqueClock {
    last: AtomicI64,
}

impl UniqueClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next timestamp: the wall clock, bumped past the previous value if needed
    pub fn next_timestamp_ms(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let next = if now > last { now } else { last + 1 };
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }

    /// Next [`EventTime`] with a unique timestamp
    pub fn now(&self) -> EventTime {
        EventTime::from_timestamp_ms(self.next_timestamp_ms())
    }
}
