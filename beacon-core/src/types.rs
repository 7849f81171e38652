//! Core domain types for beacon
//!
//! An [`EventRecord`] is one analytics event occurrence. It is persisted as a
//! flat JSON object:
//!
//! | Field | Type | Notes |
//! |-------|------|-------|
//! | `key` | string | required, non-empty |
//! | `count` | integer | defaults to 1 when absent |
//! | `sum` | double | omitted when zero |
//! | `dur` | double | omitted when zero |
//! | `timestamp` | integer | milliseconds since the Unix epoch |
//! | `hour` | integer | 0-23 |
//! | `dow` | integer | 0-6, Sunday is 0 |
//! | `segmentation` | object of strings | omitted when empty |
//! | `segmentation2` | object of int/double/bool | omitted when empty |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Error;
use crate::time::EventTime;

/// A typed segmentation value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SegmentValue {
    Bool(bool),
    Int(i64),
    Double(f64),
}

impl From<bool> for SegmentValue {
    fn from(v: bool) -> Self {
        SegmentValue::Bool(v)
    }
}

impl From<i64> for SegmentValue {
    fn from(v: i64) -> Self {
        SegmentValue::Int(v)
    }
}

impl From<f64> for SegmentValue {
    fn from(v: f64) -> Self {
        SegmentValue::Double(v)
    }
}

/// One recorded analytics event.
///
/// Equality covers every field; two events recorded at different timestamps
/// are never equal, which is what lets [`EventQueue::remove`] target exactly
/// the records a flush picked up.
///
/// [`EventQueue::remove`]: crate::store::EventQueue::remove
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "EventWire", try_from = "EventWire")]
pub struct EventRecord {
    pub key: String,
    /// String-valued segmentation
    pub segmentation: BTreeMap<String, String>,
    /// Int, double and bool segmentation; keys never overlap `segmentation`
    pub typed_segmentation: BTreeMap<String, SegmentValue>,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub hour: u8,
    pub dow: u8,
    pub count: u32,
    pub sum: f64,
    pub duration: f64,
}

impl EventRecord {
    /// Create a record with count 1 and no segmentation
    pub fn new(key: impl Into<String>, time: EventTime) -> Self {
        Self {
            key: key.into(),
            segmentation: BTreeMap::new(),
            typed_segmentation: BTreeMap::new(),
            timestamp: time.timestamp_ms,
            hour: time.hour,
            dow: time.dow,
            count: 1,
            sum: 0.0,
            duration: 0.0,
        }
    }

    /// Add a string segment, replacing any typed segment with the same key
    pub fn with_segment(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.typed_segmentation.remove(&key);
        self.segmentation.insert(key, value.into());
        self
    }

    /// Add a typed segment, replacing any string segment with the same key
    pub fn with_typed_segment(
        mut self,
        key: impl Into<String>,
        value: impl Into<SegmentValue>,
    ) -> Self {
        let key = key.into();
        self.segmentation.remove(&key);
        self.typed_segmentation.insert(key, value.into());
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn with_sum(mut self, sum: f64) -> Self {
        self.sum = sum;
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    /// Fail unless `sum`, `duration` and every typed double are finite.
    ///
    /// JSON has no representation for NaN or infinity; such a record would
    /// be written as `null` and could never be read back.
    pub fn ensure_finite(&self) -> crate::error::Result<()> {
        if !self.sum.is_finite() {
            return Err(Error::InvalidEvent(format!(
                "event {:?} has non-finite sum {}",
                self.key, self.sum
            )));
        }
        if !self.duration.is_finite() {
            return Err(Error::InvalidEvent(format!(
                "event {:?} has non-finite duration {}",
                self.key, self.duration
            )));
        }
        for (k, v) in &self.typed_segmentation {
            if let SegmentValue::Double(d) = v {
                if !d.is_finite() {
                    return Err(Error::InvalidEvent(format!(
                        "event {:?} has non-finite segment {} = {}",
                        self.key, k, d
                    )));
                }
            }
        }
        Ok(())
    }

    /// Serialize to the persisted JSON form
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse one persisted JSON object
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// On-disk shape of an [`EventRecord`]
#[derive(Serialize, Deserialize)]
struct EventWire {
    key: String,
    #[serde(default = "default_count")]
    count: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    sum: f64,
    #[serde(default, skip_serializing_if = "is_zero")]
    dur: f64,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    hour: u8,
    #[serde(default)]
    dow: u8,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    segmentation: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    segmentation2: BTreeMap<String, SegmentValue>,
}

fn default_count() -> u32 {
    1
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

impl From<EventRecord> for EventWire {
    fn from(event: EventRecord) -> Self {
        EventWire {
            key: event.key,
            count: event.count,
            sum: event.sum,
            dur: event.duration,
            timestamp: event.timestamp,
            hour: event.hour,
            dow: event.dow,
            segmentation: event.segmentation,
            segmentation2: event.typed_segmentation,
        }
    }
}

impl TryFrom<EventWire> for EventRecord {
    type Error = Error;

    fn try_from(wire: EventWire) -> Result<Self, Self::Error> {
        if wire.key.is_empty() {
            return Err(Error::InvalidEvent("event key is empty".to_string()));
        }

        let segmentation = wire.segmentation;
        let typed_segmentation = wire
            .segmentation2
            .into_iter()
            .filter(|(k, _)| !segmentation.contains_key(k))
            .collect();

        Ok(EventRecord {
            key: wire.key,
            segmentation,
            typed_segmentation,
            timestamp: wire.timestamp,
            hour: wire.hour,
            dow: wire.dow,
            count: wire.count,
            sum: wire.sum,
            duration: wire.dur,
        })
    }
}
