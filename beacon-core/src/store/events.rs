//! Durable queue of pending event records
//!
//! The queue lives in a single value under [`EVENTS_KEY`]. Every
//! read-modify-write of that value runs under the queue's own lock, so
//! concurrent appends and removals never lose each other's updates.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::preferences::{Preferences, EVENTS_KEY};
use super::sequence::{self, Decoded};
use crate::error::Result;
use crate::types::EventRecord;

/// Ordered, durable collection of pending [`EventRecord`]s
#[derive(Debug)]
pub struct EventQueue {
    prefs: Preferences,
    lock: Mutex<()>,
}

impl EventQueue {
    pub(crate) fn new(prefs: Preferences) -> Self {
        Self {
            prefs,
            lock: Mutex::new(()),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stored elements in storage order
    pub(crate) fn load(&self) -> Result<Vec<String>> {
        Ok(self
            .prefs
            .get(EVENTS_KEY)?
            .map(|raw| sequence::split(&raw))
            .unwrap_or_default())
    }

    /// Append one event and persist it.
    ///
    /// Events with a non-finite `sum`, `duration` or typed double are
    /// rejected with [`Error::InvalidEvent`](crate::Error::InvalidEvent).
    pub fn add_event(&self, event: &EventRecord) -> Result<()> {
        event.ensure_finite()?;
        if event.key.is_empty() {
            tracing::warn!("Queueing event with an empty key; it will be dropped on read");
        }
        let json = event.to_json()?;

        let _guard = self.lock();
        let mut items = self.load()?;
        items.push(json);
        self.prefs
            .set(EVENTS_KEY, Some(&sequence::join(&items)?))?;

        tracing::debug!(key = %event.key, timestamp = event.timestamp, queued = items.len(), "Queued event");
        Ok(())
    }

    /// Valid records sorted by timestamp; ties keep append order
    pub fn list(&self) -> Result<Vec<EventRecord>> {
        let items = self.load()?;
        Ok(decode_sorted(&items).items)
    }

    /// Raw serialized records in storage order
    pub fn raw(&self) -> Result<Vec<String>> {
        self.load()
    }

    /// Remove every stored record equal to one of `events`.
    ///
    /// The removal is computed against the value stored now, so records
    /// appended after `events` was read are kept. Records that are no longer
    /// queued are ignored and leave storage untouched; otherwise unreadable
    /// entries are pruned in the same rewrite. Returns the number of entries
    /// removed.
    pub fn remove(&self, events: &[EventRecord]) -> Result<usize> {
        if events.is_empty() {
            return Ok(0);
        }

        let _guard = self.lock();
        let items = self.load()?;
        let (remaining, removed) = without(&items, events);

        if removed > 0 {
            self.prefs
                .set(EVENTS_KEY, Some(&sequence::join(&remaining)?))?;
        }

        tracing::debug!(removed, remaining = remaining.len(), "Removed events");
        Ok(removed)
    }

    /// True when no records are stored
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.load()?.is_empty())
    }

    /// Number of stored entries, including unreadable ones
    pub fn len(&self) -> Result<usize> {
        Ok(self.load()?.len())
    }
}

/// Decode and stable-sort stored records by timestamp
pub(crate) fn decode_sorted(items: &[String]) -> Decoded<EventRecord> {
    let mut decoded = sequence::decode_each(items.iter().map(String::as_str), "event", |s| {
        EventRecord::from_json(s)
    });
    decoded.items.sort_by_key(|e| e.timestamp);
    decoded
}

/// Stored elements that do not match any of `events`, in storage order.
///
/// Unreadable elements are pruned as well; the returned count only covers
/// matched records.
pub(crate) fn without(items: &[String], events: &[EventRecord]) -> (Vec<String>, usize) {
    let decoded = sequence::decode_each(items.iter().map(String::as_str), "event", |s| {
        EventRecord::from_json(s).map(|e| (s.to_owned(), e))
    });

    let mut removed = 0;
    let remaining = decoded
        .items
        .into_iter()
        .filter_map(|(raw, event)| {
            if events.contains(&event) {
                removed += 1;
                None
            } else {
                Some(raw)
            }
        })
        .collect();

    (remaining, removed)
}

/// Stored elements left after taking out one entry per record in `staged`.
///
/// Unlike [`without`], duplicates beyond the staged count stay queued.
/// Unreadable elements are pruned.
pub(crate) fn without_each(items: &[String], staged: &[EventRecord]) -> Vec<String> {
    let decoded = sequence::decode_each(items.iter().map(String::as_str), "event", |s| {
        EventRecord::from_json(s).map(|e| (s.to_owned(), e))
    });

    let mut taken = vec![false; staged.len()];
    decoded
        .items
        .into_iter()
        .filter_map(|(raw, event)| {
            let slot = staged
                .iter()
                .zip(taken.iter_mut())
                .find(|(candidate, used)| !**used && **candidate == event);
            match slot {
                Some((_, used)) => {
                    *used = true;
                    None
                }
                None => Some(raw),
            }
        })
        .collect()
}
