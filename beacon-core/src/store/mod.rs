//! Store facade
//!
//! A [`Store`] is the one handle the rest of an SDK uses to reach durable
//! state for a namespace. It owns:
//! - the [`EventQueue`] and [`ConnectionQueue`], each guarded by its own lock
//! - the primary and push [`Preferences`]
//! - cached copies of the advertising id and remote-config payload
//!
//! When an operation needs both queue locks it takes the event lock first.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use beacon_core::{Config, Database, EventRecord, Store};
//!
//! let config = Config::default();
//! let db = Arc::new(Database::open(&config.storage.resolved_database_path())?);
//! db.migrate()?;
//! let store = Store::open(db, &config.storage, &config.queue)?;
//!
//! store.events().add_event(&EventRecord::new("app_open", store.now()))?;
//! if store.should_flush_events()? {
//!     store.stage_events(None, |events| format!("events={}", events))?;
//! }
//! # Ok::<(), beacon_core::Error>(())
//! ```

mod connections;
mod events;
pub mod preferences;
pub mod sequence;

pub use connections::ConnectionQueue;
pub use events::EventQueue;
pub use preferences::Preferences;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::{Config, QueueConfig, StoreConfig};
use crate::db::{Database, PreferenceBackend, PreferenceWrite};
use crate::error::{Error, Result};
use crate::time::{EventTime, UniqueClock};
use preferences::*;

/// A push action cached until the app handles it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushAction {
    pub id: Option<String>,
    pub index: Option<String>,
}

/// Write-through copies of frequently read scalars; `None` means not loaded yet
#[derive(Debug, Default)]
struct ScalarCache {
    advertising_id: Option<Option<String>>,
    remote_config: Option<Option<String>>,
}

/// Durable state for one namespace
pub struct Store {
    events: EventQueue,
    connections: ConnectionQueue,
    preferences: Preferences,
    push: Preferences,
    cache: Mutex<ScalarCache>,
    clock: UniqueClock,
    event_queue_threshold: usize,
}

impl Store {
    /// Create a store over `backend`.
    ///
    /// Fails immediately if the configuration is invalid or the backend
    /// cannot serve requests yet.
    pub fn open(
        backend: Arc<dyn PreferenceBackend>,
        storage: &StoreConfig,
        queue: &QueueConfig,
    ) -> Result<Self> {
        storage.validate()?;
        queue.validate()?;
        backend.ensure_ready()?;

        let preferences = Preferences::new(backend.clone(), storage.namespace.clone());
        let push = Preferences::new(backend, storage.push_namespace.clone());

        tracing::debug!(
            namespace = %storage.namespace,
            push_namespace = %storage.push_namespace,
            "Opened store"
        );

        Ok(Self {
            events: EventQueue::new(preferences.clone()),
            connections: ConnectionQueue::new(preferences.clone(), queue.request_capacity()),
            preferences,
            push,
            cache: Mutex::new(ScalarCache::default()),
            clock: UniqueClock::new(),
            event_queue_threshold: queue.event_queue_threshold,
        })
    }

    /// Open (and migrate) the SQLite database named by `config`, then the store
    pub fn open_database(config: &Config) -> Result<(Arc<Database>, Self)> {
        let path = config.storage.resolved_database_path();
        let db = Arc::new(Database::open(&path)?);
        db.migrate()?;
        let store = Self::open(db.clone(), &config.storage, &config.queue)?;
        Ok((db, store))
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn connections(&self) -> &ConnectionQueue {
        &self.connections
    }

    /// Scalars in the primary namespace
    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Scalars in the push namespace
    pub fn push_preferences(&self) -> &Preferences {
        &self.push
    }

    /// Next unique event time
    pub fn now(&self) -> EventTime {
        self.clock.now()
    }

    fn cache(&self) -> MutexGuard<'_, ScalarCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove both queues entirely
    pub fn clear(&self) -> Result<()> {
        let _events = self.events.lock();
        let _connections = self.connections.lock();
        self.preferences.commit(&[
            PreferenceWrite::remove(EVENTS_KEY),
            PreferenceWrite::remove(CONNECTIONS_KEY),
        ])?;
        tracing::info!(namespace = %self.preferences.namespace(), "Cleared event and request queues");
        Ok(())
    }

    /// True once the event queue holds at least the configured threshold
    pub fn should_flush_events(&self) -> Result<bool> {
        Ok(self.events.len()? >= self.event_queue_threshold)
    }

    /// Move queued events into one pending request.
    ///
    /// Takes up to `limit` events in timestamp order, renders them as a JSON
    /// array and passes it to `build_request`. The returned request is
    /// appended to the request queue and the staged events are removed from
    /// the event queue in a single commit. Returns the number of events
    /// staged; nothing is written when there is nothing to stage.
    pub fn stage_events<F>(&self, limit: Option<usize>, build_request: F) -> Result<usize>
    where
        F: FnOnce(&str) -> String,
    {
        let _events = self.events.lock();
        let _connections = self.connections.lock();

        let stored = self.events.load()?;
        let mut staged = events::decode_sorted(&stored).items;
        if let Some(limit) = limit {
            staged.truncate(limit);
        }
        if staged.is_empty() {
            return Ok(0);
        }

        let request = build_request(&serde_json::to_string(&staged)?);
        if request.is_empty() {
            tracing::warn!(events = staged.len(), "Request builder returned nothing, events stay queued");
            return Ok(0);
        }

        let remaining = events::without_each(&stored, &staged);
        let mut pending = self.connections.load()?;
        self.connections.push_bounded(&mut pending, &request);

        self.preferences.commit(&[
            PreferenceWrite::put(EVENTS_KEY, sequence::join(&remaining)?),
            PreferenceWrite::put(CONNECTIONS_KEY, sequence::join(&pending)?),
        ])?;

        tracing::info!(
            staged = staged.len(),
            events_left = remaining.len(),
            pending_requests = pending.len(),
            "Staged events into request"
        );
        Ok(staged.len())
    }

    // ============================================
    // Generic preferences
    // ============================================

    /// Read a scalar from the primary namespace
    pub fn preference(&self, key: &str) -> Result<Option<String>> {
        self.preferences.get(key)
    }

    /// Write a scalar in the primary namespace; `None` removes it.
    ///
    /// The queue keys are owned by the queues and cannot be written here.
    pub fn set_preference(&self, key: &str, value: Option<&str>) -> Result<()> {
        if key == EVENTS_KEY || key == CONNECTIONS_KEY {
            return Err(Error::Storage(format!(
                "{} is reserved for the queue it backs",
                key
            )));
        }

        let mut cache = self.cache();
        self.preferences.set(key, value)?;
        match key {
            ADVERTISING_ID_KEY => cache.advertising_id = None,
            REMOTE_CONFIG_KEY => cache.remote_config = None,
            _ => {}
        }
        Ok(())
    }

    // ============================================
    // Cached analytics scalars (primary namespace)
    // ============================================

    // Each accessor holds the cache guard across its backend call.

    pub fn cached_advertising_id(&self) -> Result<Option<String>> {
        let mut cache = self.cache();
        if let Some(cached) = &cache.advertising_id {
            return Ok(cached.clone());
        }
        let value = self.preferences.get(ADVERTISING_ID_KEY)?;
        cache.advertising_id = Some(value.clone());
        Ok(value)
    }

    pub fn set_cached_advertising_id(&self, id: Option<&str>) -> Result<()> {
        let mut cache = self.cache();
        self.preferences.set(ADVERTISING_ID_KEY, id)?;
        cache.advertising_id = Some(id.map(str::to_owned));
        Ok(())
    }

    pub fn remote_config_values(&self) -> Result<Option<String>> {
        let mut cache = self.cache();
        if let Some(cached) = &cache.remote_config {
            return Ok(cached.clone());
        }
        let value = self.preferences.get(REMOTE_CONFIG_KEY)?;
        cache.remote_config = Some(value.clone());
        Ok(value)
    }

    pub fn set_remote_config_values(&self, values: Option<&str>) -> Result<()> {
        let mut cache = self.cache();
        self.preferences.set(REMOTE_CONFIG_KEY, values)?;
        cache.remote_config = Some(values.map(str::to_owned));
        Ok(())
    }

    // ============================================
    // Push state (push namespace)
    // ============================================

    /// Messaging provider id, 0 when never stored
    pub fn messaging_provider(&self) -> Result<i64> {
        Ok(self.push.get_i64(PUSH_PROVIDER_KEY)?.unwrap_or(0))
    }

    pub fn set_messaging_provider(&self, provider: i64) -> Result<()> {
        self.push.set_i64(PUSH_PROVIDER_KEY, Some(provider))
    }

    /// Last messaging mode, -1 when never stored
    pub fn last_messaging_mode(&self) -> Result<i64> {
        Ok(self.push.get_i64(PUSH_MODE_KEY)?.unwrap_or(-1))
    }

    pub fn cache_last_messaging_mode(&self, mode: i64) -> Result<()> {
        self.push.set_i64(PUSH_MODE_KEY, Some(mode))
    }

    /// Push consent, false when never stored
    pub fn consent_push(&self) -> Result<bool> {
        Ok(self.push.get_bool(PUSH_CONSENT_KEY)?.unwrap_or(false))
    }

    pub fn set_consent_push(&self, consent: bool) -> Result<()> {
        self.push.set_bool(PUSH_CONSENT_KEY, Some(consent))
    }

    pub fn cached_push_action(&self) -> Result<PushAction> {
        Ok(PushAction {
            id: self.push.get(PUSH_ACTION_ID_KEY)?,
            index: self.push.get(PUSH_ACTION_INDEX_KEY)?,
        })
    }

    pub fn cache_push_action(&self, id: &str, index: &str) -> Result<()> {
        self.push.commit(&[
            PreferenceWrite::put(PUSH_ACTION_ID_KEY, id),
            PreferenceWrite::put(PUSH_ACTION_INDEX_KEY, index),
        ])
    }

    pub fn clear_cached_push_action(&self) -> Result<()> {
        self.push.commit(&[
            PreferenceWrite::remove(PUSH_ACTION_ID_KEY),
            PreferenceWrite::remove(PUSH_ACTION_INDEX_KEY),
        ])
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("namespace", &self.preferences.namespace())
            .field("push_namespace", &self.push.namespace())
            .field("event_queue_threshold", &self.event_queue_threshold)
            .finish()
    }
}
