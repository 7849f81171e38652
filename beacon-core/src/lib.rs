//! # beacon-core
//!
//! Durable on-device queueing for an analytics client.
//!
//! This library provides:
//! - The [`EventRecord`] value type and its JSON form
//! - An event queue and a pending-request queue that survive process restarts
//! - Namespaced scalar preferences for cached configuration and push state
//! - SQLite-backed storage, configuration and logging infrastructure
//!
//! ## Architecture
//!
//! Instrumentation code records events into the [`Store`]'s event queue. When
//! a flush is due, the events are staged into a request string that waits in
//! the request queue until the transport has delivered it and removes it.
//! Every queue update is a locked read-modify-write that ends in one atomic
//! commit, so a crash or failed write never leaves a half-applied change.
//!
//! ## Example
//!
//! ```rust,no_run
//! use beacon_core::{Config, EventRecord, Store};
//!
//! let config = Config::load().expect("failed to load config");
//! let (_db, store) = Store::open_database(&config).expect("failed to open store");
//!
//! let event = EventRecord::new("purchase", store.now())
//!     .with_segment("currency", "EUR")
//!     .with_sum(9.99);
//! store.events().add_event(&event).expect("failed to queue event");
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::{Database, PreferenceBackend, PreferenceWrite};
pub use error::{Error, Result};
pub use store::{ConnectionQueue, EventQueue, Preferences, PushAction, Store};
pub use time::{EventTime, UniqueClock};
pub use types::*;

// Public modules
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod store;
pub mod time;
pub mod types;
