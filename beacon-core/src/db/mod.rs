//! Database layer for beacon
//!
//! This module provides the durable key/value storage used by the store:
//! - Schema migrations
//! - SQLite-backed namespaced preferences
//! - The [`PreferenceBackend`] trait the store is written against

pub mod backend;
pub mod repo;
pub mod schema;

pub use backend::{PreferenceBackend, PreferenceWrite};
pub use repo::Database;
