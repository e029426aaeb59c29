//! # sift-store
//!
//! Durable state for runs and their steps over `SQLite`.
//!
//! Pure persistence, no business logic: the orchestrator owns all mutations
//! after creation, and per-run rows have a single writer (the run's
//! orchestration task), so there is no cross-task write contention at row
//! granularity. Listeners only read.
//!
//! Layout mirrors the rest of the workspace's store conventions:
//!
//! - [`connection`] — r2d2 pool over rusqlite, file or named in-memory
//! - [`migrations`] — `user_version`-gated schema migrations
//! - [`repositories`] — stateless repos, every method takes `&Connection`
//! - [`store`] — high-level transactional [`RunStore`] facade

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod migrations;
pub mod repositories;
pub mod store;

pub use connection::{new_file_pool, new_in_memory_pool, ConnectionPool};
pub use errors::{Result, StoreError};
pub use store::{NewRun, RunStore};
