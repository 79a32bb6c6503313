//! # agora-store
//!
//! Local SQLite backend for Agora.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` with typed helpers for the message and profile
//! tables, and [`LocalBackend`], which serves the same data through the async
//! backend traits of `agora-shared` together with a change feed.

pub mod backend;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod profiles;

mod error;

pub use backend::LocalBackend;
pub use database::Database;
pub use error::{Result, StoreError};
