//! # agora-sync
//!
//! Client-side synchronization core for community rooms.
//!
//! A room's messages live in a [`MessageCache`] that is refreshed by full
//! refetch whenever the backend's change feed reports activity. The
//! [`RoomRegistry`] shares one cache and one feed subscription among all
//! observers of a room, and the [`MutationGateway`] writes through the backend
//! and invalidates the room afterwards.
//!
//! ```text
//! send/delete ─► MessageStore ─► change feed ─► ChangeListener
//!                                                    │
//!      RoomObserver ◄── RoomView ◄── MessageCache ◄──┘ invalidate()
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod join;
pub mod listener;
pub mod registry;

#[cfg(test)]
mod fakes;

pub use cache::{MessageCache, RoomView, Snapshot};
pub use config::SyncConfig;
pub use error::SyncError;
pub use gateway::MutationGateway;
pub use listener::ChangeListener;
pub use registry::{Backend, RoomObserver, RoomRegistry};
