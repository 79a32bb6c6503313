//! # agora-shared
//!
//! Types, models and backend interfaces shared by the Agora crates.

pub mod backend;
pub mod constants;
pub mod error;
pub mod models;
pub mod types;

pub use backend::{
    ChangeFeed, FeedSubscription, IdentityProvider, MessageStore, ProfileResolver, StaticIdentity,
};
pub use error::BackendError;
pub use models::*;
pub use types::{MessageId, RoomId, UserId};
