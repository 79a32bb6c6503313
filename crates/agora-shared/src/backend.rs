//! Interfaces the sync core consumes from the outside world.
//!
//! A hosted database, a local SQLite file or a test fake can sit behind these
//! traits; the core only ever sees `Arc<dyn ...>` handles.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::error::BackendError;
use crate::models::{ChangeEvent, FeedNotice, FeedTopic, Message, NewMessage, Profile};
use crate::types::{MessageId, RoomId, UserId};

/// Row access to the message table.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// The `limit` most recent messages of `room`, ascending by creation time.
    async fn fetch_recent(&self, room: &RoomId, limit: usize)
        -> Result<Vec<Message>, BackendError>;

    /// Insert a message. The store assigns `id` and `created_at`.
    async fn insert(&self, draft: NewMessage) -> Result<Message, BackendError>;

    /// Delete a message on behalf of `caller`. Only the author may delete.
    async fn delete(&self, caller: &UserId, id: MessageId) -> Result<(), BackendError>;
}

/// Batch lookup of author display metadata.
#[async_trait]
pub trait ProfileResolver: Send + Sync {
    /// Profiles for the given ids. Ids without a profile are simply absent.
    async fn resolve(
        &self,
        ids: &HashSet<UserId>,
    ) -> Result<HashMap<UserId, Profile>, BackendError>;
}

/// Push channel of row changes.
pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self, topic: FeedTopic) -> Result<FeedSubscription, BackendError>;
}

/// Supplies the signed-in user, if any. The value is opaque to the core.
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
}

/// Fixed identity, for clients that resolve the user once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(pub Option<UserId>);

impl StaticIdentity {
    pub fn signed_in(user: UserId) -> Self {
        Self(Some(user))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.0.clone()
    }
}

/// One live subscription on a change feed, filtered to its topic.
pub struct FeedSubscription {
    topic: FeedTopic,
    rx: broadcast::Receiver<FeedNotice>,
}

impl FeedSubscription {
    pub fn new(topic: FeedTopic, rx: broadcast::Receiver<FeedNotice>) -> Self {
        Self { topic, rx }
    }

    pub fn topic(&self) -> &FeedTopic {
        &self.topic
    }

    /// Next notice for this topic, or `None` once the feed is closed.
    ///
    /// Changes on other tables or of unwanted kinds are skipped. If the
    /// receiver fell behind, [`FeedNotice::Missed`] reports how many notices
    /// were dropped.
    pub async fn next(&mut self) -> Option<FeedNotice> {
        loop {
            match self.rx.recv().await {
                Ok(FeedNotice::Change(event)) if !self.accepts(&event) => continue,
                Ok(notice) => return Some(notice),
                Err(RecvError::Lagged(skipped)) => return Some(FeedNotice::Missed(skipped)),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn accepts(&self, event: &ChangeEvent) -> bool {
        event.table == self.topic.table && self.topic.events.matches(event.kind)
    }
}
