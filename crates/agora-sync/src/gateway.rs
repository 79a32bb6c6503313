//! Send and delete.
//!
//! Mutations are fire-and-confirm: nothing is applied to the cache in memory.
//! A successful write only invalidates the room; the UI sees the change once
//! the refetch lands.

use std::sync::Arc;

use agora_shared::backend::{IdentityProvider, MessageStore};
use agora_shared::{BackendError, Message, MessageId, NewMessage, RoomId, UserId};
use tracing::{info, warn};

use crate::error::{Result, SyncError};
use crate::registry::RoomRegistry;

pub struct MutationGateway {
    room: RoomId,
    store: Arc<dyn MessageStore>,
    identity: Arc<dyn IdentityProvider>,
    registry: Arc<RoomRegistry>,
}

impl MutationGateway {
    pub fn new(
        room: RoomId,
        store: Arc<dyn MessageStore>,
        identity: Arc<dyn IdentityProvider>,
        registry: Arc<RoomRegistry>,
    ) -> Self {
        Self {
            room,
            store,
            identity,
            registry,
        }
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// The signed-in user, as reported by the identity collaborator.
    pub fn current_user(&self) -> Option<UserId> {
        self.identity.current_user()
    }

    /// Post `text` as `author`.
    ///
    /// Blank text is rejected without touching the store. The stored text is
    /// trimmed.
    pub async fn send(&self, author: &UserId, text: &str) -> Result<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SyncError::EmptyMessage);
        }

        let max = self.registry.config().max_message_len;
        let len = text.chars().count();
        if len > max {
            return Err(SyncError::MessageTooLong { len, max });
        }

        let draft = NewMessage {
            room: self.room.clone(),
            author_id: author.clone(),
            text: text.to_string(),
        };

        let message = self.store.insert(draft).await.map_err(|e| {
            warn!(room = %self.room, author = %author, error = %e, "send failed");
            SyncError::SendFailed(e)
        })?;

        info!(room = %self.room, id = %message.id, author = %author, "message sent");
        self.registry.invalidate(&self.room);
        Ok(message)
    }

    /// Post `text` as the signed-in user.
    pub async fn send_as_current(&self, text: &str) -> Result<Message> {
        let author = self
            .current_user()
            .ok_or(SyncError::SendFailed(BackendError::Unauthorized))?;
        self.send(&author, text).await
    }

    /// Delete a message as the signed-in user. The store only lets authors
    /// delete their own messages.
    pub async fn delete(&self, id: MessageId) -> Result<()> {
        let caller = self
            .current_user()
            .ok_or(SyncError::DeleteFailed(BackendError::Unauthorized))?;

        self.store.delete(&caller, id).await.map_err(|e| {
            warn!(room = %self.room, id = %id, error = %e, "delete failed");
            SyncError::DeleteFailed(e)
        })?;

        info!(room = %self.room, id = %id, "message deleted");
        self.registry.invalidate(&self.room);
        Ok(())
    }
}
