//! Domain models exchanged between the backend, the sync core and the UI.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to a rendering layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{UNKNOWN_AUTHOR_INITIALS, UNKNOWN_AUTHOR_NAME};
use crate::types::{MessageId, RoomId, UserId};

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single community message. Never edited; only hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Identifier assigned by the store on insert.
    pub id: MessageId,
    /// The room this message belongs to.
    pub room: RoomId,
    /// Author of the message.
    pub author_id: UserId,
    /// Plain message text.
    pub text: String,
    /// Creation time assigned by the store.
    pub created_at: DateTime<Utc>,
}

/// What a client submits; the store fills in id and creation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewMessage {
    pub room: RoomId,
    pub author_id: UserId,
    pub text: String,
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Display metadata owned by the identity system.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// The author attached to a message after the profile join.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Author {
    Known(Profile),
    /// No profile row resolved for this author.
    Unknown,
}

impl Author {
    pub fn profile(&self) -> Option<&Profile> {
        match self {
            Author::Known(profile) => Some(profile),
            Author::Unknown => None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.profile()
            .and_then(|p| p.display_name.as_deref())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(UNKNOWN_AUTHOR_NAME)
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.profile().and_then(|p| p.avatar_url.as_deref())
    }

    /// Up to two uppercase initials of the display name.
    pub fn initials(&self) -> String {
        let name = match self.profile().and_then(|p| p.display_name.as_deref()) {
            Some(name) if !name.trim().is_empty() => name,
            _ => return UNKNOWN_AUTHOR_INITIALS.to_string(),
        };

        name.split_whitespace()
            .filter_map(|word| word.chars().next())
            .flat_map(char::to_uppercase)
            .take(2)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// EnrichedMessage
// ---------------------------------------------------------------------------

/// A message joined with its author's profile at read time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnrichedMessage {
    pub message: Message,
    pub author: Author,
}

impl EnrichedMessage {
    pub fn is_authored_by(&self, user: &UserId) -> bool {
        &self.message.author_id == user
    }
}

// ---------------------------------------------------------------------------
// Change feed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Which change kinds a subscription wants. `All` is the `*` wildcard.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventFilter {
    All,
    Only(ChangeKind),
}

impl EventFilter {
    pub fn matches(&self, kind: ChangeKind) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Only(k) => *k == kind,
        }
    }
}

/// Subscription key on the change feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FeedTopic {
    pub table: String,
    pub events: EventFilter,
}

impl FeedTopic {
    /// Every change on `table`.
    pub fn all(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            events: EventFilter::All,
        }
    }
}

/// A row change. The record is opaque; consumers must not rely on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    pub record: Option<serde_json::Value>,
}

/// What a change feed subscription delivers.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedNotice {
    Change(ChangeEvent),
    /// The transport lost its connection; events may be missed.
    Disconnected,
    /// The transport is connected again.
    Reconnected,
    /// The subscriber fell behind and this many notices were dropped.
    Missed(u64),
}
