use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tracing::info;

use agora_shared::{EnrichedMessage, MessageId, RoomId, UserId};
use agora_sync::RoomView;

use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub initials: String,
    pub avatar_url: Option<String>,
    pub text: String,
    pub created_at: String,
    /// Local wall-clock `HH:MM`.
    pub time: String,
    pub is_own: bool,
}

impl MessageDto {
    pub fn from_enriched(m: &EnrichedMessage, viewer: Option<&UserId>) -> Self {
        Self {
            id: m.message.id.to_string(),
            author_id: m.message.author_id.to_string(),
            author_name: m.author.display_name().to_string(),
            initials: m.author.initials(),
            avatar_url: m.author.avatar_url().map(str::to_string),
            text: m.message.text.clone(),
            created_at: m.message.created_at.to_rfc3339(),
            time: clock_time(m.message.created_at),
            is_own: viewer.is_some_and(|user| m.is_authored_by(user)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomViewDto {
    pub room: String,
    pub is_loading: bool,
    /// `false` until the first successful load.
    pub loaded: bool,
    pub messages: Vec<MessageDto>,
    pub error: Option<String>,
}

impl RoomViewDto {
    pub fn from_view(room: &RoomId, view: &RoomView, viewer: Option<&UserId>) -> Self {
        let messages = view
            .messages
            .as_ref()
            .map(|snapshot| {
                snapshot
                    .iter()
                    .map(|m| MessageDto::from_enriched(m, viewer))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            room: room.to_string(),
            is_loading: view.is_loading,
            loaded: view.messages.is_some(),
            messages,
            error: view.error.as_ref().map(|e| e.to_string()),
        }
    }
}

pub fn clock_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M").to_string()
}

/// Post `content` as the signed-in user. Returns the new message id.
pub async fn send_message(state: &AppState, content: &str) -> Result<String, String> {
    let message = state
        .gateway
        .send_as_current(content)
        .await
        .map_err(|e| e.to_string())?;

    info!(id = %message.id, "Message sent");
    Ok(message.id.to_string())
}

/// Delete one of the signed-in user's messages by id.
pub async fn delete_message(state: &AppState, id: &str) -> Result<(), String> {
    let id: MessageId = id
        .parse()
        .map_err(|e| format!("Invalid message id: {e}"))?;

    state.gateway.delete(id).await.map_err(|e| e.to_string())?;

    info!(id = %id, "Message deleted");
    Ok(())
}
