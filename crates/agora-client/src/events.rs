//! Rendering of room state and notices to output lines.

use serde::Serialize;

use agora_shared::{RoomId, UserId};
use agora_sync::RoomView;

use crate::commands::messaging::{MessageDto, RoomViewDto};
use crate::config::OutputFormat;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticePayload {
    pub level: NoticeLevel,
    pub notice: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

pub struct Renderer {
    format: OutputFormat,
    room: RoomId,
    viewer: Option<UserId>,
}

impl Renderer {
    pub fn new(format: OutputFormat, room: RoomId, viewer: Option<UserId>) -> Self {
        Self {
            format,
            room,
            viewer,
        }
    }

    /// Output for a published view, or `None` when there is nothing to show.
    ///
    /// JSON output mirrors every state; text output only shows settled ones.
    pub fn view(&self, view: &RoomView) -> Option<String> {
        let dto = RoomViewDto::from_view(&self.room, view, self.viewer.as_ref());
        match self.format {
            OutputFormat::Json => to_json_line(&dto),
            OutputFormat::Text if view.is_loading => None,
            OutputFormat::Text => Some(render_text(&dto)),
        }
    }

    pub fn info(&self, text: impl Into<String>) -> String {
        self.notice(NoticeLevel::Info, text.into())
    }

    pub fn error(&self, text: impl Into<String>) -> String {
        self.notice(NoticeLevel::Error, text.into())
    }

    fn notice(&self, level: NoticeLevel, notice: String) -> String {
        match self.format {
            OutputFormat::Json => to_json_line(&NoticePayload { level, notice: notice.clone() })
                .unwrap_or(notice),
            OutputFormat::Text => match level {
                NoticeLevel::Info => format!("* {notice}"),
                NoticeLevel::Error => format!("! {notice}"),
            },
        }
    }
}

fn to_json_line<T: Serialize>(value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(line) => Some(line),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize output");
            None
        }
    }
}

fn render_text(dto: &RoomViewDto) -> String {
    let mut out = format!("--- #{} ---", dto.room);
    if !dto.loaded {
        out.push_str("\n(no messages loaded)");
    } else if dto.messages.is_empty() {
        out.push_str("\n(no messages yet)");
    }
    for m in &dto.messages {
        out.push('\n');
        out.push_str(&message_line(m));
    }
    if let Some(error) = &dto.error {
        out.push_str(&format!("\n! {error}"));
    }
    out
}

pub fn message_line(m: &MessageDto) -> String {
    format!("{} {} ({}): {}", m.time, m.author_name, m.initials, m.text)
}
