use agora_shared::{Message, MessageId, NewMessage, RoomId, UserId};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    /// Insert a message, assigning its id and creation time.
    pub fn insert_message(&self, draft: &NewMessage) -> Result<Message> {
        let message = Message {
            id: MessageId::new(),
            room: draft.room.clone(),
            author_id: draft.author_id.clone(),
            text: draft.text.clone(),
            created_at: now_micros()?,
        };

        self.conn().execute(
            "INSERT INTO community_messages (id, room_id, user_id, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.id.to_string(),
                message.room.as_str(),
                message.author_id.as_str(),
                message.text,
                format_ts(&message.created_at),
            ],
        )?;
        Ok(message)
    }

    /// The `limit` most recent messages of a room, oldest first.
    pub fn get_recent_messages(&self, room: &RoomId, limit: usize) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, room_id, user_id, message, created_at FROM (
                 SELECT rowid AS seq, id, room_id, user_id, message, created_at
                 FROM community_messages
                 WHERE room_id = ?1
                 ORDER BY created_at DESC, seq DESC
                 LIMIT ?2
             )
             ORDER BY created_at ASC, seq ASC",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![room.as_str(), limit], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn get_message_by_id(&self, id: MessageId) -> Result<Message> {
        self.conn()
            .query_row(
                "SELECT id, room_id, user_id, message, created_at
                 FROM community_messages WHERE id = ?1",
                params![id.to_string()],
                row_to_message,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Delete a message on behalf of `caller`.
    ///
    /// Only the author may delete; anyone else gets [`StoreError::Forbidden`].
    pub fn delete_message_as(&self, caller: &UserId, id: MessageId) -> Result<()> {
        let affected = self.conn().execute(
            "DELETE FROM community_messages WHERE id = ?1 AND user_id = ?2",
            params![id.to_string(), caller.as_str()],
        )?;
        if affected > 0 {
            return Ok(());
        }

        // Nothing deleted: tell a foreign row apart from a missing one.
        match self.get_message_by_id(id) {
            Ok(_) => Err(StoreError::Forbidden),
            Err(e) => Err(e),
        }
    }

    pub fn count_messages(&self, room: &RoomId) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM community_messages WHERE room_id = ?1",
            params![room.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

/// Text form used in the database. Fixed precision keeps text order equal to
/// time order.
pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time truncated to what the database keeps.
pub(crate) fn now_micros() -> Result<DateTime<Utc>> {
    parse_ts(&format_ts(&Utc::now())).map_err(StoreError::from)
}

fn parse_ts(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let room: String = row.get(1)?;
    let author: String = row.get(2)?;
    let text: String = row.get(3)?;
    let ts_str: String = row.get(4)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at = parse_ts(&ts_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Message {
        id: MessageId(id),
        room: RoomId(room),
        author_id: UserId(author),
        text,
        created_at,
    })
}
