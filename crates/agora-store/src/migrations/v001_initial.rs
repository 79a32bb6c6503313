//! v001 -- Initial schema creation.
//!
//! Creates `profiles` and `community_messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Profiles (owned by the identity system, read-only for chat)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS profiles (
    id           TEXT PRIMARY KEY NOT NULL,   -- opaque user id
    full_name    TEXT,
    avatar_url   TEXT,
    updated_at   TEXT NOT NULL                -- RFC-3339
);

-- ----------------------------------------------------------------
-- Community messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS community_messages (
    id          TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    room_id     TEXT NOT NULL,
    user_id     TEXT NOT NULL,                -- author, no FK: profiles may lag
    message     TEXT NOT NULL CHECK (length(trim(message)) > 0),
    created_at  TEXT NOT NULL                 -- RFC-3339, fixed microseconds
);

CREATE INDEX IF NOT EXISTS idx_community_messages_room_ts
    ON community_messages(room_id, created_at);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
