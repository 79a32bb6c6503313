//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so the client starts with zero configuration
//! against a local database.

use std::path::PathBuf;
use std::str::FromStr;

use agora_shared::constants::{
    DEFAULT_ROOM, FEED_CAPACITY, MAX_MESSAGE_LEN, SNAPSHOT_LIMIT,
};
use agora_shared::{Profile, RoomId, UserId};
use agora_sync::SyncConfig;

/// How room state is written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One `HH:MM name (initials): text` line per message.
    #[default]
    Text,
    /// One JSON document per published view.
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// SQLite file.
    /// Env: `AGORA_DB_PATH`
    /// Default: `None`, meaning `agora.db` in the platform data directory.
    pub db_path: Option<PathBuf>,

    /// Room to watch and post into.
    /// Env: `AGORA_ROOM`
    /// Default: `community`
    pub room: RoomId,

    /// Signed-in user. Without one the client is read-only.
    /// Env: `AGORA_USER_ID`
    pub user_id: Option<UserId>,

    /// Written to the user's profile row at startup.
    /// Env: `AGORA_DISPLAY_NAME`
    pub display_name: Option<String>,

    /// Env: `AGORA_AVATAR_URL`
    pub avatar_url: Option<String>,

    /// Env: `AGORA_SNAPSHOT_LIMIT`
    /// Default: `100`
    pub snapshot_limit: usize,

    /// Env: `AGORA_MAX_MESSAGE_LEN`
    /// Default: `4000`
    pub max_message_len: usize,

    /// Buffered change notices per subscriber before it lags.
    /// Env: `AGORA_FEED_CAPACITY`
    /// Default: `256`
    pub feed_capacity: usize,

    /// Env: `AGORA_OUTPUT` (`text` or `json`)
    /// Default: `text`
    pub output: OutputFormat,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            room: RoomId::new(DEFAULT_ROOM),
            user_id: None,
            display_name: None,
            avatar_url: None,
            snapshot_limit: SNAPSHOT_LIMIT,
            max_message_len: MAX_MESSAGE_LEN,
            feed_capacity: FEED_CAPACITY,
            output: OutputFormat::Text,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = non_empty(lookup("AGORA_DB_PATH")) {
            config.db_path = Some(PathBuf::from(path));
        }

        if let Some(room) = non_empty(lookup("AGORA_ROOM")) {
            config.room = RoomId::new(room);
        }

        config.user_id = non_empty(lookup("AGORA_USER_ID")).map(UserId::new);
        config.display_name = non_empty(lookup("AGORA_DISPLAY_NAME"));
        config.avatar_url = non_empty(lookup("AGORA_AVATAR_URL"));

        if let Some(n) = parse_count(&lookup, "AGORA_SNAPSHOT_LIMIT") {
            config.snapshot_limit = n;
        }
        if let Some(n) = parse_count(&lookup, "AGORA_MAX_MESSAGE_LEN") {
            config.max_message_len = n;
        }
        if let Some(n) = parse_count(&lookup, "AGORA_FEED_CAPACITY") {
            config.feed_capacity = n;
        }

        if let Some(val) = lookup("AGORA_OUTPUT") {
            match val.parse() {
                Ok(format) => config.output = format,
                Err(e) => tracing::warn!(value = %val, error = %e, "Invalid AGORA_OUTPUT, using default"),
            }
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            snapshot_limit: self.snapshot_limit,
            max_message_len: self.max_message_len,
        }
    }

    /// Profile to seed for the signed-in user, if any field was given.
    pub fn seed_profile(&self) -> Option<Profile> {
        if self.display_name.is_none() && self.avatar_url.is_none() {
            return None;
        }
        Some(Profile {
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A positive integer, or `None` with a warning when the value is unusable.
fn parse_count(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<usize> {
    let raw = lookup(key)?;
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            tracing::warn!(key, value = %raw, "Invalid count, using default");
            None
        }
    }
}
