/// Application name
pub const APP_NAME: &str = "Agora";

/// Room every client joins unless configured otherwise
pub const DEFAULT_ROOM: &str = "community";

/// Table holding community messages
pub const MESSAGES_TABLE: &str = "community_messages";

/// Table holding author profiles
pub const PROFILES_TABLE: &str = "profiles";

/// Number of most recent messages kept in a room snapshot
pub const SNAPSHOT_LIMIT: usize = 100;

/// Maximum message length in characters
pub const MAX_MESSAGE_LEN: usize = 4_000;

/// Buffered change notifications per feed before receivers lag
pub const FEED_CAPACITY: usize = 256;

/// Display name shown for authors without a resolvable profile
pub const UNKNOWN_AUTHOR_NAME: &str = "Anonymous";

/// Initials shown for authors without a display name
pub const UNKNOWN_AUTHOR_INITIALS: &str = "U";
