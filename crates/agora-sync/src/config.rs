use agora_shared::constants::{MAX_MESSAGE_LEN, SNAPSHOT_LIMIT};

/// Tunables of the sync core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Most recent messages kept per room snapshot.
    pub snapshot_limit: usize,

    /// Longest accepted message, in characters.
    pub max_message_len: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            snapshot_limit: SNAPSHOT_LIMIT,
            max_message_len: MAX_MESSAGE_LEN,
        }
    }
}
