use agora_shared::BackendError;
use thiserror::Error;

/// Failures surfaced to the UI layer. None of them is fatal: the cache and
/// listener stay usable after any single failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Read or subscribe failed. The previous snapshot stays visible.
    #[error("Message store unavailable: {0}")]
    StoreUnavailable(#[source] BackendError),

    /// The insert was rejected. Nothing changed locally.
    #[error("Failed to send message: {0}")]
    SendFailed(#[source] BackendError),

    /// The delete was rejected (unauthorized, missing row, ...).
    #[error("Failed to delete message: {0}")]
    DeleteFailed(#[source] BackendError),

    /// Blank text is refused before reaching the store.
    #[error("Message is empty")]
    EmptyMessage,

    #[error("Message too long: {len} characters (max {max})")]
    MessageTooLong { len: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, SyncError>;
