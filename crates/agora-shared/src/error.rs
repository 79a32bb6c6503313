use thiserror::Error;

/// Failures reported by a remote backend through the injected interfaces.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend could not be reached or failed to answer.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// The access policy refused the operation for this caller.
    #[error("Not authorized")]
    Unauthorized,

    /// The targeted row does not exist.
    #[error("Record not found")]
    NotFound,

    /// The backend refused the write (constraint, validation, ...).
    #[error("Rejected by backend: {0}")]
    Rejected(String),
}

impl BackendError {
    pub fn unavailable(reason: impl std::fmt::Display) -> Self {
        Self::Unavailable(reason.to_string())
    }
}
