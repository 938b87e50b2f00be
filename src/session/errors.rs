use crate::backend::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("token store contains invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Login failures. The session is back to `Anonymous` when one of these is returned.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("login failed: {0}")]
    Backend(#[from] BackendError),
    #[error("two-factor challenge is missing its temporary token")]
    MissingTempToken,
    #[error("session token is expired or cannot be decoded")]
    TokenRejected,
    #[error("failed to persist session: {0}")]
    Storage(StoreError),
}

/// Two-factor failures. The session stays `TwoFactorPending` unless noted.
#[derive(Debug, Error)]
pub enum TwoFactorError {
    #[error("no two-factor verification is pending")]
    NotPending,
    #[error("two-factor verification failed: {0}")]
    Backend(#[from] BackendError),
    #[error("session token is expired or cannot be decoded")]
    TokenRejected,
    #[error("failed to persist session: {0}")]
    Storage(StoreError),
    /// The session changed while the verification was in flight; the result
    /// was discarded.
    #[error("session changed during two-factor verification")]
    Superseded,
}
