use thiserror::Error;

/// Failure taxonomy for the store collaborator. Callers log these at the
/// call site and continue; nothing is retried.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("auth failure: {0}")]
    Auth(String),
    #[error("read failure: {0}")]
    Read(String),
    #[error("write failure: {0}")]
    Write(String),
    #[error("subscription failure: {0}")]
    Subscription(String),
}

impl StoreError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn read(message: impl Into<String>) -> Self {
        Self::Read(message.into())
    }

    pub fn write(message: impl Into<String>) -> Self {
        Self::Write(message.into())
    }

    pub fn subscription(message: impl Into<String>) -> Self {
        Self::Subscription(message.into())
    }
}
