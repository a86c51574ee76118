//! Core error types

use thiserror::Error;

/// Failure raised by an event handler. It passes through timing wrappers unchanged.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("cannot wrap {listener} of {owner}: event executor unavailable")]
    ExecutorUnavailable { owner: String, listener: String },
}

impl WatchError {
    pub fn owner(&self) -> &str {
        match self {
            Self::ExecutorUnavailable { owner, .. } => owner,
        }
    }
}
