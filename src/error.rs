//! Error types shared across the crate.
//!
//! Typed variants exist where callers branch on them: permission failures are
//! skipped with a log line, lookup failures surface to the invoking command,
//! capture failures abandon the current artifact. Everything else is wrapped
//! with context and bubbles up as [`Error::Other`].

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Chat platform failures the pipeline reacts to.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("missing {permission} permission in channel {channel}")]
    MissingPermission {
        permission: &'static str,
        channel: String,
    },

    #[error("server {0} not found")]
    ServerNotFound(String),

    #[error("channel {0} not found")]
    ChannelNotFound(String),

    #[error("not connected to the gateway")]
    NotConnected,
}

/// Page rendering failures. Never fatal, the affected artifact keeps its
/// previous state.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("screenshot failed: {0}")]
    Screenshot(String),
}
