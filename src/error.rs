//! Error types for mimic-bot.

use thiserror::Error;

use crate::channels::traits::ChannelError;

/// Result type alias using the bot error type.
pub type Result<T> = std::result::Result<T, BotError>;

/// Top-level failure taxonomy.
///
/// None of these are allowed to crash the process once the bot is running;
/// each owning task catches at its boundary, logs, and falls back to a
/// user-visible message. The only fatal condition is missing startup
/// configuration.
#[derive(Error, Debug)]
pub enum BotError {
    /// Required configuration is missing or malformed (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// AI session creation or priming failed (non-fatal, handle stays absent)
    #[error("Session creation failed: {0}")]
    SessionCreation(String),

    /// The AI backend failed mid-stream (non-fatal, surfaces an error chunk)
    #[error("Stream failure: {0}")]
    Stream(String),

    /// The chat platform rejected a send/edit/delete (logged, best-effort)
    #[error("Delivery failed: {0}")]
    Delivery(#[from] ChannelError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
