//! Error taxonomy for the bot core.
//!
//! `Denied` and `NotFound` are policy outcomes rather than failures; they
//! exist so handlers can answer them with fixed user-facing text instead of
//! an apology.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    /// Persistence unavailable or constraint conflict.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Filesystem problem while opening the database.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Outbound send/edit/answer failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Chat completion failed (timeout, rate limit, malformed response).
    #[error("ai error: {0}")]
    Ai(String),

    /// Caller's role does not permit the requested action.
    #[error("not authorized")]
    Denied,

    /// Target user id does not exist.
    #[error("user not found")]
    NotFound,
}

pub type Result<T> = std::result::Result<T, BotError>;
