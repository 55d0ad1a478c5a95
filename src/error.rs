//! Error types for the channel forwarder

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Session file not found: {0}")]
    SessionNotFound(String),

    #[error("Session is locked by another process")]
    SessionLocked,

    #[error("Failed to acquire session lock: {0}")]
    LockError(String),

    #[error("Telegram API error: {0}")]
    Telegram(String),

    #[error("Rate limited: retry after {0}s")]
    FloodWait(u64),

    #[error("Channel {0} not found in dialogs")]
    ChannelNotFound(i64),

    #[error("Credentials file '{0}' is malformed: expected API id, API hash and phone on separate lines")]
    MalformedCredentials(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<grammers_client::InvocationError> for Error {
    fn from(err: grammers_client::InvocationError) -> Self {
        if let grammers_client::InvocationError::Rpc(rpc) = &err {
            // FLOOD_WAIT carries the imposed wait in seconds.
            if rpc.name.starts_with("FLOOD_WAIT") {
                return Error::FloodWait(rpc.value.unwrap_or(0) as u64);
            }
        }
        Error::Telegram(err.to_string())
    }
}
