//! Telegram channel forwarder library
//!
//! Polls a set of source channels and republishes matching messages to a
//! single destination channel:
//! - per-channel last-seen message-id tracking (in-memory, monotonic)
//! - case-insensitive keyword filtering over text and media captions
//! - outbound reconstruction with a "New Post From [...]" header
//! - flood-wait aware delivery with retry

pub mod client;
pub mod composer;
pub mod config;
pub mod credentials;
pub mod error;
pub mod forwarder;
pub mod metrics;
pub mod session;
pub mod telegram;

// Re-export common types
pub use client::{ChannelClient, ChannelMessage, MediaPart};
pub use composer::{compose, Outbound};
pub use config::Config;
pub use credentials::{Credentials, PromptInput, StdinPrompt};
pub use error::{Error, Result};
pub use forwarder::Forwarder;
pub use session::{SessionLock, TelegramConnection};
pub use telegram::TelegramChannelClient;
