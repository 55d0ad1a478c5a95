//! Configuration for the forwarder
//!
//! Loads configuration from a config.yml file; a `.env` file is loaded
//! first so YAML can stay free of machine-local paths.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Default constants (fallback if config.yml not found)
pub const SESSION_PREFIX: &str = "session";
pub const LOCK_FILE: &str = "forwarder_session.lock";
pub const CREDENTIALS_FILE: &str = "credentials.txt";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    forwarder: Option<ForwarderSection>,
    telegram: Option<TelegramSection>,
}

#[derive(Debug, Default, Deserialize)]
struct ForwarderSection {
    sources: Option<Vec<i64>>,
    destination: Option<i64>,
    keywords: Option<Vec<String>>,
    poll_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramSection {
    session_prefix: Option<String>,
    credentials_file: Option<String>,
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    /// Source channels to poll, in polling order.
    pub sources: Vec<i64>,
    /// Destination channel for forwarded messages.
    pub destination: i64,
    /// Lowercase substrings a message must contain; empty forwards everything.
    pub keywords: Vec<String>,
    /// Delay between polling sweeps.
    pub poll_interval: Duration,
    pub session_prefix: String,
    pub credentials_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load configuration from config.yml or use defaults
    pub fn new() -> Self {
        Self::load_from_file("config.yml").unwrap_or_else(|_| Self::defaults())
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        Self::load_dotenv();

        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let yaml: YamlConfig = serde_yaml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        let forwarder = yaml.forwarder.unwrap_or_default();
        let telegram = yaml.telegram.unwrap_or_default();

        Ok(Self {
            sources: forwarder.sources.unwrap_or_default(),
            destination: forwarder.destination.unwrap_or(0),
            keywords: forwarder.keywords.unwrap_or_default(),
            poll_interval: Duration::from_secs(
                forwarder
                    .poll_interval_secs
                    .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            session_prefix: telegram
                .session_prefix
                .unwrap_or_else(|| SESSION_PREFIX.to_string()),
            credentials_file: telegram
                .credentials_file
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(CREDENTIALS_FILE)),
        })
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Create config with empty defaults (fallback).
    /// A real run needs config.yml with sources and a destination.
    pub fn defaults() -> Self {
        Self {
            sources: Vec::new(),
            destination: 0,
            keywords: Vec::new(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            session_prefix: SESSION_PREFIX.to_string(),
            credentials_file: PathBuf::from(CREDENTIALS_FILE),
        }
    }

    /// One session file per phone number, e.g. `session_+100.session`.
    pub fn session_file(&self, phone: &str) -> String {
        format!("{}_{}.session", self.session_prefix, phone)
    }

    /// Check the parts the forwarder cannot run without.
    pub fn validate(&self) -> Result<(), String> {
        if self.sources.is_empty() {
            return Err("no source channels configured".to_string());
        }
        if self.destination == 0 {
            return Err("no destination channel configured".to_string());
        }
        Ok(())
    }
}
