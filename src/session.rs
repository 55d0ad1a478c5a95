//! Session management for the Telegram client
//!
//! Provides:
//! - File-based session locking to prevent parallel execution
//! - Client creation from a per-phone SQLite session file
//! - Interactive authorization (login code + two-step password)

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use grammers_client::{Client, SignInError};
use grammers_mtsender::{SenderPool, SenderPoolHandle};
use grammers_session::storages::SqliteSession;
use tracing::info;

use crate::config::LOCK_FILE;
use crate::credentials::{Credentials, PromptInput};
use crate::error::{Error, Result};

/// Session lock guard that ensures exclusive access to the Telegram session.
///
/// Telegram requires sequential use of one session; a second forwarder
/// process on the same session would conflict with this one.
pub struct SessionLock {
    lock_file: Option<File>,
    lock_path: PathBuf,
}

impl SessionLock {
    /// Acquire an exclusive lock on the session.
    pub fn acquire() -> Result<Self> {
        Self::acquire_with_base_dir(Path::new("."))
    }

    pub fn acquire_with_base_dir(base_dir: &Path) -> Result<Self> {
        let lock_path = base_dir.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(|e| Error::LockError(format!("Failed to open lock file: {}", e)))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                lock_file: Some(lock_file),
                lock_path,
            }),
            Err(_) => Err(Error::SessionLocked),
        }
    }

    /// Release the lock manually
    pub fn release(&mut self) {
        if let Some(ref file) = self.lock_file {
            let _ = file.unlock();
        }
        self.lock_file = None;
        let _ = std::fs::remove_file(&self.lock_path);
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Holder for SenderPool components and Client
pub struct TelegramConnection {
    pub client: Client,
    pub handle: SenderPoolHandle,
    _session: Arc<SqliteSession>,
    _runner_handle: tokio::task::JoinHandle<()>,
}

impl TelegramConnection {
    /// Open (or create) the session file and connect.
    pub async fn connect(session_file: &str, api_id: i32) -> Result<Self> {
        let session = SqliteSession::open(session_file)
            .await
            .map_err(|e| Error::SessionNotFound(format!("Failed to open session: {}", e)))?;
        let session = Arc::new(session);

        let pool = SenderPool::new(session.clone(), api_id);

        // Create client from pool (needs a reference to the whole pool)
        let client = Client::new(pool.handle.clone());

        let SenderPool {
            runner, handle, ..
        } = pool;

        // Spawn the runner in background
        let runner_handle = tokio::spawn(async move {
            runner.run().await;
        });

        Ok(Self {
            client,
            handle: handle.thin,
            _session: session,
            _runner_handle: runner_handle,
        })
    }

    /// Interactive sign-in: no-op when the session is already authorized,
    /// otherwise request a login code for the phone, prompt for it, and
    /// fall back to the two-step password when the account has one.
    pub async fn authorize(
        &self,
        credentials: &Credentials,
        prompts: &mut impl PromptInput,
    ) -> Result<()> {
        if self
            .client
            .is_authorized()
            .await
            .map_err(|e| Error::Telegram(e.to_string()))?
        {
            return Ok(());
        }

        let token = self
            .client
            .request_login_code(&credentials.phone, &credentials.api_hash)
            .await
            .map_err(|e| Error::Authorization(format!("failed to request login code: {}", e)))?;

        let code = prompts.prompt("Enter the code")?;

        match self.client.sign_in(&token, &code).await {
            Ok(user) => {
                info!(user = %user.full_name(), "signed in");
                Ok(())
            }
            Err(SignInError::PasswordRequired(password_token)) => {
                let password = prompts.prompt("Enter your 2-step verification password")?;
                let user = self
                    .client
                    .check_password(password_token, password.trim())
                    .await
                    .map_err(|e| Error::Authorization(format!("password check failed: {}", e)))?;
                info!(user = %user.full_name(), "signed in with password");
                Ok(())
            }
            Err(e) => Err(Error::Authorization(e.to_string())),
        }
    }
}

// Allow using TelegramConnection as &Client
impl std::ops::Deref for TelegramConnection {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn session_lock_creation() {
        let temp = tempdir().expect("tempdir");
        let result = SessionLock::acquire_with_base_dir(temp.path());
        if let Ok(mut lock) = result {
            lock.release();
        }
    }

    #[test]
    fn release_removes_lock_file() {
        let temp = tempdir().expect("tempdir");
        let temp_path = temp.path();

        let mut lock = SessionLock::acquire_with_base_dir(temp_path).expect("lock");
        assert!(temp_path.join(LOCK_FILE).exists());
        lock.release();
        assert!(!temp_path.join(LOCK_FILE).exists());
    }

    #[test]
    fn lock_dropped_releases_automatically() {
        let temp = tempdir().expect("tempdir");
        let temp_path = temp.path();

        {
            let _lock = SessionLock::acquire_with_base_dir(temp_path).expect("lock");
            assert!(temp_path.join(LOCK_FILE).exists());
        }
        assert!(!temp_path.join(LOCK_FILE).exists());
    }

    #[test]
    fn double_release_is_safe() {
        let temp = tempdir().expect("tempdir");

        let mut lock = SessionLock::acquire_with_base_dir(temp.path()).expect("lock");
        lock.release();
        lock.release();
    }
}
