//! Login session persistence.
//!
//! The bearer token returned by `/user/login` is cached in memory and
//! written to a small JSON file so later invocations stay logged in.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Errors from session persistence.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub token: String,
}

/// Current session, optionally backed by a file.
pub struct SessionStore {
    path: Option<PathBuf>,
    session: RwLock<Option<Session>>,
}

impl SessionStore {
    /// Opens the store at `path`, loading an existing session if present.
    pub fn open(path: PathBuf) -> Result<Self, SessionError> {
        let session = load_session(&path)?;
        Ok(Self {
            path: Some(path),
            session: RwLock::new(session),
        })
    }

    /// A store that never touches the disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            session: RwLock::new(None),
        }
    }

    /// Bearer token of the current session, if logged in.
    pub fn token(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.token.clone())
    }

    pub fn username(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.username.clone())
    }

    pub fn current(&self) -> Option<Session> {
        self.read().clone()
    }

    /// Replaces the current session and persists it.
    pub fn save(&self, session: Session) -> Result<(), SessionError> {
        *self.write() = Some(session);
        self.persist()
    }

    /// Forgets the current session and removes it from disk.
    pub fn clear(&self) -> Result<(), SessionError> {
        *self.write() = None;
        if let Some(path) = &self.path
            && path.exists()
        {
            std::fs::remove_file(path)?;
            debug!(path = %path.display(), "session removed");
        }
        Ok(())
    }

    fn persist(&self) -> Result<(), SessionError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&*self.read())?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        debug!(path = %path.display(), "session persisted");
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Session>> {
        self.session.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Session>> {
        self.session.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Loads a session from a JSON file; a missing file means logged out.
fn load_session(path: &Path) -> Result<Option<Session>, SessionError> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    let session: Option<Session> = serde_json::from_str(&data)?;
    debug!(path = %path.display(), logged_in = session.is_some(), "session loaded");
    Ok(session)
}
