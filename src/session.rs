//! Current auth session, observable by any number of readers.
//!
//! [`SessionStore`] is the only writer and is owned by the auth client.
//! Readers hold a [`SessionHandle`] and either poll [`SessionHandle::current`]
//! or register a callback with [`SessionHandle::subscribe`].

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map(|at| at <= now.timestamp())
            .unwrap_or(false)
    }
}

pub struct SessionStore {
    tx: watch::Sender<Option<Session>>,
}

impl SessionStore {
    pub fn new(initial: Option<Session>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn publish(&self, session: Option<Session>) {
        debug!(signed_in = session.is_some(), "Publishing session change");
        self.tx.send_replace(session);
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read-only view of the session store.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    rx: watch::Receiver<Option<Session>>,
}

impl SessionHandle {
    pub fn current(&self) -> Option<Session> {
        self.rx.borrow().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Calls `callback` on every session change published after this call.
    /// Changes published in quick succession may be coalesced into the latest one.
    /// Must be called from within a tokio runtime.
    pub fn subscribe<F>(&self, mut callback: F) -> Subscription
    where
        F: FnMut(Option<&Session>) + Send + 'static,
    {
        let mut rx = self.rx.clone();
        drop(rx.borrow_and_update());

        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let session = rx.borrow_and_update().clone();
                callback(session.as_ref());
            }
        });

        Subscription { task }
    }
}

/// Stops notifications when dropped.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn load_session(path: &Path) -> Option<Session> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read stored session");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(session) => Some(session),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring malformed stored session");
            None
        }
    }
}

/// Writes the session readable by the owner only, since it holds bearer tokens.
pub fn save_session(path: &Path, session: &Session) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        create_private_dir(parent)?;
    }
    let json = serde_json::to_string_pretty(session)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    let mut file = open_private_file(path)?;
    file.write_all(json.as_bytes())
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn open_private_file(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // The mode above only applies when the file is created.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private_file(path: &Path) -> io::Result<File> {
    File::create(path)
}

pub fn clear_session(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
