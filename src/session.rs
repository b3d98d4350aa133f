//! Concurrent handshake sessions.
//!
//! Each session is its own [`Handshake`] behind its own async mutex, so the
//! steps of one session run one at a time while different sessions never
//! wait on each other.
//!
//! 并发的握手会话。每个会话都有独立的 [`Handshake`] 和异步互斥锁。

use crate::config::Config;
use crate::error::Result;
use crate::handshake::Handshake;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

/// Identifies one handshake session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// The session used when a caller does not name one.
    pub const DEFAULT: SessionId = SessionId(Uuid::nil());

    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }

    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(SessionId)
    }
}

pub type SharedHandshake = Arc<Mutex<Handshake>>;

#[derive(Debug)]
pub struct SessionRegistry {
    config: Config,
    sessions: RwLock<HashMap<SessionId, SharedHandshake>>,
}

impl SessionRegistry {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens a session under a fresh id.
    pub async fn create(&self) -> Result<(SessionId, SharedHandshake)> {
        let id = SessionId::new();
        let session = self.get_or_create(id).await?;
        Ok((id, session))
    }

    pub async fn get(&self, id: SessionId) -> Option<SharedHandshake> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn get_or_create(&self, id: SessionId) -> Result<SharedHandshake> {
        if let Some(session) = self.get(id).await {
            return Ok(session);
        }

        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(&id) {
            return Ok(session.clone());
        }
        let handshake = if id.is_default() {
            Handshake::new(self.config.clone())?
        } else {
            Handshake::with_cert_dir(self.config.clone(), self.cert_dir(id))?
        };
        let session = Arc::new(Mutex::new(handshake));
        sessions.insert(id, session.clone());
        info!(session = %id, "session opened");
        Ok(session)
    }

    pub async fn remove(&self, id: SessionId) -> Option<SharedHandshake> {
        let removed = self.sessions.write().await.remove(&id);
        if removed.is_some() {
            info!(session = %id, "session closed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// The default session keeps the standard layout; others get a subdirectory.
    fn cert_dir(&self, id: SessionId) -> PathBuf {
        if id.is_default() {
            self.config.certs_dir()
        } else {
            self.config
                .certs_dir()
                .join("sessions")
                .join(id.to_string())
        }
    }
}
