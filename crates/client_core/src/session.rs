//! Credential state for one signed-in user, passed explicitly to every remote call site.

use std::{io::ErrorKind, path::Path, sync::Arc};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use shared::protocol::User;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
}

/// Shared handle over the current credentials. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    inner: Arc<RwLock<Credentials>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_credentials(credentials: Credentials) -> Self {
        Self {
            inner: Arc::new(RwLock::new(credentials)),
        }
    }

    pub async fn set_tokens(&self, access: impl Into<String>, refresh: impl Into<String>) {
        let mut guard = self.inner.write().await;
        guard.access_token = Some(access.into());
        guard.refresh_token = Some(refresh.into());
    }

    pub async fn set_access_token(&self, access: impl Into<String>) {
        self.inner.write().await.access_token = Some(access.into());
    }

    pub async fn set_user(&self, user: User) {
        self.inner.write().await.user = Some(user);
    }

    pub async fn access_token(&self) -> Option<String> {
        self.inner.read().await.access_token.clone()
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.inner.read().await.refresh_token.clone()
    }

    pub async fn user(&self) -> Option<User> {
        self.inner.read().await.user.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.read().await.access_token.is_some()
    }

    pub async fn snapshot(&self) -> Credentials {
        self.inner.read().await.clone()
    }

    /// Drops tokens and user. Used for logout and terminal auth failure.
    pub async fn clear(&self) {
        *self.inner.write().await = Credentials::default();
    }

    pub async fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let raw = serde_json::to_vec_pretty(&self.snapshot().await)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create session directory '{}'", parent.display())
            })?;
        }
        tokio::fs::write(path, raw)
            .await
            .with_context(|| format!("failed to write session file '{}'", path.display()))
    }

    /// Returns `None` when no session file exists yet.
    pub async fn load_from(path: &Path) -> anyhow::Result<Option<Self>> {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read session file '{}'", path.display()))
            }
        };
        let credentials: Credentials = serde_json::from_slice(&raw)
            .with_context(|| format!("malformed session file '{}'", path.display()))?;
        Ok(Some(Self::from_credentials(credentials)))
    }

    pub async fn forget(path: &Path) -> anyhow::Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to remove session file '{}'", path.display())),
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
