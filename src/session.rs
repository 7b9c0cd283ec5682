use crate::errors::{ApiError, AppError};
use crate::storage::{load_session, persist_session, remove_session, PersistedSession};
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::info;

/// Holds the bearer token for the signed-in user.
///
/// Created once at startup from the durable session file and injected into
/// the API-facing modules; `begin` and `end` bracket a login.
pub struct SessionStore {
    path: PathBuf,
    token: RwLock<Option<String>>,
}

impl SessionStore {
    pub async fn open(path: PathBuf) -> Self {
        let persisted = load_session(&path).await;
        if persisted.token.is_some() {
            info!(path = %path.display(), "restored saved session");
        }
        Self {
            path,
            token: RwLock::new(persisted.token),
        }
    }

    /// An in-memory store that starts signed in; used by tests.
    pub fn with_token(path: PathBuf, token: Option<String>) -> Self {
        Self {
            path,
            token: RwLock::new(token),
        }
    }

    pub async fn token(&self) -> Result<String, ApiError> {
        self.token
            .read()
            .await
            .clone()
            .ok_or(ApiError::NotAuthenticated)
    }

    pub async fn is_active(&self) -> bool {
        self.token.read().await.is_some()
    }

    pub async fn begin(&self, token: String) -> Result<(), AppError> {
        let mut guard = self.token.write().await;
        persist_session(
            &self.path,
            &PersistedSession {
                token: Some(token.clone()),
            },
        )
        .await?;
        *guard = Some(token);
        Ok(())
    }

    /// Clears the token locally and on disk, returning the one that was held.
    pub async fn end(&self) -> Result<Option<String>, AppError> {
        let mut guard = self.token.write().await;
        let previous = guard.take();
        remove_session(&self.path).await?;
        Ok(previous)
    }
}
