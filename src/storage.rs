use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::error;

/// On-disk form of the session: just the bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersistedSession {
    #[serde(default)]
    pub token: Option<String>,
}

pub async fn load_session(path: &Path) -> PersistedSession {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(session) => session,
            Err(err) => {
                error!("failed to parse session file: {err}");
                PersistedSession::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => PersistedSession::default(),
        Err(err) => {
            error!("failed to read session file: {err}");
            PersistedSession::default()
        }
    }
}

/// Writes through a temp file so readers never observe a half-written token.
pub async fn persist_session(path: &Path, session: &PersistedSession) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let payload = serde_json::to_vec_pretty(session).map_err(AppError::internal)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, payload).await?;
    fs::rename(&staging, path).await?;
    Ok(())
}

pub async fn remove_session(path: &Path) -> Result<(), AppError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}
