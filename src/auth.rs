use crate::errors::{ApiError, AppError};
use crate::state::AppState;
use tracing::{info, warn};

pub const LOGIN_FAILED_MESSAGE: &str = "로그인 실패 정보를 다시 확인해 주세요";

#[derive(Debug)]
pub enum LoginError {
    /// Bad credentials, a token-less response, or a failed warm-up call.
    Rejected(ApiError),
    Storage(AppError),
}

impl LoginError {
    pub fn user_message(&self) -> &'static str {
        LOGIN_FAILED_MESSAGE
    }
}

/// Authenticates, stores the token, and warms up the server-side calendar.
pub async fn login(state: &AppState, username: &str, password: &str) -> Result<(), LoginError> {
    let token = state
        .api
        .login(username.trim(), password)
        .await
        .map_err(LoginError::Rejected)?;

    state.calendar.reset().await;
    state.navigator.close().await;
    state.session.begin(token.clone()).await.map_err(LoginError::Storage)?;

    if let Err(err) = state.api.warm_calendar(&token).await {
        warn!("calendar warm-up failed after login: {err}");
        if let Err(cleanup) = state.session.end().await {
            warn!("failed to discard session after warm-up failure: {}", cleanup.message);
        }
        return Err(LoginError::Rejected(err));
    }

    info!(username = username.trim(), "signed in");
    Ok(())
}

/// Ends the session. Local state is always torn down, even when the remote
/// logout call fails.
pub async fn logout(state: &AppState) -> Result<(), AppError> {
    let token = state.session.end().await?;
    state.calendar.reset().await;
    state.navigator.close().await;

    let Some(token) = token else {
        warn!("logout requested without an active session");
        return Ok(());
    };
    match state.api.logout(&token).await {
        Ok(()) => info!("signed out"),
        Err(err) => warn!("remote logout failed, local session cleared anyway: {err}"),
    }
    Ok(())
}

/// Local teardown after the service rejected our token.
pub async fn expire(state: &AppState) {
    if let Err(err) = state.session.end().await {
        warn!("failed to clear expired session: {}", err.message);
    }
    state.calendar.reset().await;
    state.navigator.close().await;
    info!("session expired, returning to login");
}
