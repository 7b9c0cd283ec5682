use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/dashboard", get(handlers::dashboard))
        .route("/dashboard/day/:date", get(handlers::select_day))
        .route("/walk-history/next", post(handlers::walk_next))
        .route("/walk-history/previous", post(handlers::walk_previous))
        .route("/walk-history/close", post(handlers::walk_close))
        .route("/walk-history/:session_id", get(handlers::walk_history))
        .route("/api/month/:year/:month", get(handlers::api_month))
        .route("/api/emotion/:date", get(handlers::api_emotion))
        .with_state(state)
}
