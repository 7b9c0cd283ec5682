pub mod api;
pub mod app;
pub mod auth;
pub mod calendar;
pub mod config;
pub mod emotion;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod navigator;
pub mod session;
pub mod state;
pub mod stats;
pub mod storage;
pub mod ui;

#[cfg(test)]
mod testing;

pub use app::router;
pub use config::Config;
pub use state::AppState;
