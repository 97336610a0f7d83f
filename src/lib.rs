pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod services;
pub mod state;
pub mod storage;

pub use app::{app, router};
pub use state::AppState;
