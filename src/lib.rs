pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod seed;
pub mod services;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

pub use app::{router, AppState};
