#![forbid(unsafe_code)]

//! Run interactive coding-agent sessions in detached tmux sessions, one
//! Slack thread per session, with a status hook marking thread activity.

pub mod config;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod signal;
pub mod slack;
pub mod state;
pub mod tmux;
pub mod transport;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
pub use state::AppState;
