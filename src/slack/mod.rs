//! Slack bridge layer modules.

pub mod api;
pub mod client;
pub mod commands;
