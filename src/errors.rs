//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
///
/// The spawn path reports `Thread`, `Descriptor`, `Launch` and `Delivery`
/// separately because each one calls for a different remediation.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Slack API or Socket Mode failure.
    Slack(String),
    /// The session thread could not be created.
    Thread(String),
    /// The session descriptor could not be written or read.
    Descriptor(String),
    /// A session descriptor is unreadable or incomplete.
    DescriptorRead(String),
    /// The detached agent process could not be launched.
    Launch(String),
    /// The initial prompt could not be delivered to a running session.
    Delivery(String),
    /// A tmux command failed or timed out.
    Tmux(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// Caller is not allowed to perform the requested action.
    Unauthorized(String),
    /// A string is not a valid session name.
    InvalidName(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Slack(msg) => write!(f, "slack: {msg}"),
            Self::Thread(msg) => write!(f, "could not create thread: {msg}"),
            Self::Descriptor(msg) => write!(f, "could not write config: {msg}"),
            Self::DescriptorRead(msg) => write!(f, "could not read config: {msg}"),
            Self::Launch(msg) => write!(f, "could not launch session: {msg}"),
            Self::Delivery(msg) => write!(f, "could not deliver prompt: {msg}"),
            Self::Tmux(msg) => write!(f, "tmux: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            Self::InvalidName(msg) => write!(f, "invalid session name: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
