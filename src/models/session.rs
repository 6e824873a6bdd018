//! Session views produced by the registry, terminator and handoff.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A live session as reported by the registry.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionInfo {
    /// Full session name, also the tmux session name.
    pub name: String,
    /// Project slug parsed from the name.
    pub project: String,
    /// When tmux created the session.
    pub created_at: DateTime<Utc>,
    /// Time since creation, measured when the list was taken.
    #[serde(serialize_with = "serialize_secs")]
    pub age: Duration,
}

impl SessionInfo {
    /// Human-readable age such as `3h 12m` or `45s`.
    #[must_use]
    pub fn age_display(&self) -> String {
        let secs = self.age.as_secs();
        let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
        if hours > 0 {
            format!("{hours}h {minutes}m")
        } else if minutes > 0 {
            format!("{minutes}m {seconds}s")
        } else {
            format!("{seconds}s")
        }
    }
}

fn serialize_secs<S: serde::Serializer>(
    age: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(age.as_secs())
}

/// Result of a kill request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    /// The tmux session, its artifacts, or both were removed.
    Killed,
    /// Nothing existed under that name; no cleanup was needed.
    NotFound,
}

/// Proof of a successful prompt delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivered {
    /// Number of paste attempts, including the successful one.
    pub attempts: u32,
    /// Time from the first attempt until the paste landed.
    pub elapsed: Duration,
}
