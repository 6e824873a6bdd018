//! Active session discovery.
//!
//! There is no session database: tmux's live session list is the source of
//! truth, filtered through the naming scheme. A descriptor left on disk for
//! a session tmux no longer knows about is stale, not active.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::session::SessionInfo;
use crate::orchestrator::naming;
use crate::tmux::{LiveSession, Multiplexer};
use crate::Result;

/// Most completion choices returned at once.
pub const MAX_CHOICES: usize = 25;

/// Live sessions that carry a valid session name, oldest first.
///
/// # Errors
///
/// Returns `AppError::Tmux` if the session list cannot be read.
pub async fn list_active(mux: &dyn Multiplexer) -> Result<Vec<SessionInfo>> {
    let live = mux.list_sessions().await?;
    Ok(reconcile(live, Utc::now()))
}

/// Keep the entries the naming scheme recognizes and order them by age.
#[must_use]
pub fn reconcile(live: Vec<LiveSession>, now: DateTime<Utc>) -> Vec<SessionInfo> {
    let mut sessions: Vec<SessionInfo> = live
        .into_iter()
        .filter_map(|entry| match naming::parse(&entry.name) {
            Ok(parsed) => Some(SessionInfo {
                age: (now - entry.created_at).to_std().unwrap_or_default(),
                project: parsed.project,
                created_at: entry.created_at,
                name: entry.name,
            }),
            Err(_) => {
                debug!(name = %entry.name, "ignoring unrelated tmux session");
                None
            }
        })
        .collect();

    sessions.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.name.cmp(&b.name))
    });
    sessions
}

/// Active session names containing `current`, case-insensitively, in
/// registry order.
#[must_use]
pub fn complete(sessions: &[SessionInfo], current: &str) -> Vec<String> {
    let needle = current.to_lowercase();
    sessions
        .iter()
        .filter(|s| s.name.to_lowercase().contains(&needle))
        .take(MAX_CHOICES)
        .map(|s| s.name.clone())
        .collect()
}

/// Project directories under `root` containing `current`, case-insensitively.
///
/// Hidden directories are skipped. Results are sorted and capped at
/// [`MAX_CHOICES`]. An unreadable root yields no choices.
#[must_use]
pub fn complete_projects(root: &Path, current: &str) -> Vec<String> {
    let Ok(entries) = fs::read_dir(root) else {
        debug!(root = %root.display(), "project root not readable");
        return Vec::new();
    };

    let needle = current.to_lowercase();
    let mut names: Vec<String> = entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !name.starts_with('.'))
        .filter(|name| name.to_lowercase().contains(&needle))
        .collect();
    names.sort();
    names.truncate(MAX_CHOICES);
    names
}
