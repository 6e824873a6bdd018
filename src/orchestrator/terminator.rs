//! Session kill and cleanup.
//!
//! The two steps are independent: the tmux session may already be gone
//! while its directory remains, or the reverse. Each step runs regardless
//! of how the other went.

use tracing::{info, info_span, warn, Instrument};

use crate::models::session::KillOutcome;
use crate::orchestrator::descriptor_store::DescriptorStore;
use crate::orchestrator::naming;
use crate::tmux::Multiplexer;
use crate::{AppError, Result};

/// Kill the session `name` and remove its artifacts.
///
/// Idempotent: once nothing is left, further calls return
/// [`KillOutcome::NotFound`]. Names outside the naming scheme are
/// `NotFound` and never touch the filesystem.
///
/// # Errors
///
/// Returns an error only when neither step removed anything and at least
/// one step failed for a reason other than absence, so a failed cleanup is
/// never reported as "nothing to clean up".
pub async fn kill(
    mux: &dyn Multiplexer,
    store: &DescriptorStore,
    name: &str,
) -> Result<KillOutcome> {
    kill_inner(mux, store, name)
        .instrument(info_span!("kill_session", session = name))
        .await
}

async fn kill_inner(
    mux: &dyn Multiplexer,
    store: &DescriptorStore,
    name: &str,
) -> Result<KillOutcome> {
    let Ok(name) = naming::validate(name) else {
        info!("not a session name; nothing to kill");
        return Ok(KillOutcome::NotFound);
    };

    let mut failure: Option<AppError> = None;

    let killed_process = match mux.kill_session(name.as_str()).await {
        Ok(()) => true,
        Err(AppError::NotFound(_)) => false,
        Err(err) => {
            warn!(%err, "tmux kill failed; continuing with cleanup");
            failure = Some(err);
            false
        }
    };

    let removed_files = match store.remove(&name) {
        Ok(removed) => removed,
        Err(err) => {
            warn!(%err, "artifact cleanup failed");
            failure.get_or_insert(err);
            false
        }
    };

    if killed_process || removed_files {
        if let Some(ref err) = failure {
            warn!(%err, "session killed with partial cleanup");
        }
        info!(killed_process, removed_files, "session killed");
        return Ok(KillOutcome::Killed);
    }

    match failure {
        Some(err) => Err(err),
        None => {
            info!("no such session");
            Ok(KillOutcome::NotFound)
        }
    }
}
