//! Detached launch and initial prompt delivery.
//!
//! Launch returns as soon as tmux accepts the session. The agent needs a
//! moment before it reads input, so delivery polls readiness and retries
//! the paste with a short backoff until the configured window closes.

use std::path::Path;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::HandoffConfig;
use crate::models::session::Delivered;
use crate::orchestrator::naming::SessionName;
use crate::tmux::Multiplexer;
use crate::{AppError, Result};

/// Longest pause between two delivery attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(2);

/// Start `command` detached in a new session named `name`.
///
/// # Errors
///
/// Returns `AppError::Launch` if tmux refuses the session.
pub async fn spawn(
    mux: &dyn Multiplexer,
    name: &SessionName,
    start_dir: &Path,
    command: &str,
    env: &[(String, String)],
) -> Result<()> {
    mux.new_detached_session(name.as_str(), start_dir, command, env)
        .await
        .map_err(|err| match err {
            AppError::Launch(_) => err,
            other => AppError::Launch(other.to_string()),
        })?;
    info!(session = %name, dir = %start_dir.display(), "session launched");
    Ok(())
}

/// Paste `prompt` into the session once it is ready to take input.
///
/// The prompt lands as a single paste plus one Enter. Attempts repeat until
/// `policy.delivery_timeout()` has elapsed; a slow tmux call is cut off at
/// the same deadline.
///
/// # Errors
///
/// Returns `AppError::Delivery` naming the session when the window closes
/// without a successful paste. The session may still be running.
pub async fn deliver_prompt(
    mux: &dyn Multiplexer,
    name: &SessionName,
    prompt: &str,
    policy: &HandoffConfig,
) -> Result<Delivered> {
    let span = info_span!("deliver_prompt", session = %name);
    async move {
        let started = Instant::now();
        let deadline = started + policy.delivery_timeout();
        let mut backoff = policy.retry_interval();
        let mut attempts = 0_u32;
        let mut last_reason = String::from("session never became ready");
        let mut pasted = false;

        loop {
            attempts += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            let attempt = try_deliver(
                mux,
                name,
                prompt,
                policy.ready_pattern.as_deref(),
                &mut pasted,
            );
            let outcome = tokio::time::timeout(remaining, attempt).await;
            match outcome {
                Ok(Ok(true)) => {
                    let delivered = Delivered {
                        attempts,
                        elapsed: started.elapsed(),
                    };
                    info!(attempts, elapsed_ms = delivered.elapsed.as_millis(), "prompt delivered");
                    return Ok(delivered);
                }
                Ok(Ok(false)) => {
                    debug!(attempts, "session not ready yet");
                    last_reason = String::from("session never became ready");
                }
                Ok(Err(err)) => {
                    debug!(attempts, pasted, %err, "prompt delivery attempt failed");
                    last_reason = err.to_string();
                }
                Err(_) => {
                    debug!(attempts, pasted, "delivery attempt outlived the window");
                    last_reason = String::from("tmux did not answer in time");
                    break;
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(backoff.min(deadline - now)).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }

        warn!(attempts, reason = %last_reason, "prompt delivery gave up");
        Err(AppError::Delivery(format!(
            "session `{name}` did not accept the prompt within {}s ({last_reason}); \
             it may still be running without input",
            policy.delivery_timeout().as_secs()
        )))
    }
    .instrument(span)
    .await
}

/// One attempt. `Ok(false)` means not ready yet.
///
/// The prompt is pasted at most once; after that only Enter is retried.
async fn try_deliver(
    mux: &dyn Multiplexer,
    name: &SessionName,
    prompt: &str,
    ready_pattern: Option<&str>,
    pasted: &mut bool,
) -> Result<bool> {
    if !*pasted {
        if !mux.is_ready(name.as_str(), ready_pattern).await? {
            return Ok(false);
        }
        mux.paste_text(name.as_str(), prompt).await?;
        *pasted = true;
    }
    mux.submit(name.as_str()).await?;
    Ok(true)
}
