//! Subprocess execution helpers.

use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Default timeout for tmux commands.
pub const TMUX_TIMEOUT: Duration = Duration::from_secs(10);

/// Run a subprocess command with a timeout.
///
/// The child is killed if the timeout elapses (tokio kills on drop once
/// `kill_on_drop` is set).
///
/// # Errors
///
/// Returns a description of the spawn failure or the timeout.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> std::result::Result<Output, String> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{description} failed: {io_err}")),
        Err(_elapsed) => Err(format!(
            "{description} timed out after {}s",
            timeout.as_secs()
        )),
    }
}

/// Run a subprocess with `input` piped to its stdin, bounded by `timeout`.
///
/// # Errors
///
/// Returns a description of the spawn, write or wait failure, or the timeout.
pub async fn run_with_input(
    mut cmd: Command,
    input: &[u8],
    timeout: Duration,
    description: &str,
) -> std::result::Result<Output, String> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let run = async {
        let mut child = cmd
            .spawn()
            .map_err(|err| format!("{description} failed: {err}"))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input)
                .await
                .map_err(|err| format!("{description} stdin write failed: {err}"))?;
            // Dropping stdin closes the pipe so the reader sees EOF.
        }
        child
            .wait_with_output()
            .await
            .map_err(|err| format!("{description} failed: {err}"))
    };

    match tokio::time::timeout(timeout, run).await {
        Ok(result) => result,
        Err(_elapsed) => Err(format!(
            "{description} timed out after {}s",
            timeout.as_secs()
        )),
    }
}
