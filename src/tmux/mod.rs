//! Process multiplexer seam and its tmux implementation.
//!
//! The orchestrator never owns the agent processes it starts. After launch
//! it only holds the session name and asks the multiplexer whether that
//! name exists, what it contains, or to kill it.

pub mod subprocess;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use chrono::{DateTime, TimeZone, Utc};
use tokio::process::Command;
use tracing::{error, warn};

use crate::{AppError, Result};
use subprocess::{run_with_input, run_with_timeout, TMUX_TIMEOUT};

/// A session entry as reported by the multiplexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSession {
    /// Multiplexer session name.
    pub name: String,
    /// Creation time reported by the multiplexer.
    pub created_at: DateTime<Utc>,
}

/// Boxed future returned by [`Multiplexer`] methods.
pub type MuxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Remote process table: detached sessions addressed by name.
pub trait Multiplexer: Send + Sync {
    /// Start `command` in a new detached session named `name`.
    ///
    /// Returns once the multiplexer has accepted the session; it does not
    /// wait for the command to become interactive.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Launch`] if the session cannot be created.
    fn new_detached_session<'a>(
        &'a self,
        name: &'a str,
        start_dir: &'a Path,
        command: &'a str,
        env: &'a [(String, String)],
    ) -> MuxFuture<'a, ()>;

    /// List every live session, including ones this system did not start.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Tmux`] if the listing command fails.
    fn list_sessions(&self) -> MuxFuture<'_, Vec<LiveSession>>;

    /// Whether a session with exactly this name is live.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Tmux`] if the probe itself fails.
    fn has_session<'a>(&'a self, name: &'a str) -> MuxFuture<'a, bool>;

    /// Whether the session can take input. With `pattern`, the visible pane
    /// must also contain that text.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Tmux`] if the probe itself fails.
    fn is_ready<'a>(&'a self, name: &'a str, pattern: Option<&'a str>) -> MuxFuture<'a, bool>;

    /// Paste `text` into the session's active pane without submitting it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the session does not exist, or
    /// [`AppError::Tmux`] if the paste fails.
    fn paste_text<'a>(&'a self, name: &'a str, text: &'a str) -> MuxFuture<'a, ()>;

    /// Press Enter once in the session's active pane.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Tmux`] if the keystroke cannot be sent.
    fn submit<'a>(&'a self, name: &'a str) -> MuxFuture<'a, ()>;

    /// Kill the named session.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no such session is live, or
    /// [`AppError::Tmux`] if the command fails for another reason.
    fn kill_session<'a>(&'a self, name: &'a str) -> MuxFuture<'a, ()>;
}

/// Tmux-backed [`Multiplexer`].
#[derive(Debug, Clone)]
pub struct TmuxMultiplexer {
    binary: String,
}

impl Default for TmuxMultiplexer {
    fn default() -> Self {
        Self::new("tmux")
    }
}

impl TmuxMultiplexer {
    /// Use the given tmux binary.
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self) -> Command {
        Command::new(&self.binary)
    }

    async fn run(&self, args: &[&str], description: &str) -> Result<std::process::Output> {
        let mut cmd = self.command();
        cmd.args(args);
        run_with_timeout(cmd, TMUX_TIMEOUT, description)
            .await
            .map_err(AppError::Tmux)
    }
}

/// Exact-match session target; a bare name would prefix-match in tmux.
fn session_target(name: &str) -> String {
    format!("={name}")
}

/// Exact-match pane target for the session's active pane.
fn pane_target(name: &str) -> String {
    format!("={name}:")
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn is_missing_session(stderr: &str) -> bool {
    stderr.contains("can't find session")
        || stderr.contains("no server running")
        || stderr.contains("session not found")
        || stderr.contains("error connecting")
}

/// Parse `list-sessions -F '#{session_name} #{session_created}'` output.
fn parse_session_list(stdout: &str) -> Vec<LiveSession> {
    stdout
        .lines()
        .filter_map(|line| {
            let (name, created) = line.trim_end().rsplit_once(' ')?;
            let epoch = created.trim().parse::<i64>().ok()?;
            let created_at = Utc.timestamp_opt(epoch, 0).single()?;
            Some(LiveSession {
                name: name.to_owned(),
                created_at,
            })
        })
        .collect()
}

impl Multiplexer for TmuxMultiplexer {
    fn new_detached_session<'a>(
        &'a self,
        name: &'a str,
        start_dir: &'a Path,
        command: &'a str,
        env: &'a [(String, String)],
    ) -> MuxFuture<'a, ()> {
        Box::pin(async move {
            if !start_dir.is_dir() {
                return Err(AppError::Launch(format!(
                    "working directory does not exist: {}",
                    start_dir.display()
                )));
            }

            let mut cmd = self.command();
            cmd.arg("new-session")
                .arg("-d")
                .arg("-s")
                .arg(name)
                .arg("-c")
                .arg(start_dir);
            for (key, value) in env {
                cmd.arg("-e").arg(format!("{key}={value}"));
            }
            cmd.arg(command);

            let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux new-session")
                .await
                .map_err(AppError::Launch)?;

            if !output.status.success() {
                let stderr = stderr_of(&output);
                error!(session = name, stderr = %stderr, "tmux new-session failed");
                return Err(AppError::Launch(stderr));
            }

            if !output.stderr.is_empty() {
                warn!(session = name, stderr = %stderr_of(&output), "tmux new-session stderr (non-fatal)");
            }

            Ok(())
        })
    }

    fn list_sessions(&self) -> MuxFuture<'_, Vec<LiveSession>> {
        Box::pin(async move {
            let output = self
                .run(
                    &["list-sessions", "-F", "#{session_name} #{session_created}"],
                    "tmux list-sessions",
                )
                .await?;

            if !output.status.success() {
                let stderr = stderr_of(&output);
                // No server means no sessions, not a failure.
                if is_missing_session(&stderr) {
                    return Ok(Vec::new());
                }
                return Err(AppError::Tmux(format!("list-sessions failed: {stderr}")));
            }

            Ok(parse_session_list(&String::from_utf8_lossy(&output.stdout)))
        })
    }

    fn has_session<'a>(&'a self, name: &'a str) -> MuxFuture<'a, bool> {
        Box::pin(async move {
            let target = session_target(name);
            let output = self
                .run(&["has-session", "-t", &target], "tmux has-session")
                .await?;
            Ok(output.status.success())
        })
    }

    fn is_ready<'a>(&'a self, name: &'a str, pattern: Option<&'a str>) -> MuxFuture<'a, bool> {
        Box::pin(async move {
            if !self.has_session(name).await? {
                return Ok(false);
            }
            let Some(pattern) = pattern else {
                return Ok(true);
            };

            let target = pane_target(name);
            let output = self
                .run(&["capture-pane", "-p", "-t", &target], "tmux capture-pane")
                .await?;
            if !output.status.success() {
                return Ok(false);
            }
            Ok(String::from_utf8_lossy(&output.stdout).contains(pattern))
        })
    }

    fn paste_text<'a>(&'a self, name: &'a str, text: &'a str) -> MuxFuture<'a, ()> {
        Box::pin(async move {
            // Buffer named after the session so concurrent spawns never
            // paste each other's prompt.
            let buffer = format!("prompt-{name}");
            let target = pane_target(name);

            let mut load = self.command();
            load.args(["load-buffer", "-b", &buffer, "-"]);
            let output = run_with_input(load, text.as_bytes(), TMUX_TIMEOUT, "tmux load-buffer")
                .await
                .map_err(AppError::Tmux)?;
            if !output.status.success() {
                return Err(AppError::Tmux(format!(
                    "load-buffer failed: {}",
                    stderr_of(&output)
                )));
            }

            // -d drops the buffer after pasting; -p uses bracketed paste so
            // embedded newlines do not submit early.
            let output = self
                .run(
                    &["paste-buffer", "-d", "-p", "-b", &buffer, "-t", &target],
                    "tmux paste-buffer",
                )
                .await?;
            if !output.status.success() {
                let stderr = stderr_of(&output);
                let _ = self
                    .run(&["delete-buffer", "-b", &buffer], "tmux delete-buffer")
                    .await;
                if is_missing_session(&stderr) {
                    return Err(AppError::NotFound(format!("session {name}")));
                }
                return Err(AppError::Tmux(format!("paste-buffer failed: {stderr}")));
            }

            Ok(())
        })
    }

    fn submit<'a>(&'a self, name: &'a str) -> MuxFuture<'a, ()> {
        Box::pin(async move {
            let target = pane_target(name);
            let output = self
                .run(&["send-keys", "-t", &target, "Enter"], "tmux send-keys")
                .await?;
            if !output.status.success() {
                return Err(AppError::Tmux(format!(
                    "send-keys failed: {}",
                    stderr_of(&output)
                )));
            }

            Ok(())
        })
    }

    fn kill_session<'a>(&'a self, name: &'a str) -> MuxFuture<'a, ()> {
        Box::pin(async move {
            let target = session_target(name);
            let output = self
                .run(&["kill-session", "-t", &target], "tmux kill-session")
                .await?;
            if output.status.success() {
                return Ok(());
            }

            let stderr = stderr_of(&output);
            if is_missing_session(&stderr) {
                Err(AppError::NotFound(format!("session {name}")))
            } else {
                Err(AppError::Tmux(format!("kill-session failed: {stderr}")))
            }
        })
    }
}
