//! Per-session descriptor shared by the orchestrator, the agent and the hook.
//!
//! The on-disk form is a `---` fenced block of `key: value` lines. The hook
//! runs as a short-lived process inside the agent's lifecycle, so the format
//! stays readable by a plain line scanner: one key per line, the first `:`
//! separates key from value, unknown keys are ignored.

use std::fmt::Write as _;
use std::path::PathBuf;

use crate::config::SignalConfig;
use crate::{AppError, Result};

const FENCE: &str = "---";

/// The chat location a session talks through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTarget {
    /// Channel holding the session thread.
    pub channel_id: String,
    /// Timestamp of the thread's parent message. `None` routes to the
    /// channel itself.
    pub thread_ts: Option<String>,
}

impl RoutingTarget {
    /// Target a thread inside a channel.
    #[must_use]
    pub fn thread(channel_id: impl Into<String>, thread_ts: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            thread_ts: Some(thread_ts.into()),
        }
    }
}

/// Everything a session process and its hook need to reach the thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescriptor {
    /// Thread the session must use for all communication.
    pub target: RoutingTarget,
    /// Bot token used by the agent tooling and the hook.
    pub bot_token: String,
    /// Directory the session was started in.
    pub working_dir: PathBuf,
    /// Seconds the agent waits for a reply.
    pub default_timeout: u64,
    /// Hook tuning.
    pub signal: SignalConfig,
}

impl SessionDescriptor {
    /// Render the frontmatter form written to disk.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(FENCE);
        out.push('\n');
        push_line(&mut out, "bot_token", &self.bot_token);
        push_line(&mut out, "channel_id", &self.target.channel_id);
        if let Some(ref ts) = self.target.thread_ts {
            push_line(&mut out, "thread_ts", ts);
        }
        push_line(&mut out, "working_dir", &self.working_dir.to_string_lossy());
        push_line(&mut out, "default_timeout", &self.default_timeout.to_string());
        push_line(
            &mut out,
            "throttle_seconds",
            &self.signal.throttle_seconds.to_string(),
        );
        push_line(&mut out, "busy_reaction", &self.signal.busy_reaction);
        push_line(&mut out, "done_reaction", &self.signal.done_reaction);
        push_line(
            &mut out,
            "call_timeout_seconds",
            &self.signal.call_timeout_seconds.to_string(),
        );
        out.push_str(FENCE);
        out.push('\n');
        out
    }

    /// Parse a descriptor with a line scanner.
    ///
    /// Lines outside the first fenced block are ignored when a fence is
    /// present; without fences every line is scanned. Malformed numeric
    /// values fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Descriptor` if `channel_id` or `bot_token` is
    /// missing or empty.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut channel_id = None;
        let mut thread_ts = None;
        let mut bot_token = None;
        let mut working_dir = None;
        let mut default_timeout = None;
        let mut signal = SignalConfig::default();

        for (key, value) in scan(raw) {
            match key {
                "channel_id" => channel_id = Some(value.to_owned()),
                "thread_ts" => thread_ts = Some(value.to_owned()),
                "bot_token" => bot_token = Some(value.to_owned()),
                "working_dir" => working_dir = Some(PathBuf::from(value)),
                "default_timeout" => default_timeout = value.parse().ok(),
                "throttle_seconds" => {
                    if let Ok(secs) = value.parse() {
                        signal.throttle_seconds = secs;
                    }
                }
                "busy_reaction" => signal.busy_reaction = value.to_owned(),
                "done_reaction" => signal.done_reaction = value.to_owned(),
                "call_timeout_seconds" => {
                    if let Ok(secs) = value.parse::<u64>() {
                        if secs > 0 {
                            signal.call_timeout_seconds = secs;
                        }
                    }
                }
                _ => {}
            }
        }

        let channel_id = channel_id
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::DescriptorRead("descriptor has no channel_id".into()))?;
        let bot_token = bot_token
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::DescriptorRead("descriptor has no bot_token".into()))?;

        Ok(Self {
            target: RoutingTarget {
                channel_id,
                thread_ts: thread_ts.filter(|v| !v.is_empty()),
            },
            bot_token,
            working_dir: working_dir.unwrap_or_default(),
            default_timeout: default_timeout.unwrap_or(86_400),
            signal,
        })
    }
}

fn push_line(out: &mut String, key: &str, value: &str) {
    // Values are single-line by construction; strip stray newlines so a
    // value can never inject another key.
    let value = value.replace(['\r', '\n'], " ");
    let _ = writeln!(out, "{key}: {value}");
}

/// Yield `(key, value)` pairs from the descriptor body.
fn scan(raw: &str) -> Vec<(&str, &str)> {
    let fenced = raw.lines().any(|line| line.trim() == FENCE);
    let mut inside = !fenced;
    let mut pairs = Vec::new();

    for line in raw.lines() {
        let trimmed = line.trim();
        if fenced && trimmed == FENCE {
            if inside {
                break;
            }
            inside = true;
            continue;
        }
        if !inside || trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = trimmed.split_once(':') {
            pairs.push((key.trim(), value.trim()));
        }
    }

    pairs
}
