//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

/// Keychain service under which Slack tokens are stored.
pub const KEYRING_SERVICE: &str = "command-runner";

/// Nested Slack configuration for Socket Mode connectivity.
///
/// Tokens are loaded at runtime via OS keychain or environment variables,
/// never from the TOML config file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SlackConfig {
    /// The only channel slash commands are accepted from. Session threads
    /// are created here.
    pub channel_id: String,
    /// App-level token used for Socket Mode (populated at runtime).
    #[serde(skip)]
    pub app_token: String,
    /// Bot user token used for posting messages (populated at runtime).
    #[serde(skip)]
    pub bot_token: String,
}

/// Bounds for handing the initial prompt to a freshly launched session.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HandoffConfig {
    /// Total time allowed for the prompt paste to succeed.
    #[serde(default = "default_delivery_timeout_seconds")]
    pub delivery_timeout_seconds: u64,
    /// Pause between delivery attempts.
    #[serde(default = "default_retry_interval_millis")]
    pub retry_interval_millis: u64,
    /// Text that must appear in the pane before the prompt is pasted.
    /// When unset the paste is attempted as soon as the session exists.
    #[serde(default)]
    pub ready_pattern: Option<String>,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            delivery_timeout_seconds: default_delivery_timeout_seconds(),
            retry_interval_millis: default_retry_interval_millis(),
            ready_pattern: None,
        }
    }
}

impl HandoffConfig {
    /// Total delivery window.
    #[must_use]
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_seconds)
    }

    /// Delay between attempts.
    #[must_use]
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_millis)
    }
}

fn default_delivery_timeout_seconds() -> u64 {
    15
}

fn default_retry_interval_millis() -> u64 {
    500
}

/// Tuning for the status signal hook, copied into every session descriptor.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SignalConfig {
    /// Minimum seconds between two busy markers for one session.
    #[serde(default = "default_throttle_seconds")]
    pub throttle_seconds: u64,
    /// Reaction added while the agent is working.
    #[serde(default = "default_busy_reaction")]
    pub busy_reaction: String,
    /// Reaction added when the agent stops.
    #[serde(default = "default_done_reaction")]
    pub done_reaction: String,
    /// Timeout applied to each Slack call made by the hook.
    #[serde(default = "default_call_timeout_seconds")]
    pub call_timeout_seconds: u64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            throttle_seconds: default_throttle_seconds(),
            busy_reaction: default_busy_reaction(),
            done_reaction: default_done_reaction(),
            call_timeout_seconds: default_call_timeout_seconds(),
        }
    }
}

fn default_throttle_seconds() -> u64 {
    30
}

fn default_busy_reaction() -> String {
    "hourglass_flowing_sand".into()
}

fn default_done_reaction() -> String {
    "white_check_mark".into()
}

fn default_call_timeout_seconds() -> u64 {
    5
}

fn default_sessions_dir() -> PathBuf {
    PathBuf::from("/tmp/claude-sessions")
}

fn default_agent_command() -> String {
    "claude".into()
}

fn default_unset_env() -> Vec<String> {
    vec!["CLAUDECODE".into()]
}

fn default_tmux_binary() -> String {
    "tmux".into()
}

fn default_notify_command() -> String {
    "uv run --project ${CLAUDE_PLUGIN_ROOT} slack-notify".into()
}

fn default_reply_timeout_seconds() -> u64 {
    86_400
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Directory holding project checkouts; sessions start here by default.
    pub default_working_dir: PathBuf,
    /// Root of the per-session descriptor directories.
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: PathBuf,
    /// tmux executable.
    #[serde(default = "default_tmux_binary")]
    pub tmux_binary: String,
    /// Agent binary launched inside each tmux session.
    #[serde(default = "default_agent_command")]
    pub agent_command: String,
    /// Arguments passed to the agent binary.
    #[serde(default)]
    pub agent_args: Vec<String>,
    /// Plugin directory handed to the agent as `--plugin-dir`.
    #[serde(default)]
    pub plugin_dir: Option<PathBuf>,
    /// Environment variables removed before the agent starts.
    #[serde(default = "default_unset_env")]
    pub unset_env: Vec<String>,
    /// Agent-side tool the initial prompt tells the agent to talk through.
    #[serde(default = "default_notify_command")]
    pub notify_command: String,
    /// Seconds the agent waits for a reply in the thread.
    #[serde(default = "default_reply_timeout_seconds")]
    pub reply_timeout_seconds: u64,
    /// Slack users allowed to run commands. Empty allows anyone in the
    /// command channel.
    #[serde(default)]
    pub authorized_user_ids: Vec<String>,
    /// Slack connectivity settings.
    pub slack: SlackConfig,
    /// Prompt delivery bounds.
    #[serde(default)]
    pub handoff: HandoffConfig,
    /// Hook throttling and reaction names.
    #[serde(default)]
    pub signal: SignalConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load Slack credentials from OS keychain with env-var fallback.
    ///
    /// Tries the `command-runner` keyring service first, then falls back
    /// to `SLACK_APP_TOKEN` / `SLACK_BOT_TOKEN` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if neither keychain nor env vars provide
    /// the required tokens.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.slack.app_token = load_credential("slack_app_token", "SLACK_APP_TOKEN").await?;
        self.load_bot_token().await
    }

    /// Load only the bot token, for CLI paths that never open Socket Mode.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the token is not available.
    pub async fn load_bot_token(&mut self) -> Result<()> {
        self.slack.bot_token = load_credential("slack_bot_token", "SLACK_BOT_TOKEN").await?;
        Ok(())
    }

    /// Absolute path to the default working directory.
    #[must_use]
    pub fn default_working_dir(&self) -> &Path {
        &self.default_working_dir
    }

    /// Full launch command for the agent, including the plugin directory
    /// and the environment scrub.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if an argument cannot be shell-quoted.
    pub fn launch_command(&self) -> Result<String> {
        let mut words: Vec<String> = Vec::new();
        if !self.unset_env.is_empty() {
            words.push("env".into());
            for var in &self.unset_env {
                words.push("-u".into());
                words.push(var.clone());
            }
        }
        words.push(self.agent_command.clone());
        words.extend(self.agent_args.iter().cloned());
        if let Some(ref plugin_dir) = self.plugin_dir {
            words.push("--plugin-dir".into());
            words.push(plugin_dir.to_string_lossy().into_owned());
        }

        shlex::try_join(words.iter().map(String::as_str))
            .map_err(|err| AppError::Config(format!("agent command cannot be quoted: {err}")))
    }

    /// Validate that a Slack user may manage sessions.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Unauthorized` if an allow-list is configured and
    /// the user is not on it.
    pub fn ensure_authorized(&self, user_id: &str) -> Result<()> {
        if self.authorized_user_ids.is_empty()
            || self.authorized_user_ids.iter().any(|id| id == user_id)
        {
            Ok(())
        } else {
            Err(AppError::Unauthorized("user is not authorized".into()))
        }
    }

    /// Validate that a command came from the configured command channel.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Unauthorized` for any other channel.
    pub fn ensure_command_channel(&self, channel_id: &str) -> Result<()> {
        if self.slack.channel_id == channel_id {
            Ok(())
        } else {
            Err(AppError::Unauthorized(
                "this command can only be used in the designated command channel".into(),
            ))
        }
    }

    fn validate(&mut self) -> Result<()> {
        if self.slack.channel_id.trim().is_empty() {
            return Err(AppError::Config("slack.channel_id must not be empty".into()));
        }

        if self.agent_command.trim().is_empty() {
            return Err(AppError::Config("agent_command must not be empty".into()));
        }

        if self.handoff.delivery_timeout_seconds == 0 {
            return Err(AppError::Config(
                "handoff.delivery_timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.handoff.retry_interval_millis == 0 {
            return Err(AppError::Config(
                "handoff.retry_interval_millis must be greater than zero".into(),
            ));
        }

        if self.signal.call_timeout_seconds == 0 {
            return Err(AppError::Config(
                "signal.call_timeout_seconds must be greater than zero".into(),
            ));
        }

        let canonical_root = self
            .default_working_dir
            .canonicalize()
            .map_err(|err| AppError::Config(format!("default_working_dir invalid: {err}")))?;
        self.default_working_dir = canonical_root;

        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    env::var(env_key).map_err(|_| {
        AppError::Config(format!(
            "credential {keyring_key} not found in keychain or {env_key} env var"
        ))
    })
}
