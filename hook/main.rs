#![forbid(unsafe_code)]

//! `command-runner-hook` — agent lifecycle hook.
//!
//! `command-runner-hook pre_tool|stop`. Reads the session descriptor named
//! by `SESSION_CONFIG` and moves the thread's busy/done reactions. Always
//! exits successfully; stdout is left untouched for the agent.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, EnvFilter};

use command_runner::orchestrator::spawner::SESSION_CONFIG_ENV;
use command_runner::signal::{self, HookAction};
use command_runner::slack::api::SlackApi;
use command_runner::transport::ChatTransport;

/// Log filter for the hook; stderr only.
const LOG_ENV: &str = "COMMAND_RUNNER_HOOK_LOG";
/// Upper bound for reading the hook event from stdin.
const STDIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Parser)]
#[command(name = "command-runner-hook", about = "Session status hook", version, long_about = None)]
struct Cli {
    /// Lifecycle event: `pre_tool` or `stop`.
    action: String,
}

fn main() {
    init_tracing();

    let Ok(args) = Cli::try_parse() else {
        warn!("invalid hook arguments");
        return;
    };
    let action = match args.action.parse::<HookAction>() {
        Ok(action) => action,
        Err(err) => {
            warn!(%err, "ignoring hook invocation");
            return;
        }
    };
    let Some(descriptor_path) = std::env::var_os(SESSION_CONFIG_ENV).map(PathBuf::from) else {
        debug!("{SESSION_CONFIG_ENV} not set; not a managed session");
        return;
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            warn!(%err, "failed to build tokio runtime");
            return;
        }
    };

    runtime.block_on(async move {
        drain_event().await;
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        let outcome = signal::run(
            action,
            &descriptor_path,
            |descriptor| {
                let timeout = Duration::from_secs(descriptor.signal.call_timeout_seconds);
                SlackApi::connect(&descriptor.bot_token, timeout)
                    .map(|api| Arc::new(api) as Arc<dyn ChatTransport>)
            },
            now,
        )
        .await;
        debug!(?outcome, "hook finished");
    });
    // An interactive stdin keeps a blocking reader alive; do not wait on it.
    runtime.shutdown_background();
}

/// Read the agent's JSON event from stdin, bounded in time. The content is
/// only logged; the hook acts on the action argument alone.
async fn drain_event() {
    let mut raw = String::new();
    let mut stdin = tokio::io::stdin();
    let read = tokio::time::timeout(STDIN_TIMEOUT, stdin.read_to_string(&mut raw)).await;
    match read {
        Ok(Ok(_)) if !raw.trim().is_empty() => {
            match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(event) => debug!(
                    event = event.get("hook_event_name").and_then(|v| v.as_str()),
                    "hook event received"
                ),
                Err(err) => debug!(%err, "hook event is not JSON; ignored"),
            }
        }
        Ok(Ok(_)) => {}
        Ok(Err(err)) => debug!(%err, "stdin unreadable"),
        Err(_) => debug!("no hook event on stdin"),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
