#![forbid(unsafe_code)]

//! `command-runner` — Slack front door and local CLI for agent sessions.
//!
//! `serve` connects Socket Mode and handles `/claude`, `/sessions` and
//! `/kill`. `list`, `kill` and `complete` work against tmux and the
//! sessions directory without touching Slack.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use command_runner::config::GlobalConfig;
use command_runner::models::session::KillOutcome;
use command_runner::orchestrator::descriptor_store::DescriptorStore;
use command_runner::orchestrator::{registry, terminator};
use command_runner::slack::client::SlackService;
use command_runner::tmux::TmuxMultiplexer;
use command_runner::{AppError, AppState, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum CompletionKind {
    Sessions,
    Projects,
}

#[derive(Debug, Parser)]
#[command(name = "command-runner", about = "Agent sessions in tmux, driven from Slack", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Connect to Slack and serve slash commands until interrupted.
    Serve,
    /// Print active sessions, oldest first.
    List,
    /// Kill a session and remove its files.
    Kill {
        /// Session name.
        name: String,
    },
    /// Print completion candidates, one per line.
    Complete {
        /// What to complete.
        #[arg(value_enum)]
        kind: CompletionKind,
        /// Text typed so far.
        #[arg(default_value = "")]
        prefix: String,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = GlobalConfig::load_from_path(&args.config)?;
    let mux = TmuxMultiplexer::new(config.tmux_binary.clone());

    match args.command {
        Command::Serve => serve(config, mux).await,
        Command::List => {
            for session in registry::list_active(&mux).await? {
                println!(
                    "{}\t{}\t{}",
                    session.name,
                    session.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    session.age_display()
                );
            }
            Ok(())
        }
        Command::Kill { name } => {
            let store = DescriptorStore::new(config.sessions_dir.clone());
            match terminator::kill(&mux, &store, &name).await? {
                KillOutcome::Killed => println!("Session {name} killed and cleaned up."),
                KillOutcome::NotFound => {
                    println!("No session named {name} (nothing to clean up).");
                }
            }
            Ok(())
        }
        Command::Complete { kind, prefix } => {
            let choices = match kind {
                CompletionKind::Sessions => {
                    registry::complete(&registry::list_active(&mux).await?, &prefix)
                }
                CompletionKind::Projects => {
                    registry::complete_projects(config.default_working_dir(), &prefix)
                }
            };
            for choice in choices {
                println!("{choice}");
            }
            Ok(())
        }
    }
}

async fn serve(mut config: GlobalConfig, mux: TmuxMultiplexer) -> Result<()> {
    info!("command-runner server bootstrap");

    // Load Slack credentials from keyring / env vars.
    config.load_credentials().await?;
    let config = Arc::new(config);
    info!(sessions_dir = %config.sessions_dir.display(), "configuration loaded");

    let call_timeout = Duration::from_secs(config.signal.call_timeout_seconds);
    let (slack, queue_task) = SlackService::start(&config.slack, call_timeout).map_err(|err| {
        error!(%err, "slack service start failed");
        err
    })?;
    let slack = Arc::new(slack);

    let state = Arc::new(AppState::new(
        Arc::clone(&config),
        Arc::new(mux),
        Arc::clone(&slack) as Arc<dyn command_runner::transport::ChatTransport>,
    ));
    let socket_task = slack.spawn_socket_mode(&config.slack.app_token, Arc::clone(&state));
    info!("slash commands ready");

    let ct = CancellationToken::new();
    let signal_ct = ct.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_ct.cancel();
    });

    ct.cancelled().await;
    info!("shutdown signal received");

    // Sessions keep running in tmux; only the front door goes away.
    socket_task.abort();
    drop(state);
    drop(slack);
    // Brief pause to let queued notices drain.
    tokio::time::sleep(Duration::from_millis(500)).await;
    queue_task.abort();

    info!("command-runner shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
