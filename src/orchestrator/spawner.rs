//! Session spawn flow.
//!
//! thread → name → descriptor → prompt file → detached launch → prompt
//! delivery. Each failure maps to its own error variant so the operator
//! knows which remediation applies: `Thread`, `Descriptor`, `Launch` or
//! `Delivery`.

use std::path::{Path, PathBuf};

use tracing::{info, info_span, warn, Instrument};

use crate::models::descriptor::{RoutingTarget, SessionDescriptor};
use crate::models::session::Delivered;
use crate::orchestrator::naming::{self, SessionName};
use crate::orchestrator::{handoff, prompt};
use crate::state::AppState;
use crate::config::GlobalConfig;
use crate::tmux::Multiplexer;
use crate::{AppError, Result};

/// Environment variable carrying the descriptor path into the session.
pub const SESSION_CONFIG_ENV: &str = "SESSION_CONFIG";
/// Environment variable carrying the session name into the session.
pub const SESSION_NAME_ENV: &str = "COMMAND_RUNNER_SESSION";

/// Names tried before giving up on a collision with a live session.
const MAX_NAME_ATTEMPTS: usize = 10;

/// Longest slice of the prompt used in a thread title.
const TITLE_PROMPT_CHARS: usize = 80;

/// A request to start one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnRequest {
    /// Project directory name under the default working directory, or an
    /// absolute path.
    pub project: Option<String>,
    /// Initial task for the agent.
    pub prompt: Option<String>,
    /// Explicit working directory; wins over `project`.
    pub working_dir: Option<PathBuf>,
}

/// A session that was launched and received its prompt.
#[derive(Debug, Clone)]
pub struct SpawnedSession {
    /// Allocated session name.
    pub name: SessionName,
    /// Thread the session talks through.
    pub target: RoutingTarget,
    /// Published descriptor.
    pub descriptor_path: PathBuf,
    /// Directory the agent started in.
    pub working_dir: PathBuf,
    /// Delivery statistics.
    pub delivered: Delivered,
}

/// Resolve where the session starts.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the resolved directory does not exist.
pub fn resolve_working_dir(config: &GlobalConfig, request: &SpawnRequest) -> Result<PathBuf> {
    let dir = match (&request.working_dir, &request.project) {
        (Some(dir), _) => dir.clone(),
        (None, Some(project)) if Path::new(project).is_absolute() => PathBuf::from(project),
        (None, Some(project)) => config.default_working_dir().join(project),
        (None, None) => config.default_working_dir().to_path_buf(),
    };

    if dir.is_dir() {
        Ok(dir)
    } else {
        Err(AppError::NotFound(format!(
            "directory does not exist: {}",
            dir.display()
        )))
    }
}

/// Project label used for the session name.
#[must_use]
pub fn project_label(request: &SpawnRequest, working_dir: &Path) -> String {
    request
        .project
        .as_deref()
        .map(Path::new)
        .and_then(Path::file_name)
        .or_else(|| working_dir.file_name())
        .map_or_else(|| "claude".to_owned(), |n| n.to_string_lossy().into_owned())
}

/// Title of the session thread.
#[must_use]
pub fn thread_title(prompt: Option<&str>) -> String {
    match prompt.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => format!("Claude: {}", p.chars().take(TITLE_PROMPT_CHARS).collect::<String>()),
        None => "Claude Session".to_owned(),
    }
}

/// Open the session thread in the command channel.
///
/// # Errors
///
/// Returns `AppError::Thread` if the transport cannot create it.
pub async fn open_thread(state: &AppState, prompt: Option<&str>) -> Result<RoutingTarget> {
    let title = thread_title(prompt);
    state
        .chat
        .create_thread(&state.config.slack.channel_id, &title)
        .await
        .map_err(|err| AppError::Thread(err.to_string()))
}

/// Allocate a name that no live session uses yet.
///
/// # Errors
///
/// Returns `AppError::Launch` if every attempt collided.
pub async fn allocate_unique(mux: &dyn Multiplexer, project: &str) -> Result<SessionName> {
    for _ in 0..MAX_NAME_ATTEMPTS {
        let name = naming::allocate(project);
        match mux.has_session(name.as_str()).await {
            Ok(false) => return Ok(name),
            Ok(true) => warn!(session = %name, "name already live, allocating another"),
            Err(err) => {
                // The clock already guarantees uniqueness; the probe is extra.
                warn!(session = %name, %err, "collision probe failed, using name");
                return Ok(name);
            }
        }
    }
    Err(AppError::Launch(format!(
        "could not find an available session name for {project}"
    )))
}

/// Launch a session bound to an existing thread.
///
/// # Errors
///
/// Returns `AppError::Descriptor` when the descriptor or prompt cannot be
/// written (nothing is launched), `AppError::Launch` when tmux refuses the
/// session (artifacts are removed), or `AppError::Delivery` when the prompt
/// could not be pasted (the session keeps running).
pub async fn launch_session(
    state: &AppState,
    request: &SpawnRequest,
    working_dir: &Path,
    target: RoutingTarget,
) -> Result<SpawnedSession> {
    let project = project_label(request, working_dir);
    let name = allocate_unique(state.mux.as_ref(), &project).await?;
    let span = info_span!("launch_session", session = %name, project = %project);

    async move {
        let config = &state.config;
        let descriptor = SessionDescriptor {
            target: target.clone(),
            bot_token: config.slack.bot_token.clone(),
            working_dir: working_dir.to_path_buf(),
            default_timeout: config.reply_timeout_seconds,
            signal: config.signal.clone(),
        };
        let descriptor_path = state.store.write(&name, &descriptor)?;
        let absolute_descriptor = descriptor_path
            .canonicalize()
            .unwrap_or_else(|_| descriptor_path.clone());

        let prompt_text = prompt::render(
            &name,
            &absolute_descriptor,
            &config.notify_command,
            config.reply_timeout_seconds,
            request.prompt.as_deref(),
        );
        state.store.write_prompt(&name, &prompt_text)?;

        let env = vec![
            (
                SESSION_CONFIG_ENV.to_owned(),
                absolute_descriptor.to_string_lossy().into_owned(),
            ),
            (SESSION_NAME_ENV.to_owned(), name.to_string()),
        ];
        let command = config.launch_command()?;

        if let Err(err) =
            handoff::spawn(state.mux.as_ref(), &name, working_dir, &command, &env).await
        {
            if let Err(cleanup) = state.store.remove(&name) {
                warn!(%cleanup, "failed to remove artifacts of unlaunched session");
            }
            return Err(err);
        }

        let delivered =
            handoff::deliver_prompt(state.mux.as_ref(), &name, &prompt_text, &config.handoff)
                .await?;

        info!(attempts = delivered.attempts, "session spawned");
        Ok(SpawnedSession {
            name,
            target,
            descriptor_path: absolute_descriptor,
            working_dir: working_dir.to_path_buf(),
            delivered,
        })
    }
    .instrument(span)
    .await
}

/// Full spawn: resolve the directory, open the thread, then launch.
///
/// # Errors
///
/// See [`resolve_working_dir`], [`open_thread`] and [`launch_session`].
pub async fn spawn_session(state: &AppState, request: &SpawnRequest) -> Result<SpawnedSession> {
    let working_dir = resolve_working_dir(&state.config, request)?;
    let target = open_thread(state, request.prompt.as_deref()).await?;
    launch_session(state, request, &working_dir, target).await
}
