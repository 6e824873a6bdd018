//! Slack slash command router.
//!
//! `/claude [dir:<path>] [project] [prompt...]`, `/sessions` and
//! `/kill <name>`. Commands are accepted only from the configured command
//! channel and, when an allow-list is set, only from listed users.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use slack_morphism::prelude::{
    SlackClient, SlackClientEventsUserState, SlackClientHyperHttpsConnector, SlackCommandEvent,
    SlackCommandEventResponse, SlackMessageContent, SlackMessageResponseType,
};
use tracing::{error, info, info_span, warn, Instrument};

use crate::models::descriptor::RoutingTarget;
use crate::models::session::{KillOutcome, SessionInfo};
use crate::orchestrator::spawner::{self, SpawnRequest};
use crate::orchestrator::{registry, terminator};
use crate::state::AppState;

const DIR_PREFIX: &str = "dir:";

/// Handle incoming slash commands routed via Socket Mode.
///
/// # Errors
///
/// Never fails; problems are reported back to the user ephemerally.
pub async fn handle_command(
    event: SlackCommandEvent,
    _client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
    state: SlackClientEventsUserState,
) -> slack_morphism::AnyStdResult<SlackCommandEventResponse> {
    info!(command = ?event.command, user = ?event.user_id, "received slash command");

    let app_state: Option<Arc<AppState>> = {
        let guard = state.read().await;
        guard.get_user_state::<Arc<AppState>>().cloned()
    };

    let text = match app_state {
        Some(app) => {
            dispatch(
                &app,
                &event.command.0,
                event.text.as_deref().unwrap_or_default(),
                &event.channel_id.0,
                &event.user_id.0,
            )
            .await
        }
        None => {
            warn!("app state not available; cannot process command");
            "Command runner is still starting, try again shortly.".to_owned()
        }
    };

    Ok(ephemeral(text))
}

fn ephemeral(text: String) -> SlackCommandEventResponse {
    SlackCommandEventResponse {
        content: SlackMessageContent::new().with_text(text),
        response_type: Some(SlackMessageResponseType::Ephemeral),
    }
}

/// Route one command and return the reply shown to the invoking user.
pub async fn dispatch(
    state: &Arc<AppState>,
    command: &str,
    text: &str,
    channel_id: &str,
    user_id: &str,
) -> String {
    if state.config.ensure_command_channel(channel_id).is_err() {
        info!(channel_id, "command outside the command channel refused");
        return "This command can only be used in the designated command channel.".to_owned();
    }
    if state.config.ensure_authorized(user_id).is_err() {
        warn!(user_id, "unauthorized user attempted a command");
        return "You are not authorized to manage sessions.".to_owned();
    }

    match command.trim_start_matches('/') {
        "claude" => start(state, text),
        "sessions" => sessions(state).await,
        "kill" => kill(state, text.trim()).await,
        other => format!("Unknown command `/{other}`."),
    }
}

/// Split `/claude` arguments into a spawn request.
///
/// A leading `dir:<path>` token sets the working directory. The next token
/// is taken as the project when it names a directory under `projects_root`;
/// everything else is the prompt.
#[must_use]
pub fn parse_spawn_args(text: &str, projects_root: &Path) -> SpawnRequest {
    let mut rest = text.trim();
    let mut request = SpawnRequest::default();

    if let Some(after) = rest.strip_prefix(DIR_PREFIX) {
        let (dir, tail) = split_word(after);
        if !dir.is_empty() {
            request.working_dir = Some(PathBuf::from(dir));
        }
        rest = tail;
    }

    if request.working_dir.is_none() {
        let (word, tail) = split_word(rest);
        let is_project = !word.is_empty()
            && !word.starts_with('.')
            && (Path::new(word).is_absolute() || !word.contains('/'))
            && projects_root.join(word).is_dir();
        if is_project {
            request.project = Some(word.to_owned());
            rest = tail;
        }
    }

    let prompt = rest.trim();
    if !prompt.is_empty() {
        request.prompt = Some(prompt.to_owned());
    }
    request
}

fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(idx) => (&text[..idx], text[idx..].trim_start()),
        None => (text, ""),
    }
}

/// Acknowledge immediately and run the spawn in the background.
fn start(state: &Arc<AppState>, text: &str) -> String {
    let request = parse_spawn_args(text, state.config.default_working_dir());
    let working_dir = match spawner::resolve_working_dir(&state.config, &request) {
        Ok(dir) => dir,
        Err(err) => return format!("Cannot start a session: {err}"),
    };

    let ack = format!(
        "Starting a Claude session in `{}`. Follow the new thread in this channel.",
        working_dir.display()
    );

    let state = Arc::clone(state);
    let span = info_span!("slash_claude", dir = %working_dir.display());
    tokio::spawn(
        async move {
            run_spawn(&state, &request, &working_dir).await;
        }
        .instrument(span),
    );

    ack
}

async fn run_spawn(state: &AppState, request: &SpawnRequest, working_dir: &Path) {
    let channel = RoutingTarget {
        channel_id: state.config.slack.channel_id.clone(),
        thread_ts: None,
    };

    let target = match spawner::open_thread(state, request.prompt.as_deref()).await {
        Ok(target) => target,
        Err(err) => {
            error!(%err, "thread creation failed");
            notify(state, &channel, &format!("Failed to start session: {err}")).await;
            return;
        }
    };

    let notice = match spawner::launch_session(state, request, working_dir, target.clone()).await
    {
        Ok(session) => format!(
            "Claude session `{}` started. Initializing...",
            session.name
        ),
        Err(err) => {
            error!(%err, "spawn failed");
            format!("Failed to start session: {err}")
        }
    };
    notify(state, &target, &notice).await;
}

async fn notify(state: &AppState, target: &RoutingTarget, text: &str) {
    if let Err(err) = state.chat.post_message(target, text).await {
        warn!(%err, "failed to post notice");
    }
}

async fn sessions(state: &AppState) -> String {
    match registry::list_active(state.mux.as_ref()).await {
        Ok(list) => render_sessions(&list),
        Err(err) => {
            error!(%err, "session listing failed");
            format!("Could not list sessions: {err}")
        }
    }
}

/// Reply body for `/sessions`.
#[must_use]
pub fn render_sessions(sessions: &[SessionInfo]) -> String {
    if sessions.is_empty() {
        return "No active Claude sessions.".to_owned();
    }
    let mut out = String::from("*Active Claude sessions:*");
    for session in sessions {
        let _ = write!(
            out,
            "\n• `{}` started {} ({})",
            session.name,
            session.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            session.age_display()
        );
    }
    out
}

async fn kill(state: &AppState, name: &str) -> String {
    if name.is_empty() {
        return "Usage: `/kill <session name>`".to_owned();
    }
    match terminator::kill(state.mux.as_ref(), &state.store, name).await {
        Ok(KillOutcome::Killed) => format!("Session `{name}` killed and cleaned up."),
        Ok(KillOutcome::NotFound) => {
            format!("No session named `{name}` (nothing to clean up).")
        }
        Err(err) => {
            error!(%err, session = name, "kill failed");
            format!("Failed to kill session `{name}`: {err}")
        }
    }
}
