//! Slack Socket Mode client with a small buffered send queue.

use std::sync::Arc;
use std::time::Duration;

use slack_morphism::prelude::{
    SlackApiToken, SlackApiTokenType, SlackApiTokenValue, SlackClientEventsListenerEnvironment,
    SlackClientSocketModeConfig, SlackClientSocketModeListener, SlackSocketModeListenerCallbacks,
};
use tokio::{sync::mpsc, task::JoinHandle, time::sleep};
use tracing::{error, info, warn};

use crate::models::descriptor::RoutingTarget;
use crate::slack::api::{post_request, HyperClient, SlackApi};
use crate::slack::commands;
use crate::state::AppState;
use crate::transport::{ChatFuture, ChatTransport, MessagePage};
use crate::{config::SlackConfig, AppError, Result};

const QUEUE_CAPACITY: usize = 256;
const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
const MAX_SEND_ATTEMPTS: u32 = 6;

/// Notice to be delivered via chat.postMessage.
#[derive(Debug, Clone)]
pub struct SlackMessage {
    /// Channel or thread receiving the notice.
    pub target: RoutingTarget,
    /// Plain text body.
    pub text: String,
}

/// Slack wrapper owning the outgoing notice queue.
///
/// Threads and reactions go straight to the Web API because their callers
/// need the result; notices are queued and retried with backoff.
pub struct SlackService {
    api: Arc<SlackApi>,
    queue_tx: mpsc::Sender<SlackMessage>,
}

impl SlackService {
    /// Start the Slack client and background sender task.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the HTTPS connector cannot be created.
    pub fn start(config: &SlackConfig, call_timeout: Duration) -> Result<(Self, JoinHandle<()>)> {
        let api = Arc::new(SlackApi::connect(&config.bot_token, call_timeout)?);
        let (queue_tx, queue_rx) = mpsc::channel(QUEUE_CAPACITY);
        let queue_task = Self::spawn_worker(Arc::clone(&api), queue_rx);

        info!("slack service started with buffered queue");
        Ok((Self { api, queue_tx }, queue_task))
    }

    /// Enqueue a notice for async delivery.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the sender task has stopped.
    pub async fn enqueue(&self, message: SlackMessage) -> Result<()> {
        self.queue_tx
            .send(message)
            .await
            .map_err(|err| AppError::Slack(format!("failed to enqueue slack message: {err}")))
    }

    fn spawn_worker(api: Arc<SlackApi>, mut queue_rx: mpsc::Receiver<SlackMessage>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(message) = queue_rx.recv().await {
                let request = post_request(&message.target, &message.text);
                let mut backoff = INITIAL_RETRY_DELAY;
                for attempt in 1..=MAX_SEND_ATTEMPTS {
                    match api.session().chat_post_message(&request).await {
                        Ok(_) => {
                            info!(channel = %message.target.channel_id, "sent slack message");
                            break;
                        }
                        Err(error) if attempt < MAX_SEND_ATTEMPTS => {
                            let delay = match &error {
                                slack_morphism::errors::SlackClientError::RateLimitError(rate) => {
                                    rate.retry_after.unwrap_or(backoff)
                                }
                                _ => backoff,
                            };
                            warn!(?error, delay = ?delay, attempt, "slack post failed; retrying");
                            sleep(delay).await;
                            backoff = (backoff * 2).min(MAX_RETRY_DELAY);
                        }
                        Err(error) => {
                            error!(?error, "slack post failed; dropping message");
                        }
                    }
                }
            }
            info!("slack sender task exiting");
        })
    }

    /// Listen for slash commands, handing `state` to every handler.
    #[must_use]
    pub fn spawn_socket_mode(&self, app_token: &str, state: Arc<AppState>) -> JoinHandle<()> {
        let app_token = SlackApiToken {
            token_value: SlackApiTokenValue(app_token.to_owned()),
            cookie: None,
            team_id: None,
            scope: None,
            token_type: Some(SlackApiTokenType::App),
        };
        let client: Arc<HyperClient> = Arc::clone(self.api.client());
        let listener_env = Arc::new(
            SlackClientEventsListenerEnvironment::new(client)
                .with_error_handler(|err, _client, _state| {
                    error!(?err, "socket mode error");
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR
                })
                .with_user_state(state),
        );
        let callbacks = SlackSocketModeListenerCallbacks::new()
            .with_hello_events(|event, _client, _state| async move {
                info!(?event, "socket hello");
            })
            .with_command_events(commands::handle_command)
            .with_push_events(|event, _client, _state| async move {
                info!(?event, "push event ignored");
                Ok(())
            });
        let config = SlackClientSocketModeConfig {
            max_connections_count: SlackClientSocketModeConfig::DEFAULT_CONNECTIONS_COUNT,
            debug_connections: SlackClientSocketModeConfig::DEFAULT_DEBUG_CONNECTIONS,
            initial_backoff_in_seconds:
                SlackClientSocketModeConfig::DEFAULT_INITIAL_BACKOFF_IN_SECONDS,
            reconnect_timeout_in_seconds:
                SlackClientSocketModeConfig::DEFAULT_RECONNECT_TIMEOUT_IN_SECONDS,
            ping_interval_in_seconds: SlackClientSocketModeConfig::DEFAULT_PING_INTERVAL_IN_SECONDS,
            ping_failure_threshold_times:
                SlackClientSocketModeConfig::DEFAULT_PING_FAILURE_THRESHOLD_TIMES,
        };

        let listener = SlackClientSocketModeListener::new(&config, listener_env, callbacks);
        tokio::spawn(async move {
            if let Err(error) = listener.listen_for(&app_token).await {
                error!(?error, "socket mode listen failed");
                return;
            }

            listener.serve().await;
            info!("socket mode listener exited");
        })
    }
}

impl ChatTransport for SlackService {
    fn create_thread<'a>(
        &'a self,
        parent_channel: &'a str,
        name: &'a str,
    ) -> ChatFuture<'a, RoutingTarget> {
        self.api.create_thread(parent_channel, name)
    }

    fn list_messages<'a>(
        &'a self,
        target: &'a RoutingTarget,
        cursor: Option<&'a str>,
        limit: u16,
    ) -> ChatFuture<'a, MessagePage> {
        self.api.list_messages(target, cursor, limit)
    }

    fn post_message<'a>(
        &'a self,
        target: &'a RoutingTarget,
        text: &'a str,
    ) -> ChatFuture<'a, ()> {
        Box::pin(async move {
            self.enqueue(SlackMessage {
                target: target.clone(),
                text: text.to_owned(),
            })
            .await
        })
    }

    fn add_reaction<'a>(
        &'a self,
        target: &'a RoutingTarget,
        message_id: &'a str,
        emoji: &'a str,
    ) -> ChatFuture<'a, ()> {
        self.api.add_reaction(target, message_id, emoji)
    }

    fn remove_reaction<'a>(
        &'a self,
        target: &'a RoutingTarget,
        message_id: &'a str,
        emoji: &'a str,
    ) -> ChatFuture<'a, ()> {
        self.api.remove_reaction(target, message_id, emoji)
    }
}
