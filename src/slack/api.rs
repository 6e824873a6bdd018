//! Direct Slack Web API calls behind [`ChatTransport`].
//!
//! Threads are parent messages in the command channel; the thread id is the
//! parent's `ts`. Markers are emoji reactions.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use slack_morphism::prelude::{
    SlackApiChatPostMessageRequest, SlackApiConversationsHistoryRequest,
    SlackApiConversationsRepliesRequest, SlackApiReactionsAddRequest,
    SlackApiReactionsRemoveRequest, SlackApiToken, SlackApiTokenType, SlackApiTokenValue,
    SlackChannelId, SlackClient, SlackClientHyperHttpsConnector, SlackClientSession,
    SlackCursorId, SlackHistoryMessage, SlackMessageContent, SlackReactionName,
    SlackResponseMetadata, SlackTs,
};
use tracing::debug;

use crate::models::descriptor::RoutingTarget;
use crate::transport::{ChatFuture, ChatMessage, ChatTransport, MessagePage};
use crate::{AppError, Result};

/// Shared hyper-backed Slack client.
pub type HyperClient = SlackClient<SlackClientHyperHttpsConnector>;

/// Bot-token Slack client with a timeout on every call.
pub struct SlackApi {
    client: Arc<HyperClient>,
    token: SlackApiToken,
    call_timeout: Duration,
}

impl SlackApi {
    /// Build a client with its own HTTPS connector.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the HTTPS connector cannot be created.
    pub fn connect(bot_token: &str, call_timeout: Duration) -> Result<Self> {
        let connector = SlackClientHyperHttpsConnector::new()
            .map_err(|err| AppError::Slack(format!("failed to init slack connector: {err}")))?;
        Ok(Self::with_client(
            Arc::new(SlackClient::new(connector)),
            bot_token,
            call_timeout,
        ))
    }

    /// Reuse an existing client.
    #[must_use]
    pub fn with_client(client: Arc<HyperClient>, bot_token: &str, call_timeout: Duration) -> Self {
        Self {
            client,
            token: bot_token_of(bot_token),
            call_timeout,
        }
    }

    /// Underlying client, shared with Socket Mode.
    #[must_use]
    pub fn client(&self) -> &Arc<HyperClient> {
        &self.client
    }

    /// HTTP session authenticated with the bot token.
    #[must_use]
    pub fn session(&self) -> SlackClientSession<'_, SlackClientHyperHttpsConnector> {
        self.client.open_session(&self.token)
    }

    async fn bounded<T, E, F>(&self, what: &str, call: F) -> Result<T>
    where
        E: std::fmt::Display,
        F: Future<Output = std::result::Result<T, E>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(AppError::Slack(format!("{what} failed: {err}"))),
            Err(_) => Err(AppError::Slack(format!(
                "{what} timed out after {}s",
                self.call_timeout.as_secs()
            ))),
        }
    }

    async fn post(&self, target: &RoutingTarget, text: &str) -> Result<SlackTs> {
        let request = post_request(target, text);
        let session = self.session();
        let response = self
            .bounded("chat.postMessage", session.chat_post_message(&request))
            .await?;
        Ok(response.ts)
    }
}

/// Build a bot token for direct API calls.
#[must_use]
pub fn bot_token_of(value: &str) -> SlackApiToken {
    SlackApiToken {
        token_value: SlackApiTokenValue(value.to_owned()),
        cookie: None,
        team_id: None,
        scope: None,
        token_type: Some(SlackApiTokenType::Bot),
    }
}

/// `chat.postMessage` request for a plain-text line.
#[must_use]
pub fn post_request(target: &RoutingTarget, text: &str) -> SlackApiChatPostMessageRequest {
    SlackApiChatPostMessageRequest {
        channel: SlackChannelId(target.channel_id.clone()),
        content: SlackMessageContent::new().with_text(text.to_owned()),
        as_user: None,
        icon_emoji: None,
        icon_url: None,
        link_names: Some(true),
        parse: None,
        thread_ts: target.thread_ts.clone().map(SlackTs),
        username: None,
        reply_broadcast: None,
        unfurl_links: None,
        unfurl_media: None,
    }
}

fn next_cursor_of(metadata: Option<SlackResponseMetadata>) -> Option<String> {
    metadata
        .and_then(|meta| meta.next_cursor)
        .map(|cursor| cursor.0)
        .filter(|cursor| !cursor.is_empty())
}

fn to_chat_message(message: SlackHistoryMessage) -> ChatMessage {
    ChatMessage {
        id: message.origin.ts.0,
        text: message.content.text,
    }
}

impl ChatTransport for SlackApi {
    fn create_thread<'a>(
        &'a self,
        parent_channel: &'a str,
        name: &'a str,
    ) -> ChatFuture<'a, RoutingTarget> {
        Box::pin(async move {
            let channel = RoutingTarget {
                channel_id: parent_channel.to_owned(),
                thread_ts: None,
            };
            let ts = self.post(&channel, name).await?;
            debug!(channel = parent_channel, ts = %ts.0, "thread opened");
            Ok(RoutingTarget::thread(parent_channel, ts.0))
        })
    }

    fn list_messages<'a>(
        &'a self,
        target: &'a RoutingTarget,
        cursor: Option<&'a str>,
        limit: u16,
    ) -> ChatFuture<'a, MessagePage> {
        Box::pin(async move {
            let channel = SlackChannelId(target.channel_id.clone());
            let session = self.session();
            match target.thread_ts {
                Some(ref ts) => {
                    // Replies come oldest first, parent included; newer ones
                    // sit behind the cursor.
                    let request =
                        SlackApiConversationsRepliesRequest::new(channel, SlackTs(ts.clone()))
                            .with_limit(limit)
                            .opt_cursor(cursor.map(|c| SlackCursorId(c.to_owned())));
                    let response = self
                        .bounded("conversations.replies", session.conversations_replies(&request))
                        .await?;
                    Ok(MessagePage {
                        messages: response.messages.into_iter().map(to_chat_message).collect(),
                        next_cursor: next_cursor_of(response.response_metadata),
                    })
                }
                None => {
                    // History comes newest first, so the first page already
                    // holds the newest messages.
                    let request = SlackApiConversationsHistoryRequest::new()
                        .with_channel(channel)
                        .with_limit(limit);
                    let mut messages = self
                        .bounded("conversations.history", session.conversations_history(&request))
                        .await?
                        .messages;
                    messages.reverse();
                    Ok(MessagePage {
                        messages: messages.into_iter().map(to_chat_message).collect(),
                        next_cursor: None,
                    })
                }
            }
        })
    }

    fn post_message<'a>(
        &'a self,
        target: &'a RoutingTarget,
        text: &'a str,
    ) -> ChatFuture<'a, ()> {
        Box::pin(async move {
            self.post(target, text).await?;
            Ok(())
        })
    }

    fn add_reaction<'a>(
        &'a self,
        target: &'a RoutingTarget,
        message_id: &'a str,
        emoji: &'a str,
    ) -> ChatFuture<'a, ()> {
        Box::pin(async move {
            let request = SlackApiReactionsAddRequest::new(
                SlackChannelId(target.channel_id.clone()),
                SlackReactionName(emoji.to_owned()),
                SlackTs(message_id.to_owned()),
            );
            let session = self.session();
            self.bounded("reactions.add", session.reactions_add(&request))
                .await?;
            Ok(())
        })
    }

    fn remove_reaction<'a>(
        &'a self,
        target: &'a RoutingTarget,
        message_id: &'a str,
        emoji: &'a str,
    ) -> ChatFuture<'a, ()> {
        Box::pin(async move {
            let request = SlackApiReactionsRemoveRequest::new(SlackReactionName(emoji.to_owned()))
                .with_channel(SlackChannelId(target.channel_id.clone()))
                .with_timestamp(SlackTs(message_id.to_owned()));
            let session = self.session();
            self.bounded("reactions.remove", session.reactions_remove(&request))
                .await?;
            Ok(())
        })
    }
}
