//! Chat transport seam.
//!
//! The orchestrator and the hook only need a handful of chat operations:
//! open a thread, read its recent messages, post a line, and add or remove
//! a reaction. [`ChatTransport`] decouples both from Slack so tests can run
//! against an in-memory transport.

use std::future::Future;
use std::pin::Pin;

use tracing::warn;

use crate::models::descriptor::RoutingTarget;
use crate::Result;

/// Boxed future returned by [`ChatTransport`] methods.
pub type ChatFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A message as seen by the status signal hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Transport message id (the Slack `ts`).
    pub id: String,
    /// Message text, when the transport returned one.
    pub text: Option<String>,
}

/// One page of a conversation, oldest message first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    /// Messages of this page, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Set while newer messages remain; pass it back to read the next page.
    pub next_cursor: Option<String>,
}

/// Remote chat service used by the orchestrator and the hook.
pub trait ChatTransport: Send + Sync {
    /// Create a thread under `parent_channel` titled `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Slack`](crate::AppError::Slack) if the thread
    /// cannot be created.
    fn create_thread<'a>(
        &'a self,
        parent_channel: &'a str,
        name: &'a str,
    ) -> ChatFuture<'a, RoutingTarget>;

    /// One page of up to `limit` messages of `target`, starting at `cursor`
    /// (the beginning when `None`).
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Slack`](crate::AppError::Slack) on API failure.
    fn list_messages<'a>(
        &'a self,
        target: &'a RoutingTarget,
        cursor: Option<&'a str>,
        limit: u16,
    ) -> ChatFuture<'a, MessagePage>;

    /// Post a plain-text message to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Slack`](crate::AppError::Slack) on API failure.
    fn post_message<'a>(&'a self, target: &'a RoutingTarget, text: &'a str)
        -> ChatFuture<'a, ()>;

    /// Add `emoji` to a message.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Slack`](crate::AppError::Slack) on API failure.
    fn add_reaction<'a>(
        &'a self,
        target: &'a RoutingTarget,
        message_id: &'a str,
        emoji: &'a str,
    ) -> ChatFuture<'a, ()>;

    /// Remove `emoji` from a message.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Slack`](crate::AppError::Slack) on API failure.
    fn remove_reaction<'a>(
        &'a self,
        target: &'a RoutingTarget,
        message_id: &'a str,
        emoji: &'a str,
    ) -> ChatFuture<'a, ()>;
}

/// Messages requested per page when scanning for the newest one.
pub const PAGE_SIZE: u16 = 200;

/// Pages read before settling for the newest message seen so far.
pub const MAX_PAGES: usize = 50;

/// The newest message of `target`, if any.
///
/// Thread replies are served oldest first, so this walks every page.
///
/// # Errors
///
/// Propagates the transport failure.
pub async fn latest_message(
    transport: &dyn ChatTransport,
    target: &RoutingTarget,
) -> Result<Option<ChatMessage>> {
    let mut cursor: Option<String> = None;
    let mut latest = None;
    for _ in 0..MAX_PAGES {
        let page = transport
            .list_messages(target, cursor.as_deref(), PAGE_SIZE)
            .await?;
        if let Some(last) = page.messages.into_iter().last() {
            latest = Some(last);
        }
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => return Ok(latest),
        }
    }
    warn!(pages = MAX_PAGES, "conversation longer than the scan limit");
    Ok(latest)
}
