//! Busy/done reaction state machine driven by agent lifecycle events.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::models::descriptor::SessionDescriptor;
use crate::signal::sidecar::Sidecar;
use crate::transport::{self, ChatMessage, ChatTransport};

use super::HookAction;

/// Where a session stands between hook invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalState {
    /// No message carries the busy marker.
    Idle,
    /// A busy signal went out (the throttle gate is stamped) but no message
    /// is recorded as carrying the marker, for instance because the add
    /// failed or is still in flight.
    Signaling,
    /// `message_id` carries the busy marker.
    Working {
        /// Id of the marked message.
        message_id: String,
    },
}

/// What one hook invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    /// The descriptor was missing or unreadable; nothing was called.
    NoDescriptor,
    /// The chat transport could not be built.
    Unavailable,
    /// `pre_tool` inside the throttle window.
    Throttled,
    /// The thread had no message to mark.
    NoMessage,
    /// `pre_tool` left `message_id` marked busy.
    Busy {
        /// Message carrying the busy marker.
        message_id: String,
    },
    /// `stop` cleared the busy marker and marked the latest message done.
    Done {
        /// Message whose busy marker was removed.
        cleared: Option<String>,
        /// Message that received the done marker.
        marked: Option<String>,
    },
}

/// One session's status signal, bound to its descriptor and sidecar files.
pub struct StatusSignal<'a> {
    transport: &'a dyn ChatTransport,
    descriptor: &'a SessionDescriptor,
    sidecar: Sidecar,
}

impl<'a> StatusSignal<'a> {
    /// Bind the machine to one session.
    #[must_use]
    pub fn new(
        transport: &'a dyn ChatTransport,
        descriptor: &'a SessionDescriptor,
        sidecar: Sidecar,
    ) -> Self {
        Self {
            transport,
            descriptor,
            sidecar,
        }
    }

    /// State recovered from the sidecar files.
    #[must_use]
    pub fn state(&self) -> SignalState {
        match (self.sidecar.tracked_message(), self.sidecar.last_signal()) {
            (Some(message_id), _) => SignalState::Working { message_id },
            (None, Some(_)) => SignalState::Signaling,
            (None, None) => SignalState::Idle,
        }
    }

    /// Whether a busy marker placed at `now` would fall inside the window.
    ///
    /// A gate stamped in the future (clock stepped back) counts as open.
    #[must_use]
    pub fn gate_closed(&self, now: u64) -> bool {
        self.sidecar.last_signal().is_some_and(|last| {
            now >= last && now - last < self.descriptor.signal.throttle_seconds
        })
    }

    /// Apply one lifecycle event observed at `now` (epoch seconds).
    pub async fn handle(&self, action: HookAction, now: u64) -> SignalOutcome {
        match action {
            HookAction::PreTool => self.pre_tool(now).await,
            HookAction::Stop => self.stop().await,
        }
    }

    async fn pre_tool(&self, now: u64) -> SignalOutcome {
        if self.gate_closed(now) {
            debug!("busy signal throttled");
            return SignalOutcome::Throttled;
        }

        let previous = self.state();
        let Some(latest) = self.latest().await else {
            return SignalOutcome::NoMessage;
        };
        debug!(from = ?previous, to = ?SignalState::Signaling, "signaling");

        let already_marked =
            matches!(&previous, SignalState::Working { message_id } if *message_id == latest.id);

        if !already_marked {
            if let SignalState::Working { ref message_id } = previous {
                self.remove_marker(message_id, &self.descriptor.signal.busy_reaction)
                    .await;
            }
            let added = self
                .best_effort(
                    "add busy marker",
                    self.transport.add_reaction(
                        &self.descriptor.target,
                        &latest.id,
                        &self.descriptor.signal.busy_reaction,
                    ),
                )
                .await
                .is_some();
            if added {
                log_io("tracked_message", self.sidecar.set_tracked_message(&latest.id));
            } else if matches!(previous, SignalState::Working { .. }) {
                log_io("tracked_message", self.sidecar.clear_tracked_message());
            }
        }

        log_io("last_signal", self.sidecar.set_last_signal(now));
        info!(message_id = %latest.id, "busy signal");
        SignalOutcome::Busy {
            message_id: latest.id,
        }
    }

    async fn stop(&self) -> SignalOutcome {
        let cleared = match self.state() {
            SignalState::Working { message_id } => {
                self.remove_marker(&message_id, &self.descriptor.signal.busy_reaction)
                    .await;
                log_io("tracked_message", self.sidecar.clear_tracked_message());
                Some(message_id)
            }
            SignalState::Idle | SignalState::Signaling => None,
        };

        let mut marked = None;
        if let Some(latest) = self.latest().await {
            let added = self
                .best_effort(
                    "add done marker",
                    self.transport.add_reaction(
                        &self.descriptor.target,
                        &latest.id,
                        &self.descriptor.signal.done_reaction,
                    ),
                )
                .await;
            if added.is_some() {
                marked = Some(latest.id);
            }
        }

        log_io("last_signal", self.sidecar.clear_last_signal());
        info!(?cleared, ?marked, "done signal");
        SignalOutcome::Done { cleared, marked }
    }

    async fn latest(&self) -> Option<ChatMessage> {
        self.best_effort(
            "fetch latest message",
            transport::latest_message(self.transport, &self.descriptor.target),
        )
        .await
        .flatten()
    }

    async fn remove_marker(&self, message_id: &str, emoji: &str) {
        self.best_effort(
            "remove marker",
            self.transport
                .remove_reaction(&self.descriptor.target, message_id, emoji),
        )
        .await;
    }

    /// Run one transport call under the per-call timeout. Failures are
    /// logged and turned into `None`.
    async fn best_effort<T, F>(&self, what: &str, call: F) -> Option<T>
    where
        F: Future<Output = crate::Result<T>>,
    {
        let limit = Duration::from_secs(self.descriptor.signal.call_timeout_seconds);
        match tokio::time::timeout(limit, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                warn!(%err, "{what} failed");
                None
            }
            Err(_) => {
                warn!(timeout_secs = limit.as_secs(), "{what} timed out");
                None
            }
        }
    }
}

fn log_io(file: &str, result: crate::Result<()>) {
    if let Err(err) = result {
        warn!(file, %err, "sidecar update failed");
    }
}
