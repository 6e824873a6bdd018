//! Status signal hook.
//!
//! Invoked by the agent on lifecycle events. Marks the newest message of
//! the session thread busy while tools run and done when the agent stops.
//! Every external call is best-effort: the hook must never fail the
//! agent.

pub mod machine;
pub mod sidecar;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info_span, warn, Instrument};

use crate::models::descriptor::SessionDescriptor;
use crate::orchestrator::descriptor_store::read_descriptor;
use crate::transport::ChatTransport;
use crate::{AppError, Result};

pub use machine::{SignalOutcome, SignalState, StatusSignal};
pub use sidecar::Sidecar;

/// Agent lifecycle event the hook reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    /// A tool is about to run.
    PreTool,
    /// The agent finished its turn.
    Stop,
}

impl FromStr for HookAction {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "pre_tool" => Ok(Self::PreTool),
            "stop" => Ok(Self::Stop),
            other => Err(AppError::Config(format!("unknown hook action: {other}"))),
        }
    }
}

impl fmt::Display for HookAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PreTool => "pre_tool",
            Self::Stop => "stop",
        })
    }
}

/// Run one hook invocation against the descriptor at `descriptor_path`.
///
/// `connect` builds the chat transport from the descriptor's credential;
/// it is only called once the descriptor has been read. A missing or
/// unreadable descriptor is a silent no-op.
pub async fn run<F>(
    action: HookAction,
    descriptor_path: &Path,
    connect: F,
    now: u64,
) -> SignalOutcome
where
    F: FnOnce(&SessionDescriptor) -> Result<Arc<dyn ChatTransport>>,
{
    let span = info_span!("status_signal", %action, descriptor = %descriptor_path.display());
    async move {
        let descriptor = match read_descriptor(descriptor_path) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                debug!(%err, "no usable descriptor");
                return SignalOutcome::NoDescriptor;
            }
        };

        let transport = match connect(&descriptor) {
            Ok(transport) => transport,
            Err(err) => {
                warn!(%err, "chat transport unavailable");
                return SignalOutcome::Unavailable;
            }
        };

        StatusSignal::new(
            transport.as_ref(),
            &descriptor,
            Sidecar::beside(descriptor_path),
        )
        .handle(action, now)
        .await
    }
    .instrument(span)
    .await
}
