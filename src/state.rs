//! Shared application state handed to every command handler.

use std::sync::Arc;

use crate::config::GlobalConfig;
use crate::orchestrator::descriptor_store::DescriptorStore;
use crate::tmux::Multiplexer;
use crate::transport::ChatTransport;

/// Dependencies of the orchestration operations.
///
/// Holds no per-session data: the session list lives in tmux and the
/// session details live in the descriptor directory.
pub struct AppState {
    /// Validated configuration with credentials loaded.
    pub config: Arc<GlobalConfig>,
    /// Process multiplexer hosting the agent sessions.
    pub mux: Arc<dyn Multiplexer>,
    /// Chat transport used for threads and notices.
    pub chat: Arc<dyn ChatTransport>,
    /// Session descriptor directory.
    pub store: DescriptorStore,
}

impl AppState {
    /// Build state with the descriptor store rooted at `config.sessions_dir`.
    #[must_use]
    pub fn new(
        config: Arc<GlobalConfig>,
        mux: Arc<dyn Multiplexer>,
        chat: Arc<dyn ChatTransport>,
    ) -> Self {
        let store = DescriptorStore::new(config.sessions_dir.clone());
        Self {
            config,
            mux,
            chat,
            store,
        }
    }
}
