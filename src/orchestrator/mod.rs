//! Session orchestration.
//!
//! Naming, descriptor publication, detached launch with prompt handoff,
//! discovery of live sessions, and kill with cleanup.

pub mod descriptor_store;
pub mod handoff;
pub mod naming;
pub mod prompt;
pub mod registry;
pub mod spawner;
pub mod terminator;
