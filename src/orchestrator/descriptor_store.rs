//! Session descriptor directory: `<sessions_dir>/<name>/`.
//!
//! The directory is the only channel between the orchestrator, the agent
//! process and the hook. Writers publish whole files with an atomic rename
//! (`tempfile::NamedTempFile` in the same directory, then persist), so a
//! reader sees either no file or the complete file. Readers tolerate
//! absence; nobody waits on a write.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::models::descriptor::SessionDescriptor;
use crate::orchestrator::naming::SessionName;
use crate::{AppError, Result};

/// Descriptor file name inside a session directory.
pub const DESCRIPTOR_FILE: &str = "config";
/// Initial prompt, kept for the operator.
pub const PROMPT_FILE: &str = "prompt.txt";
/// Hook throttle gate: epoch seconds of the last busy marker.
pub const LAST_SIGNAL_FILE: &str = "last_signal";
/// Hook state: id of the message currently marked busy.
pub const TRACKED_MESSAGE_FILE: &str = "tracked_message";

/// Filesystem layout rooted at the configured sessions directory.
#[derive(Debug, Clone)]
pub struct DescriptorStore {
    base_dir: PathBuf,
}

impl DescriptorStore {
    /// Store rooted at `base_dir`. Nothing is created until the first write.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Root of all session directories.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory owned by one session.
    #[must_use]
    pub fn session_dir(&self, name: &SessionName) -> PathBuf {
        self.base_dir.join(name.as_str())
    }

    /// Deterministic descriptor path for `name`.
    #[must_use]
    pub fn descriptor_path(&self, name: &SessionName) -> PathBuf {
        self.session_dir(name).join(DESCRIPTOR_FILE)
    }

    /// Prompt file path for `name`.
    #[must_use]
    pub fn prompt_path(&self, name: &SessionName) -> PathBuf {
        self.session_dir(name).join(PROMPT_FILE)
    }

    /// Publish the descriptor for a new session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Descriptor` if a descriptor already exists for
    /// `name` (names are single-use) or on any I/O failure.
    pub fn write(&self, name: &SessionName, descriptor: &SessionDescriptor) -> Result<PathBuf> {
        let dir = self.session_dir(name);
        fs::create_dir_all(&dir).map_err(|err| {
            AppError::Descriptor(format!("failed to create {}: {err}", dir.display()))
        })?;

        let path = self.descriptor_path(name);
        let tmp = stage(&dir, descriptor.render().as_bytes())?;
        tmp.persist_noclobber(&path).map_err(|err| {
            if err.error.kind() == ErrorKind::AlreadyExists {
                AppError::Descriptor(format!("descriptor already exists for {name}"))
            } else {
                AppError::Descriptor(format!(
                    "failed to persist {}: {}",
                    path.display(),
                    err.error
                ))
            }
        })?;

        debug!(session = %name, path = %path.display(), "descriptor published");
        Ok(path)
    }

    /// Publish the initial prompt next to the descriptor.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Descriptor` on I/O failure.
    pub fn write_prompt(&self, name: &SessionName, prompt: &str) -> Result<PathBuf> {
        let dir = self.session_dir(name);
        fs::create_dir_all(&dir).map_err(|err| {
            AppError::Descriptor(format!("failed to create {}: {err}", dir.display()))
        })?;

        let path = self.prompt_path(name);
        stage(&dir, prompt.as_bytes())?
            .persist(&path)
            .map_err(|err| {
                AppError::Descriptor(format!(
                    "failed to persist {}: {}",
                    path.display(),
                    err.error
                ))
            })?;
        Ok(path)
    }

    /// Read back the descriptor for `name`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no descriptor is published, or
    /// `AppError::DescriptorRead` if it cannot be read or parsed.
    pub fn read(&self, name: &SessionName) -> Result<SessionDescriptor> {
        read_descriptor(&self.descriptor_path(name))
    }

    /// Remove the session directory with its descriptor, prompt and
    /// sidecar files. Returns whether anything was there.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the directory exists but cannot be removed.
    pub fn remove(&self, name: &SessionName) -> Result<bool> {
        let dir = self.session_dir(name);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(AppError::Io(format!(
                "failed to remove {}: {err}",
                dir.display()
            ))),
        }
    }
}

/// Read and parse a descriptor at an explicit path.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the file does not exist, or
/// `AppError::DescriptorRead` if it cannot be read or parsed.
pub fn read_descriptor(path: &Path) -> Result<SessionDescriptor> {
    let raw = fs::read_to_string(path).map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            AppError::NotFound(format!("descriptor {}", path.display()))
        } else {
            AppError::DescriptorRead(format!("failed to read {}: {err}", path.display()))
        }
    })?;
    SessionDescriptor::parse(&raw)
}

/// Write `bytes` to a temporary file in `dir`, ready to be renamed into place.
fn stage(dir: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|err| AppError::Descriptor(format!("failed to create temporary file: {err}")))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|err| AppError::Descriptor(format!("failed to write temporary file: {err}")))?;
    Ok(tmp)
}
