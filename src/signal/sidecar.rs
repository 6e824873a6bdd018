//! Hook-to-hook state kept next to the session descriptor.
//!
//! Each hook invocation is a fresh process, so the throttle gate and the
//! tracked message survive between invocations only as two small files in
//! the session directory. Readers treat a missing or garbled file as
//! absent.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::orchestrator::descriptor_store::{LAST_SIGNAL_FILE, TRACKED_MESSAGE_FILE};
use crate::{AppError, Result};

/// Sidecar files of one session.
#[derive(Debug, Clone)]
pub struct Sidecar {
    dir: PathBuf,
}

impl Sidecar {
    /// Sidecar files living in `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Sidecar files in the directory holding `descriptor_path`.
    #[must_use]
    pub fn beside(descriptor_path: &Path) -> Self {
        Self::new(
            descriptor_path
                .parent()
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
        )
    }

    /// Epoch seconds of the last busy marker.
    #[must_use]
    pub fn last_signal(&self) -> Option<u64> {
        read_trimmed(&self.dir.join(LAST_SIGNAL_FILE)).and_then(|raw| raw.parse().ok())
    }

    /// Close the throttle gate at `now`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file cannot be written.
    pub fn set_last_signal(&self, now: u64) -> Result<()> {
        publish(&self.dir, LAST_SIGNAL_FILE, &now.to_string())
    }

    /// Open the throttle gate.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file exists but cannot be removed.
    pub fn clear_last_signal(&self) -> Result<()> {
        remove(&self.dir.join(LAST_SIGNAL_FILE))
    }

    /// Id of the message currently marked busy.
    #[must_use]
    pub fn tracked_message(&self) -> Option<String> {
        read_trimmed(&self.dir.join(TRACKED_MESSAGE_FILE))
    }

    /// Record the message that now carries the busy marker.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file cannot be written.
    pub fn set_tracked_message(&self, message_id: &str) -> Result<()> {
        publish(&self.dir, TRACKED_MESSAGE_FILE, message_id)
    }

    /// Forget the tracked message.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file exists but cannot be removed.
    pub fn clear_tracked_message(&self) -> Result<()> {
        remove(&self.dir.join(TRACKED_MESSAGE_FILE))
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|raw| raw.trim().to_owned())
        .filter(|raw| !raw.is_empty())
}

fn publish(dir: &Path, file: &str, value: &str) -> Result<()> {
    let path = dir.join(file);
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(value.as_bytes())?;
    tmp.persist(&path).map_err(|err| {
        AppError::Io(format!("failed to persist {}: {}", path.display(), err.error))
    })?;
    Ok(())
}

fn remove(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}
