//! The boundary between the sync client and everything that touches the
//! filesystem or the user's native dialogs.

use std::path::{Path, PathBuf};

use crossbeam_channel::Receiver;
use livefs::{DirectoryEntry, WatchCoordinator, WatchEvent, WatchTiming};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("could not read {}: {message}", path.display())]
pub struct ReadError {
    pub path: PathBuf,
    pub message: String,
}

impl ReadError {
    pub fn new(path: &Path, err: impl std::fmt::Display) -> Self {
        Self {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

/// Filesystem access and watch control, as seen from the client.
///
/// None of these calls fail loudly: reads and listings report a
/// [`ReadError`], and watch requests that cannot be honoured simply leave the
/// slot empty.
pub trait Host {
    fn read_file(&mut self, path: &Path) -> Result<String, ReadError>;
    fn list_directory(&mut self, path: &Path) -> Result<Vec<DirectoryEntry>, ReadError>;
    fn is_directory(&mut self, path: &Path) -> bool;

    fn start_file_watch(&mut self, path: &Path);
    fn stop_file_watch(&mut self);
    fn start_dir_watch(&mut self, path: &Path);
    fn stop_dir_watch(&mut self);
}

/// Asks the user for a path. `None` means the user cancelled.
pub trait Picker {
    fn pick_file(&mut self) -> Option<PathBuf>;
    fn pick_directory(&mut self) -> Option<PathBuf>;
}

/// A [`Host`] backed by the local filesystem and a [`WatchCoordinator`].
pub struct LocalHost {
    coordinator: WatchCoordinator,
}

impl LocalHost {
    /// Creates a host along with the stream of change events its watches
    /// produce.
    pub fn new(timing: WatchTiming) -> (Self, Receiver<WatchEvent>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let host = Self {
            coordinator: WatchCoordinator::new(timing, sender),
        };
        (host, receiver)
    }

    pub fn coordinator(&mut self) -> &mut WatchCoordinator {
        &mut self.coordinator
    }
}

impl Host for LocalHost {
    fn read_file(&mut self, path: &Path) -> Result<String, ReadError> {
        livefs::read_file(path).map_err(|err| ReadError::new(path, err))
    }

    fn list_directory(&mut self, path: &Path) -> Result<Vec<DirectoryEntry>, ReadError> {
        livefs::list_directory(path).map_err(|err| ReadError::new(path, err))
    }

    fn is_directory(&mut self, path: &Path) -> bool {
        path.is_dir()
    }

    fn start_file_watch(&mut self, path: &Path) {
        self.coordinator.watch_file(path);
    }

    fn stop_file_watch(&mut self) {
        self.coordinator.unwatch_file();
    }

    fn start_dir_watch(&mut self, path: &Path) {
        self.coordinator.watch_directory(path);
    }

    fn stop_dir_watch(&mut self) {
        self.coordinator.unwatch_directory();
    }
}
