/*!
Single-slot filesystem watching for a document viewer.

livefs owns the privileged half of the viewer: it reads files, lists
directories, and keeps at most one file watch and one directory watch alive at
a time. Changes are reported as [`WatchEvent`]s over a channel so that the
consumer can live on a different thread (or, conceptually, in a different
process).

## Watches
* File watches poll the target's metadata on a fixed interval. Polling
  survives editors that save by renaming a temporary file over the original.
* Directory watches use the `notify` crate and coalesce bursts of raw
  notifications through a [`DebounceTimer`], emitting a single
  [`WatchEvent::DirChanged`] per quiet period.

Failures never cross the channel. A file that cannot be read produces no
event, and a directory watch that breaks quietly empties its slot.
*/

mod debounce;
mod dir_watch;
mod file_watch;
mod listing;
mod slot;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::Sender;

pub use debounce::DebounceTimer;
pub use dir_watch::{DirWatch, Debouncer, RawSignal};
pub use file_watch::FileWatch;
pub use listing::{list_directory, read_file, DirectoryEntry};
pub use slot::WatchSlot;

/// How often a watched file's metadata is checked.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How long a watched directory has to stay quiet before a change is reported.
pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_millis(250);

/// Trait that transforms `io::Result<T>` into `io::Result<Option<T>>`.
///
/// `Ok(None)` takes the place of IO errors whose `io::ErrorKind` is `NotFound`.
pub trait IoResultExt<T> {
    fn with_not_found(self) -> io::Result<Option<T>>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn with_not_found(self) -> io::Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(err) => {
                if err.kind() == io::ErrorKind::NotFound {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }
}

/// A change notification pushed from the coordinator to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The watched file was modified. Carries the full, freshly read content.
    FileChanged { path: PathBuf, content: String },

    /// Something inside the watched directory changed.
    DirChanged { path: PathBuf },
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::FileChanged { path, .. } | WatchEvent::DirChanged { path } => path,
        }
    }
}

/// Timing parameters for the two watch kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchTiming {
    pub poll_interval: Duration,
    pub debounce_delay: Duration,
}

impl Default for WatchTiming {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            debounce_delay: DEFAULT_DEBOUNCE_DELAY,
        }
    }
}

/// Owns the file watch slot and the directory watch slot.
///
/// Every start/stop goes through this object, so within a slot the calls are
/// strictly ordered: replacing a watch tears the old one down completely
/// (its thread is joined) before the new one starts.
pub struct WatchCoordinator {
    timing: WatchTiming,
    event_sender: Sender<WatchEvent>,
    file_slot: WatchSlot<FileWatch>,
    dir_slot: WatchSlot<DirWatch>,
}

impl WatchCoordinator {
    pub fn new(timing: WatchTiming, event_sender: Sender<WatchEvent>) -> Self {
        Self {
            timing,
            event_sender,
            file_slot: WatchSlot::new(),
            dir_slot: WatchSlot::new(),
        }
    }

    /// Starts polling `path`, cancelling whatever file watch was active.
    pub fn watch_file(&mut self, path: &Path) {
        let interval = self.timing.poll_interval;
        let sender = self.event_sender.clone();

        self.file_slot.replace(|| {
            match FileWatch::start(path.to_path_buf(), interval, sender) {
                Ok(watch) => {
                    log::debug!("Watching file {}", path.display());
                    Some(watch)
                }
                Err(err) => {
                    log::debug!("Could not start file watch on {}: {}", path.display(), err);
                    None
                }
            }
        });
    }

    pub fn unwatch_file(&mut self) {
        if let Some(path) = self.watched_file() {
            log::debug!("Unwatching file {}", path.display());
        }
        self.file_slot.clear();
    }

    pub fn watched_file(&self) -> Option<&Path> {
        self.file_slot.get().map(FileWatch::path)
    }

    /// Starts watching `path` for changes, cancelling whatever directory
    /// watch was active. If the watch cannot be established the slot is left
    /// empty; the caller is not told.
    pub fn watch_directory(&mut self, path: &Path) {
        let delay = self.timing.debounce_delay;
        let sender = self.event_sender.clone();

        self.dir_slot.replace(|| {
            match DirWatch::start(path.to_path_buf(), delay, sender) {
                Ok(watch) => {
                    log::debug!("Watching directory {}", path.display());
                    Some(watch)
                }
                Err(err) => {
                    log::debug!("Could not watch directory {}: {}", path.display(), err);
                    None
                }
            }
        });
    }

    pub fn unwatch_directory(&mut self) {
        if let Some(path) = self.watched_directory() {
            log::debug!("Unwatching directory {}", path.display());
        }
        self.dir_slot.clear();
    }

    /// The directory currently being watched. A watch that broke during
    /// operation has already released its native handle; its slot is
    /// emptied here and reported as absent.
    pub fn watched_directory(&mut self) -> Option<&Path> {
        if self.dir_slot.get().is_some_and(|watch| !watch.is_alive()) {
            log::debug!("Directory watch stopped on its own, clearing slot");
            self.dir_slot.clear();
        }

        self.dir_slot.get().map(DirWatch::path)
    }
}
