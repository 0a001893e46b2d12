use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crossbeam_channel::{select, Sender};
use jod_thread::JoinHandle;

use crate::WatchEvent;

/// Polls a single file for modification and pushes its fresh content when it
/// changes.
///
/// Owns a polling thread. Dropping the watch signals the thread and joins it,
/// so once a `FileWatch` is gone no further events will be sent on its
/// behalf.
pub struct FileWatch {
    path: PathBuf,

    /// Signaled on drop to stop the polling loop.
    shutdown_sender: Sender<()>,

    /// Joined on drop.
    ///
    /// Allowed to be unused because dropping this value has side effects.
    #[allow(unused)]
    job_thread: JoinHandle<()>,
}

impl FileWatch {
    pub fn start(
        path: PathBuf,
        interval: Duration,
        event_sender: Sender<WatchEvent>,
    ) -> io::Result<Self> {
        let (shutdown_sender, shutdown_receiver) = crossbeam_channel::bounded(1);
        let thread_path = path.clone();

        // Taken before the thread exists so that an edit landing while it
        // starts up still differs from the baseline.
        let mut last_seen = FileStamp::read(&path);

        let job_thread = jod_thread::Builder::new()
            .name(format!("FileWatch {}", path.display()))
            .spawn(move || {
                log::trace!("FileWatch thread started for {}", thread_path.display());

                loop {
                    select! {
                        recv(shutdown_receiver) -> _ => {
                            log::trace!("FileWatch shutdown for {}", thread_path.display());
                            return;
                        },
                        default(interval) => {
                            let current = FileStamp::read(&thread_path);
                            if current == last_seen {
                                continue;
                            }
                            last_seen = current;

                            if !forward_content(&thread_path, &event_sender) {
                                return;
                            }
                        },
                    }
                }
            })?;

        Ok(Self {
            path,
            shutdown_sender,
            job_thread,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileWatch {
    fn drop(&mut self) {
        // Without this the poll loop never ends and the join below hangs.
        let _ = self.shutdown_sender.send(());
    }
}

/// Reads the file and sends it along. Returns `false` once nobody is
/// listening anymore.
fn forward_content(path: &Path, event_sender: &Sender<WatchEvent>) -> bool {
    let content = match crate::read_file(path) {
        Ok(content) => content,
        Err(err) => {
            // Deleted or mid-replace; the next stamp change will retry.
            log::debug!("Watched file changed but could not be read: {}", err);
            return true;
        }
    };

    log::debug!("Watched file changed: {}", path.display());

    event_sender
        .send(WatchEvent::FileChanged {
            path: path.to_path_buf(),
            content,
        })
        .is_ok()
}

/// The parts of a file's metadata that change when it is written or
/// replaced. `None` when the file can't be stat'ed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl FileStamp {
    fn read(path: &Path) -> Option<Self> {
        let metadata = fs_err::metadata(path).ok()?;

        Some(Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }
}
