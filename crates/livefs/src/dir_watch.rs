use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver, Sender};
use jod_thread::JoinHandle;
use notify::event::{EventKind, MetadataKind, ModifyKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::{DebounceTimer, WatchEvent};

/// What the native watcher tells the debouncer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSignal {
    /// Something in the directory changed.
    Changed,

    /// The watch can no longer be trusted, e.g. the directory itself was
    /// removed or the backend reported an error.
    Failed(String),
}

/// Native watch on one directory level, debounced into
/// [`WatchEvent::DirChanged`].
///
/// The native watcher lives on the debouncer thread, so a watch that fails
/// releases its OS handle right away instead of waiting to be replaced.
pub struct DirWatch {
    debouncer: Debouncer,
}

impl DirWatch {
    pub fn start(
        path: PathBuf,
        delay: Duration,
        event_sender: Sender<WatchEvent>,
    ) -> io::Result<Self> {
        let (raw_sender, raw_receiver) = crossbeam_channel::unbounded();
        let root = path.clone();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
            let signal = match result {
                Ok(event) => match classify(&event, &root) {
                    Some(signal) => signal,
                    None => return,
                },
                Err(err) => RawSignal::Failed(err.to_string()),
            };
            let _ = raw_sender.send(signal);
        })
        .map_err(io::Error::other)?;

        // One level only: the client lists a single level and re-lists it on
        // change. Expanded subdirectories are not tracked.
        watcher
            .watch(&path, RecursiveMode::NonRecursive)
            .map_err(io::Error::other)?;

        let debouncer = Debouncer::spawn(path, delay, raw_receiver, event_sender, Some(watcher))?;

        Ok(Self { debouncer })
    }

    pub fn path(&self) -> &Path {
        self.debouncer.path()
    }

    /// `false` once the watch has stopped on its own.
    pub fn is_alive(&self) -> bool {
        self.debouncer.is_alive()
    }
}

/// Decides whether a native event matters to a directory listing.
fn classify(event: &notify::Event, root: &Path) -> Option<RawSignal> {
    match &event.kind {
        // Listing a directory can itself produce access events; reacting to
        // them would re-list forever.
        EventKind::Access(_) => None,
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => None,

        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
            if event.paths.iter().any(|path| path == root) =>
        {
            Some(RawSignal::Failed(format!(
                "watched directory {} was removed or renamed",
                root.display()
            )))
        }

        _ => Some(RawSignal::Changed),
    }
}

/// Turns a stream of raw signals into debounced directory change events.
///
/// Owns a thread that resets a [`DebounceTimer`] on every raw signal and
/// emits one event per quiet period. Dropping the debouncer joins the thread.
///
/// `native` is whatever produces the raw signals. It is dropped as soon as the
/// watch stops, whether by shutdown or by failure.
pub struct Debouncer {
    path: PathBuf,
    alive: Arc<AtomicBool>,
    shutdown_sender: Sender<()>,

    /// Allowed to be unused because dropping this value has side effects.
    #[allow(unused)]
    job_thread: JoinHandle<()>,
}

impl Debouncer {
    pub fn spawn(
        path: PathBuf,
        delay: Duration,
        raw_receiver: Receiver<RawSignal>,
        event_sender: Sender<WatchEvent>,
        native: Option<RecommendedWatcher>,
    ) -> io::Result<Self> {
        let (shutdown_sender, shutdown_receiver) = crossbeam_channel::bounded(1);
        let alive = Arc::new(AtomicBool::new(true));

        let context = DebounceContext {
            native,
            path: path.clone(),
            timer: DebounceTimer::new(delay),
            alive: Arc::clone(&alive),
            event_sender,
        };

        let job_thread = jod_thread::Builder::new()
            .name(format!("DirWatch {}", path.display()))
            .spawn(move || context.run(raw_receiver, shutdown_receiver))?;

        Ok(Self {
            path,
            alive,
            shutdown_sender,
            job_thread,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        let _ = self.shutdown_sender.send(());
    }
}

struct DebounceContext {
    native: Option<RecommendedWatcher>,
    path: PathBuf,
    timer: DebounceTimer,
    alive: Arc<AtomicBool>,
    event_sender: Sender<WatchEvent>,
}

impl DebounceContext {
    fn run(mut self, raw_receiver: Receiver<RawSignal>, shutdown_receiver: Receiver<()>) {
        log::trace!("DirWatch thread started for {}", self.path.display());

        loop {
            let tick = match self.timer.remaining(Instant::now()) {
                Some(remaining) => crossbeam_channel::after(remaining),
                None => crossbeam_channel::never(),
            };

            select! {
                recv(shutdown_receiver) -> _ => {
                    log::trace!("DirWatch shutdown for {}", self.path.display());
                    return;
                },
                recv(raw_receiver) -> signal => match signal {
                    Ok(RawSignal::Changed) => self.timer.reset(Instant::now()),
                    Ok(RawSignal::Failed(reason)) => {
                        log::debug!("Directory watch on {} stopped: {}", self.path.display(), reason);
                        self.stop();
                        return;
                    }
                    Err(_) => {
                        self.stop();
                        return;
                    }
                },
                recv(tick) -> _ => {
                    if self.timer.fire(Instant::now()) && !self.emit() {
                        self.stop();
                        return;
                    }
                },
            }
        }
    }

    fn emit(&self) -> bool {
        log::debug!("Watched directory changed: {}", self.path.display());

        self.event_sender
            .send(WatchEvent::DirChanged {
                path: self.path.clone(),
            })
            .is_ok()
    }

    /// Releases the native watcher before the watch is reported dead.
    fn stop(&mut self) {
        self.timer.cancel();
        self.native = None;
        self.alive.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const DELAY: Duration = Duration::from_millis(150);

    fn debouncer() -> (Debouncer, Sender<RawSignal>, Receiver<WatchEvent>) {
        let (raw_sender, raw_receiver) = crossbeam_channel::unbounded();
        let (event_sender, event_receiver) = crossbeam_channel::unbounded();
        let debouncer =
            Debouncer::spawn(PathBuf::from("/docs"), DELAY, raw_receiver, event_sender, None)
                .unwrap();
        (debouncer, raw_sender, event_receiver)
    }

    #[test]
    fn burst_is_coalesced_into_one_event() {
        let (_debouncer, raw, events) = debouncer();

        let started = Instant::now();
        for _ in 0..25 {
            raw.send(RawSignal::Changed).unwrap();
            std::thread::sleep(Duration::from_millis(2));
        }
        let last_signal = Instant::now();

        let event = events.recv_timeout(Duration::from_secs(3)).unwrap();
        assert_eq!(
            event,
            WatchEvent::DirChanged {
                path: PathBuf::from("/docs")
            }
        );
        assert!(last_signal.elapsed() >= DELAY - Duration::from_millis(5));
        assert!(started.elapsed() >= DELAY);

        assert!(events.recv_timeout(DELAY * 3).is_err());
    }

    #[test]
    fn separate_quiet_periods_each_emit() {
        let (_debouncer, raw, events) = debouncer();

        raw.send(RawSignal::Changed).unwrap();
        events.recv_timeout(Duration::from_secs(3)).unwrap();

        raw.send(RawSignal::Changed).unwrap();
        events.recv_timeout(Duration::from_secs(3)).unwrap();

        assert!(events.recv_timeout(DELAY * 3).is_err());
    }

    #[test]
    fn failure_discards_pending_change_and_marks_dead() {
        let (debouncer, raw, events) = debouncer();

        raw.send(RawSignal::Changed).unwrap();
        raw.send(RawSignal::Failed("gone".to_owned())).unwrap();

        assert!(events.recv_timeout(DELAY * 3).is_err());
        assert!(!debouncer.is_alive());
    }

    #[test]
    fn drop_before_deadline_emits_nothing() {
        let (debouncer, raw, events) = debouncer();

        raw.send(RawSignal::Changed).unwrap();
        drop(debouncer);

        assert!(events.recv_timeout(DELAY * 3).is_err());
    }

    #[test]
    fn classify_ignores_access_and_flags_root_removal() {
        let root = PathBuf::from("/docs");

        let access = notify::Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(root.join("a.md"));
        assert_eq!(classify(&access, &root), None);

        let create = notify::Event::new(EventKind::Create(notify::event::CreateKind::File))
            .add_path(root.join("a.md"));
        assert_eq!(classify(&create, &root), Some(RawSignal::Changed));

        let child_removed = notify::Event::new(EventKind::Remove(notify::event::RemoveKind::File))
            .add_path(root.join("a.md"));
        assert_eq!(classify(&child_removed, &root), Some(RawSignal::Changed));

        let root_removed =
            notify::Event::new(EventKind::Remove(notify::event::RemoveKind::Folder))
                .add_path(root.clone());
        assert!(matches!(
            classify(&root_removed, &root),
            Some(RawSignal::Failed(_))
        ));
    }

    #[test]
    fn native_watch_reports_new_file() {
        let dir = tempdir().unwrap();
        let (sender, receiver) = crossbeam_channel::unbounded();
        let _watch = DirWatch::start(dir.path().to_path_buf(), DELAY, sender).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        for i in 0..10 {
            fs_err::write(dir.path().join(format!("note-{i}.md")), "hello").unwrap();
        }

        let event = receiver.recv_timeout(Duration::from_secs(3)).unwrap();
        assert_eq!(event.path(), dir.path());
        assert!(receiver.recv_timeout(DELAY * 3).is_err());
    }

    #[test]
    fn removing_the_root_releases_the_native_watch() {
        let parent = tempdir().unwrap();
        let root = parent.path().join("browsed");
        fs_err::create_dir(&root).unwrap();

        let (sender, receiver) = crossbeam_channel::unbounded();
        let watch = DirWatch::start(root.clone(), DELAY, sender).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        fs_err::remove_dir(&root).unwrap();

        let deadline = Instant::now() + Duration::from_secs(3);
        while watch.is_alive() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }

        assert!(!watch.is_alive());
        assert!(receiver.recv_timeout(DELAY * 2).is_err());
    }

    #[test]
    fn native_watch_on_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let (sender, _receiver) = crossbeam_channel::unbounded();
        assert!(DirWatch::start(dir.path().join("missing"), DELAY, sender).is_err());
    }
}
