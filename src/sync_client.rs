use std::collections::HashMap;
use std::path::{Path, PathBuf};

use livefs::{DirectoryEntry, WatchEvent};

use crate::{
    dir_tree::DirectoryTree,
    host::{Host, Picker, ReadError},
    paths::{display_name, parent_dir},
    recent::{EntryKind, KeyValueStore, RecentEntry, RecentStore},
};

/// The document currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenDocument {
    pub path: PathBuf,
    pub content: String,
}

/// Last known scroll offset per document path, kept for the session only.
#[derive(Debug, Default)]
pub struct ScrollPositionCache {
    offsets: HashMap<PathBuf, f64>,
}

impl ScrollPositionCache {
    pub fn save(&mut self, path: &Path, offset: f64) {
        self.offsets.insert(path.to_path_buf(), offset);
    }

    pub fn get(&self, path: &Path) -> Option<f64> {
        self.offsets.get(path).copied()
    }
}

/// Result of a user-initiated open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened,

    /// The user dismissed the picker.
    Cancelled,

    /// The target could not be read. Nothing on screen changed.
    Failed,
}

/// What a watch event did to client state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    DocumentRefreshed,
    DirectoryRefreshed,

    /// The event referred to a document or directory that is no longer
    /// current and was dropped.
    Stale,
}

/// Directory to show alongside a newly opened file: its parent, but only
/// when no directory is being browsed yet.
pub fn directory_for_opened_file(current_directory: Option<&Path>, file: &Path) -> Option<PathBuf> {
    match current_directory {
        Some(_) => None,
        None => parent_dir(file),
    }
}

/// Client-side application state and the logic that keeps it in step with
/// the filesystem.
///
/// All mutation happens through `&mut self` on one thread. Watch events
/// arrive asynchronously and may be stale by the time they are handled, so
/// every event is checked against the current document or directory before
/// it is applied.
pub struct SyncClient<H, S> {
    host: H,
    recent: RecentStore<S>,

    document: Option<OpenDocument>,

    /// Scroll offset of the visible document.
    scroll_offset: f64,
    scroll_cache: ScrollPositionCache,

    current_directory: Option<PathBuf>,
    tree: DirectoryTree,
}

impl<H: Host, S: KeyValueStore> SyncClient<H, S> {
    pub fn new(host: H, store: S) -> Self {
        Self {
            host,
            recent: RecentStore::new(store),
            document: None,
            scroll_offset: 0.0,
            scroll_cache: ScrollPositionCache::default(),
            current_directory: None,
            tree: DirectoryTree::new(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn document(&self) -> Option<&OpenDocument> {
        self.document.as_ref()
    }

    pub fn current_directory(&self) -> Option<&Path> {
        self.current_directory.as_deref()
    }

    pub fn tree(&self) -> &DirectoryTree {
        &self.tree
    }

    pub fn recent_entries(&self) -> Vec<RecentEntry> {
        self.recent.list()
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn set_scroll_offset(&mut self, offset: f64) {
        self.scroll_offset = offset;
    }

    pub fn saved_scroll_offset(&self, path: &Path) -> Option<f64> {
        self.scroll_cache.get(path)
    }

    /// Directory that relative resources in the open document resolve
    /// against.
    pub fn base_path(&self) -> Option<PathBuf> {
        self.document.as_ref().and_then(|doc| parent_dir(&doc.path))
    }

    /// Shows `content` as the document at `path`, replacing whatever was
    /// open, and starts watching it.
    pub fn open_document(&mut self, path: &Path, content: String) {
        self.stash_scroll_offset();
        self.scroll_offset = self.scroll_cache.get(path).unwrap_or(0.0);

        log::info!("Opened {}", path.display());
        self.document = Some(OpenDocument {
            path: path.to_path_buf(),
            content,
        });

        self.host.start_file_watch(path);
        self.record_recent(path, EntryKind::File);

        if let Some(directory) = directory_for_opened_file(self.current_directory(), path) {
            log::debug!("No directory open yet, showing {}", directory.display());
            if let Err(err) = self.load_directory(&directory) {
                log::debug!("Not showing the document's directory: {}", err);
            }
        }
    }

    /// Reads and opens the file at `path`: the entry point for drag-and-drop,
    /// the command line, and anything else that already has a path.
    pub fn open_file_path(&mut self, path: &Path) -> OpenOutcome {
        match self.host.read_file(path) {
            Ok(content) => {
                self.open_document(path, content);
                OpenOutcome::Opened
            }
            Err(err) => {
                log::warn!("{}", err);
                OpenOutcome::Failed
            }
        }
    }

    /// Opens whatever `path` points at: directories are browsed, anything
    /// else is read as a document.
    pub fn open_path(&mut self, path: &Path) -> OpenOutcome {
        if self.host.is_directory(path) {
            self.open_directory(path)
        } else {
            self.open_file_path(path)
        }
    }

    pub fn open_file_dialog(&mut self, picker: &mut dyn Picker) -> OpenOutcome {
        match picker.pick_file() {
            Some(path) => self.open_file_path(&path),
            None => OpenOutcome::Cancelled,
        }
    }

    pub fn open_directory_dialog(&mut self, picker: &mut dyn Picker) -> OpenOutcome {
        match picker.pick_directory() {
            Some(path) => self.open_directory(&path),
            None => OpenOutcome::Cancelled,
        }
    }

    /// Activates a sidebar entry: directories become the browsed directory,
    /// files are opened as the document.
    pub fn select_entry(&mut self, entry: &DirectoryEntry) -> OpenOutcome {
        if entry.is_directory {
            self.open_directory(&entry.path)
        } else {
            self.open_file_path(&entry.path)
        }
    }

    pub fn open_recent(&mut self, entry: &RecentEntry) -> OpenOutcome {
        match entry.kind {
            EntryKind::File => self.open_file_path(&entry.path),
            EntryKind::Directory => self.open_directory(&entry.path),
        }
    }

    /// Makes `path` the browsed directory and records it in the history. A
    /// directory that cannot be listed changes nothing.
    pub fn open_directory(&mut self, path: &Path) -> OpenOutcome {
        match self.load_directory(path) {
            Ok(()) => {
                self.record_recent(path, EntryKind::Directory);
                OpenOutcome::Opened
            }
            Err(err) => {
                log::warn!("{}", err);
                OpenOutcome::Failed
            }
        }
    }

    /// Moves the browsed directory one level up. Returns `false` at the root
    /// or when the parent cannot be listed.
    pub fn navigate_up(&mut self) -> bool {
        let Some(current) = self.current_directory.as_deref() else {
            return false;
        };

        match parent_dir(current) {
            Some(parent) if parent != current => {
                self.open_directory(&parent) == OpenOutcome::Opened
            }
            _ => false,
        }
    }

    /// Expands a subdirectory of the tree, listing it the first time.
    pub fn expand(&mut self, path: &Path) -> &[DirectoryEntry] {
        let host = &mut self.host;
        self.tree.expand(path, |path| {
            host.list_directory(path).unwrap_or_else(|err| {
                log::debug!("Expanding with no children: {}", err);
                Vec::new()
            })
        })
    }

    pub fn collapse(&mut self, path: &Path) {
        self.tree.collapse(path);
    }

    /// Closes the document and stops watching it.
    pub fn close_document(&mut self) {
        self.stash_scroll_offset();
        if let Some(document) = self.document.take() {
            log::info!("Closed {}", document.path.display());
        }
        self.scroll_offset = 0.0;
        self.host.stop_file_watch();
    }

    /// Applies a change pushed by the watch coordinator.
    pub fn handle_event(&mut self, event: WatchEvent) -> Reconciliation {
        match event {
            WatchEvent::FileChanged { path, content } => match &mut self.document {
                Some(document) if document.path == path => {
                    self.scroll_cache.save(&path, self.scroll_offset);
                    document.content = content;
                    // Redisplay from the top; the saved offset is still
                    // available for the presentation to restore.
                    self.scroll_offset = 0.0;

                    log::debug!("Reloaded {}", path.display());
                    Reconciliation::DocumentRefreshed
                }
                _ => {
                    log::trace!("Dropping change for {}, no longer open", path.display());
                    Reconciliation::Stale
                }
            },
            WatchEvent::DirChanged { path } => {
                if self.current_directory.as_deref() != Some(path.as_path()) {
                    log::trace!("Dropping change for {}, no longer browsed", path.display());
                    return Reconciliation::Stale;
                }

                let entries = self.host.list_directory(&path).unwrap_or_else(|err| {
                    log::debug!("Listing failed, showing nothing: {}", err);
                    Vec::new()
                });
                self.tree.replace_root(&path, entries);

                log::debug!("Re-listed {}", path.display());
                Reconciliation::DirectoryRefreshed
            }
        }
    }

    fn load_directory(&mut self, path: &Path) -> Result<(), ReadError> {
        let entries = self.host.list_directory(path)?;
        self.tree.replace_root(path, entries);
        self.current_directory = Some(path.to_path_buf());
        self.host.start_dir_watch(path);
        Ok(())
    }

    fn stash_scroll_offset(&mut self) {
        if let Some(document) = &self.document {
            self.scroll_cache.save(&document.path, self.scroll_offset);
        }
    }

    fn record_recent(&mut self, path: &Path, kind: EntryKind) {
        if let Err(err) = self.recent.record(path, &display_name(path), kind) {
            log::warn!("Could not save recent entries: {}", err);
        }
    }
}
