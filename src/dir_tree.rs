use std::collections::HashMap;
use std::path::{Path, PathBuf};

use livefs::DirectoryEntry;

use crate::listing::sort_entries;

#[derive(Debug, Default)]
struct Node {
    expanded: bool,
    children: Vec<DirectoryEntry>,
}

/// In-memory mirror of the browsed directory.
///
/// The root level is replaced wholesale on every refresh. Subdirectories are
/// listed lazily on first expansion and their children stay cached after a
/// collapse, so re-expanding is free.
#[derive(Debug, Default)]
pub struct DirectoryTree {
    root: Option<PathBuf>,
    entries: Vec<DirectoryEntry>,
    nodes: HashMap<PathBuf, Node>,
}

/// One line of the flattened, display-ordered tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeRow<'a> {
    pub depth: usize,
    pub entry: &'a DirectoryEntry,
    pub expanded: bool,
}

impl DirectoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Top-level entries, unsorted.
    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    /// Replaces the top-level listing.
    ///
    /// Moving to a different root drops every cached subtree. Refreshing the
    /// same root keeps the caches of subdirectories that still exist; only
    /// those whose directory disappeared from the listing are forgotten.
    pub fn replace_root(&mut self, root: &Path, entries: Vec<DirectoryEntry>) {
        if self.root.as_deref() == Some(root) {
            self.nodes.retain(|path, _| {
                entries.iter().any(|entry| {
                    entry.is_directory && (path == &entry.path || path.starts_with(&entry.path))
                })
            });
        } else {
            self.nodes.clear();
            self.root = Some(root.to_path_buf());
        }

        self.entries = entries;
    }

    /// Expands `path`, calling `fetch` only the first time this directory is
    /// expanded.
    pub fn expand<F>(&mut self, path: &Path, fetch: F) -> &[DirectoryEntry]
    where
        F: FnOnce(&Path) -> Vec<DirectoryEntry>,
    {
        let node = self.nodes.entry(path.to_path_buf()).or_insert_with(|| {
            log::trace!("Listing {} for first expansion", path.display());
            Node {
                expanded: false,
                children: fetch(path),
            }
        });
        node.expanded = true;
        &node.children
    }

    /// Collapses `path`. Its cached children are kept.
    pub fn collapse(&mut self, path: &Path) {
        if let Some(node) = self.nodes.get_mut(path) {
            node.expanded = false;
        }
    }

    pub fn is_expanded(&self, path: &Path) -> bool {
        self.nodes.get(path).is_some_and(|node| node.expanded)
    }

    /// Cached children of `path`, whether or not it is currently expanded.
    pub fn cached_children(&self, path: &Path) -> Option<&[DirectoryEntry]> {
        self.nodes.get(path).map(|node| node.children.as_slice())
    }

    /// Finds a visible entry by path, searching the root level and every
    /// expanded subtree.
    pub fn find(&self, path: &Path) -> Option<&DirectoryEntry> {
        self.rows()
            .into_iter()
            .map(|row| row.entry)
            .find(|entry| entry.path == path)
    }

    /// Flattens the visible tree in display order.
    pub fn rows(&self) -> Vec<TreeRow<'_>> {
        let mut rows = Vec::new();
        self.push_rows(&self.entries, 0, &mut rows);
        rows
    }

    fn push_rows<'a>(&'a self, level: &'a [DirectoryEntry], depth: usize, rows: &mut Vec<TreeRow<'a>>) {
        for entry in sort_entries(level) {
            let expanded = entry.is_directory && self.is_expanded(&entry.path);
            rows.push(TreeRow {
                depth,
                entry,
                expanded,
            });

            if expanded {
                if let Some(children) = self.cached_children(&entry.path) {
                    self.push_rows(children, depth + 1, rows);
                }
            }
        }
    }
}
