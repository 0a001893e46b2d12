//! Pure helpers over a directory listing snapshot. Nothing here holds state;
//! callers run them fresh every time a tree level is displayed.

use std::cmp::Ordering;

use livefs::DirectoryEntry;

const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown", "mdx", "txt"];

/// Whether a file name has an extension the viewer renders. Other files are
/// still listed, just dimmed.
pub fn is_markdown(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, extension)) => MARKDOWN_EXTENSIONS
            .iter()
            .any(|known| extension.eq_ignore_ascii_case(known)),
        None => false,
    }
}

/// Orders names the way a human-facing file list would: case-insensitively,
/// with lowercase ahead of uppercase when two names differ only in case.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}

/// Directories first, then files, each group ordered by name.
pub fn sort_entries(entries: &[DirectoryEntry]) -> Vec<&DirectoryEntry> {
    let mut sorted: Vec<&DirectoryEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| compare_names(&a.name, &b.name))
    });
    sorted
}

/// A placeholder line to show instead of (or above) a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingHint {
    Empty,
    NoMarkdown,
}

impl ListingHint {
    pub fn message(self) -> &'static str {
        match self {
            ListingHint::Empty => "This folder is empty",
            ListingHint::NoMarkdown => "No Markdown files here",
        }
    }
}

pub fn listing_hint(entries: &[DirectoryEntry]) -> Option<ListingHint> {
    if entries.is_empty() {
        Some(ListingHint::Empty)
    } else if !entries
        .iter()
        .any(|entry| entry.is_directory || is_markdown(&entry.name))
    {
        Some(ListingHint::NoMarkdown)
    } else {
        None
    }
}
