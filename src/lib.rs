pub mod cli;
pub mod dir_tree;
pub mod host;
pub mod listing;
pub mod logging;
pub mod outline;
pub mod paths;
pub mod recent;
pub mod settings;
pub mod sync_client;

pub use dir_tree::{DirectoryTree, TreeRow};
pub use host::{Host, LocalHost, Picker, ReadError};
pub use listing::{is_markdown, listing_hint, sort_entries, ListingHint};
pub use outline::{extract_headings, extract_image_sources, Heading};
pub use paths::{parent_dir, resolve_image_src};
pub use recent::{EntryKind, FileStore, KeyValueStore, MemoryStore, RecentEntry, RecentStore};
pub use settings::{Settings, SettingsError};
pub use sync_client::{OpenDocument, OpenOutcome, Reconciliation, SyncClient};
