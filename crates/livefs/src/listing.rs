use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

/// One entry of a single-level directory listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_directory: bool,
    pub size: u64,

    /// Milliseconds since the Unix epoch, or 0 when unknown.
    pub modified: u64,
}

impl DirectoryEntry {
    /// Builds an entry by stat'ing `path`. A failed stat still yields an
    /// entry, treated as a file with zeroed size and timestamp.
    fn stat(name: String, path: PathBuf) -> Self {
        match fs_err::metadata(&path) {
            Ok(metadata) => {
                let modified = metadata
                    .modified()
                    .ok()
                    .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                    .map(|since| since.as_millis() as u64)
                    .unwrap_or(0);

                Self {
                    name,
                    path,
                    is_directory: metadata.is_dir(),
                    size: metadata.len(),
                    modified,
                }
            }
            Err(err) => {
                log::trace!("Listing entry without metadata: {}", err);
                Self {
                    name,
                    path,
                    is_directory: false,
                    size: 0,
                    modified: 0,
                }
            }
        }
    }
}

/// Lists one level of `path`, in whatever order the OS returns entries.
pub fn list_directory(path: &Path) -> io::Result<Vec<DirectoryEntry>> {
    let mut entries = Vec::new();

    for entry in fs_err::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        entries.push(DirectoryEntry::stat(name, entry.path()));
    }

    Ok(entries)
}

/// Reads a whole file as UTF-8 text.
pub fn read_file(path: &Path) -> io::Result<String> {
    fs_err::read_to_string(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lists_one_level_with_metadata() {
        let dir = tempdir().unwrap();
        fs_err::write(dir.path().join("readme.md"), "12345").unwrap();
        fs_err::create_dir(dir.path().join("assets")).unwrap();
        fs_err::write(dir.path().join("assets").join("nested.md"), "deep").unwrap();

        let mut entries = list_directory(dir.path()).unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "assets");
        assert!(entries[0].is_directory);
        assert_eq!(entries[1].name, "readme.md");
        assert_eq!(entries[1].path, dir.path().join("readme.md"));
        assert!(!entries[1].is_directory);
        assert_eq!(entries[1].size, 5);
        assert!(entries[1].modified > 0);
    }

    #[cfg(unix)]
    #[test]
    fn broken_symlink_is_listed_with_zeroed_metadata() {
        let dir = tempdir().unwrap();
        std::os::unix::fs::symlink(dir.path().join("nowhere"), dir.path().join("dangling.md"))
            .unwrap();

        let entries = list_directory(dir.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "dangling.md");
        assert!(!entries[0].is_directory);
        assert_eq!(entries[0].size, 0);
        assert_eq!(entries[0].modified, 0);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(list_directory(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn read_file_error_names_the_path() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("gone.md");
        let err = read_file(&missing).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(err.to_string().contains("gone.md"));
    }
}
