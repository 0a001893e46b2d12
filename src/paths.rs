use std::path::{Path, PathBuf};

/// The directory containing `path`, or `None` for a filesystem root or a bare
/// file name with no directory part.
pub fn parent_dir(path: &Path) -> Option<PathBuf> {
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

/// Last component of `path` for display, falling back to the whole path for
/// roots.
pub fn display_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => path.to_string_lossy().into_owned(),
    }
}

fn is_absolute_url(src: &str) -> bool {
    ["http:", "https:", "file:", "data:"]
        .iter()
        .any(|scheme| src.starts_with(scheme))
}

/// Resolves an image `src` found in a document against the document's
/// directory.
///
/// Absolute URLs come back unchanged. Relative sources become `file:///`
/// URLs with forward slashes.
pub fn resolve_image_src(src: Option<&str>, base_path: Option<&str>) -> String {
    let src = match src {
        Some(src) if !src.is_empty() => src,
        _ => return String::new(),
    };

    if is_absolute_url(src) {
        return src.to_owned();
    }

    let Some(base_path) = base_path else {
        return src.to_owned();
    };

    let base = base_path.replace('\\', "/");
    let relative = src.replace('\\', "/");

    format!("file:///{}/{}", base.trim_start_matches('/'), relative)
}
