use crate::catalog::Catalog;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Substring a file name must contain to be treated as a candidate image.
pub const DEFAULT_MARKER: &str = ".tif";

/// Parameters that control candidate discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanConfig {
    pub marker: String,
    /// When true, sub-directories are walked as well.
    pub recursive: bool,
}

impl ScanConfig {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            recursive: false,
        }
    }

    pub fn with_recursive(mut self, enabled: bool) -> Self {
        self.recursive = enabled;
        self
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER)
    }
}

/// Lists the candidate images of `directory` and registers each of them in
/// `catalog`, in the same order as the returned paths.
///
/// Order follows the directory listing and is not sorted.
pub fn discover(
    directory: &Path,
    config: &ScanConfig,
    catalog: &mut Catalog,
) -> Result<Vec<PathBuf>, ScanError> {
    if !directory.is_dir() {
        return Err(ScanError::MissingDirectory(directory.to_path_buf()));
    }

    let max_depth = if config.recursive { usize::MAX } else { 1 };
    let mut candidates = Vec::new();
    for entry in WalkDir::new(directory).min_depth(1).max_depth(max_depth) {
        let entry = entry.map_err(ScanError::Walk)?;
        let path = entry.path();
        if path.is_file() && has_format_marker(path, &config.marker) {
            let name = catalog.register(path);
            debug!(name = %name, path = %path.display(), "registered candidate");
            candidates.push(path.to_path_buf());
        }
    }
    Ok(candidates)
}

/// Loose match: any file name containing `marker` qualifies, not only names
/// ending in it.
pub fn has_format_marker(path: &Path, marker: &str) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().contains(marker))
        .unwrap_or(false)
}

#[derive(Debug)]
pub enum ScanError {
    MissingDirectory(PathBuf),
    Walk(walkdir::Error),
}

impl Display for ScanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDirectory(path) => write!(f, "Directory {} doesn't exist", path.display()),
            Self::Walk(error) => write!(f, "failed to list directory: {}", error),
        }
    }
}

impl Error for ScanError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Walk(error) => Some(error),
            _ => None,
        }
    }
}
