/// Service locator
///
/// Resolves a short service name (e.g. "wikijs") to its deployment
/// directory by scanning the homelab checkout a few levels deep. Multiple
/// matches are legal: the first in traversal order wins and a warning is
/// emitted by the caller.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// How deep below the root we look for service directories
pub const SEARCH_DEPTH: usize = 3;

/// All directories under `root` (max depth 3) whose name equals `name`,
/// in deterministic traversal order
pub fn find_service_candidates(root: &Path, name: &str) -> Vec<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(SEARCH_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir() && entry.file_name().to_str() == Some(name))
        .map(|entry| entry.into_path())
        .collect()
}
