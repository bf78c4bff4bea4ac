use crate::models::FileGroups;
use std::path::Path;
use walkdir::WalkDir;

/// Groups the regular files directly inside `root` by lowercase extension.
/// Symlinks are followed when deciding what is a file.
/// Files without an extension land under `""`. A missing or unreadable
/// directory yields an empty map.
pub fn scan_directory(root: &Path) -> FileGroups {
    let mut groups = FileGroups::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.path().is_file() {
            continue;
        }

        let extension = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        groups
            .entry(extension)
            .or_default()
            .push(entry.path().to_path_buf());
    }

    groups
}
