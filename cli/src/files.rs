//! File helpers shared by the commands.

use bt_gen_core::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Reads a file, naming it in the error.
pub fn read(path: &Path) -> AppResult<String> {
    fs::read_to_string(path)
        .map_err(|e| AppError::General(format!("Failed to read {:?}: {}", path, e)))
}

/// Writes `content` unless the file already holds it. Returns whether it wrote.
pub fn write_if_changed(path: &Path, content: &str, dry_run: bool) -> AppResult<bool> {
    if fs::read_to_string(path).is_ok_and(|current| current == content) {
        debug!(path = %path.display(), "unchanged");
        return Ok(false);
    }
    if dry_run {
        info!(path = %path.display(), "would update (dry run)");
        return Ok(true);
    }
    fs::write(path, content)
        .map_err(|e| AppError::General(format!("Failed to write {:?}: {}", path, e)))?;
    info!(path = %path.display(), "updated");
    Ok(true)
}

/// Files under `root` with one of `extensions`, sorted by path.
pub fn collect(root: &Path, extensions: &[&str], max_depth: usize) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.contains(&ext))
        })
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_only_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.h");
        assert!(write_if_changed(&path, "x", false).unwrap());
        assert!(!write_if_changed(&path, "x", false).unwrap());
        assert!(write_if_changed(&path, "y", true).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "x");
    }

    #[test]
    fn test_collect_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.h", "a.hpp", "c.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/d.h"), "").unwrap();

        let names: Vec<_> = collect(dir.path(), &["h", "hpp"], 1)
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.hpp", "b.h"]);
        assert_eq!(collect(dir.path(), &["h"], usize::MAX).len(), 2);
    }
}
