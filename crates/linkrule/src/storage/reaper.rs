use std::collections::{BTreeSet, VecDeque};
use std::path::{Component, Path, PathBuf};

use log::{debug, trace};

/// Best-effort removal of directories left empty after targets are deleted.
pub struct DirectoryReaper;

impl DirectoryReaper {
    /// Removes every empty directory below `base` plus any empty ancestor of
    /// `base` (the filesystem root excepted). `base` itself is kept.
    ///
    /// Candidates are visited deepest first so a parent emptied by removing
    /// its last child is removed in the same pass. Failures are ignored.
    /// Returns the number of directories removed.
    pub fn reap(base: &Path) -> usize {
        let mut candidates = collect_subdirectories(base);
        candidates.extend(ancestors(base));

        let mut ordered: Vec<PathBuf> = candidates.into_iter().collect();
        ordered.sort_by_key(|dir| std::cmp::Reverse(depth(dir)));

        let mut removed = 0;
        for dir in ordered {
            if is_empty_dir(&dir) {
                match std::fs::remove_dir(&dir) {
                    Ok(()) => {
                        debug!("Removed empty directory {}", dir.display());
                        removed += 1;
                    }
                    Err(e) => trace!("Could not remove {}: {}", dir.display(), e),
                }
            }
        }
        removed
    }
}

/// All directories below `base`, gathered with an explicit work queue.
fn collect_subdirectories(base: &Path) -> BTreeSet<PathBuf> {
    let mut found = BTreeSet::new();
    let mut queue = VecDeque::from([base.to_path_buf()]);

    while let Some(dir) = queue.pop_front() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            // `file_type` does not follow symlinks, so linked directories
            // are never descended into.
            if entry.file_type().is_ok_and(|t| t.is_dir()) {
                let path = entry.path();
                found.insert(path.clone());
                queue.push_back(path);
            }
        }
    }
    found
}

fn ancestors(base: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    base.ancestors()
        .skip(1)
        .filter(|dir| dir.parent().is_some() && !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

fn depth(path: &Path) -> usize {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
}

fn is_empty_dir(path: &Path) -> bool {
    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_removes_nested_empty_directories() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("target");
        std::fs::create_dir_all(base.join("a/b/c")).unwrap();
        std::fs::create_dir_all(base.join("d")).unwrap();

        let removed = DirectoryReaper::reap(&base);

        assert_eq!(removed, 4);
        assert!(base.is_dir());
        assert!(!base.join("a").exists());
        assert!(!base.join("d").exists());
    }

    #[test]
    fn test_keeps_directories_with_files() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("target");
        std::fs::create_dir_all(base.join("full/empty")).unwrap();
        std::fs::write(base.join("full/file.txt"), b"x").unwrap();

        DirectoryReaper::reap(&base);

        assert!(base.join("full/file.txt").exists());
        assert!(!base.join("full/empty").exists());
    }

    #[test]
    fn test_hidden_files_keep_directory() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("target");
        std::fs::create_dir_all(base.join("sub")).unwrap();
        std::fs::write(base.join("sub/.keep"), b"").unwrap();

        DirectoryReaper::reap(&base);

        assert!(base.join("sub/.keep").exists());
    }

    #[test]
    fn test_ancestors_holding_base_are_kept() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("x/y/target");
        std::fs::create_dir_all(&base).unwrap();

        DirectoryReaper::reap(&base);

        assert!(base.is_dir());
        assert!(temp_dir.path().join("x/y").is_dir());
    }

    #[test]
    fn test_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("target");
        std::fs::create_dir_all(base.join("a/b")).unwrap();

        assert_eq!(DirectoryReaper::reap(&base), 2);
        assert_eq!(DirectoryReaper::reap(&base), 0);
        assert!(base.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_does_not_follow_directory_symlinks() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("target");
        let outside = temp_dir.path().join("outside");
        std::fs::create_dir_all(outside.join("empty")).unwrap();
        std::fs::create_dir_all(&base).unwrap();
        std::os::unix::fs::symlink(&outside, base.join("link")).unwrap();

        DirectoryReaper::reap(&base);

        assert!(outside.join("empty").is_dir());
    }

    #[test]
    fn test_depth_counts_components() {
        assert!(depth(Path::new("/a/b/c")) > depth(Path::new("/a/b")));
    }
}
