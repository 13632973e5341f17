use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// How a mapping is realised on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    #[default]
    Hardlink,
    Symlink,
    Move,
}

impl LinkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hardlink => "hardlink",
            Self::Symlink => "symlink",
            Self::Move => "move",
        }
    }

    /// Whether the source file survives materialization.
    pub fn keeps_source(&self) -> bool {
        !matches!(self, Self::Move)
    }
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hardlink" | "link" => Ok(Self::Hardlink),
            "symlink" => Ok(Self::Symlink),
            "move" => Ok(Self::Move),
            other => Err(format!("unknown link mode '{}'", other)),
        }
    }
}

/// Result of a [`Materializer::materialize`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialized {
    Created,
    /// Something already occupies the target path; it was left untouched.
    AlreadyPresent,
}

pub struct Materializer {
    mode: LinkMode,
}

impl Materializer {
    pub fn new(mode: LinkMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> LinkMode {
        self.mode
    }

    /// Realises `source` at `target`, creating missing parent directories.
    ///
    /// Never overwrites: an existing target (including a dangling symlink)
    /// makes this a no-op. A directory at `target` is an error.
    pub fn materialize(&self, source: &Path, target: &Path) -> Result<Materialized, StorageError> {
        match std::fs::symlink_metadata(target) {
            Ok(meta) if meta.is_dir() => {
                return Err(StorageError::TargetIsDirectory(target.to_path_buf()));
            }
            Ok(_) => return Ok(Materialized::AlreadyPresent),
            Err(_) => {}
        }

        if std::fs::metadata(source).is_err() {
            return Err(StorageError::MissingSource(source.to_path_buf()));
        }

        if let Some(parent) = target.parent() {
            ensure_directory(parent)?;
        }

        let result = match self.mode {
            LinkMode::Hardlink => {
                std::fs::hard_link(source, target).map_err(|e| StorageError::Link {
                    link: target.to_path_buf(),
                    target: source.to_path_buf(),
                    source: e,
                })
            }
            LinkMode::Symlink => {
                // Absolute link text keeps the link valid from any cwd.
                let absolute = source
                    .canonicalize()
                    .map_err(|e| StorageError::Canonicalize {
                        path: source.to_path_buf(),
                        source: e,
                    })?;
                create_symlink(&absolute, target)
            }
            LinkMode::Move => move_file(source, target),
        };

        match result {
            Ok(()) => Ok(Materialized::Created),
            // Lost a race with another writer; the target is there now.
            Err(StorageError::Link { source, .. } | StorageError::CreateSymlink { source, .. })
                if source.kind() == ErrorKind::AlreadyExists =>
            {
                Ok(Materialized::AlreadyPresent)
            }
            Err(e) => Err(e),
        }
    }
}

/// True when a file or link (dangling or not) sits at `path`. Directories
/// never count as a materialized target.
pub fn target_present(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|m| !m.is_dir())
}

/// Checks that a rendered target name stays strictly below its root: a
/// non-empty relative path without empty, `.` or `..` components.
pub fn check_target_name(name: &str) -> Result<(), StorageError> {
    let reason = if name.is_empty() {
        "renders to an empty path"
    } else if name.starts_with('/') {
        "must be a relative path"
    } else if name
        .split('/')
        .any(|c| c.is_empty() || c == "." || c == "..")
    {
        "must not contain empty, '.' or '..' components"
    } else {
        return Ok(());
    };
    Err(StorageError::InvalidTargetName {
        name: name.to_string(),
        reason,
    })
}

/// Joins a normalized `target_dir` (trailing `/`) with a checked target name.
pub fn join_target(target_dir: &str, name: &str) -> Result<PathBuf, StorageError> {
    check_target_name(name)?;
    Ok(PathBuf::from(format!("{}{}", target_dir, name)))
}

/// Removes the file or link at `path`. Returns `false` when there was nothing
/// to remove. Directories are never removed here.
pub fn remove_target(path: &Path) -> Result<bool, StorageError> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(false),
        Ok(_) => match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::RemoveFile {
                path: path.to_path_buf(),
                source: e,
            }),
        },
        Err(_) => Ok(false),
    }
}

/// Replaces whatever sits at `target` with an absolute symlink to `source`.
pub fn replace_with_symlink(source: &Path, target: &Path) -> Result<(), StorageError> {
    let absolute = source
        .canonicalize()
        .map_err(|e| StorageError::Canonicalize {
            path: source.to_path_buf(),
            source: e,
        })?;
    remove_target(target)?;
    create_symlink(&absolute, target)
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.is_dir() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

fn create_symlink(source: &Path, link: &Path) -> Result<(), StorageError> {
    #[cfg(unix)]
    std::os::unix::fs::symlink(source, link).map_err(|e| StorageError::CreateSymlink {
        link: link.to_path_buf(),
        target: source.to_path_buf(),
        source: e,
    })?;

    #[cfg(windows)]
    std::os::windows::fs::symlink_file(source, link).map_err(|e| StorageError::CreateSymlink {
        link: link.to_path_buf(),
        target: source.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

/// Moves `src` to `dst`: `rename` first, copy + delete when the rename fails
/// (different filesystems).
fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    std::fs::copy(src, dst).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    std::fs::remove_file(src).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    Ok(())
}
