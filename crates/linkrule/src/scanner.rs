use std::path::{Path, PathBuf};

use log::{debug, info};
use walkdir::WalkDir;

use crate::engine::Cancellation;
use crate::error::EnumerationError;
use crate::pattern::Pattern;

/// Walks a source tree and yields the relative paths that pass a rule's
/// include/exclude filters.
pub struct SourceScanner<'a> {
    source_directory: PathBuf,
    include: &'a Pattern,
    exclude: Option<&'a Pattern>,
}

impl<'a> SourceScanner<'a> {
    pub fn new<P: AsRef<Path>>(
        source_directory: P,
        include: &'a Pattern,
        exclude: Option<&'a Pattern>,
    ) -> Self {
        Self {
            source_directory: source_directory.as_ref().to_path_buf(),
            include,
            exclude,
        }
    }

    pub fn source_directory(&self) -> &Path {
        &self.source_directory
    }

    /// Lazily walks the tree. Every call starts a fresh walk.
    pub fn iter(&self) -> impl Iterator<Item = Result<String, EnumerationError>> + '_ {
        let root = self.source_directory.clone();
        let preflight = check_directory(&root).err();

        let walk = WalkDir::new(&self.source_directory)
            .min_depth(1)
            .follow_links(true)
            .into_iter();

        preflight
            .into_iter()
            .map(Err)
            .chain(walk.filter_map(move |entry| match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        return None;
                    }
                    let relative = relative_name(&root, entry.path())?;
                    self.accepts(&relative).then_some(Ok(relative))
                }
                Err(e) => Some(Err(EnumerationError::ScanFailed {
                    path: e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| root.clone()),
                    source: e,
                })),
            }))
    }

    /// Collects the whole walk, sorted. Any walk error aborts the scan.
    pub fn scan(&self) -> Result<Vec<String>, EnumerationError> {
        self.scan_with_cancel(&Cancellation::new())
    }

    pub fn scan_with_cancel(&self, cancel: &Cancellation) -> Result<Vec<String>, EnumerationError> {
        let mut files = Vec::new();
        for entry in self.iter() {
            if cancel.is_cancelled() {
                return Err(EnumerationError::Cancelled);
            }
            let relative = entry?;
            debug!("Matched source file: {}", relative);
            files.push(relative);
        }
        files.sort();

        info!(
            "Scanned {} matching files in {}",
            files.len(),
            self.source_directory.display()
        );
        Ok(files)
    }

    fn accepts(&self, relative: &str) -> bool {
        if !self.include.is_match(relative) {
            return false;
        }
        !self.exclude.is_some_and(|exclude| exclude.is_match(relative))
    }
}

fn check_directory(path: &Path) -> Result<(), EnumerationError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(EnumerationError::NotADirectory(path.to_path_buf())),
        Err(_) => Err(EnumerationError::NotFound(path.to_path_buf())),
    }
}

/// `/`-joined path of `path` below `root`.
fn relative_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Some(parts.join("/"))
}
