//! Test harness for isolated reconciliation runs.
//!
//! Each `TestHarness` owns a temporary directory with `source/` and
//! `target/` subdirectories plus a fresh in-memory database.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use linkrule::db::{mapping_repo, MappingRow};
use linkrule::{ApplyOutcome, Cancellation, Database, Reconciler, RuleSpec};

use super::builders::RuleSpecBuilder;

pub struct TestHarness {
    temp_dir: TempDir,
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    pub reconciler: Reconciler,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source_dir = temp_dir.path().join("source");
        let target_dir = temp_dir.path().join("target");
        std::fs::create_dir_all(&source_dir).expect("Failed to create source dir");
        std::fs::create_dir_all(&target_dir).expect("Failed to create target dir");

        let db = Database::open_in_memory().expect("Failed to create test database");

        Self {
            temp_dir,
            source_dir,
            target_dir,
            reconciler: Reconciler::new(db),
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn db(&self) -> &Database {
        self.reconciler.database()
    }

    /// A builder for a rule from `source/` to `target/` (`*.txt` → `*.bak`).
    pub fn rule(&self) -> RuleSpecBuilder {
        RuleSpecBuilder::new(&self.source_dir, &self.target_dir)
    }

    /// Writes a source file, creating parent directories.
    pub fn write_source(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.source_dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create source subdir");
        }
        std::fs::write(&path, content).expect("Failed to write source file");
        path
    }

    pub fn remove_source(&self, relative: &str) {
        std::fs::remove_file(self.source_dir.join(relative)).expect("Failed to remove source");
    }

    pub fn source(&self, relative: &str) -> PathBuf {
        self.source_dir.join(relative)
    }

    pub fn target(&self, relative: &str) -> PathBuf {
        self.target_dir.join(relative)
    }

    pub fn apply(&self, spec: &RuleSpec) -> ApplyOutcome {
        self.reconciler
            .apply(spec, None, &Cancellation::new())
            .expect("apply failed")
    }

    pub fn apply_rule(&self, spec: &RuleSpec, rule_id: i64) -> ApplyOutcome {
        self.reconciler
            .apply(spec, Some(rule_id), &Cancellation::new())
            .expect("apply failed")
    }

    pub fn mappings(&self, rule_id: i64) -> Vec<MappingRow> {
        mapping_repo::list_for_rule(self.db(), rule_id).expect("Failed to list mappings")
    }

    /// `(source_name, target_name, processed)` for every mapping of a rule.
    pub fn mapping_triples(&self, rule_id: i64) -> Vec<(String, String, bool)> {
        self.mappings(rule_id)
            .into_iter()
            .map(|m| (m.source_name, m.target_name, m.processed))
            .collect()
    }

    pub fn read_target(&self, relative: &str) -> String {
        std::fs::read_to_string(self.target(relative)).expect("Failed to read target")
    }
}

/// True when both paths are hardlinks to the same inode.
#[cfg(unix)]
pub fn same_inode(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    let (Ok(a), Ok(b)) = (std::fs::metadata(a), std::fs::metadata(b)) else {
        return false;
    };
    a.dev() == b.dev() && a.ino() == b.ino()
}

pub fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}
