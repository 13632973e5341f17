//! Hardlink → symlink migration of existing targets.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::db::{mapping_repo, Database, DatabaseError, MappingWithRule};
use crate::storage::materializer::{join_target, replace_with_symlink};

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Mappings loaded per page.
    pub batch_size: usize,
    /// Report what would change without touching the filesystem.
    pub dry_run: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConversionSummary {
    pub total: u64,
    pub processed: u64,
    pub converted: u64,
    pub errors: u64,
}

impl ConversionSummary {
    pub fn exit_code(&self) -> i32 {
        if self.errors == 0 {
            0
        } else {
            1
        }
    }
}

/// Per-mapping outcome of a conversion run.
#[derive(Debug)]
pub enum ConversionEvent<'a> {
    MissingTarget { target: &'a Path },
    AlreadySymlink { target: &'a Path },
    MissingSource { source: &'a Path },
    WouldConvert { target: &'a Path },
    Converted { target: &'a Path },
    Failed { target: &'a Path, error: String },
}

pub trait ConversionReporter: Send + Sync {
    fn report(&self, event: ConversionEvent<'_>);
}

/// Discards every event.
pub struct NoopReporter;

impl ConversionReporter for NoopReporter {
    fn report(&self, _event: ConversionEvent<'_>) {}
}

/// Forwards events to the `log` facade.
pub struct LogReporter;

impl ConversionReporter for LogReporter {
    fn report(&self, event: ConversionEvent<'_>) {
        match event {
            ConversionEvent::MissingTarget { target } => {
                log::warn!("Skipping missing target: {}", target.display())
            }
            ConversionEvent::AlreadySymlink { target } => {
                log::info!("Already symlink: {}", target.display())
            }
            ConversionEvent::MissingSource { source } => {
                log::warn!("Source file missing: {}", source.display())
            }
            ConversionEvent::WouldConvert { target } => {
                log::info!("[DRY RUN] Would convert: {}", target.display())
            }
            ConversionEvent::Converted { target } => {
                log::info!("Converted: {}", target.display())
            }
            ConversionEvent::Failed { target, error } => {
                log::error!("Error converting {}: {}", target.display(), error)
            }
        }
    }
}

/// Replaces the hardlinked target of every stored mapping with a symlink to
/// its source, one page of `batch_size` mappings at a time.
///
/// Per-mapping failures are counted and the run continues. A failure to
/// load a page ends the run with the counts gathered so far and one extra
/// error.
pub fn convert_to_symlinks(
    db: &Database,
    options: &ConversionOptions,
    reporter: &dyn ConversionReporter,
) -> Result<ConversionSummary, DatabaseError> {
    let batch_size = options.batch_size.max(1);
    let mut summary = ConversionSummary {
        total: mapping_repo::count(db)?,
        ..Default::default()
    };

    let _span = tracing::info_span!("convert_to_symlinks",
        total = summary.total,
        batch_size,
        dry_run = options.dry_run,
    )
    .entered();

    let mut after_id = 0;
    loop {
        let page = match mapping_repo::page_after(db, after_id, batch_size) {
            Ok(page) => page,
            Err(e) => {
                log::error!("Failed to load mappings after id {}: {}", after_id, e);
                summary.errors += 1;
                break;
            }
        };
        let Some(last) = page.last() else {
            break;
        };
        after_id = last.mapping.id;

        for mapping in &page {
            summary.processed += 1;
            match convert_one(mapping, options.dry_run, reporter) {
                Step::Converted => summary.converted += 1,
                Step::Error => summary.errors += 1,
                Step::Skipped => {}
            }
        }
    }

    Ok(summary)
}

enum Step {
    Converted,
    Skipped,
    Error,
}

fn convert_one(
    mapping: &MappingWithRule,
    dry_run: bool,
    reporter: &dyn ConversionReporter,
) -> Step {
    let target = match join_target(&mapping.target_dir, &mapping.mapping.target_name) {
        Ok(target) => target,
        Err(e) => {
            reporter.report(ConversionEvent::Failed {
                target: &PathBuf::from(mapping.target_path()),
                error: e.to_string(),
            });
            return Step::Error;
        }
    };

    // `exists` follows links, so a dangling symlink counts as missing.
    if !target.exists() {
        reporter.report(ConversionEvent::MissingTarget { target: &target });
        return Step::Skipped;
    }
    if std::fs::symlink_metadata(&target).is_ok_and(|m| m.file_type().is_symlink()) {
        reporter.report(ConversionEvent::AlreadySymlink { target: &target });
        return Step::Skipped;
    }

    let source = PathBuf::from(mapping.source_path());
    if !source.exists() {
        reporter.report(ConversionEvent::MissingSource { source: &source });
        return Step::Error;
    }

    if dry_run {
        reporter.report(ConversionEvent::WouldConvert { target: &target });
        return Step::Converted;
    }

    match replace_with_symlink(&source, &target) {
        Ok(()) => {
            reporter.report(ConversionEvent::Converted { target: &target });
            Step::Converted
        }
        Err(e) => {
            reporter.report(ConversionEvent::Failed {
                target: &target,
                error: e.to_string(),
            });
            Step::Error
        }
    }
}
