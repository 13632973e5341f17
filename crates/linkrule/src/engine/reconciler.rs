use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use log::{debug, info, warn};
use serde::Serialize;
use tracing::info_span;

use crate::db::{mapping_repo, rule_repo, Database, MappingRow, RuleRow, RuleSummary};
use crate::error::{EngineError, EnumerationError, ValidationErrors};
use crate::storage::materializer::{join_target, remove_target, target_present};
use crate::storage::{DirectoryReaper, LinkMode, Materialized, Materializer};

use super::rule::dirs_overlap;
use super::{Cancellation, CompiledRule, Entry, RuleLocks, RuleSpec, SourceFilters};

/// Result of an apply pass.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutcome {
    pub rule: RuleRow,
    pub entries: Vec<Entry>,
    /// Mappings dropped because their source is gone or filtered out.
    pub retired: usize,
    pub reaped: usize,
}

/// Result of deleting a rule.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub rule: RuleRow,
    pub removed_targets: usize,
    pub reaped: usize,
}

/// Drives scan, preview, apply and delete for rules stored in a [`Database`].
///
/// Passes over the same rule are serialized through [`RuleLocks`]; rule
/// creation and updates additionally hold a creation lock so the natural
/// key and the target overlap check cannot race.
///
/// Rules targeting overlapping directories are rejected, so a pass only ever
/// touches files below its own `target_dir`.
pub struct Reconciler {
    db: Database,
    locks: RuleLocks,
    creation: Mutex<()>,
}

impl Reconciler {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            locks: RuleLocks::new(),
            creation: Mutex::new(()),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Every stored rule with its mapping counts.
    pub fn rules(&self) -> Result<Vec<RuleSummary>, EngineError> {
        Ok(rule_repo::list_with_counts(&self.db)?)
    }

    /// Lists the files a rule would pick up. Read-only.
    pub fn scan(
        &self,
        source_dir: &str,
        include_pattern: &str,
        exclude_pattern: Option<&str>,
    ) -> Result<Vec<Entry>, EngineError> {
        let mut errors = ValidationErrors::new();
        let Some(filters) =
            SourceFilters::compile(source_dir, include_pattern, exclude_pattern, &mut errors)
        else {
            return Err(errors.into());
        };

        let files = filters.scanner().scan()?;
        Ok(files.into_iter().map(Entry::scanned).collect())
    }

    /// Renders the target of every matching file with the candidate `spec`
    /// and reports whether the stored rule already materialized it.
    /// Nothing is written.
    pub fn preview(
        &self,
        spec: &RuleSpec,
        rule_id: Option<i64>,
    ) -> Result<Vec<Entry>, EngineError> {
        let rule = spec.validate()?;
        let existing = match rule_id {
            Some(id) => Some(self.find_rule(id)?),
            None => rule_repo::find_by_dirs(&self.db, rule.source_dir(), &rule.target_dir)?,
        };

        let files = rule.scanner().scan()?;
        let mut entries = Vec::with_capacity(files.len());
        for source in files {
            let target = rule.target_name(&source);
            if let Err(e) = rule.target_path(&target) {
                entries.push(Entry::failed(source, target, e));
                continue;
            }
            let processed = match &existing {
                Some(row) => mapping_repo::find_exact(&self.db, row.id, &source, &target)?
                    .is_some_and(|m| m.processed),
                None => false,
            };
            entries.push(Entry::mapped(source, target, processed));
        }
        Ok(entries)
    }

    /// Creates or updates the rule described by `spec` and reconciles its
    /// mappings and targets with the source tree.
    ///
    /// The source tree is walked before anything is written, so a failed or
    /// cancelled walk leaves the database untouched. Cancellation between
    /// files keeps the files already handled and skips retirement and
    /// reaping.
    pub fn apply(
        &self,
        spec: &RuleSpec,
        rule_id: Option<i64>,
        cancel: &Cancellation,
    ) -> Result<ApplyOutcome, EngineError> {
        let compiled = spec.validate()?;
        let files = compiled
            .scanner()
            .scan_with_cancel(cancel)
            .map_err(|e| match e {
                EnumerationError::Cancelled => EngineError::Cancelled,
                other => other.into(),
            })?;

        let creating = self.creation.lock().map_err(|_| EngineError::LockPoisoned)?;
        let rule_id = match rule_id {
            Some(id) => self.find_rule(id)?.id,
            None => {
                let existing =
                    rule_repo::find_by_dirs(&self.db, compiled.source_dir(), &compiled.target_dir)?;
                match existing {
                    Some(row) => row.id,
                    None => {
                        self.check_overlap(&compiled, None)?;
                        let row = rule_repo::insert(&self.db, &compiled.to_new_rule())?;
                        info!(
                            "Created rule {} ({} -> {})",
                            row.id, row.source_dir, row.target_dir
                        );
                        row.id
                    }
                }
            }
        };

        let handle = self.locks.handle(rule_id)?;
        let _guard = handle.lock().map_err(|_| EngineError::LockPoisoned)?;

        let previous = self.find_rule(rule_id)?;
        let rule = if compiled.differs_from(&previous) {
            self.check_overlap(&compiled, Some(rule_id))?;
            rule_repo::update(&self.db, &compiled.apply_to(&previous))?;
            self.find_rule(rule_id)?
        } else {
            previous.clone()
        };
        drop(creating);

        let _span = info_span!("reconcile",
            rule_id = rule.id,
            source_dir = %rule.source_dir,
        )
        .entered();

        if previous.source_dir != rule.source_dir || previous.target_dir != rule.target_dir {
            info!(
                "Rule {} moved from {} -> {}, retiring old mappings",
                rule.id, previous.source_dir, previous.target_dir
            );
            self.retire_all(&previous)?;
        }

        // Targets are deleted only when neither the old nor the new mode
        // moved the data there.
        let removes_targets =
            row_link_mode(&previous).keeps_source() && compiled.link_mode.keeps_source();
        let materializer = Materializer::new(compiled.link_mode);

        let mut entries = Vec::with_capacity(files.len());
        for source_name in &files {
            if cancel.is_cancelled() {
                warn!(
                    "Rule {} cancelled after {} of {} files",
                    rule.id,
                    entries.len(),
                    files.len()
                );
                return Err(EngineError::Cancelled);
            }
            entries.push(self.reconcile_file(
                &compiled,
                rule.id,
                source_name,
                &materializer,
                removes_targets,
            )?);
        }

        let current: HashSet<String> = files.into_iter().collect();
        let retired = self.retire_stale(&compiled, rule.id, &current, removes_targets)?;
        let reaped = reap_target_root(&compiled.target_dir);

        let failed = entries.iter().filter(|e| !e.is_ok()).count();
        info!(
            "Rule {} reconciled: {} files, {} failed, {} retired, {} directories reaped",
            rule.id,
            entries.len(),
            failed,
            retired,
            reaped
        );

        Ok(ApplyOutcome {
            rule,
            entries,
            retired,
            reaped,
        })
    }

    /// Deletes a rule, its mappings and (unless it moved files) its targets.
    pub fn delete_rule(&self, rule_id: i64) -> Result<DeleteOutcome, EngineError> {
        let handle = self.locks.handle(rule_id)?;
        let outcome = {
            let _guard = handle.lock().map_err(|_| EngineError::LockPoisoned)?;
            let rule = self.find_rule(rule_id)?;
            let _span = info_span!("delete_rule",
                rule_id = rule.id,
                target_dir = %rule.target_dir,
            )
            .entered();

            let (removed_targets, reaped) = self.retire_all(&rule)?;
            rule_repo::delete(&self.db, rule_id)?;
            info!(
                "Deleted rule {} ({} targets removed)",
                rule_id, removed_targets
            );

            DeleteOutcome {
                rule,
                removed_targets,
                reaped,
            }
        };
        self.locks.forget(rule_id);
        Ok(outcome)
    }

    /// Renders and materializes every matching file without touching the
    /// database.
    pub fn apply_once(&self, spec: &RuleSpec, mode: LinkMode) -> Result<Vec<Entry>, EngineError> {
        let rule = spec.validate()?;
        let _span = info_span!("apply_once",
            source_dir = %rule.source_dir(),
            mode = %mode,
        )
        .entered();

        let materializer = Materializer::new(mode);
        let files = rule.scanner().scan()?;
        let entries = files
            .into_iter()
            .map(|source| {
                let target = rule.target_name(&source);
                let result = rule
                    .target_path(&target)
                    .and_then(|path| materializer.materialize(&rule.source_path(&source), &path));
                match result {
                    Ok(_) => Entry::mapped(source, target, true),
                    Err(e) => {
                        warn!("Failed to materialize {}: {}", source, e);
                        Entry::failed(source, target, e)
                    }
                }
            })
            .collect();
        Ok(entries)
    }

    fn find_rule(&self, id: i64) -> Result<RuleRow, EngineError> {
        rule_repo::find_by_id(&self.db, id)?.ok_or(EngineError::RuleNotFound(id))
    }

    fn check_overlap(&self, rule: &CompiledRule, own_id: Option<i64>) -> Result<(), EngineError> {
        for other in rule_repo::list(&self.db)? {
            if Some(other.id) == own_id {
                continue;
            }
            if dirs_overlap(&rule.target_dir, &other.target_dir) {
                return Err(ValidationErrors::single(
                    "target_dir",
                    format!(
                        "overlaps the target directory of rule {} ({})",
                        other.id, other.target_dir
                    ),
                )
                .into());
            }
        }
        Ok(())
    }

    /// Brings one source file's mapping and target up to date.
    ///
    /// Filesystem failures land on the returned entry; database failures
    /// abort the pass.
    fn reconcile_file(
        &self,
        rule: &CompiledRule,
        rule_id: i64,
        source_name: &str,
        materializer: &Materializer,
        removes_targets: bool,
    ) -> Result<Entry, EngineError> {
        let target_name = rule.target_name(source_name);
        let existing = mapping_repo::find(&self.db, rule_id, source_name)?;

        // A name outside the target root is never recorded; an earlier
        // mapping for this source is retired instead.
        let target_path = match rule.target_path(&target_name) {
            Ok(path) => path,
            Err(e) => {
                warn!("Skipping {}: {}", source_name, e);
                if let Some(existing) = existing {
                    self.retire_mapping(rule, &existing, removes_targets)?;
                }
                return Ok(Entry::failed(source_name, target_name, e));
            }
        };

        let mapping = match existing {
            None => mapping_repo::insert(&self.db, rule_id, source_name, &target_name)?,
            Some(existing) if existing.target_name != target_name => {
                if removes_targets {
                    if let Ok(stale) = rule.target_path(&existing.target_name) {
                        if let Err(e) = remove_target(&stale) {
                            warn!("Could not remove stale target {}: {}", stale.display(), e);
                            return Ok(Entry::failed(source_name, target_name, e));
                        }
                    }
                }
                debug!(
                    "Target of {} changed: {} -> {}",
                    source_name, existing.target_name, target_name
                );
                mapping_repo::update_target(&self.db, existing.id, &target_name)?;
                MappingRow {
                    target_name: target_name.clone(),
                    processed: false,
                    ..existing
                }
            }
            Some(existing) => existing,
        };

        if mapping.processed && target_present(&target_path) {
            return Ok(Entry::mapped(source_name, target_name, true));
        }

        match materializer.materialize(&rule.source_path(source_name), &target_path) {
            Ok(outcome) => {
                match outcome {
                    Materialized::Created => info!(
                        "{} {} -> {}",
                        materializer.mode(),
                        source_name,
                        target_name
                    ),
                    Materialized::AlreadyPresent => {
                        debug!("Target {} already present", target_path.display())
                    }
                }
                mapping_repo::set_processed(&self.db, mapping.id, true)?;
                Ok(Entry::mapped(source_name, target_name, true))
            }
            Err(e) => {
                warn!("Failed to materialize {}: {}", source_name, e);
                if mapping.processed {
                    mapping_repo::set_processed(&self.db, mapping.id, false)?;
                }
                Ok(Entry::failed(source_name, target_name, e))
            }
        }
    }

    /// Drops mappings whose source is no longer enumerated. A mapping whose
    /// target cannot be removed is kept so the next pass retries it.
    fn retire_stale(
        &self,
        rule: &CompiledRule,
        rule_id: i64,
        current: &HashSet<String>,
        removes_targets: bool,
    ) -> Result<usize, EngineError> {
        let mut retired = 0;
        for mapping in mapping_repo::find_stale(&self.db, rule_id, current)? {
            if self.retire_mapping(rule, &mapping, removes_targets)? {
                retired += 1;
            }
        }
        Ok(retired)
    }

    /// Removes a mapping's target (when `removes_targets`), then the mapping.
    /// Returns `false` when the target could not be removed and the mapping
    /// was kept for a retry.
    fn retire_mapping(
        &self,
        rule: &CompiledRule,
        mapping: &MappingRow,
        removes_targets: bool,
    ) -> Result<bool, EngineError> {
        if removes_targets {
            match rule.target_path(&mapping.target_name) {
                Ok(target) => {
                    if let Err(e) = remove_target(&target) {
                        warn!("Could not retire {}: {}", target.display(), e);
                        return Ok(false);
                    }
                }
                Err(e) => warn!("Leaving target of {} in place: {}", mapping.source_name, e),
            }
        }
        mapping_repo::delete(&self.db, mapping.id)?;
        debug!(
            "Retired mapping {} -> {}",
            mapping.source_name, mapping.target_name
        );
        Ok(true)
    }

    /// Removes every mapping of `rule` and its targets, then reaps the
    /// rule's target root. Returns (targets removed, directories reaped).
    fn retire_all(&self, rule: &RuleRow) -> Result<(usize, usize), EngineError> {
        let removes_targets = row_link_mode(rule).keeps_source();
        let mut removed = 0;

        for mapping in mapping_repo::list_for_rule(&self.db, rule.id)? {
            if !removes_targets {
                continue;
            }
            let target = match join_target(&rule.target_dir, &mapping.target_name) {
                Ok(target) => target,
                Err(e) => {
                    warn!("Leaving target of {} in place: {}", mapping.source_name, e);
                    continue;
                }
            };
            match remove_target(&target) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!("Could not remove {}: {}", target.display(), e),
            }
        }

        mapping_repo::delete_for_rule(&self.db, rule.id)?;
        let reaped = reap_target_root(&rule.target_dir);
        Ok((removed, reaped))
    }
}

fn row_link_mode(row: &RuleRow) -> LinkMode {
    row.link_mode.parse().unwrap_or_default()
}

fn reap_target_root(target_dir: &str) -> usize {
    let root = Path::new(target_dir);
    if !root.is_dir() {
        return 0;
    }
    DirectoryReaper::reap(root)
}
