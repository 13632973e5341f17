use std::path::PathBuf;

use crate::db::{NewRule, RuleRow};
use crate::error::{StorageError, ValidationErrors};
use crate::pattern::{render_target_name, Pattern};
use crate::scanner::SourceScanner;
use crate::storage::materializer::join_target;
use crate::storage::LinkMode;

/// Raw rule fields as supplied by a caller, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSpec {
    pub source_dir: String,
    pub target_dir: String,
    pub include_pattern: String,
    pub exclude_pattern: Option<String>,
    pub target_template: String,
    pub link_mode: LinkMode,
}

impl RuleSpec {
    /// Checks every field and compiles the patterns. All problems are
    /// reported together, keyed by field name.
    pub fn validate(&self) -> Result<CompiledRule, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let filters = SourceFilters::compile(
            &self.source_dir,
            &self.include_pattern,
            self.exclude_pattern.as_deref(),
            &mut errors,
        );
        let target_dir = check_directory("target_dir", &self.target_dir, &mut errors);
        if self.target_template.is_empty() {
            errors.add("target_template", "is required");
        } else if let Some(message) = check_template(&self.target_template) {
            errors.add("target_template", message);
        }

        match (filters, target_dir) {
            (Some(filters), Some(target_dir)) if errors.is_empty() => Ok(CompiledRule {
                filters,
                target_dir,
                target_template: self.target_template.clone(),
                link_mode: self.link_mode,
            }),
            _ => Err(errors),
        }
    }
}

/// A source directory plus compiled include/exclude filters.
#[derive(Debug, Clone)]
pub struct SourceFilters {
    pub source_dir: String,
    pub include: Pattern,
    pub exclude: Option<Pattern>,
}

impl SourceFilters {
    /// Validates the scan-relevant fields, recording failures in `errors`.
    pub fn compile(
        source_dir: &str,
        include_pattern: &str,
        exclude_pattern: Option<&str>,
        errors: &mut ValidationErrors,
    ) -> Option<Self> {
        let source_dir = check_directory("source_dir", source_dir, errors);

        let include = if include_pattern.is_empty() {
            errors.add("include_pattern", "is required");
            None
        } else {
            Pattern::parse(include_pattern)
                .map_err(|e| errors.add("include_pattern", e.to_string()))
                .ok()
        };

        let exclude = match exclude_pattern.filter(|p| !p.is_empty()) {
            Some(raw) => match Pattern::parse(raw) {
                Ok(pattern) => Some(Some(pattern)),
                Err(e) => {
                    errors.add("exclude_pattern", e.to_string());
                    None
                }
            },
            None => Some(None),
        };

        Some(Self {
            source_dir: source_dir?,
            include: include?,
            exclude: exclude?,
        })
    }

    pub fn scanner(&self) -> SourceScanner<'_> {
        SourceScanner::new(&self.source_dir, &self.include, self.exclude.as_ref())
    }
}

/// A validated rule: normalized directories and compiled patterns.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub filters: SourceFilters,
    pub target_dir: String,
    pub target_template: String,
    pub link_mode: LinkMode,
}

impl CompiledRule {
    pub fn source_dir(&self) -> &str {
        &self.filters.source_dir
    }

    pub fn scanner(&self) -> SourceScanner<'_> {
        self.filters.scanner()
    }

    pub fn target_name(&self, source_name: &str) -> String {
        render_target_name(&self.filters.include, &self.target_template, source_name)
    }

    pub fn source_path(&self, source_name: &str) -> PathBuf {
        PathBuf::from(format!("{}{}", self.filters.source_dir, source_name))
    }

    /// Where `target_name` lives. Names that would escape `target_dir` or
    /// name the directory itself are rejected.
    pub fn target_path(&self, target_name: &str) -> Result<PathBuf, StorageError> {
        join_target(&self.target_dir, target_name)
    }

    /// Whether this rule's record fields differ from `row`.
    pub fn differs_from(&self, row: &RuleRow) -> bool {
        let new = self.to_new_rule();
        new.source_dir != row.source_dir
            || new.target_dir != row.target_dir
            || new.include_pattern != row.include_pattern
            || new.exclude_pattern != row.exclude_pattern
            || new.target_template != row.target_template
            || new.link_mode != row.link_mode
    }

    pub fn to_new_rule(&self) -> NewRule {
        NewRule {
            source_dir: self.filters.source_dir.clone(),
            target_dir: self.target_dir.clone(),
            include_pattern: self.filters.include.as_str().to_string(),
            exclude_pattern: self
                .filters
                .exclude
                .as_ref()
                .map(|p| p.as_str().to_string()),
            target_template: self.target_template.clone(),
            link_mode: self.link_mode.as_str().to_string(),
        }
    }

    /// `row` with this rule's fields written over it.
    pub fn apply_to(&self, row: &RuleRow) -> RuleRow {
        let new = self.to_new_rule();
        RuleRow {
            source_dir: new.source_dir,
            target_dir: new.target_dir,
            include_pattern: new.include_pattern,
            exclude_pattern: new.exclude_pattern,
            target_template: new.target_template,
            link_mode: new.link_mode,
            ..row.clone()
        }
    }
}

/// Strips trailing separators and appends exactly one.
pub fn normalize_dir(dir: &str) -> String {
    format!("{}/", dir.trim_end_matches('/'))
}

/// True when one directory contains the other. Both must be normalized.
pub fn dirs_overlap(a: &str, b: &str) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

/// Literal template text that can never render a path below the target
/// root. Placeholder output is checked per file when it is rendered.
fn check_template(template: &str) -> Option<&'static str> {
    if template.starts_with('/') {
        Some("must render a relative path")
    } else if template.ends_with('/') {
        Some("must render a file name, not a directory")
    } else if template.split('/').any(|c| c == "." || c == "..") {
        Some("must not contain '.' or '..' path components")
    } else {
        None
    }
}

fn check_directory(field: &str, raw: &str, errors: &mut ValidationErrors) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        errors.add(field, "is required");
        return None;
    }
    if !trimmed.starts_with('/') {
        errors.add(field, "must be an absolute path");
        return None;
    }
    Some(normalize_dir(trimmed))
}
