use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkruleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Settings validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("Pattern is empty")]
    Empty,

    #[error("No ending delimiter '{delimiter}' found in pattern '{pattern}'")]
    Unterminated { pattern: String, delimiter: char },

    #[error("Unknown modifier '{flag}' in pattern '{pattern}'")]
    UnknownFlag { pattern: String, flag: char },

    #[error("Invalid regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },
}

#[derive(Error, Debug)]
pub enum EnumerationError {
    #[error("Source directory '{0}' does not exist")]
    NotFound(PathBuf),

    #[error("Source path '{0}' is not a directory")]
    NotADirectory(PathBuf),

    #[error("Directory scan failed for '{path}': {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Directory scan cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Source file '{0}' does not exist")]
    MissingSource(PathBuf),

    #[error("Invalid target name '{name}': {reason}")]
    InvalidTargetName { name: String, reason: &'static str },

    #[error("Target '{0}' is a directory")]
    TargetIsDirectory(PathBuf),

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create hardlink '{link}' to '{target}': {source}")]
    Link {
        link: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create symlink '{link}' to '{target}': {source}")]
    CreateSymlink {
        link: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to resolve path '{path}': {source}")]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove '{path}': {source}")]
    RemoveFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Field-keyed validation failures, reported all at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.fields
    }

    /// Returns `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Rule {0} not found")]
    RuleNotFound(i64),

    #[error("Enumeration failed: {0}")]
    Enumeration(#[from] EnumerationError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Reconciliation cancelled")]
    Cancelled,

    #[error("Rule lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, LinkruleError>;
