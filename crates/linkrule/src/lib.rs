pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod maintenance;
pub mod pattern;
pub mod scanner;
pub mod storage;

pub use api::{Api, ApiResponse};
pub use config::{load_settings, load_settings_or_default, Settings};
pub use db::{Database, DatabaseError};
pub use engine::{
    ApplyOutcome, Cancellation, CompiledRule, DeleteOutcome, Entry, Reconciler, RuleSpec,
};
pub use error::{
    ConfigError, EnumerationError, EngineError, LinkruleError, PatternError, Result, StorageError,
    ValidationErrors,
};
pub use maintenance::{convert_to_symlinks, ConversionOptions, ConversionSummary};
pub use pattern::{render, render_target_name, Pattern};
pub use scanner::SourceScanner;
pub use storage::{DirectoryReaper, LinkMode, Materializer};
