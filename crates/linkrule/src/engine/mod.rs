//! Rule reconciliation.
//!
//! A [`Reconciler`] aligns a rule's persisted mappings and its on-disk
//! targets with the current source tree: it creates links for new files,
//! re-links files whose rendered target changed, and retires mappings whose
//! source disappeared, then reaps directories left empty.

pub mod cancel;
pub mod entry;
pub mod locks;
pub mod reconciler;
pub mod rule;

pub use cancel::Cancellation;
pub use entry::Entry;
pub use locks::RuleLocks;
pub use reconciler::{ApplyOutcome, DeleteOutcome, Reconciler};
pub use rule::{normalize_dir, CompiledRule, RuleSpec, SourceFilters};
