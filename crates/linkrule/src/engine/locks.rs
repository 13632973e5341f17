use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::EngineError;

/// One mutex per rule id, so two passes over the same rule never interleave
/// while passes over different rules run freely.
#[derive(Debug, Default)]
pub struct RuleLocks {
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl RuleLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for `rule_id`, creating it on first use.
    pub fn handle(&self, rule_id: i64) -> Result<Arc<Mutex<()>>, EngineError> {
        let mut locks = self.locks.lock().map_err(|_| EngineError::LockPoisoned)?;
        Ok(Arc::clone(locks.entry(rule_id).or_default()))
    }

    /// Drops the lock of a deleted rule. Holders of the handle keep it alive.
    pub fn forget(&self, rule_id: i64) {
        if let Ok(mut locks) = self.locks.lock() {
            locks.remove(&rule_id);
        }
    }
}
