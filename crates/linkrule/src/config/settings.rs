use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::maintenance::convert::DEFAULT_BATCH_SIZE;
use crate::storage::LinkMode;

/// User settings read from `~/.linkrule/config.json`. Every field is
/// optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub default_link_mode: LinkMode,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            default_link_mode: LinkMode::default(),
            batch_size: default_batch_size(),
        }
    }
}

impl Settings {
    /// The configured database path, or `~/.linkrule/data/linkrule.db`.
    pub fn resolve_database_path(&self) -> Option<PathBuf> {
        self.database_path
            .clone()
            .or_else(crate::db::default_database_path)
    }
}
