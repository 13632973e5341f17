pub mod materializer;
pub mod reaper;

pub use materializer::{LinkMode, Materialized, Materializer};
pub use reaper::DirectoryReaper;
