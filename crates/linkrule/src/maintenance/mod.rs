//! Batch maintenance jobs over the stored mappings.

pub mod convert;

pub use convert::{
    convert_to_symlinks, ConversionEvent, ConversionOptions, ConversionReporter,
    ConversionSummary, LogReporter, NoopReporter,
};
