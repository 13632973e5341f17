//! Rule patterns and target-name templating.
//!
//! Rule records store their regexes in delimiter syntax (`/^(.+)\.txt$/i`).
//! [`Pattern`] parses that form into a compiled [`regex::Regex`], and
//! [`render`] expands a target template against the first match.

pub mod delimited;
pub mod template;

pub use delimited::Pattern;
pub use template::{render, render_target_name};
