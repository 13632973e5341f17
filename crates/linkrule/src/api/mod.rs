//! Request/response boundary over the [`Reconciler`](crate::engine::Reconciler).
//!
//! Requests arrive as JSON-shaped structs, responses leave as an
//! [`ApiResponse`] envelope carrying an HTTP-like status code.

pub mod handlers;
pub mod request;
pub mod response;

pub use handlers::Api;
pub use request::{RemoveRequest, RuleRequest, ScanRequest};
pub use response::{ApiResponse, EntriesResponse, RemoveResponse};
