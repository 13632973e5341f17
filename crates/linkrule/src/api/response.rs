use serde::Serialize;

use crate::db::DatabaseError;
use crate::engine::Entry;
use crate::error::{EngineError, EnumerationError, ValidationErrors};

pub const STATUS_OK: u16 = 200;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_CONFLICT: u16 = 409;
pub const STATUS_UNPROCESSABLE: u16 = 422;
pub const STATUS_INTERNAL: u16 = 500;

#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,
    #[serde(skip)]
    status: u16,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            errors: None,
            status: STATUS_OK,
        }
    }

    pub fn err(status: u16, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            errors: None,
            status,
        }
    }

    pub fn invalid(errors: ValidationErrors) -> Self {
        Self {
            success: false,
            data: None,
            error: Some("The given data was invalid.".to_string()),
            errors: Some(errors),
            status: STATUS_UNPROCESSABLE,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn from_result(result: Result<T, EngineError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::from(e),
        }
    }
}

impl<T> From<EngineError> for ApiResponse<T> {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::Validation(errors) => Self::invalid(errors),
            EngineError::Enumeration(
                e @ (EnumerationError::NotFound(_) | EnumerationError::NotADirectory(_)),
            ) => Self::invalid(ValidationErrors::single("source_dir", e.to_string())),
            e @ EngineError::RuleNotFound(_) => Self::err(STATUS_NOT_FOUND, e.to_string()),
            EngineError::Database(e @ DatabaseError::Duplicate(_)) => {
                Self::err(STATUS_CONFLICT, e.to_string())
            }
            other => {
                log::error!("Request failed: {}", other);
                Self::err(STATUS_INTERNAL, other.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntriesResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<i64>,
    pub entries: Vec<Entry>,
}

impl EntriesResponse {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            rule_id: None,
            entries,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoveResponse {
    pub rule_id: i64,
    pub removed_targets: usize,
}
