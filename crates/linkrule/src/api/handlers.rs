use crate::engine::{Cancellation, Reconciler};
use crate::error::{EngineError, ValidationErrors};
use crate::storage::LinkMode;

use super::request::{RemoveRequest, RuleRequest, ScanRequest};
use super::response::{ApiResponse, EntriesResponse, RemoveResponse};

/// Request handlers bound to one reconciler.
pub struct Api {
    reconciler: Reconciler,
    default_link_mode: LinkMode,
}

impl Api {
    pub fn new(reconciler: Reconciler, default_link_mode: LinkMode) -> Self {
        Self {
            reconciler,
            default_link_mode,
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn scan(&self, request: &ScanRequest) -> ApiResponse<EntriesResponse> {
        ApiResponse::from_result(
            self.reconciler
                .scan(
                    &request.source_dir,
                    &request.include_pattern,
                    request.exclude_pattern.as_deref(),
                )
                .map(EntriesResponse::new),
        )
    }

    pub fn preview(&self, request: &RuleRequest) -> ApiResponse<EntriesResponse> {
        let spec = request.to_spec(self.default_link_mode);
        ApiResponse::from_result(
            self.reconciler
                .preview(&spec, request.rule_id)
                .map(EntriesResponse::new),
        )
    }

    pub fn apply(
        &self,
        request: &RuleRequest,
        cancel: &Cancellation,
    ) -> ApiResponse<EntriesResponse> {
        let spec = request.to_spec(self.default_link_mode);
        ApiResponse::from_result(self.reconciler.apply(&spec, request.rule_id, cancel).map(
            |outcome| EntriesResponse {
                rule_id: Some(outcome.rule.id),
                entries: outcome.entries,
            },
        ))
    }

    pub fn apply_once(&self, request: &RuleRequest) -> ApiResponse<EntriesResponse> {
        let spec = request.to_spec(self.default_link_mode);
        ApiResponse::from_result(
            self.reconciler
                .apply_once(&spec, spec.link_mode)
                .map(EntriesResponse::new),
        )
    }

    pub fn remove(&self, request: &RemoveRequest) -> ApiResponse<RemoveResponse> {
        let Some(rule_id) = request.rule_id else {
            return ApiResponse::from(EngineError::from(ValidationErrors::single(
                "rule_id",
                "is required",
            )));
        };
        ApiResponse::from_result(self.reconciler.delete_rule(rule_id).map(|outcome| {
            RemoveResponse {
                rule_id: outcome.rule.id,
                removed_targets: outcome.removed_targets,
            }
        }))
    }
}
