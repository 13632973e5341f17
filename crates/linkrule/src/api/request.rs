use serde::Deserialize;

use crate::engine::RuleSpec;
use crate::storage::LinkMode;

/// Fields shared by preview, apply and apply-once.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleRequest {
    #[serde(default)]
    pub source_dir: String,
    #[serde(default)]
    pub target_dir: String,
    #[serde(default)]
    pub include_pattern: String,
    #[serde(default)]
    pub exclude_pattern: Option<String>,
    #[serde(default)]
    pub target_template: String,
    #[serde(default)]
    pub rule_id: Option<i64>,
    /// `false` moves files instead of linking them, unless `link_mode` is set.
    #[serde(default)]
    pub keep_original: Option<bool>,
    #[serde(default)]
    pub link_mode: Option<LinkMode>,
}

impl RuleRequest {
    pub fn link_mode(&self, default: LinkMode) -> LinkMode {
        match (self.link_mode, self.keep_original) {
            (Some(mode), _) => mode,
            (None, Some(false)) => LinkMode::Move,
            (None, _) => default,
        }
    }

    pub fn to_spec(&self, default_mode: LinkMode) -> RuleSpec {
        RuleSpec {
            source_dir: self.source_dir.clone(),
            target_dir: self.target_dir.clone(),
            include_pattern: self.include_pattern.clone(),
            exclude_pattern: self.exclude_pattern.clone(),
            target_template: self.target_template.clone(),
            link_mode: self.link_mode(default_mode),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub source_dir: String,
    #[serde(default)]
    pub include_pattern: String,
    #[serde(default)]
    pub exclude_pattern: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoveRequest {
    #[serde(default)]
    pub rule_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_mode_resolution() {
        let request = RuleRequest::default();
        assert_eq!(request.link_mode(LinkMode::Symlink), LinkMode::Symlink);

        let moving = RuleRequest {
            keep_original: Some(false),
            ..Default::default()
        };
        assert_eq!(moving.link_mode(LinkMode::Hardlink), LinkMode::Move);

        let explicit = RuleRequest {
            keep_original: Some(false),
            link_mode: Some(LinkMode::Symlink),
            ..Default::default()
        };
        assert_eq!(explicit.link_mode(LinkMode::Hardlink), LinkMode::Symlink);
    }

    #[test]
    fn test_deserialize_partial_request() {
        let request: RuleRequest = serde_json::from_str(
            r#"{ "source_dir": "/in", "include_pattern": "/.*/", "link_mode": "symlink" }"#,
        )
        .unwrap();
        assert_eq!(request.source_dir, "/in");
        assert!(request.target_dir.is_empty());
        assert_eq!(request.link_mode, Some(LinkMode::Symlink));
        assert!(request.rule_id.is_none());
    }
}
