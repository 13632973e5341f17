#![allow(dead_code)]

use std::path::Path;

use linkrule::{LinkMode, RuleSpec};

/// Builder for [`RuleSpec`] values.
pub struct RuleSpecBuilder {
    spec: RuleSpec,
}

impl RuleSpecBuilder {
    pub fn new(source_dir: &Path, target_dir: &Path) -> Self {
        Self {
            spec: RuleSpec {
                source_dir: source_dir.to_string_lossy().into_owned(),
                target_dir: target_dir.to_string_lossy().into_owned(),
                include_pattern: r"/^(.+)\.txt$/".to_string(),
                exclude_pattern: None,
                target_template: "$1.bak".to_string(),
                link_mode: LinkMode::Hardlink,
            },
        }
    }

    pub fn include(mut self, pattern: &str) -> Self {
        self.spec.include_pattern = pattern.to_string();
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.spec.exclude_pattern = Some(pattern.to_string());
        self
    }

    pub fn template(mut self, template: &str) -> Self {
        self.spec.target_template = template.to_string();
        self
    }

    pub fn mode(mut self, mode: LinkMode) -> Self {
        self.spec.link_mode = mode;
        self
    }

    pub fn build(self) -> RuleSpec {
        self.spec
    }
}
