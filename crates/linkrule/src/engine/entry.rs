use serde::Serialize;

/// One file's outcome in a scan, preview or apply response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Entry {
    pub fn scanned(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: None,
            processed: None,
            error: None,
        }
    }

    pub fn mapped(source: impl Into<String>, target: impl Into<String>, processed: bool) -> Self {
        Self {
            source: source.into(),
            target: Some(target.into()),
            processed: Some(processed),
            error: None,
        }
    }

    pub fn failed(
        source: impl Into<String>,
        target: impl Into<String>,
        error: impl ToString,
    ) -> Self {
        Self {
            source: source.into(),
            target: Some(target.into()),
            processed: Some(false),
            error: Some(error.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scanned_serializes_source_only() {
        let json = serde_json::to_value(Entry::scanned("a.txt")).unwrap();
        assert_eq!(json, serde_json::json!({ "source": "a.txt" }));
    }

    #[test]
    fn test_failed_carries_error() {
        let entry = Entry::failed("a.txt", "a.bak", "Source file 'x' does not exist");
        assert!(!entry.is_ok());
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["processed"], false);
        assert_eq!(json["error"], "Source file 'x' does not exist");
    }
}
