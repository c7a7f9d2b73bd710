// Ignore List - codes suppressed before they ever reach the result

/// Codes a check drops before insertion.
///
/// `overrides == None` means "use the defaults". `Some(vec![])` is an
/// explicit override that ignores nothing, which is not the same thing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreList {
    defaults: Vec<String>,
    overrides: Option<Vec<String>>,
}

impl IgnoreList {
    pub fn new<I, S>(defaults: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            defaults: defaults.into_iter().map(Into::into).collect(),
            overrides: None,
        }
    }

    /// Replace the defaults with a caller-supplied list (possibly empty)
    pub fn with_overrides(mut self, overrides: Option<Vec<String>>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn is_ignored(&self, code: &str) -> bool {
        self.overrides
            .as_ref()
            .unwrap_or(&self.defaults)
            .iter()
            .any(|c| c == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_without_override() {
        let list = IgnoreList::new(["contributor_ignored"]);
        assert!(list.is_ignored("contributor_ignored"));
        assert!(!list.is_ignored("tested_header_ignored"));
    }

    #[test]
    fn test_empty_override_ignores_nothing() {
        let list = IgnoreList::new(["contributor_ignored"]).with_overrides(Some(vec![]));
        assert!(!list.is_ignored("contributor_ignored"));
    }

    #[test]
    fn test_override_replaces_defaults() {
        let list = IgnoreList::new(["contributor_ignored"])
            .with_overrides(Some(vec!["tested_header_ignored".to_string()]));
        assert!(list.is_ignored("tested_header_ignored"));
        assert!(!list.is_ignored("contributor_ignored"));
    }
}
