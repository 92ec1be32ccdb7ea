use serde::Deserialize;

pub const DEFAULT_PAGE: &str = "1";
pub const DEFAULT_PAGE_SIZE: &str = "10";
pub const DEFAULT_SORT: &str = "latest";

/// Raw list parameters exactly as they arrived in the query string.
///
/// Everything stays a string here; interpretation happens in the planner so
/// that malformed values produce a typed validation error instead of an
/// extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQueryRequest {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort_by: Option<String>,
    pub keyword: Option<String>,
    pub is_public: Option<String>,
}

impl ListQueryRequest {
    /// Fills in omitted `page`, `pageSize` and `sortBy`. Parameters that were
    /// supplied, even as empty strings, are left for the planner to judge.
    pub fn with_defaults(self) -> Self {
        Self {
            page: self.page.or_else(|| Some(DEFAULT_PAGE.to_string())),
            page_size: self.page_size.or_else(|| Some(DEFAULT_PAGE_SIZE.to_string())),
            sort_by: self.sort_by.or_else(|| Some(DEFAULT_SORT.to_string())),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_only_missing_fields() {
        let req = ListQueryRequest {
            page: Some("".to_string()),
            keyword: Some("trip".to_string()),
            ..Default::default()
        }
        .with_defaults();
        assert_eq!(req.page.as_deref(), Some(""));
        assert_eq!(req.page_size.as_deref(), Some("10"));
        assert_eq!(req.sort_by.as_deref(), Some("latest"));
        assert_eq!(req.keyword.as_deref(), Some("trip"));
        assert_eq!(req.is_public, None);
    }
}
