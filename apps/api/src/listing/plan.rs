use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::listing::page::PaginationEnvelope;
use crate::listing::request::ListQueryRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorKind {
    InvalidPagination,
    UnknownSortKey,
}

/// Rejection of client-supplied list parameters. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub message: String,
}

impl ValidationError {
    fn invalid_pagination(message: impl Into<String>) -> Self {
        Self {
            kind: ValidationErrorKind::InvalidPagination,
            message: message.into(),
        }
    }

    fn unknown_sort_key(message: impl Into<String>) -> Self {
        Self {
            kind: ValidationErrorKind::UnknownSortKey,
            message: message.into(),
        }
    }
}

/// Logical sort orders a client may request by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Latest,
    MostLiked,
    MostCommented,
    MostPosted,
    MostBadge,
}

impl SortKey {
    pub const ALL: [SortKey; 5] = [
        SortKey::Latest,
        SortKey::MostLiked,
        SortKey::MostCommented,
        SortKey::MostPosted,
        SortKey::MostBadge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Latest => "latest",
            SortKey::MostLiked => "mostLiked",
            SortKey::MostCommented => "mostCommented",
            SortKey::MostPosted => "mostPosted",
            SortKey::MostBadge => "mostBadge",
        }
    }

    pub fn parse(raw: &str) -> Option<SortKey> {
        Self::ALL.into_iter().find(|key| key.as_str() == raw)
    }

    /// Every key is a single-field descending sort.
    pub fn spec(&self) -> SortSpec {
        let field = match self {
            SortKey::Latest => SortField::CreatedAt,
            SortKey::MostLiked => SortField::LikeCount,
            SortKey::MostCommented => SortField::CommentCount,
            SortKey::MostPosted => SortField::PostCount,
            SortKey::MostBadge => SortField::BadgeCount,
        };
        SortSpec {
            key: *self,
            field,
            direction: SortDirection::Desc,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete record attribute a sort is applied to. Stores map these to
/// their own columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    LikeCount,
    CommentCount,
    PostCount,
    BadgeCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    #[allow(dead_code)]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub key: SortKey,
    pub field: SortField,
    pub direction: SortDirection,
}

/// Row predicate derived from `keyword` and `isPublic`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    /// Case-insensitive substring of the resource's display field. Never empty.
    pub keyword: Option<String>,
    pub is_public: Option<bool>,
}

impl FilterSpec {
    pub fn matches_text(&self, text: &str) -> bool {
        match &self.keyword {
            Some(keyword) => text.to_lowercase().contains(&keyword.to_lowercase()),
            None => true,
        }
    }

    pub fn matches_visibility(&self, is_public: bool) -> bool {
        self.is_public.map_or(true, |wanted| wanted == is_public)
    }
}

/// Normalized, validated description of one page of a list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQueryPlan {
    pub page: u64,
    pub skip: u64,
    pub limit: u64,
    pub sort: SortSpec,
    pub filter: FilterSpec,
}

impl ListQueryPlan {
    /// Rejects sort keys that have no meaning for the listed resource.
    pub fn ensure_sort_supported(&self, supported: &[SortKey]) -> Result<(), ValidationError> {
        if supported.contains(&self.sort.key) {
            return Ok(());
        }
        let allowed: Vec<&str> = supported.iter().map(SortKey::as_str).collect();
        Err(ValidationError::unknown_sort_key(format!(
            "sortBy '{}' is not supported here (expected one of: {})",
            self.sort.key,
            allowed.join(", ")
        )))
    }

    pub fn envelope(&self, total_item_count: u64) -> PaginationEnvelope {
        PaginationEnvelope::new(self.page, self.limit, total_item_count)
    }
}

/// Turns raw list parameters into a plan. Pure; never touches storage.
pub fn plan_list_query(request: &ListQueryRequest) -> Result<ListQueryPlan, ValidationError> {
    let page = parse_positive("page", request.page.as_deref())?;
    let page_size = parse_positive("pageSize", request.page_size.as_deref())?;

    let raw_sort = request.sort_by.as_deref().unwrap_or_default();
    let sort_key = SortKey::parse(raw_sort)
        .ok_or_else(|| ValidationError::unknown_sort_key(format!("unknown sortBy '{raw_sort}'")))?;

    // Offsets are handed to Postgres as BIGINT.
    let skip = (page - 1)
        .checked_mul(page_size)
        .filter(|skip| i64::try_from(*skip).is_ok())
        .ok_or_else(|| ValidationError::invalid_pagination("page is out of range"))?;

    Ok(ListQueryPlan {
        page,
        skip,
        limit: page_size,
        sort: sort_key.spec(),
        filter: FilterSpec {
            keyword: request
                .keyword
                .as_deref()
                .filter(|k| !k.is_empty())
                .map(str::to_string),
            is_public: parse_visibility(request.is_public.as_deref()),
        },
    })
}

fn parse_positive(name: &str, raw: Option<&str>) -> Result<u64, ValidationError> {
    let raw = raw.ok_or_else(|| ValidationError::invalid_pagination(format!("{name} is required")))?;
    match raw.trim().parse::<u64>() {
        Ok(value) if value >= 1 && i64::try_from(value).is_ok() => Ok(value),
        _ => Err(ValidationError::invalid_pagination(format!(
            "{name} must be a positive integer, got '{raw}'"
        ))),
    }
}

/// Only the literal strings "true" and "false" filter; anything else means no filter.
fn parse_visibility(raw: Option<&str>) -> Option<bool> {
    match raw {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(page: &str, page_size: &str, sort_by: &str) -> ListQueryRequest {
        ListQueryRequest {
            page: Some(page.to_string()),
            page_size: Some(page_size.to_string()),
            sort_by: Some(sort_by.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_page_plan() {
        let plan = plan_list_query(&request("1", "10", "latest")).unwrap();
        assert_eq!(plan.skip, 0);
        assert_eq!(plan.limit, 10);
        assert_eq!(plan.sort.field, SortField::CreatedAt);
        assert_eq!(plan.sort.direction, SortDirection::Desc);
        assert_eq!(plan.filter, FilterSpec::default());
    }

    #[test]
    fn test_skip_is_page_offset() {
        let plan = plan_list_query(&request("3", "7", "mostLiked")).unwrap();
        assert_eq!(plan.skip, 14);
        assert_eq!(plan.limit, 7);
        assert_eq!(plan.sort.field, SortField::LikeCount);
    }

    #[test]
    fn test_page_zero_is_invalid() {
        let err = plan_list_query(&request("0", "10", "latest")).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::InvalidPagination);
    }

    #[test]
    fn test_bad_pagination_values() {
        for (page, size) in [("-1", "10"), ("abc", "10"), ("1", "0"), ("1", ""), ("1.5", "10")] {
            let err = plan_list_query(&request(page, size, "latest")).unwrap_err();
            assert_eq!(
                err.kind,
                ValidationErrorKind::InvalidPagination,
                "page={page} size={size}"
            );
        }
    }

    #[test]
    fn test_missing_pagination_is_invalid() {
        let req = ListQueryRequest {
            page_size: Some("10".to_string()),
            sort_by: Some("latest".to_string()),
            ..Default::default()
        };
        let err = plan_list_query(&req).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::InvalidPagination);
    }

    #[test]
    fn test_unknown_sort_key() {
        let err = plan_list_query(&request("2", "5", "bogus")).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::UnknownSortKey);
    }

    #[test]
    fn test_every_sort_key_resolves() {
        for key in SortKey::ALL {
            let plan = plan_list_query(&request("1", "10", key.as_str())).unwrap();
            assert_eq!(plan.sort.key, key);
        }
    }

    #[test]
    fn test_huge_page_overflow_is_invalid() {
        let err = plan_list_query(&request("9223372036854775807", "10", "latest")).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::InvalidPagination);
    }

    #[test]
    fn test_page_past_end_is_still_valid() {
        let plan = plan_list_query(&request("1000", "10", "latest")).unwrap();
        assert_eq!(plan.skip, 9990);
    }

    #[test]
    fn test_keyword_and_visibility_filter() {
        let req = ListQueryRequest {
            keyword: Some("Trip".to_string()),
            is_public: Some("false".to_string()),
            ..request("1", "10", "latest")
        };
        let plan = plan_list_query(&req).unwrap();
        assert_eq!(plan.filter.keyword.as_deref(), Some("Trip"));
        assert_eq!(plan.filter.is_public, Some(false));
        assert!(plan.filter.matches_text("Summer trip to Busan"));
        assert!(!plan.filter.matches_text("Winter"));
        assert!(plan.filter.matches_visibility(false));
        assert!(!plan.filter.matches_visibility(true));
    }

    #[test]
    fn test_visibility_only_on_literal_strings() {
        for raw in ["no", "TRUE", "1", ""] {
            let req = ListQueryRequest {
                is_public: Some(raw.to_string()),
                ..request("1", "10", "latest")
            };
            let plan = plan_list_query(&req).unwrap();
            assert_eq!(plan.filter.is_public, None, "isPublic={raw}");
            assert!(plan.filter.matches_visibility(true));
            assert!(plan.filter.matches_visibility(false));
        }
    }

    #[test]
    fn test_empty_keyword_is_no_filter() {
        let req = ListQueryRequest {
            keyword: Some(String::new()),
            ..request("1", "10", "latest")
        };
        assert_eq!(plan_list_query(&req).unwrap().filter.keyword, None);
    }

    #[test]
    fn test_sort_support_check() {
        let plan = plan_list_query(&request("1", "10", "mostBadge")).unwrap();
        let err = plan
            .ensure_sort_supported(&[SortKey::Latest, SortKey::MostLiked])
            .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::UnknownSortKey);
        assert!(plan.ensure_sort_supported(&SortKey::ALL).is_ok());
    }

    #[test]
    fn test_sort_direction_sql() {
        assert_eq!(SortDirection::Asc.sql(), "ASC");
        assert_eq!(SortDirection::Desc.sql(), "DESC");
    }
}
