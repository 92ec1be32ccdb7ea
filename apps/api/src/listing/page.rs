use serde::Serialize;

/// Pagination metadata returned alongside a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationEnvelope {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_item_count: u64,
}

impl PaginationEnvelope {
    pub fn new(current_page: u64, page_size: u64, total_item_count: u64) -> Self {
        Self {
            current_page,
            total_pages: total_item_count.div_ceil(page_size.max(1)),
            total_item_count,
        }
    }
}

/// `{currentPage, totalPages, totalItemCount, data}` response body.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    #[serde(flatten)]
    pub pagination: PaginationEnvelope,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(pagination: PaginationEnvelope, data: Vec<T>) -> Self {
        Self { pagination, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_result_has_zero_pages() {
        let env = PaginationEnvelope::new(1, 10, 0);
        assert_eq!(env.total_pages, 0);
        assert_eq!(env.total_item_count, 0);
    }

    #[test]
    fn test_partial_last_page_rounds_up() {
        let env = PaginationEnvelope::new(3, 10, 25);
        assert_eq!(env.current_page, 3);
        assert_eq!(env.total_pages, 3);
    }

    #[test]
    fn test_exact_multiple() {
        assert_eq!(PaginationEnvelope::new(1, 5, 20).total_pages, 4);
    }

    #[test]
    fn test_page_serializes_flat() {
        let page = Page::new(PaginationEnvelope::new(2, 1, 2), vec!["b"]);
        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            json!({
                "currentPage": 2,
                "totalPages": 2,
                "totalItemCount": 2,
                "data": ["b"]
            })
        );
    }
}
