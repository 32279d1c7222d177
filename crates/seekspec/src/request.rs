//! Caller-facing request shapes.
//!
//! These deserialize from camelCase JSON, so an HTTP layer can bind them
//! directly:
//!
//! ```
//! use seekspec::QueryRequest;
//!
//! let request: QueryRequest = serde_json::from_str(
//!     r#"{
//!         "page": 2,
//!         "pageSize": 10,
//!         "sort": "age:desc",
//!         "search": {"keyword": "jo", "targets": ["name"]},
//!         "filter": {"age": {"$gte": 18}}
//!     }"#,
//! )
//! .unwrap();
//! assert_eq!(request.offset().page, 2);
//! assert!(request.cursor.is_none());
//! ```

use serde::{Deserialize, Serialize};

use crate::filter::FilterValue;

/// Filter, search, sort and paging in one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryRequest {
    /// 1-based page for offset paging.
    pub page: usize,
    /// Zero means the configured default.
    pub page_size: usize,
    /// Switches to keyset paging when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<CursorPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchRequest>,
    /// `"field:dir,field:dir"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterValue>,
}

impl Default for QueryRequest {
    fn default() -> Self {
        QueryRequest {
            page: 1,
            page_size: 0,
            cursor: None,
            search: None,
            sort: None,
            filter: None,
        }
    }
}

impl QueryRequest {
    pub fn offset(&self) -> OffsetRequest {
        OffsetRequest {
            page: self.page,
            page_size: self.page_size,
        }
    }

    /// Keyset request for this query, `None` in offset mode.
    pub fn cursor_request(&self, tie_breaker: &str) -> Option<CursorRequest> {
        self.cursor.as_ref().map(|position| CursorRequest {
            before: position.before.clone(),
            after: position.after.clone(),
            size: self.page_size,
            sort: self.sort.clone(),
            unique_sort: tie_breaker.to_string(),
        })
    }
}

/// Cursor tokens from a previous page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorPosition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    /// Field paths to search; discovered automatically when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,
    /// Discovery depth override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<i32>,
}

impl SearchRequest {
    pub fn keyword(keyword: impl Into<String>) -> Self {
        SearchRequest {
            keyword: Some(keyword.into()),
            ..Self::default()
        }
    }

    pub fn targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = Some(targets.into_iter().map(Into::into).collect());
        self
    }

    pub fn depth(mut self, depth: i32) -> Self {
        self.depth = Some(depth);
        self
    }

    /// The keyword, unless blank.
    pub fn effective_keyword(&self) -> Option<&str> {
        self.keyword.as_deref().filter(|k| !k.trim().is_empty())
    }
}

/// Offset paging parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffsetRequest {
    pub page: usize,
    pub page_size: usize,
}

impl OffsetRequest {
    pub fn new(page: usize, page_size: usize) -> Self {
        OffsetRequest { page, page_size }
    }
}

/// Keyset paging parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CursorRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    /// Tie-breaker field, unique per record (`"id"` or `"id:desc"`).
    pub unique_sort: String,
}

impl CursorRequest {
    pub fn new(size: usize, unique_sort: impl Into<String>) -> Self {
        CursorRequest {
            size,
            unique_sort: unique_sort.into(),
            ..Self::default()
        }
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn after(mut self, token: impl Into<String>) -> Self {
        self.after = Some(token.into());
        self
    }

    pub fn before(mut self, token: impl Into<String>) -> Self {
        self.before = Some(token.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_take_defaults() {
        let request: QueryRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(request, QueryRequest::default());
        assert_eq!(request.offset(), OffsetRequest::new(1, 0));
        assert!(request.cursor_request("id").is_none());
    }

    #[test]
    fn cursor_request_carries_sort_and_size() {
        let request: QueryRequest = serde_json::from_value(json!({
            "pageSize": 10,
            "sort": "name",
            "cursor": {"after": "abc"}
        }))
        .unwrap();
        let cursor = request.cursor_request("id").unwrap();
        assert_eq!(
            cursor,
            CursorRequest::new(10, "id").sort("name").after("abc")
        );
    }

    #[test]
    fn blank_keywords_are_ignored() {
        assert_eq!(SearchRequest::keyword("  ").effective_keyword(), None);
        assert_eq!(SearchRequest::keyword("jo").effective_keyword(), Some("jo"));
    }

    #[test]
    fn serializes_camel_case() {
        let request = CursorRequest::new(5, "id");
        insta::assert_json_snapshot!(request, @r#"
        {
          "size": 5,
          "uniqueSort": "id"
        }
        "#);
    }
}
