//! Paging defaults and limits.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const MAX_PAGE_SIZE: usize = 1000;

/// Evaluator settings, loadable from any serde format.
///
/// Missing fields take their defaults:
///
/// ```
/// use seekspec::PagingConfig;
///
/// let config: PagingConfig = serde_json::from_str(r#"{"maxPageSize": 50}"#).unwrap();
/// assert_eq!(config.max_page_size, 50);
/// assert_eq!(config.default_page_size, 100);
/// assert_eq!(config.page_size(0), 50);
/// assert_eq!(config.page_size(20), 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PagingConfig {
    /// Used when a request asks for zero items per page.
    pub default_page_size: usize,
    /// Hard upper bound on any page.
    pub max_page_size: usize,
    /// Nesting depth for search field discovery.
    pub default_search_depth: i32,
}

impl Default for PagingConfig {
    fn default() -> Self {
        PagingConfig {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            default_search_depth: 0,
        }
    }
}

impl PagingConfig {
    /// Effective page size: zero means the default, and nothing exceeds the
    /// maximum.
    pub fn page_size(&self, requested: usize) -> usize {
        let size = if requested == 0 {
            self.default_page_size
        } else {
            requested
        };
        size.min(self.max_page_size.max(1))
    }

    /// Caps an explicit size without substituting the default.
    pub fn clamp(&self, requested: usize) -> usize {
        requested.min(self.max_page_size.max(1))
    }
}
