//! Offset and keyset pagination.
//!
//! Offset paging windows the filtered, sorted set with skip/take. Keyset
//! paging resumes from the sort-key values of a boundary record carried in
//! an opaque cursor, so pages stay stable while records are inserted or
//! removed elsewhere in the set.
//!
//! The end-of-set check compares page edges with the first and last records
//! of the filtered set in forward order. Those two records are fixed for a
//! request regardless of which direction it travels.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cursor::{Cursor, CursorCodec};
use crate::error::{EvaluateError, Result, SeekError};
use crate::filter::FilterNode;
use crate::ordering::SortSpec;
use crate::source::{FetchRequest, Source};
use crate::traits::Seekable;

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub paging: Paging,
}

impl<T> Page<T> {
    pub fn empty(paging: Paging) -> Self {
        Page {
            data: Vec::new(),
            paging,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Converts the records, keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            paging: self.paging,
        }
    }
}

/// Paging metadata.
///
/// Offset pages fill `current_page`; keyset pages fill `before`/`after`,
/// which are `None` on the first and last page respectively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paging {
    pub page_size: usize,
    pub total_page: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page: Option<usize>,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
}

impl Paging {
    pub fn offset(total: usize, page: usize, page_size: usize) -> Paging {
        let total_page = total_pages(total, page_size);
        Paging {
            page_size,
            total_page,
            current_page: Some(page),
            has_next_page: page < total_page,
            has_previous_page: page > 1,
            before: None,
            after: None,
        }
    }

    pub fn keyset(
        total: usize,
        page_size: usize,
        before: Option<String>,
        after: Option<String>,
    ) -> Paging {
        Paging {
            page_size,
            total_page: total_pages(total, page_size),
            current_page: None,
            has_next_page: after.is_some(),
            has_previous_page: before.is_some(),
            before,
            after,
        }
    }
}

fn total_pages(total: usize, page_size: usize) -> usize {
    if page_size == 0 {
        0
    } else {
        total.div_ceil(page_size)
    }
}

/// Skip and take for a 1-based page.
///
/// ```
/// use seekspec::pagination::offset_window;
///
/// assert_eq!(offset_window(3, 10).unwrap(), (20, 10));
/// assert!(offset_window(0, 10).is_err());
/// assert!(offset_window(1, 0).is_err());
/// ```
pub fn offset_window(page: usize, page_size: usize) -> Result<(usize, usize)> {
    if page == 0 {
        return Err(SeekError::InvalidPagination(
            "page numbers start at 1".to_string(),
        ));
    }
    if page_size == 0 {
        return Err(SeekError::InvalidPagination(
            "page size must be positive".to_string(),
        ));
    }
    let skip = (page - 1)
        .checked_mul(page_size)
        .ok_or_else(|| SeekError::InvalidPagination(format!("page {page} is out of range")))?;
    Ok((skip, page_size))
}

/// Where a keyset request starts.
#[derive(Debug)]
enum Position {
    Start,
    After(FilterNode),
    Before(FilterNode),
}

/// A validated keyset request, ready to run against a source.
///
/// Building one decodes the cursor, so every request error surfaces before
/// the source is queried.
#[derive(Debug)]
pub struct KeysetPager<'a> {
    filter: &'a FilterNode,
    sort: SortSpec,
    reversed: SortSpec,
    size: usize,
    position: Position,
    codec: &'a CursorCodec,
}

impl<'a> KeysetPager<'a> {
    pub fn new(
        filter: &'a FilterNode,
        sort: SortSpec,
        size: usize,
        before: Option<&str>,
        after: Option<&str>,
        codec: &'a CursorCodec,
    ) -> Result<Self> {
        if size == 0 {
            return Err(SeekError::InvalidPagination(
                "page size must be positive".to_string(),
            ));
        }
        if sort.tie_breaker().is_none() {
            return Err(SeekError::InvalidPagination(
                "keyset paging needs a unique tie-breaker".to_string(),
            ));
        }

        let reversed = sort.reversed();
        let position = match (blank_to_none(before), blank_to_none(after)) {
            (Some(_), Some(_)) => return Err(SeekError::ConflictingCursors),
            (None, Some(token)) => {
                let boundary = codec.boundary(token, &sort)?;
                Position::After(filter.clone().and(sort.keyset(&boundary)))
            }
            (Some(token), None) => {
                let boundary = codec.boundary(token, &sort)?;
                Position::Before(filter.clone().and(reversed.keyset(&boundary)))
            }
            (None, None) => Position::Start,
        };

        Ok(KeysetPager {
            filter,
            sort,
            reversed,
            size,
            position,
            codec,
        })
    }

    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }

    /// Fetches the page. `base` supplies includes and tracking flags.
    pub fn run<T, S>(
        &self,
        source: &S,
        base: FetchRequest<'_>,
    ) -> std::result::Result<Page<T>, EvaluateError<S::Error>>
    where
        T: Seekable,
        S: Source<T>,
    {
        let total = source.count(self.filter).map_err(EvaluateError::Source)?;
        if total == 0 {
            debug!(sort = %self.sort, "keyset page over empty set");
            return Ok(Page::empty(Paging::keyset(0, self.size, None, None)));
        }

        let edge = |order: &SortSpec| {
            source
                .fetch(&FetchRequest {
                    filter: self.filter,
                    order: Some(order),
                    skip: 0,
                    take: Some(1),
                    ..base
                })
                .map(|rows| rows.into_iter().next())
                .map_err(EvaluateError::Source)
        };
        let set_first = edge(&self.sort)?;
        let set_last = edge(&self.reversed)?;

        let (predicate, order) = match &self.position {
            Position::Start => (self.filter, &self.sort),
            Position::After(predicate) => (predicate, &self.sort),
            Position::Before(predicate) => (predicate, &self.reversed),
        };
        let mut rows = source
            .fetch(&FetchRequest {
                filter: predicate,
                order: Some(order),
                skip: 0,
                take: Some(self.size),
                ..base
            })
            .map_err(EvaluateError::Source)?;
        let backward = matches!(self.position, Position::Before(_));
        if backward {
            rows.reverse();
        }

        let short = rows.len() < self.size;
        let same = |row: &T, edge: &Option<T>| {
            edge.as_ref()
                .is_some_and(|e| self.sort.compare(row, e) == Ordering::Equal)
        };

        let previous = match (&self.position, rows.first()) {
            (Position::Start, _) | (_, None) => None,
            (Position::After(_), Some(first)) if same(first, &set_first) => None,
            (Position::Before(_), Some(first)) if short || same(first, &set_first) => None,
            (_, Some(first)) => Some(self.encode(first)?),
        };
        let next = match rows.last() {
            None => None,
            Some(last) if same(last, &set_last) => None,
            Some(_) if short && !backward => None,
            Some(last) => Some(self.encode(last)?),
        };

        debug!(
            sort = %self.sort,
            rows = rows.len(),
            total,
            has_previous = previous.is_some(),
            has_next = next.is_some(),
            "produced keyset page"
        );
        Ok(Page {
            data: rows,
            paging: Paging::keyset(total, self.size, previous, next),
        })
    }

    fn encode<T: Seekable>(&self, record: &T) -> Result<String> {
        self.codec.encode(&Cursor::capture(record, &self.sort))
    }
}

fn blank_to_none(token: Option<&str>) -> Option<&str> {
    token.filter(|t| !t.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, Schema};
    use crate::source::MemorySource;
    use crate::value::{Number, Value};

    static ROW: Schema = Schema::new(
        "Row",
        &[FieldDef::number("id"), FieldDef::number("rank")],
    );

    #[derive(Debug, Clone)]
    struct Row {
        id: i64,
        rank: i64,
    }

    impl Seekable for Row {
        fn schema() -> &'static Schema {
            &ROW
        }

        fn seeker_field_value(&self, field: &str) -> Value<'_> {
            match field {
                "id" => Value::Number(Number::I64(self.id)),
                "rank" => Value::Number(Number::I64(self.rank)),
                _ => Value::None,
            }
        }
    }

    fn rows(n: i64) -> Vec<Row> {
        (1..=n).map(|id| Row { id, rank: id % 3 }).collect()
    }

    fn base(filter: &FilterNode) -> FetchRequest<'_> {
        FetchRequest {
            filter,
            order: None,
            skip: 0,
            take: None,
            includes: &[],
            no_tracking: false,
            split_query: false,
        }
    }

    fn ids(page: &Page<Row>) -> Vec<i64> {
        page.data.iter().map(|r| r.id).collect()
    }

    fn page(
        data: &[Row],
        before: Option<&str>,
        after: Option<&str>,
        size: usize,
    ) -> Page<Row> {
        let all = FilterNode::Const(true);
        let codec = CursorCodec::new();
        let sort = SortSpec::compile(&ROW, "rank:desc", Some("id")).unwrap();
        let pager = KeysetPager::new(&all, sort, size, before, after, &codec).unwrap();
        pager.run(&MemorySource::new(data), base(&all)).unwrap()
    }

    #[test]
    fn offset_paging_metadata() {
        let paging = Paging::offset(25, 3, 10);
        assert_eq!(paging.total_page, 3);
        assert!(!paging.has_next_page);
        assert!(paging.has_previous_page);

        let paging = Paging::offset(0, 1, 10);
        assert_eq!(paging.total_page, 0);
        assert!(!paging.has_next_page);
        assert!(!paging.has_previous_page);
    }

    #[test]
    fn walks_forward_and_back() {
        let data = rows(7);
        // rank desc, id asc: 2,5 | 1,4,7 | 3,6
        let first = page(&data, None, None, 3);
        assert_eq!(ids(&first), vec![2, 5, 1]);
        assert!(first.paging.before.is_none());

        let second = page(&data, None, first.paging.after.as_deref(), 3);
        assert_eq!(ids(&second), vec![4, 7, 3]);

        let third = page(&data, None, second.paging.after.as_deref(), 3);
        assert_eq!(ids(&third), vec![6]);
        assert!(third.paging.after.is_none());
        assert!(third.paging.before.is_some());

        let back = page(&data, third.paging.before.as_deref(), None, 3);
        assert_eq!(ids(&back), vec![4, 7, 3]);
        let start = page(&data, back.paging.before.as_deref(), None, 3);
        assert_eq!(ids(&start), vec![2, 5, 1]);
        assert!(start.paging.before.is_none());
        assert!(start.paging.after.is_some());
    }

    #[test]
    fn exact_fit_has_no_next() {
        let data = rows(6);
        let first = page(&data, None, None, 3);
        let second = page(&data, None, first.paging.after.as_deref(), 3);
        assert_eq!(second.len(), 3);
        assert!(second.paging.after.is_none());
        assert!(!second.paging.has_next_page);
    }

    #[test]
    fn single_page_has_no_cursors() {
        let data = rows(4);
        let only = page(&data, None, None, 10);
        assert_eq!(only.len(), 4);
        assert!(only.paging.before.is_none());
        assert!(only.paging.after.is_none());
    }

    #[test]
    fn empty_set() {
        let only = page(&[], None, None, 10);
        assert!(only.is_empty());
        assert_eq!(only.paging.total_page, 0);
        assert!(only.paging.after.is_none());
    }

    #[test]
    fn request_errors() {
        let all = FilterNode::Const(true);
        let codec = CursorCodec::new();
        let sort = || SortSpec::compile(&ROW, "rank", Some("id")).unwrap();

        assert!(matches!(
            KeysetPager::new(&all, sort(), 3, Some("a"), Some("b"), &codec),
            Err(SeekError::ConflictingCursors)
        ));
        assert!(matches!(
            KeysetPager::new(&all, sort(), 0, None, None, &codec),
            Err(SeekError::InvalidPagination(_))
        ));
        assert!(matches!(
            KeysetPager::new(&all, sort(), 3, None, Some("garbage!"), &codec),
            Err(SeekError::MalformedCursor(_))
        ));
        let untied = SortSpec::compile(&ROW, "rank", None).unwrap();
        assert!(matches!(
            KeysetPager::new(&all, untied, 3, None, None, &codec),
            Err(SeekError::InvalidPagination(_))
        ));
    }

    #[test]
    fn serializes_like_the_wire_format() {
        let paging = Paging::offset(25, 1, 10);
        insta::assert_json_snapshot!(paging, @r#"
        {
          "pageSize": 10,
          "totalPage": 3,
          "currentPage": 1,
          "hasNextPage": true,
          "hasPreviousPage": false,
          "before": null,
          "after": null
        }
        "#);
    }
}
