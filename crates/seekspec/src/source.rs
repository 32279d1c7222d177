//! Record sources.
//!
//! A [`Source`] executes compiled predicates and orderings. Storage-backed
//! sources translate the [`FilterNode`] and [`SortSpec`] into their own query
//! language; [`MemorySource`] evaluates them directly over a slice.

use std::convert::Infallible;

use crate::filter::FilterNode;
use crate::ordering::SortSpec;
use crate::specification::Include;
use crate::traits::Seekable;

/// One fetch issued by the evaluator.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'q> {
    pub filter: &'q FilterNode,
    pub order: Option<&'q SortSpec>,
    pub skip: usize,
    /// `None` fetches everything after `skip`.
    pub take: Option<usize>,
    pub includes: &'q [Include],
    pub no_tracking: bool,
    pub split_query: bool,
}

/// A queryable collection of `T`.
///
/// Errors are passed through the evaluator untouched. Cancellation and
/// retries are the implementation's business.
pub trait Source<T> {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Number of records matching `filter`.
    fn count(&self, filter: &FilterNode) -> Result<usize, Self::Error>;

    /// Records matching the request, ordered and windowed.
    fn fetch(&self, request: &FetchRequest<'_>) -> Result<Vec<T>, Self::Error>;
}

impl<T, S: Source<T> + ?Sized> Source<T> for &S {
    type Error = S::Error;

    fn count(&self, filter: &FilterNode) -> Result<usize, Self::Error> {
        (**self).count(filter)
    }

    fn fetch(&self, request: &FetchRequest<'_>) -> Result<Vec<T>, Self::Error> {
        (**self).fetch(request)
    }
}

/// In-memory source over a borrowed slice.
///
/// Sorting is stable, so records that compare equal keep slice order.
///
/// ```
/// use seekspec::{FilterNode, MemorySource, Source};
/// # use seekspec::{FieldDef, Number, Schema, Seekable, Value};
/// # #[derive(Clone)]
/// # struct Row(i64);
/// # static ROW: Schema = Schema::new("Row", &[FieldDef::number("n")]);
/// # impl Seekable for Row {
/// #     fn schema() -> &'static Schema { &ROW }
/// #     fn seeker_field_value(&self, _: &str) -> Value<'_> { Value::Number(Number::I64(self.0)) }
/// # }
///
/// let rows = vec![Row(1), Row(2), Row(3)];
/// let source = MemorySource::new(&rows);
/// let all = FilterNode::Const(true);
/// assert_eq!(source.count(&all).unwrap(), 3);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MemorySource<'a, T> {
    items: &'a [T],
}

impl<'a, T> MemorySource<'a, T> {
    pub fn new(items: &'a [T]) -> Self {
        MemorySource { items }
    }

    pub fn items(&self) -> &'a [T] {
        self.items
    }
}

impl<'a, T> From<&'a [T]> for MemorySource<'a, T> {
    fn from(items: &'a [T]) -> Self {
        MemorySource::new(items)
    }
}

impl<'a, T> From<&'a Vec<T>> for MemorySource<'a, T> {
    fn from(items: &'a Vec<T>) -> Self {
        MemorySource::new(items)
    }
}

impl<T: Seekable + Clone> Source<T> for MemorySource<'_, T> {
    type Error = Infallible;

    fn count(&self, filter: &FilterNode) -> Result<usize, Infallible> {
        Ok(self.items.iter().filter(|item| filter.matches(*item)).count())
    }

    fn fetch(&self, request: &FetchRequest<'_>) -> Result<Vec<T>, Infallible> {
        let mut matched: Vec<&T> = self
            .items
            .iter()
            .filter(|item| request.filter.matches(*item))
            .collect();

        if let Some(order) = request.order {
            matched.sort_by(|a, b| order.compare(*a, *b));
        }

        let window = matched.into_iter().skip(request.skip);
        let rows = match request.take {
            Some(n) => window.take(n).cloned().collect(),
            None => window.cloned().collect(),
        };
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, Schema};
    use crate::value::{Number, Value};
    use serde_json::json;

    static ROW: Schema = Schema::new(
        "Row",
        &[FieldDef::number("id"), FieldDef::number("group")],
    );

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: i64,
        group: i64,
    }

    impl Seekable for Row {
        fn schema() -> &'static Schema {
            &ROW
        }

        fn seeker_field_value(&self, field: &str) -> Value<'_> {
            match field {
                "id" => Value::Number(Number::I64(self.id)),
                "group" => Value::Number(Number::I64(self.group)),
                _ => Value::None,
            }
        }
    }

    fn rows() -> Vec<Row> {
        (1..=6).map(|id| Row { id, group: id % 2 }).collect()
    }

    fn request<'q>(filter: &'q FilterNode, order: Option<&'q SortSpec>) -> FetchRequest<'q> {
        FetchRequest {
            filter,
            order,
            skip: 0,
            take: None,
            includes: &[],
            no_tracking: false,
            split_query: false,
        }
    }

    #[test]
    fn filters_sorts_and_windows() {
        let rows = rows();
        let source = MemorySource::from(&rows);
        let filter = crate::filter::compile(&ROW, &json!({"group": 0})).unwrap();
        let order = SortSpec::compile(&ROW, "id:desc", None).unwrap();

        assert_eq!(source.count(&filter).unwrap(), 3);

        let mut req = request(&filter, Some(&order));
        req.skip = 1;
        req.take = Some(5);
        let ids: Vec<i64> = source.fetch(&req).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 2]);
    }

    #[test]
    fn unordered_fetch_keeps_slice_order() {
        let rows = rows();
        let source = MemorySource::new(&rows);
        let all = FilterNode::Const(true);
        let mut req = request(&all, None);
        req.skip = 10;
        assert!(source.fetch(&req).unwrap().is_empty());
        req.skip = 0;
        assert_eq!(source.fetch(&req).unwrap(), rows);
    }
}
