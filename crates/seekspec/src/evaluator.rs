//! Runs specifications against a [`Source`].

use tracing::debug;

use crate::config::PagingConfig;
use crate::cursor::CursorCodec;
use crate::error::{EvaluateError, SeekError};
use crate::ordering::SortSpec;
use crate::pagination::{offset_window, KeysetPager, Page, Paging};
use crate::request::{CursorRequest, OffsetRequest, QueryRequest};
use crate::source::{FetchRequest, Source};
use crate::specification::{Specification, SpecificationBuilder};
use crate::traits::Seekable;

type EvalResult<T, S, R> = std::result::Result<R, EvaluateError<<S as Source<T>>::Error>>;

/// Applies specifications to a source.
///
/// Everything a request can get wrong is checked before the source is
/// called, so [`EvaluateError::Source`] only ever carries source failures.
///
/// ```
/// use seekspec::{Evaluator, FieldDef, MemorySource, OffsetRequest, Schema, Seekable, Specification, Value};
/// use serde_json::json;
///
/// #[derive(Clone)]
/// struct Item {
///     n: i64,
/// }
///
/// static ITEM: Schema = Schema::new("Item", &[FieldDef::number("n")]);
///
/// impl Seekable for Item {
///     fn schema() -> &'static Schema {
///         &ITEM
///     }
///
///     fn seeker_field_value(&self, _: &str) -> Value<'_> {
///         Value::Number(self.n.into())
///     }
/// }
///
/// let items: Vec<Item> = (1..=25).map(|n| Item { n }).collect();
/// let evaluator = Evaluator::new(MemorySource::new(&items));
/// let spec = Specification::<Item>::builder()
///     .filter(&json!({"n": {"$gt": 5}}))?
///     .sort("n", None)?
///     .build();
///
/// let page = evaluator.paginate(&spec, OffsetRequest::new(2, 10)).unwrap();
/// assert_eq!(page.data.first().map(|i| i.n), Some(16));
/// assert_eq!(page.paging.total_page, 2);
/// # Ok::<(), seekspec::SeekError>(())
/// ```
#[derive(Debug)]
pub struct Evaluator<S> {
    source: S,
    config: PagingConfig,
    codec: CursorCodec,
}

impl<S> Evaluator<S> {
    pub fn new(source: S) -> Self {
        Evaluator {
            source,
            config: PagingConfig::default(),
            codec: CursorCodec::default(),
        }
    }

    pub fn with_config(mut self, config: PagingConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the codec used for cursor tokens.
    pub fn with_codec(mut self, codec: CursorCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &PagingConfig {
        &self.config
    }

    pub fn codec(&self) -> &CursorCodec {
        &self.codec
    }

    fn base<'q, T>(spec: &'q Specification<T>) -> FetchRequest<'q> {
        FetchRequest {
            filter: spec.predicate(),
            order: spec.sort(),
            skip: 0,
            take: None,
            includes: spec.includes(),
            no_tracking: spec.is_no_tracking(),
            split_query: spec.is_split_query(),
        }
    }

    /// All matching records in specification order.
    pub fn list<T>(&self, spec: &Specification<T>) -> EvalResult<T, S, Vec<T>>
    where
        S: Source<T>,
    {
        self.source
            .fetch(&Self::base(spec))
            .map_err(EvaluateError::Source)
    }

    pub fn count<T>(&self, spec: &Specification<T>) -> EvalResult<T, S, usize>
    where
        S: Source<T>,
    {
        self.source
            .count(spec.predicate())
            .map_err(EvaluateError::Source)
    }

    /// Offset paging. The page size is capped at the configured maximum.
    pub fn paginate<T>(&self, spec: &Specification<T>, request: OffsetRequest) -> EvalResult<T, S, Page<T>>
    where
        S: Source<T>,
    {
        let (skip, take) = offset_window(request.page, self.config.clamp(request.page_size))?;

        let total = self.count(spec)?;
        let data = self
            .source
            .fetch(&FetchRequest {
                skip,
                take: Some(take),
                ..Self::base(spec)
            })
            .map_err(EvaluateError::Source)?;

        debug!(page = request.page, size = take, rows = data.len(), total, "produced offset page");
        Ok(Page {
            data,
            paging: Paging::offset(total, request.page, take),
        })
    }

    /// Keyset paging.
    ///
    /// The request's sort wins over the specification's; the tie-breaker
    /// falls back to the one compiled into the specification's sort.
    pub fn paginate_cursor<T>(&self, spec: &Specification<T>, request: &CursorRequest) -> EvalResult<T, S, Page<T>>
    where
        T: Seekable,
        S: Source<T>,
    {
        let sort = keyset_sort(spec, request)?;
        let size = self.config.clamp(request.size);
        let pager = KeysetPager::new(
            spec.predicate(),
            sort,
            size,
            request.before.as_deref(),
            request.after.as_deref(),
            &self.codec,
        )?;
        pager.run(&self.source, Self::base(spec))
    }

    /// Compiles and runs a caller request.
    ///
    /// A `cursor` in the request selects keyset paging with `tie_breaker`;
    /// otherwise offset paging is used. Zero page sizes take the configured
    /// default.
    pub fn query<T>(&self, request: &QueryRequest, tie_breaker: &str) -> EvalResult<T, S, Page<T>>
    where
        T: Seekable,
        S: Source<T>,
    {
        let spec = SpecificationBuilder::<T>::new()
            .search_depth(self.config.default_search_depth)
            .request(request, Some(tie_breaker))?
            .build();
        let size = self.config.page_size(request.page_size);

        match request.cursor_request(tie_breaker) {
            Some(cursor) => self.paginate_cursor(&spec, &CursorRequest { size, ..cursor }),
            None => self.paginate(&spec, OffsetRequest::new(request.page, size)),
        }
    }
}

fn keyset_sort<T: Seekable>(spec: &Specification<T>, request: &CursorRequest) -> crate::Result<SortSpec> {
    let tie_breaker = Some(request.unique_sort.trim())
        .filter(|t| !t.is_empty())
        .or_else(|| spec.sort().and_then(SortSpec::tie_breaker))
        .ok_or_else(|| {
            SeekError::InvalidPagination("keyset paging needs a unique tie-breaker".to_string())
        })?;

    let requested = request.sort.as_deref().filter(|s| !s.trim().is_empty());
    let sort = match (requested, spec.sort()) {
        (Some(sort), _) => sort.to_string(),
        (None, Some(existing)) => existing.to_string(),
        (None, None) => String::new(),
    };
    SortSpec::compile(T::schema(), &sort, Some(tie_breaker))
}
