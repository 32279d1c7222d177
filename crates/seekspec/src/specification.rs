//! Specifications: a compiled predicate plus the directives that shape a
//! query.
//!
//! A [`Specification`] is immutable once built. Build one with
//! [`SpecificationBuilder`] or compile a whole [`QueryRequest`] with
//! [`Specification::from_request`], then hand it to an
//! [`Evaluator`](crate::Evaluator).

use std::fmt;
use std::marker::PhantomData;

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{Result, SeekError};
use crate::filter::{self, Combinator, FilterNode, FilterValue};
use crate::ordering::SortSpec;
use crate::request::{QueryRequest, SearchRequest};
use crate::search;
use crate::traits::Seekable;

static MATCH_ALL: FilterNode = FilterNode::Const(true);

/// A related path to load with each record. Sources decide what loading
/// means; the engine only checks that the path exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Include {
    path: String,
}

impl Include {
    /// Canonical dotted path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for Include {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Predicate, ordering, includes and flags for queries over `T`.
///
/// # Example
///
/// ```
/// use seekspec::{FieldDef, Schema, Seekable, Specification, Value};
/// use serde_json::json;
///
/// struct User {
///     age: i64,
/// }
///
/// static USER: Schema = Schema::new("User", &[FieldDef::number("age")]);
///
/// impl Seekable for User {
///     fn schema() -> &'static Schema {
///         &USER
///     }
///
///     fn seeker_field_value(&self, field: &str) -> Value<'_> {
///         match field {
///             "age" => Value::Number(self.age.into()),
///             _ => Value::None,
///         }
///     }
/// }
///
/// let adults = Specification::<User>::builder()
///     .filter(&json!({"age": {"$gte": 18}}))?
///     .sort("age:desc", Some("age"))?
///     .no_tracking()
///     .build();
///
/// assert!(adults.matches(&User { age: 30 }));
/// assert!(!adults.matches(&User { age: 12 }));
/// # Ok::<(), seekspec::SeekError>(())
/// ```
pub struct Specification<T> {
    criteria: Option<FilterNode>,
    sort: Option<SortSpec>,
    includes: Vec<Include>,
    no_tracking: bool,
    split_query: bool,
    cache_key: Option<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for Specification<T> {
    fn default() -> Self {
        Specification {
            criteria: None,
            sort: None,
            includes: Vec::new(),
            no_tracking: false,
            split_query: false,
            cache_key: None,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for Specification<T> {
    fn clone(&self) -> Self {
        Specification {
            criteria: self.criteria.clone(),
            sort: self.sort.clone(),
            includes: self.includes.clone(),
            no_tracking: self.no_tracking,
            split_query: self.split_query,
            cache_key: self.cache_key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Specification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Specification")
            .field("criteria", &self.criteria)
            .field("sort", &self.sort)
            .field("includes", &self.includes)
            .field("no_tracking", &self.no_tracking)
            .field("split_query", &self.split_query)
            .field("cache_key", &self.cache_key)
            .finish()
    }
}

impl<T> Specification<T> {
    /// A specification matching every record.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn criteria(&self) -> Option<&FilterNode> {
        self.criteria.as_ref()
    }

    /// The criteria, or a match-all node when there are none.
    pub fn predicate(&self) -> &FilterNode {
        self.criteria.as_ref().unwrap_or(&MATCH_ALL)
    }

    pub fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    pub fn includes(&self) -> &[Include] {
        &self.includes
    }

    pub fn is_no_tracking(&self) -> bool {
        self.no_tracking
    }

    pub fn is_split_query(&self) -> bool {
        self.split_query
    }

    /// Key set through [`SpecificationBuilder::cache`].
    pub fn cache_key(&self) -> Option<&str> {
        self.cache_key.as_deref()
    }

    /// Both specifications must match.
    ///
    /// Missing criteria match everything, so the other side is kept as is.
    /// Includes are merged, flags OR-ed, the left sort wins and the cache
    /// key is dropped.
    pub fn and(self, other: Specification<T>) -> Specification<T> {
        let criteria = match (self.criteria.clone(), other.criteria.clone()) {
            (Some(a), Some(b)) => Some(a.and(b)),
            (a, b) => a.or(b),
        };
        self.merge(other, criteria)
    }

    /// Either specification may match. Missing criteria on either side
    /// make the result match everything.
    pub fn or(self, other: Specification<T>) -> Specification<T> {
        let criteria = match (self.criteria.clone(), other.criteria.clone()) {
            (Some(a), Some(b)) => Some(a.or(b)),
            _ => None,
        };
        self.merge(other, criteria)
    }

    fn merge(self, other: Specification<T>, criteria: Option<FilterNode>) -> Specification<T> {
        let mut includes = self.includes;
        for include in other.includes {
            if !includes.contains(&include) {
                includes.push(include);
            }
        }
        Specification {
            criteria,
            sort: self.sort.or(other.sort),
            includes,
            no_tracking: self.no_tracking || other.no_tracking,
            split_query: self.split_query || other.split_query,
            cache_key: None,
            _marker: PhantomData,
        }
    }
}

impl<T: Seekable> Specification<T> {
    pub fn builder() -> SpecificationBuilder<T> {
        SpecificationBuilder::new()
    }

    /// Compiles filter, search and sort of a caller request.
    ///
    /// `tie_breaker` is appended to the sort when given.
    pub fn from_request(request: &QueryRequest, tie_breaker: Option<&str>) -> Result<Self> {
        Ok(Self::builder().request(request, tie_breaker)?.build())
    }

    pub fn matches(&self, record: &T) -> bool {
        self.predicate().matches(record)
    }

    /// Deterministic key built from the canonical rendering, followed by
    /// `~` and the JSON text of `extra` when given.
    ///
    /// Equal specifications over the same type always produce equal keys.
    pub fn cache_key_with(&self, extra: Option<&JsonValue>) -> String {
        let mut key = format!("{}|{}", T::schema().name, self);
        if let Some(extra) = extra {
            key.push('~');
            key.push_str(&extra.to_string());
        }
        key
    }
}

impl<T> fmt::Display for Specification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "where {}", self.predicate())?;
        if let Some(sort) = &self.sort {
            write!(f, " order {sort}")?;
        }
        if !self.includes.is_empty() {
            let paths: Vec<&str> = self.includes.iter().map(Include::path).collect();
            write!(f, " include [{}]", paths.join(", "))?;
        }
        if self.no_tracking {
            f.write_str(" no_tracking")?;
        }
        if self.split_query {
            f.write_str(" split_query")?;
        }
        Ok(())
    }
}

/// Fluent builder for [`Specification`].
///
/// Methods that compile request input return `Result<Self>`, so a chain
/// stops at the first bad field, operator or path.
pub struct SpecificationBuilder<T> {
    spec: Specification<T>,
    last_include: Option<String>,
    search_depth: i32,
}

impl<T> fmt::Debug for SpecificationBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecificationBuilder")
            .field("spec", &self.spec)
            .field("last_include", &self.last_include)
            .field("search_depth", &self.search_depth)
            .finish()
    }
}

impl<T: Seekable> Default for SpecificationBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Seekable> SpecificationBuilder<T> {
    pub fn new() -> Self {
        SpecificationBuilder {
            spec: Specification::default(),
            last_include: None,
            search_depth: 0,
        }
    }

    // ========================================================================
    // Criteria
    // ========================================================================

    /// Compiles a filter document and ANDs it with the current criteria.
    pub fn filter(self, document: &FilterValue) -> Result<Self> {
        let node = filter::compile(T::schema(), document)?;
        Ok(self.combine(node, Combinator::And))
    }

    /// ANDs an already compiled predicate.
    pub fn filter_node(self, node: FilterNode) -> Self {
        self.combine(node, Combinator::And)
    }

    /// Joins `node` with the current criteria; with no criteria yet, `node`
    /// becomes the criteria.
    pub fn combine(mut self, node: FilterNode, combinator: Combinator) -> Self {
        self.spec.criteria = Some(match self.spec.criteria.take() {
            None => node,
            Some(current) => match combinator {
                Combinator::And => current.and(node),
                Combinator::Or => current.or(node),
            },
        });
        self
    }

    /// Default discovery depth for [`search`](Self::search).
    pub fn search_depth(mut self, depth: i32) -> Self {
        self.search_depth = depth;
        self
    }

    /// ANDs a keyword search. Blank keywords are ignored.
    pub fn search(self, request: &SearchRequest) -> Result<Self> {
        let Some(keyword) = request.effective_keyword() else {
            return Ok(self);
        };
        let depth = request.depth.unwrap_or(self.search_depth);
        let node = search::compile(T::schema(), keyword, request.targets.as_deref(), depth)?;
        Ok(self.combine(node, Combinator::And))
    }

    // ========================================================================
    // Ordering
    // ========================================================================

    /// Compiles `"field:dir,..."` and appends the tie-breaker.
    pub fn sort(mut self, sort: &str, tie_breaker: Option<&str>) -> Result<Self> {
        self.spec.sort = Some(SortSpec::compile(T::schema(), sort, tie_breaker)?);
        Ok(self)
    }

    pub fn sort_spec(mut self, sort: SortSpec) -> Self {
        self.spec.sort = Some(sort);
        self
    }

    // ========================================================================
    // Includes
    // ========================================================================

    /// Adds a related path to load.
    pub fn include(mut self, path: &str) -> Result<Self> {
        let canonical = resolve_include::<T>(path)?;
        self.push_include(canonical);
        Ok(self)
    }

    /// Adds a path relative to the previous include's target.
    pub fn then_include(mut self, path: &str) -> Result<Self> {
        let Some(parent) = self.last_include.as_deref() else {
            return Err(SeekError::InvalidInclude {
                path: path.to_string(),
            });
        };
        let canonical = resolve_include::<T>(&format!("{parent}.{path}"))?;
        self.push_include(canonical);
        Ok(self)
    }

    fn push_include(&mut self, path: String) {
        self.last_include = Some(path.clone());
        let include = Include { path };
        if !self.spec.includes.contains(&include) {
            self.spec.includes.push(include);
        }
    }

    // ========================================================================
    // Flags
    // ========================================================================

    pub fn no_tracking(mut self) -> Self {
        self.spec.no_tracking = true;
        self
    }

    pub fn split_query(mut self) -> Self {
        self.spec.split_query = true;
        self
    }

    pub fn cache(mut self, key: impl Into<String>) -> Self {
        self.spec.cache_key = Some(key.into());
        self
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Applies filter, search and sort from a caller request.
    ///
    /// The sort is compiled when the request has one or a tie-breaker is
    /// given.
    pub fn request(self, request: &QueryRequest, tie_breaker: Option<&str>) -> Result<Self> {
        let mut builder = self;
        if let Some(document) = &request.filter {
            builder = builder.filter(document)?;
        }
        if let Some(search) = &request.search {
            builder = builder.search(search)?;
        }
        let sort = request.sort.as_deref().unwrap_or("");
        if !sort.trim().is_empty() || tie_breaker.is_some() {
            builder = builder.sort(sort, tie_breaker)?;
        }
        Ok(builder)
    }

    pub fn build(self) -> Specification<T> {
        debug!(schema = T::schema().name, spec = %self.spec, "built specification");
        self.spec
    }
}

fn resolve_include<T: Seekable>(path: &str) -> Result<String> {
    T::schema()
        .resolve(path)
        .map(|meta| meta.path())
        .map_err(|_| SeekError::InvalidInclude {
            path: path.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, Schema};
    use crate::value::{Number, Value};
    use serde_json::json;

    static ADDRESS: Schema = Schema::new(
        "Address",
        &[FieldDef::string("city"), FieldDef::object("country", country)],
    );

    fn address() -> &'static Schema {
        &ADDRESS
    }

    static COUNTRY: Schema = Schema::new("Country", &[FieldDef::string("code")]);

    fn country() -> &'static Schema {
        &COUNTRY
    }

    static USER: Schema = Schema::new(
        "User",
        &[
            FieldDef::number("id"),
            FieldDef::number("age"),
            FieldDef::string("name"),
            FieldDef::object("address", address).nullable(),
        ],
    );

    struct User {
        id: i64,
        age: i64,
        name: &'static str,
    }

    impl Seekable for User {
        fn schema() -> &'static Schema {
            &USER
        }

        fn seeker_field_value(&self, field: &str) -> Value<'_> {
            match field {
                "id" => Value::Number(Number::I64(self.id)),
                "age" => Value::Number(Number::I64(self.age)),
                "name" => Value::String(self.name),
                _ => Value::None,
            }
        }
    }

    fn user(age: i64, name: &'static str) -> User {
        User { id: 1, age, name }
    }

    fn spec(filter: serde_json::Value) -> Specification<User> {
        Specification::builder().filter(&filter).unwrap().build()
    }

    #[test]
    fn empty_spec_matches_everything() {
        let all = Specification::<User>::all();
        assert!(all.criteria().is_none());
        assert!(all.matches(&user(1, "x")));
    }

    #[test]
    fn and_or_combination() {
        let adult = spec(json!({"age": {"$gte": 18}}));
        let john = spec(json!({"name": "John"}));

        let both = adult.clone().and(john.clone());
        assert!(both.matches(&user(30, "John")));
        assert!(!both.matches(&user(10, "John")));

        let either = adult.clone().or(john);
        assert!(either.matches(&user(10, "John")));
        assert!(!either.matches(&user(10, "Mark")));

        // absent criteria are match-all
        let kept = adult.clone().and(Specification::all());
        assert!(!kept.matches(&user(10, "Mark")));
        let widened = adult.or(Specification::all());
        assert!(widened.criteria().is_none());
    }

    #[test]
    fn combine_or_with_existing_criteria() {
        let young = filter::compile(&USER, &json!({"age": {"$lt": 18}})).unwrap();
        let spec = Specification::<User>::builder()
            .filter(&json!({"name": "John"}))
            .unwrap()
            .combine(young, Combinator::Or)
            .build();
        assert!(spec.matches(&user(10, "Mark")));
        assert!(spec.matches(&user(40, "John")));
        assert!(!spec.matches(&user(40, "Mark")));
    }

    #[test]
    fn search_is_anded_and_blank_keyword_ignored() {
        let spec = Specification::<User>::builder()
            .filter(&json!({"age": {"$gt": 20}}))
            .unwrap()
            .search(&SearchRequest::keyword("jo"))
            .unwrap()
            .search(&SearchRequest::keyword("   "))
            .unwrap()
            .build();
        assert!(spec.matches(&user(30, "Johnny")));
        assert!(!spec.matches(&user(30, "Mark")));
        assert!(!spec.matches(&user(10, "John")));
    }

    #[test]
    fn includes_are_validated() {
        let spec = Specification::<User>::builder()
            .include("Address")
            .unwrap()
            .then_include("country")
            .unwrap()
            .include("address")
            .unwrap()
            .build();
        let paths: Vec<&str> = spec.includes().iter().map(Include::path).collect();
        assert_eq!(paths, vec!["address", "address.country"]);

        assert!(matches!(
            Specification::<User>::builder().then_include("country"),
            Err(SeekError::InvalidInclude { .. })
        ));
        assert!(matches!(
            Specification::<User>::builder().include("orders"),
            Err(SeekError::InvalidInclude { path }) if path == "orders"
        ));
    }

    #[test]
    fn cache_key_is_canonical() {
        let a = Specification::<User>::builder()
            .filter(&json!({"age": {"$gte": 18}, "name": "Jo"}))
            .unwrap()
            .sort("age:desc", Some("id"))
            .unwrap()
            .include("address")
            .unwrap()
            .no_tracking()
            .build();
        let b = Specification::<User>::builder()
            .filter(&json!({"AGE": {"$gte": 18}, "name": "Jo"}))
            .unwrap()
            .sort("Age:DESC", Some("id"))
            .unwrap()
            .include("Address")
            .unwrap()
            .no_tracking()
            .build();
        assert_eq!(a.cache_key_with(None), b.cache_key_with(None));
        insta::assert_snapshot!(
            a.cache_key_with(Some(&json!({"tenant": 7}))),
            @r#"User|where (age $gte 18 AND name $eq "Jo") order age:desc,id:asc include [address] no_tracking~{"tenant":7}"#
        );
    }

    #[test]
    fn from_request_compiles_everything() {
        let request: QueryRequest = serde_json::from_value(json!({
            "sort": "age:desc",
            "search": {"keyword": "jo", "targets": ["name"]},
            "filter": {"age": {"$between": [18, 65]}}
        }))
        .unwrap();
        let spec = Specification::<User>::from_request(&request, Some("id")).unwrap();
        assert_eq!(spec.sort().map(ToString::to_string).as_deref(), Some("age:desc,id:asc"));
        assert!(spec.matches(&user(30, "John")));
        assert!(!spec.matches(&user(70, "John")));

        let bad: QueryRequest = serde_json::from_value(json!({"sort": "height"})).unwrap();
        assert!(matches!(
            Specification::<User>::from_request(&bad, None),
            Err(SeekError::FieldNotFound { .. })
        ));
    }
}
