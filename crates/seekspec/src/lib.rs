//! Seekspec - dynamic query specifications for typed records.
//!
//! Seekspec compiles declarative, serializable query requests into
//! predicate trees and orderings over any record type that describes its
//! fields through a static [`Schema`]. It supports:
//!
//! - Nested filter documents with `$and`/`$or`, operator maps and dotted
//!   paths through nested records and collections
//! - Multi-field sorting with a unique tie-breaker
//! - Keyword search over explicit or discovered string fields
//! - Offset paging and bidirectional keyset paging with opaque cursors
//! - Composable [`Specification`]s with includes, flags and cache keys
//!
//! # Quick Start
//!
//! ```rust
//! use seekspec::{
//!     CursorRequest, Evaluator, FieldDef, MemorySource, Number, Schema, Seekable,
//!     Specification, Value,
//! };
//! use serde_json::json;
//!
//! #[derive(Clone)]
//! struct Person {
//!     id: u32,
//!     name: String,
//!     age: i64,
//! }
//!
//! static PERSON: Schema = Schema::new(
//!     "Person",
//!     &[
//!         FieldDef::number("id"),
//!         FieldDef::string("name"),
//!         FieldDef::number("age"),
//!     ],
//! );
//!
//! impl Seekable for Person {
//!     fn schema() -> &'static Schema {
//!         &PERSON
//!     }
//!
//!     fn seeker_field_value(&self, field: &str) -> Value<'_> {
//!         match field {
//!             "id" => Value::Number(Number::from(self.id)),
//!             "name" => Value::String(&self.name),
//!             "age" => Value::Number(Number::I64(self.age)),
//!             _ => Value::None,
//!         }
//!     }
//! }
//!
//! let people: Vec<Person> = (1..=30)
//!     .map(|id| Person { id, name: format!("user{id}"), age: 15 + i64::from(id) })
//!     .collect();
//!
//! let spec = Specification::<Person>::builder()
//!     .filter(&json!({"age": {"$between": [20, 40]}}))?
//!     .build();
//!
//! let evaluator = Evaluator::new(MemorySource::new(&people));
//! let request = CursorRequest::new(10, "id").sort("age:desc");
//! let first = evaluator.paginate_cursor(&spec, &request).unwrap();
//! assert_eq!(first.data[0].age, 40);
//! assert!(first.paging.before.is_none());
//!
//! let next = request.clone().after(first.paging.after.clone().unwrap());
//! let second = evaluator.paginate_cursor(&spec, &next).unwrap();
//! assert_eq!(second.data[0].age, 30);
//! # Ok::<(), seekspec::SeekError>(())
//! ```
//!
//! # Filter Operators
//!
//! | Token | Applies to |
//! |-------|------------|
//! | `$eq`, `$ne`, `$in`, `$notIn` | every scalar kind |
//! | `$gt`, `$gte`, `$lt`, `$lte`, `$between` | strings, numbers, timestamps, UUIDs, enums |
//! | `$contains`, `$notContains`, `$startsWith`, `$endsWith`, `$regex` | strings |
//! | `$eqI`, `$neI`, `$containsI`, `$notContainsI`, `$startsWithI`, `$endsWithI` | strings, ignoring case |
//!
//! Collections take an element-scoped sub-filter: a field map for
//! collections of records, or `$any` for collections of scalars.
//!
//! # Derive
//!
//! With the `derive` feature, `#[derive(Seekable)]` generates the schema and
//! field accessor for a struct.

mod clause;
mod coerce;
mod config;
mod cursor;
mod error;
mod evaluator;
pub mod filter;
mod op;
mod ordering;
pub mod pagination;
mod request;
mod schema;
pub mod search;
mod source;
mod specification;
mod traits;
mod value;

// Re-export public API
pub use clause::{compare_to, Clause, ClauseValue};
pub use coerce::{coerce, coerce_all, parse_timestamp};
pub use config::PagingConfig;
pub use cursor::{Cursor, CursorCodec, CursorTransform};
pub use error::{EvaluateError, Result, SeekError};
pub use evaluator::Evaluator;
pub use filter::{Combinator, FilterNode, FilterValue};
pub use op::{Op, Operator};
pub use ordering::{compare_values, Dir, SortKey, SortSpec};
pub use pagination::{Page, Paging};
pub use request::{CursorPosition, CursorRequest, OffsetRequest, QueryRequest, SearchRequest};
pub use schema::{FieldDef, FieldKind, FieldMeta, Schema};
pub use source::{FetchRequest, MemorySource, Source};
pub use specification::{Include, Specification, SpecificationBuilder};
pub use traits::{Seekable, SeekerEnum, SeekerTimestamp};
pub use value::{Number, Timestamp, Value};

#[cfg(feature = "derive")]
pub use seekspec_macros::Seekable;
