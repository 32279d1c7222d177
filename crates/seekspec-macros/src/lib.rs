//! Proc macros for Seekspec.
//!
//! - [`Seekable`] - Generate the field schema and accessor from struct annotations
//!
//! The derive is re-exported by `seekspec` behind its `derive` feature. For
//! working examples, see `seekspec/tests/seekable_derive.rs`.

mod seekable;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derives the `Seekable` trait for query-enabled structs.
///
/// # Field Attributes
///
/// | Attribute | Description |
/// |-----------|-------------|
/// | `String` | String field, any `AsRef<str>` |
/// | `Number` | Numeric field, any primitive integer or float |
/// | `Timestamp` | Date-time field, requires `SeekerTimestamp` |
/// | `Uuid` | `uuid::Uuid` field |
/// | `Enum` | Enum field, requires `SeekerEnum` with `VARIANTS` |
/// | `Bool` | Boolean field |
/// | `Object` | Nested record, requires `Seekable` |
/// | `ty = "..."` | Kind given as a string, for `enum` and `bool` spellings |
/// | `skip` | Exclude this field from queries |
/// | `rename = "..."` | Use a custom name for queries |
///
/// `Option<T>` fields are nullable and `Vec<T>` fields are collections; the
/// kind describes `T`. Fields without `#[seek]` are not queryable.
///
/// # Generated Code
///
/// 1. Field name constants (e.g., `Person::NAME`, `Person::CREATED_AT`)
/// 2. A static `Schema` returned by `Seekable::schema()`
/// 3. `Seekable::seeker_field_value()`
///
/// # Example
///
/// ```ignore
/// use seekspec::{Seekable, SeekerEnum, Specification};
/// use serde_json::json;
///
/// #[derive(Clone, Copy)]
/// enum Level { Low, High }
///
/// impl SeekerEnum for Level {
///     const VARIANTS: &'static [&'static str] = &["Low", "High"];
///
///     fn seeker_discriminant(&self) -> u32 {
///         *self as u32
///     }
/// }
///
/// #[derive(Seekable)]
/// struct Pet {
///     #[seek(String)]
///     name: String,
/// }
///
/// #[derive(Seekable)]
/// struct Person {
///     #[seek(Uuid)]
///     id: uuid::Uuid,
///     #[seek(String)]
///     name: String,
///     #[seek(Enum)]
///     level: Level,
///     #[seek(Object)]
///     pets: Vec<Pet>,
///     #[seek(skip)]
///     password: String,
/// }
///
/// let spec = Specification::<Person>::builder()
///     .filter(&json!({"pets": {"name": {"$startsWith": "R"}}}))?
///     .sort(Person::NAME, Some(Person::ID))?
///     .build();
/// ```
#[proc_macro_derive(Seekable, attributes(seek))]
pub fn seekable_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    seekable::seekable_derive_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
