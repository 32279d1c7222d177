//! Field descriptor tables and dotted-path resolution.
//!
//! Every [`Seekable`] type exposes a static [`Schema`]: one [`FieldDef`] per
//! queryable field. Nested records point at their own schema through a
//! function pointer, so self-referential types are fine.
//!
//! ```
//! use seekspec::{FieldDef, Schema};
//!
//! static ADDRESS: Schema = Schema::new("Address", &[FieldDef::string("city")]);
//! fn address() -> &'static Schema {
//!     &ADDRESS
//! }
//!
//! static PERSON: Schema = Schema::new(
//!     "Person",
//!     &[
//!         FieldDef::string("name"),
//!         FieldDef::string("tags").list(),
//!         FieldDef::object("address", address).nullable(),
//!     ],
//! );
//!
//! let meta = PERSON.resolve("Address.City").unwrap();
//! assert_eq!(meta.path(), "address.city");
//! assert!(PERSON.resolve("tags").unwrap().is_collection());
//! assert!(!PERSON.is_valid("address.zip"));
//! ```

use std::fmt;

use crate::error::{Result, SeekError};
use crate::traits::Seekable;
use crate::value::Value;

/// What a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Timestamp,
    Uuid,
    /// Enum with its variant names in discriminant order.
    Enum(&'static [&'static str]),
    Bool,
    /// Nested record, see [`FieldDef::nested`].
    Object,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Timestamp => "timestamp",
            FieldKind::Uuid => "uuid",
            FieldKind::Enum(_) => "enum",
            FieldKind::Bool => "bool",
            FieldKind::Object => "object",
        }
    }

    /// Kinds with a meaningful `<`/`>`.
    pub fn is_ordinal(self) -> bool {
        !matches!(self, FieldKind::Bool | FieldKind::Object)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor of one queryable field.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
    /// The field holds a collection of `kind` elements.
    pub collection: bool,
    pub nested: Option<fn() -> &'static Schema>,
}

impl FieldDef {
    const fn scalar(name: &'static str, kind: FieldKind) -> Self {
        FieldDef {
            name,
            kind,
            nullable: false,
            collection: false,
            nested: None,
        }
    }

    pub const fn string(name: &'static str) -> Self {
        Self::scalar(name, FieldKind::String)
    }

    pub const fn number(name: &'static str) -> Self {
        Self::scalar(name, FieldKind::Number)
    }

    pub const fn timestamp(name: &'static str) -> Self {
        Self::scalar(name, FieldKind::Timestamp)
    }

    pub const fn uuid(name: &'static str) -> Self {
        Self::scalar(name, FieldKind::Uuid)
    }

    pub const fn enumeration(name: &'static str, variants: &'static [&'static str]) -> Self {
        Self::scalar(name, FieldKind::Enum(variants))
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self::scalar(name, FieldKind::Bool)
    }

    pub const fn object(name: &'static str, nested: fn() -> &'static Schema) -> Self {
        FieldDef {
            name,
            kind: FieldKind::Object,
            nullable: false,
            collection: false,
            nested: Some(nested),
        }
    }

    /// Marks the field as a collection of its kind.
    pub const fn list(mut self) -> Self {
        self.collection = true;
        self
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn is_string(&self) -> bool {
        self.kind == FieldKind::String
    }

    pub fn is_object(&self) -> bool {
        self.kind == FieldKind::Object
    }

    /// Schema of the nested record (or of each element for collections).
    pub fn nested_schema(&self) -> Option<&'static Schema> {
        self.nested.map(|f| f())
    }
}

/// Static descriptor table for one record type.
#[derive(Debug)]
pub struct Schema {
    pub name: &'static str,
    pub fields: &'static [FieldDef],
}

impl Schema {
    pub const fn new(name: &'static str, fields: &'static [FieldDef]) -> Self {
        Schema { name, fields }
    }

    /// Looks up a direct field, ignoring ASCII case.
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Resolves a dotted path. Collection segments continue with their
    /// element schema.
    pub fn resolve(&self, path: &str) -> Result<FieldMeta> {
        let not_found = || SeekError::FieldNotFound {
            path: path.to_string(),
        };

        let mut schema = self;
        let mut hops: Vec<FieldDef> = Vec::new();
        for segment in path.split('.') {
            if let Some(prev) = hops.last() {
                schema = prev.nested_schema().ok_or_else(not_found)?;
            }
            let def = schema.field(segment.trim()).ok_or_else(not_found)?;
            hops.push(*def);
        }

        if hops.is_empty() {
            return Err(not_found());
        }
        Ok(FieldMeta { hops })
    }

    pub fn is_valid(&self, path: &str) -> bool {
        self.resolve(path).is_ok()
    }

    /// Resolves `path` and reads it from `record`.
    pub fn value_at<'a>(&self, record: &'a dyn Seekable, path: &str) -> Result<Value<'a>> {
        let meta = self.resolve(path)?;
        Ok(meta.get_value(record))
    }
}

/// A resolved field path: every hop's descriptor, leaf last.
#[derive(Debug, Clone)]
pub struct FieldMeta {
    hops: Vec<FieldDef>,
}

impl FieldMeta {
    pub(crate) fn from_hops(hops: Vec<FieldDef>) -> Option<FieldMeta> {
        if hops.is_empty() {
            None
        } else {
            Some(FieldMeta { hops })
        }
    }

    /// Canonical dotted path with declared field names.
    pub fn path(&self) -> String {
        self.hops
            .iter()
            .map(|h| h.name)
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn hops(&self) -> &[FieldDef] {
        &self.hops
    }

    pub fn leaf(&self) -> &FieldDef {
        // resolve() never builds an empty path
        &self.hops[self.hops.len() - 1]
    }

    pub fn kind(&self) -> FieldKind {
        self.leaf().kind
    }

    pub fn is_collection(&self) -> bool {
        self.leaf().collection
    }

    pub fn is_nested_object(&self) -> bool {
        self.leaf().is_object()
    }

    pub fn is_nullable(&self) -> bool {
        self.leaf().nullable
    }

    /// Any hop before the leaf is a collection.
    pub fn crosses_collection(&self) -> bool {
        self.hops[..self.hops.len() - 1]
            .iter()
            .any(|h| h.collection)
    }

    /// Reads the value at this path. Null intermediate objects short-circuit
    /// to [`Value::None`]; collection hops yield a [`Value::List`] of the
    /// per-element values.
    pub fn get_value<'a>(&self, record: &'a dyn Seekable) -> Value<'a> {
        walk(record, &self.hops)
    }
}

fn walk<'a>(subject: &'a dyn Seekable, hops: &[FieldDef]) -> Value<'a> {
    let Some((hop, rest)) = hops.split_first() else {
        return Value::None;
    };
    let value = subject.seeker_field_value(hop.name);
    if rest.is_empty() {
        return value;
    }
    match value {
        Value::Object(inner) => walk(inner, rest),
        Value::List(items) => Value::List(
            items
                .iter()
                .filter_map(|item| item.as_object())
                .map(|inner| walk(inner, rest))
                .collect(),
        ),
        _ => Value::None,
    }
}
