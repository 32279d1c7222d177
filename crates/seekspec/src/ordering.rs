//! Sort compilation.
//!
//! A sort request is a comma-separated list of `path[:asc|:desc]` entries.
//! [`SortSpec::compile`] resolves each path, appends the unique tie-breaker
//! and produces a lexicographic comparator over records.

use std::cmp::Ordering;
use std::fmt;

use tracing::debug;

use crate::clause::{Clause, ClauseValue};
use crate::error::{Result, SeekError};
use crate::filter::FilterNode;
use crate::op::Op;
use crate::schema::{FieldMeta, Schema};
use crate::traits::Seekable;
use crate::value::Value;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dir {
    #[default]
    Asc,
    Desc,
}

impl Dir {
    /// Parses `asc`/`desc`, ignoring case.
    pub fn parse(token: &str) -> Result<Dir> {
        match token.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Dir::Asc),
            "desc" => Ok(Dir::Desc),
            _ => Err(SeekError::InvalidSortDirection {
                token: token.to_string(),
            }),
        }
    }

    pub fn is_asc(self) -> bool {
        matches!(self, Dir::Asc)
    }

    /// For `Desc`, reverses the ordering.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Dir::Asc => ordering,
            Dir::Desc => ordering.reverse(),
        }
    }

    pub fn reversed(self) -> Dir {
        match self {
            Dir::Asc => Dir::Desc,
            Dir::Desc => Dir::Asc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dir::Asc => "asc",
            Dir::Desc => "desc",
        }
    }
}

impl fmt::Display for Dir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compares two values of the same type.
///
/// Strings compare by code point and UUIDs by their byte order, so results
/// do not depend on locale. `None` sorts after every other value. Returns
/// `None` for type mismatches and NaN.
pub fn compare_values(a: &Value<'_>, b: &Value<'_>) -> Option<Ordering> {
    match (a, b) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.compare(*b),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
        (Value::Enum(a), Value::Enum(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),

        (Value::None, Value::None) => Some(Ordering::Equal),
        (Value::None, _) => Some(Ordering::Greater),
        (_, Value::None) => Some(Ordering::Less),

        _ => None,
    }
}

/// One resolved sort entry.
#[derive(Debug, Clone)]
pub struct SortKey {
    pub meta: FieldMeta,
    pub dir: Dir,
}

impl SortKey {
    pub fn path(&self) -> String {
        self.meta.path()
    }

    /// Compares the key's values on two records.
    pub fn compare(&self, a: &dyn Seekable, b: &dyn Seekable) -> Ordering {
        let va = self.meta.get_value(a);
        let vb = self.meta.get_value(b);
        compare_values(&va, &vb)
            .map(|o| self.dir.apply(o))
            .unwrap_or(Ordering::Equal)
    }

    /// A clause on this key's full dotted path.
    fn clause(&self, op: Op, value: ClauseValue) -> FilterNode {
        FilterNode::Compare(Clause::new(self.path(), op, value))
    }
}

/// Ordered list of sort keys, ending with the tie-breaker when one was given.
#[derive(Debug, Clone, Default)]
pub struct SortSpec {
    keys: Vec<SortKey>,
    tie_breaker: Option<String>,
}

impl SortSpec {
    /// Compiles `"field1:asc,field2:desc"` against `schema`.
    ///
    /// Directions default to ascending. Repeated paths keep their first
    /// occurrence. `tie_breaker` (`"id"` or `"id:desc"`) is appended unless
    /// the sort already names it.
    pub fn compile(schema: &Schema, sort: &str, tie_breaker: Option<&str>) -> Result<SortSpec> {
        let mut spec = SortSpec::default();
        for entry in sort.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            spec.push(schema, entry)?;
        }

        if let Some(tie) = tie_breaker.map(str::trim).filter(|t| !t.is_empty()) {
            spec.push(schema, tie)?;
            let (path, _) = split_entry(tie)?;
            spec.tie_breaker = Some(schema.resolve(path)?.path());
        }

        debug!(schema = schema.name, sort = %spec, "compiled sort");
        Ok(spec)
    }

    fn push(&mut self, schema: &Schema, entry: &str) -> Result<()> {
        let (path, dir) = split_entry(entry)?;
        let meta = schema.resolve(path)?;
        if meta.crosses_collection() || meta.is_collection() || meta.is_nested_object() {
            return Err(SeekError::UnsortableField {
                path: path.to_string(),
            });
        }
        let canonical = meta.path();
        if self.keys.iter().all(|k| k.path() != canonical) {
            self.keys.push(SortKey { meta, dir });
        }
        Ok(())
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Canonical path of the tie-breaker key.
    pub fn tie_breaker(&self) -> Option<&str> {
        self.tie_breaker.as_deref()
    }

    /// Lexicographic comparison over all keys.
    pub fn compare(&self, a: &dyn Seekable, b: &dyn Seekable) -> Ordering {
        for key in &self.keys {
            let ordering = key.compare(a, b);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// The same keys with every direction flipped.
    pub fn reversed(&self) -> SortSpec {
        SortSpec {
            keys: self
                .keys
                .iter()
                .map(|k| SortKey {
                    meta: k.meta.clone(),
                    dir: k.dir.reversed(),
                })
                .collect(),
            tie_breaker: self.tie_breaker.clone(),
        }
    }

    /// Predicate matching records strictly after `boundary` in this order.
    ///
    /// `boundary` holds one value per key. The expansion is
    /// `(k1 > v1) OR (k1 = v1 AND k2 > v2) OR ...`, where `>` follows each
    /// key's direction and nulls sort last.
    pub fn keyset(&self, boundary: &[ClauseValue]) -> FilterNode {
        let mut branches = Vec::with_capacity(self.keys.len());
        for (level, key) in self.keys.iter().enumerate() {
            let Some(value) = boundary.get(level) else {
                break;
            };
            let mut parts: Vec<FilterNode> = self
                .keys
                .iter()
                .zip(boundary)
                .take(level)
                .map(|(k, v)| k.clause(Op::Eq, v.clone()))
                .collect();
            let op = if key.dir.is_asc() { Op::After } else { Op::Before };
            parts.push(key.clause(op, value.clone()));
            branches.push(FilterNode::all(parts));
        }
        FilterNode::Or(branches)
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}:{}", key.path(), key.dir)?;
        }
        Ok(())
    }
}

fn split_entry(entry: &str) -> Result<(&str, Dir)> {
    match entry.split_once(':') {
        Some((path, dir)) => Ok((path.trim(), Dir::parse(dir)?)),
        None => Ok((entry.trim(), Dir::Asc)),
    }
}
