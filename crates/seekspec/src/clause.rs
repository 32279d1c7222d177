//! Leaf predicates.
//!
//! A [`Clause`] compares one field of the current record (or the current
//! collection element itself) against an owned [`ClauseValue`].

use std::cmp::Ordering;
use std::fmt;

use regex::Regex;
use uuid::Uuid;

use crate::op::Op;
use crate::ordering::compare_values;
use crate::value::{Number, Timestamp, Value};

/// A single comparison.
///
/// ```
/// use seekspec::{Clause, ClauseValue, Op, Value};
///
/// let clause = Clause::new("name", Op::Contains, "JO").ignore_case();
/// assert!(clause.matches(&Value::String("John")));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    /// Field on the current record; `None` targets the current collection
    /// element itself (collections of scalars).
    pub field: Option<String>,
    pub op: Op,
    pub value: ClauseValue,
    /// Lower-case both sides of string comparisons.
    pub case_insensitive: bool,
}

impl Clause {
    pub fn new(field: impl Into<String>, op: Op, value: impl Into<ClauseValue>) -> Self {
        Clause {
            field: Some(field.into()),
            op,
            value: value.into(),
            case_insensitive: false,
        }
    }

    /// A clause over the collection element being tested.
    pub fn element(op: Op, value: impl Into<ClauseValue>) -> Self {
        Clause {
            field: None,
            op,
            value: value.into(),
            case_insensitive: false,
        }
    }

    pub fn ignore_case(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    /// Evaluates this clause against a field value.
    ///
    /// A null field matches `Eq null` and `Ne <non-null>`.
    /// `Before`/`After` place nulls after every other value.
    pub fn matches(&self, field_value: &Value<'_>) -> bool {
        match self.op {
            Op::Eq => self.equals(&self.value, field_value),
            Op::Ne => match (&self.value, field_value) {
                (ClauseValue::Null, v) => !v.is_none(),
                (cv, v) => !self.equals(cv, v),
            },
            Op::In => match &self.value {
                ClauseValue::Set(items) => items.iter().any(|cv| self.equals(cv, field_value)),
                cv => self.equals(cv, field_value),
            },
            Op::Gt | Op::Gte | Op::Lt | Op::Lte => {
                if field_value.is_none() {
                    return false;
                }
                match compare_to(field_value, &self.value) {
                    Some(ordering) => self.op.eval_ordering(ordering),
                    None => false,
                }
            }
            Op::Before | Op::After => match sort_order(field_value, &self.value) {
                Some(ordering) => self.op.eval_ordering(ordering),
                None => false,
            },
            Op::Contains | Op::StartsWith | Op::EndsWith => {
                match (field_value, &self.value) {
                    (Value::String(s), ClauseValue::String(pattern)) => {
                        self.match_string(s, pattern)
                    }
                    _ => false,
                }
            }
            Op::Regex => match (field_value, &self.value) {
                (Value::String(s), ClauseValue::Regex(regex)) => regex.is_match(s),
                _ => false,
            },
        }
    }

    fn equals(&self, expected: &ClauseValue, actual: &Value<'_>) -> bool {
        match (expected, actual) {
            (ClauseValue::Null, Value::None) => true,
            (ClauseValue::String(a), Value::String(b)) if self.case_insensitive => {
                a.to_lowercase() == b.to_lowercase()
            }
            _ => compare_to(actual, expected) == Some(Ordering::Equal),
        }
    }

    fn match_string(&self, field: &str, pattern: &str) -> bool {
        if self.case_insensitive {
            let field = field.to_lowercase();
            let pattern = pattern.to_lowercase();
            self.match_plain(&field, &pattern)
        } else {
            self.match_plain(field, pattern)
        }
    }

    fn match_plain(&self, field: &str, pattern: &str) -> bool {
        match self.op {
            Op::StartsWith => field.starts_with(pattern),
            Op::EndsWith => field.ends_with(pattern),
            Op::Contains => field.contains(pattern),
            _ => false,
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = if self.case_insensitive { "i" } else { "" };
        write!(
            f,
            "{} ${}{} {}",
            self.field.as_deref().unwrap_or("@"),
            self.op,
            suffix,
            self.value
        )
    }
}

/// Orders a record value against a clause value of the same type.
///
/// Strings compare by code point, UUIDs by their byte order.
pub fn compare_to(field: &Value<'_>, value: &ClauseValue) -> Option<Ordering> {
    match (field, value) {
        (Value::String(a), ClauseValue::String(b)) => Some((*a).cmp(b.as_str())),
        (Value::Number(a), ClauseValue::Number(b)) => a.compare(*b),
        (Value::Timestamp(a), ClauseValue::Timestamp(b)) => Some(a.cmp(b)),
        (Value::Uuid(a), ClauseValue::Uuid(b)) => Some(a.cmp(b)),
        (Value::Enum(a), ClauseValue::Enum(b)) => Some(a.cmp(b)),
        (Value::Bool(a), ClauseValue::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn sort_order(field: &Value<'_>, value: &ClauseValue) -> Option<Ordering> {
    match value {
        ClauseValue::Null => compare_values(field, &Value::None),
        _ if field.is_none() => Some(Ordering::Greater),
        _ => compare_to(field, value),
    }
}

/// Owned comparison value stored in a [`Clause`].
#[derive(Debug, Clone)]
pub enum ClauseValue {
    String(String),
    Number(Number),
    Timestamp(Timestamp),
    Uuid(Uuid),
    Enum(u32),
    Bool(bool),
    Null,
    /// Candidates for `In`.
    Set(Vec<ClauseValue>),
    Regex(Regex),
}

impl ClauseValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ClauseValue::Null)
    }
}

impl PartialEq for ClauseValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ClauseValue::String(a), ClauseValue::String(b)) => a == b,
            (ClauseValue::Number(a), ClauseValue::Number(b)) => a == b,
            (ClauseValue::Timestamp(a), ClauseValue::Timestamp(b)) => a == b,
            (ClauseValue::Uuid(a), ClauseValue::Uuid(b)) => a == b,
            (ClauseValue::Enum(a), ClauseValue::Enum(b)) => a == b,
            (ClauseValue::Bool(a), ClauseValue::Bool(b)) => a == b,
            (ClauseValue::Null, ClauseValue::Null) => true,
            (ClauseValue::Set(a), ClauseValue::Set(b)) => a == b,
            (ClauseValue::Regex(a), ClauseValue::Regex(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl fmt::Display for ClauseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClauseValue::String(s) => write!(f, "{s:?}"),
            ClauseValue::Number(n) => write!(f, "{n}"),
            ClauseValue::Timestamp(t) => write!(f, "{t}"),
            ClauseValue::Uuid(u) => write!(f, "{u}"),
            ClauseValue::Enum(d) => write!(f, "#{d}"),
            ClauseValue::Bool(b) => write!(f, "{b}"),
            ClauseValue::Null => f.write_str("null"),
            ClauseValue::Set(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            ClauseValue::Regex(r) => write!(f, "/{}/", r.as_str()),
        }
    }
}

impl From<String> for ClauseValue {
    fn from(s: String) -> Self {
        ClauseValue::String(s)
    }
}

impl From<&str> for ClauseValue {
    fn from(s: &str) -> Self {
        ClauseValue::String(s.to_string())
    }
}

impl From<Number> for ClauseValue {
    fn from(n: Number) -> Self {
        ClauseValue::Number(n)
    }
}

impl From<Timestamp> for ClauseValue {
    fn from(t: Timestamp) -> Self {
        ClauseValue::Timestamp(t)
    }
}

impl From<Uuid> for ClauseValue {
    fn from(u: Uuid) -> Self {
        ClauseValue::Uuid(u)
    }
}

impl From<bool> for ClauseValue {
    fn from(b: bool) -> Self {
        ClauseValue::Bool(b)
    }
}

impl From<Regex> for ClauseValue {
    fn from(r: Regex) -> Self {
        ClauseValue::Regex(r)
    }
}

impl From<Vec<ClauseValue>> for ClauseValue {
    fn from(items: Vec<ClauseValue>) -> Self {
        ClauseValue::Set(items)
    }
}

macro_rules! clause_value_from_number {
    ($($source:ty),+) => {
        $(
            impl From<$source> for ClauseValue {
                fn from(n: $source) -> Self {
                    ClauseValue::Number(Number::from(n))
                }
            }
        )+
    };
}

clause_value_from_number!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_eq_respects_case_flag() {
        let clause = Clause::new("name", Op::Eq, "hello");
        assert!(clause.matches(&Value::String("hello")));
        assert!(!clause.matches(&Value::String("Hello")));

        let clause = clause.ignore_case();
        assert!(clause.matches(&Value::String("HeLLo")));
    }

    #[test]
    fn string_ops_case_insensitive() {
        let clause = Clause::new("name", Op::StartsWith, "JO").ignore_case();
        assert!(clause.matches(&Value::String("joanna")));
        assert!(!clause.matches(&Value::String("mark")));

        let clause = Clause::new("name", Op::EndsWith, "NA");
        assert!(!clause.matches(&Value::String("joanna")));
    }

    #[test]
    fn string_regex() {
        let regex = Regex::new(r"^hello\d+$").unwrap();
        let clause = Clause::new("name", Op::Regex, regex);
        assert!(clause.matches(&Value::String("hello123")));
        assert!(!clause.matches(&Value::String("hello")));
    }

    #[test]
    fn ordered_comparisons() {
        let gte = Clause::new("age", Op::Gte, 18);
        assert!(gte.matches(&Value::Number(Number::U64(18))));
        assert!(!gte.matches(&Value::Number(Number::I64(17))));
        assert!(!gte.matches(&Value::None));

        let lt = Clause::new("name", Op::Lt, "b");
        assert!(lt.matches(&Value::String("a")));
        // code point order: uppercase before lowercase
        assert!(lt.matches(&Value::String("Z")));
    }

    #[test]
    fn uuid_ordering() {
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        let clause = Clause::new("id", Op::Gt, low);
        assert!(clause.matches(&Value::Uuid(high)));
        assert!(!clause.matches(&Value::Uuid(low)));
    }

    #[test]
    fn null_semantics() {
        let is_null = Clause::new("nick", Op::Eq, ClauseValue::Null);
        assert!(is_null.matches(&Value::None));
        assert!(!is_null.matches(&Value::String("x")));

        let not_null = Clause::new("nick", Op::Ne, ClauseValue::Null);
        assert!(not_null.matches(&Value::String("x")));
        assert!(!not_null.matches(&Value::None));

        let ne = Clause::new("nick", Op::Ne, "x");
        assert!(ne.matches(&Value::None));
        assert!(!ne.matches(&Value::String("x")));
    }

    #[test]
    fn membership() {
        let clause = Clause::new(
            "status",
            Op::In,
            vec![ClauseValue::Enum(1), ClauseValue::Enum(3)],
        );
        assert!(clause.matches(&Value::Enum(3)));
        assert!(!clause.matches(&Value::Enum(2)));
    }

    #[test]
    fn sort_order_puts_nulls_last() {
        let after = Clause::new("score", Op::After, 5);
        assert!(after.matches(&Value::Number(Number::I64(6))));
        assert!(after.matches(&Value::None));
        assert!(!after.matches(&Value::Number(Number::I64(5))));

        let before_null = Clause::new("score", Op::Before, ClauseValue::Null);
        assert!(before_null.matches(&Value::Number(Number::I64(100))));
        assert!(!before_null.matches(&Value::None));
    }

    #[test]
    fn element_clause_display() {
        let clause = Clause::element(Op::Eq, "x");
        assert_eq!(clause.to_string(), r#"@ $eq "x""#);
        let clause = Clause::new("name", Op::Contains, "jo").ignore_case();
        assert_eq!(clause.to_string(), r#"name $containsi "jo""#);
    }
}
