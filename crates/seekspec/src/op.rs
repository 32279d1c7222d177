//! Comparison operators and the `$token` table used by filter documents.

use std::cmp::Ordering;

use crate::schema::FieldKind;

/// Comparison operator for a [`Clause`](crate::Clause).
///
/// - **Universal**: `Eq`, `Ne`, `In`
/// - **String**: `StartsWith`, `EndsWith`, `Contains`, `Regex`
/// - **Ordinal**: `Gt`, `Gte`, `Lt`, `Lte`
/// - **Sort order**: `Before`, `After` compare in sort order, where a null
///   value sorts after everything else. Keyset predicates use these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Eq,
    Ne,
    In,

    StartsWith,
    EndsWith,
    Contains,
    Regex,

    Gt,
    Gte,
    Lt,
    Lte,

    Before,
    After,
}

impl Op {
    /// Returns `true` if this operator can be applied to fields of `kind`.
    pub fn supports(self, kind: FieldKind) -> bool {
        match self {
            Op::Eq | Op::Ne | Op::In => kind != FieldKind::Object,
            Op::StartsWith | Op::EndsWith | Op::Contains | Op::Regex => kind == FieldKind::String,
            Op::Gt | Op::Gte | Op::Lt | Op::Lte => kind.is_ordinal(),
            Op::Before | Op::After => kind != FieldKind::Object,
        }
    }

    /// Evaluates an ordering of `field` relative to the clause value.
    pub fn eval_ordering(self, ordering: Ordering) -> bool {
        match self {
            Op::Eq => ordering == Ordering::Equal,
            Op::Ne => ordering != Ordering::Equal,
            Op::Gt | Op::After => ordering == Ordering::Greater,
            Op::Gte => ordering != Ordering::Less,
            Op::Lt | Op::Before => ordering == Ordering::Less,
            Op::Lte => ordering != Ordering::Greater,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Op::Eq => "eq",
            Op::Ne => "ne",
            Op::In => "in",
            Op::StartsWith => "startswith",
            Op::EndsWith => "endswith",
            Op::Contains => "contains",
            Op::Regex => "regex",
            Op::Gt => "gt",
            Op::Gte => "gte",
            Op::Lt => "lt",
            Op::Lte => "lte",
            Op::Before => "before",
            Op::After => "after",
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parsed `$token` from a filter document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Compare {
        op: Op,
        case_insensitive: bool,
        /// `not`-prefixed tokens wrap the positive clause in a negation.
        negated: bool,
    },
    /// `[lo, hi]`, inclusive on both ends.
    Between,
}

impl Operator {
    /// Parses a token such as `$gte`, `$notIn` or `$startsWithI`.
    /// Matching ignores ASCII case; the leading `$` is required.
    pub fn parse(token: &str) -> Option<Operator> {
        let name = token.strip_prefix('$')?.to_ascii_lowercase();
        if name == "between" {
            return Some(Operator::Between);
        }

        let (rest, negated) = match name.strip_prefix("not") {
            Some(rest) => (rest, true),
            None => (name.as_str(), false),
        };

        let (op, case_insensitive) = match rest {
            "eq" => (Op::Eq, false),
            "eqi" => (Op::Eq, true),
            "ne" => (Op::Ne, false),
            "nei" => (Op::Ne, true),
            "gt" => (Op::Gt, false),
            "gte" => (Op::Gte, false),
            "lt" => (Op::Lt, false),
            "lte" => (Op::Lte, false),
            "in" => (Op::In, false),
            "contains" => (Op::Contains, false),
            "containsi" => (Op::Contains, true),
            "startswith" => (Op::StartsWith, false),
            "startswithi" => (Op::StartsWith, true),
            "endswith" => (Op::EndsWith, false),
            "endswithi" => (Op::EndsWith, true),
            "regex" => (Op::Regex, false),
            _ => return None,
        };

        // Only membership and substring operators have a `not` form.
        if negated && !matches!(op, Op::In | Op::Contains) {
            return None;
        }

        Some(Operator::Compare {
            op,
            case_insensitive,
            negated,
        })
    }
}
