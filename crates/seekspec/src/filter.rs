//! Predicate trees and the filter-document compiler.
//!
//! A filter document is a JSON object. Keys are field paths, the reserved
//! combinators `$and`/`$or`, or `$operator` tokens inside a field:
//!
//! ```json
//! {
//!   "age": { "$gte": 18, "$lt": 30 },
//!   "address": { "city": { "$startsWithI": "new" } },
//!   "orders": { "total": { "$gt": 100 } },
//!   "tags": { "$any": { "$eq": "vip" } },
//!   "$or": [ { "status": "Active" }, { "name": { "$in": ["a", "b"] } } ]
//! }
//! ```
//!
//! Sibling keys are conjoined. A raw scalar is an implicit `$eq`, a raw
//! array an implicit `$in`. Collection fields need an element-scoped
//! sub-filter: a field map for collections of records, `$any` for
//! collections of scalars.

use std::fmt;

use regex::RegexBuilder;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::clause::{Clause, ClauseValue};
use crate::coerce::{coerce, coerce_all};
use crate::error::{Result, SeekError};
use crate::op::{Op, Operator};
use crate::schema::{FieldDef, FieldKind, FieldMeta, Schema};
use crate::traits::Seekable;
use crate::value::Value;

/// Request-side filter document.
pub type FilterValue = JsonValue;

const ANY: &str = "$any";

/// Compiled predicate over one record type.
///
/// Evaluated by [`FilterNode::matches`], which threads the current record
/// through the tree explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Const(bool),
    Compare(Clause),
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    Not(Box<FilterNode>),
    /// Evaluates `inner` against a nested record; false when it is null.
    Scope { field: String, inner: Box<FilterNode> },
    /// True when at least one element of a collection satisfies `inner`.
    Any { field: String, inner: Box<FilterNode> },
}

impl FilterNode {
    /// Conjunction, flattening nested `And`s. Empty input is `Const(true)`.
    pub fn all(nodes: Vec<FilterNode>) -> FilterNode {
        let mut flat = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                FilterNode::And(children) => flat.extend(children),
                FilterNode::Const(true) => {}
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => FilterNode::Const(true),
            1 => flat.remove(0),
            _ => FilterNode::And(flat),
        }
    }

    /// Disjunction, flattening nested `Or`s.
    pub fn any(nodes: Vec<FilterNode>) -> FilterNode {
        let mut flat = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                FilterNode::Or(children) => flat.extend(children),
                other => flat.push(other),
            }
        }
        match flat.len() {
            1 => flat.remove(0),
            _ => FilterNode::Or(flat),
        }
    }

    pub fn and(self, other: FilterNode) -> FilterNode {
        FilterNode::all(vec![self, other])
    }

    pub fn or(self, other: FilterNode) -> FilterNode {
        FilterNode::any(vec![self, other])
    }

    pub fn negate(self) -> FilterNode {
        FilterNode::Not(Box::new(self))
    }

    /// Builds the leaf clause for `meta`, wrapped in one `Scope`/`Any` per hop.
    ///
    /// A collection leaf becomes an `Any` over element clauses.
    pub fn at_path(meta: &FieldMeta, op: Op, value: ClauseValue, case_insensitive: bool) -> FilterNode {
        let leaf = meta.leaf();
        let mut clause = if leaf.collection {
            Clause::element(op, value)
        } else {
            Clause::new(leaf.name, op, value)
        };
        clause.case_insensitive = case_insensitive;

        let node = if leaf.collection {
            FilterNode::Any {
                field: leaf.name.to_string(),
                inner: Box::new(FilterNode::Compare(clause)),
            }
        } else {
            FilterNode::Compare(clause)
        };
        wrap_hops(&meta.hops()[..meta.hops().len() - 1], node)
    }

    /// Tests a record against this predicate.
    pub fn matches(&self, record: &dyn Seekable) -> bool {
        self.eval(&Subject::Record(record))
    }

    fn eval(&self, subject: &Subject<'_, '_>) -> bool {
        match self {
            FilterNode::Const(b) => *b,
            FilterNode::Compare(clause) => clause.matches(&subject.read(clause.field.as_deref())),
            FilterNode::And(children) => children.iter().all(|c| c.eval(subject)),
            FilterNode::Or(children) => children.iter().any(|c| c.eval(subject)),
            FilterNode::Not(inner) => !inner.eval(subject),
            FilterNode::Scope { field, inner } => match subject.read(Some(field.as_str())) {
                Value::Object(nested) => inner.eval(&Subject::Record(nested)),
                _ => false,
            },
            FilterNode::Any { field, inner } => match subject.read(Some(field.as_str())) {
                Value::List(items) => items.iter().any(|item| inner.eval(&Subject::of(item))),
                _ => false,
            },
        }
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterNode::Const(b) => write!(f, "{b}"),
            FilterNode::Compare(clause) => write!(f, "{clause}"),
            FilterNode::And(children) => write_joined(f, children, " AND "),
            FilterNode::Or(children) => write_joined(f, children, " OR "),
            FilterNode::Not(inner) => write!(f, "NOT {inner}"),
            FilterNode::Scope { field, inner } => write!(f, "{field} {{{inner}}}"),
            FilterNode::Any { field, inner } => write!(f, "{field} ANY {{{inner}}}"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[FilterNode], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{child}")?;
    }
    f.write_str(")")
}

/// What a node is evaluated against: a record, or a scalar collection element.
enum Subject<'s, 'a> {
    Record(&'a dyn Seekable),
    Element(&'s Value<'a>),
}

impl<'s, 'a> Subject<'s, 'a> {
    fn of(item: &'s Value<'a>) -> Self {
        match item {
            Value::Object(record) => Subject::Record(*record),
            other => Subject::Element(other),
        }
    }

    /// Reads a dotted field path, or the element itself for `None`.
    fn read(&self, field: Option<&str>) -> Value<'a> {
        match (self, field) {
            (Subject::Record(record), Some(path)) => read_path(*record, path),
            (Subject::Element(item), None) => (*item).clone(),
            _ => Value::None,
        }
    }
}

fn read_path<'a>(record: &'a dyn Seekable, path: &str) -> Value<'a> {
    let mut segments = path.split('.');
    let Some(first) = segments.next() else {
        return Value::None;
    };
    let mut value = record.seeker_field_value(first);
    for segment in segments {
        value = match value {
            Value::Object(nested) => nested.seeker_field_value(segment),
            _ => return Value::None,
        };
    }
    value
}

fn wrap_hops(hops: &[FieldDef], node: FilterNode) -> FilterNode {
    hops.iter().rev().fold(node, |inner, hop| {
        let field = hop.name.to_string();
        let inner = Box::new(inner);
        if hop.collection {
            FilterNode::Any { field, inner }
        } else {
            FilterNode::Scope { field, inner }
        }
    })
}

/// Compiles a filter document against `schema`.
///
/// ```
/// use seekspec::{filter, FieldDef, Schema};
/// use serde_json::json;
///
/// static PERSON: Schema = Schema::new("Person", &[FieldDef::number("age")]);
///
/// let node = filter::compile(&PERSON, &json!({"age": {"$gte": 18, "$lt": 30}})).unwrap();
/// assert_eq!(node.to_string(), "(age $gte 18 AND age $lt 30)");
/// ```
pub fn compile(schema: &Schema, filter: &FilterValue) -> Result<FilterNode> {
    let node = match filter {
        JsonValue::Null => FilterNode::Const(true),
        JsonValue::Object(map) => compile_map(schema, map)?,
        other => {
            return Err(SeekError::MalformedFilter(format!(
                "expected an object at the top level, got {}",
                crate::coerce::json_type(other)
            )))
        }
    };
    debug!(schema = schema.name, filter = %node, "compiled filter");
    Ok(node)
}

fn compile_map(schema: &Schema, map: &Map<String, JsonValue>) -> Result<FilterNode> {
    let mut nodes = Vec::with_capacity(map.len());
    for (key, value) in map {
        if let Some(combinator) = Combinator::parse(key) {
            let children = combinator_children(key, value, |child| match child {
                JsonValue::Object(m) => compile_map(schema, m),
                _ => Err(SeekError::MalformedFilter(format!(
                    "'{key}' elements must be objects"
                ))),
            })?;
            nodes.push(combinator.join(children));
        } else if key.starts_with('$') {
            return Err(SeekError::InvalidOperator { token: key.clone() });
        } else {
            nodes.push(compile_field(schema, key, value)?);
        }
    }
    Ok(FilterNode::all(nodes))
}

fn compile_field(schema: &Schema, key: &str, value: &JsonValue) -> Result<FilterNode> {
    let meta = schema.resolve(key)?;
    let hops = meta.hops();
    let leaf = meta.leaf();
    let path = meta.path();

    let node = if leaf.collection {
        let inner = compile_collection(leaf, &path, value)?;
        FilterNode::Any {
            field: leaf.name.to_string(),
            inner: Box::new(inner),
        }
    } else if leaf.is_object() {
        let nested = leaf
            .nested_schema()
            .ok_or_else(|| SeekError::FieldNotFound { path: path.clone() })?;
        match value {
            JsonValue::Object(m) => FilterNode::Scope {
                field: leaf.name.to_string(),
                inner: Box::new(compile_map(nested, m)?),
            },
            _ => {
                return Err(SeekError::MalformedFilter(format!(
                    "'{path}' is a nested object and needs a field map"
                )))
            }
        }
    } else {
        compile_scalar(leaf, Some(leaf.name), value)?
    };

    Ok(wrap_hops(&hops[..hops.len() - 1], node))
}

/// Element-scoped sub-filter for a collection field.
fn compile_collection(leaf: &FieldDef, path: &str, value: &JsonValue) -> Result<FilterNode> {
    let ambiguous = || SeekError::AmbiguousCollectionFilter {
        path: path.to_string(),
    };
    let JsonValue::Object(map) = value else {
        return Err(ambiguous());
    };

    let element_schema = leaf.nested_schema();
    let mut nodes = Vec::with_capacity(map.len());
    for (key, inner) in map {
        if key.eq_ignore_ascii_case(ANY) {
            nodes.push(match element_schema {
                Some(schema) => match inner {
                    JsonValue::Object(m) => compile_map(schema, m)?,
                    _ => return Err(ambiguous()),
                },
                None => compile_scalar(leaf, None, inner)?,
            });
        } else if key.starts_with('$') && Combinator::parse(key).is_none() {
            return Err(ambiguous());
        } else {
            // A field or combinator of the element record.
            let schema = element_schema.ok_or_else(ambiguous)?;
            let mut single = Map::new();
            single.insert(key.clone(), inner.clone());
            nodes.push(compile_map(schema, &single)?);
        }
    }
    Ok(FilterNode::all(nodes))
}

/// Operator map, raw scalar or raw array for a scalar field. `field` is
/// `None` when the clause targets collection elements.
fn compile_scalar(def: &FieldDef, field: Option<&str>, value: &JsonValue) -> Result<FilterNode> {
    match value {
        JsonValue::Object(map) => {
            let mut nodes = Vec::with_capacity(map.len());
            for (token, operand) in map {
                if let Some(combinator) = Combinator::parse(token) {
                    let children =
                        combinator_children(token, operand, |child| compile_scalar(def, field, child))?;
                    nodes.push(combinator.join(children));
                    continue;
                }
                let operator = Operator::parse(token).ok_or_else(|| SeekError::InvalidOperator {
                    token: token.clone(),
                })?;
                nodes.push(compile_operator(def, field, operator, operand)?);
            }
            Ok(FilterNode::all(nodes))
        }
        JsonValue::Array(items) => {
            let set = coerce_all(items, def)?;
            Ok(leaf(field, Op::In, ClauseValue::Set(set), false))
        }
        scalar => {
            let value = coerce(scalar, def)?;
            Ok(leaf(field, Op::Eq, value, false))
        }
    }
}

fn compile_operator(
    def: &FieldDef,
    field: Option<&str>,
    operator: Operator,
    operand: &JsonValue,
) -> Result<FilterNode> {
    match operator {
        Operator::Between => {
            if !def.kind.is_ordinal() {
                return Err(SeekError::InvalidOperatorForType {
                    op: "between",
                    value_type: def.kind.as_str(),
                });
            }
            let bounds = match operand {
                JsonValue::Array(items) if items.len() == 2 => items,
                _ => {
                    return Err(SeekError::MalformedFilter(
                        "$between expects a two-element array [lo, hi]".to_string(),
                    ))
                }
            };
            let lo = coerce(&bounds[0], def)?;
            let hi = coerce(&bounds[1], def)?;
            Ok(FilterNode::all(vec![
                leaf(field, Op::Gte, lo, false),
                leaf(field, Op::Lte, hi, false),
            ]))
        }
        Operator::Compare {
            op,
            case_insensitive,
            negated,
        } => {
            if !op.supports(def.kind) {
                return Err(SeekError::InvalidOperatorForType {
                    op: op.as_str(),
                    value_type: def.kind.as_str(),
                });
            }
            let value = match (op, operand) {
                (Op::In, JsonValue::Array(items)) => ClauseValue::Set(coerce_all(items, def)?),
                (Op::In, _) => {
                    return Err(SeekError::MalformedFilter(
                        "$in/$notIn expect an array".to_string(),
                    ))
                }
                (Op::Regex, JsonValue::String(pattern)) => ClauseValue::Regex(
                    RegexBuilder::new(pattern)
                        .case_insensitive(case_insensitive)
                        .build()?,
                ),
                (Op::Regex, _) => {
                    return Err(SeekError::MalformedFilter(
                        "$regex expects a string pattern".to_string(),
                    ))
                }
                _ => coerce(operand, def)?,
            };
            let ignore_case = case_insensitive && def.kind == FieldKind::String;
            let node = leaf(field, op, value, ignore_case);
            Ok(if negated { node.negate() } else { node })
        }
    }
}

fn leaf(field: Option<&str>, op: Op, value: ClauseValue, ci: bool) -> FilterNode {
    let clause = Clause {
        field: field.map(str::to_string),
        op,
        value,
        case_insensitive: ci,
    };
    FilterNode::Compare(clause)
}

/// How two predicates are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    fn parse(key: &str) -> Option<Combinator> {
        if key.eq_ignore_ascii_case("$and") {
            Some(Combinator::And)
        } else if key.eq_ignore_ascii_case("$or") {
            Some(Combinator::Or)
        } else {
            None
        }
    }

    /// Empty combinator arrays do not constrain anything.
    fn join(self, children: Vec<FilterNode>) -> FilterNode {
        if children.is_empty() {
            return FilterNode::Const(true);
        }
        match self {
            Combinator::And => FilterNode::all(children),
            Combinator::Or => FilterNode::any(children),
        }
    }
}

fn combinator_children(
    key: &str,
    value: &JsonValue,
    mut compile_child: impl FnMut(&JsonValue) -> Result<FilterNode>,
) -> Result<Vec<FilterNode>> {
    match value {
        JsonValue::Array(items) => items.iter().map(&mut compile_child).collect(),
        _ => Err(SeekError::MalformedFilter(format!(
            "'{key}' expects an array"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Number;
    use serde_json::json;

    static ORDER: Schema = Schema::new(
        "Order",
        &[FieldDef::number("total"), FieldDef::string("sku")],
    );

    fn order() -> &'static Schema {
        &ORDER
    }

    static ADDRESS: Schema = Schema::new("Address", &[FieldDef::string("city")]);

    fn address() -> &'static Schema {
        &ADDRESS
    }

    static PERSON: Schema = Schema::new(
        "Person",
        &[
            FieldDef::number("age"),
            FieldDef::string("name"),
            FieldDef::string("nick").nullable(),
            FieldDef::boolean("active"),
            FieldDef::enumeration("status", &["Draft", "Active"]),
            FieldDef::string("tags").list(),
            FieldDef::object("address", address).nullable(),
            FieldDef::object("orders", order).list(),
        ],
    );

    struct Order {
        total: i64,
        sku: &'static str,
    }

    impl Seekable for Order {
        fn schema() -> &'static Schema {
            &ORDER
        }

        fn seeker_field_value(&self, field: &str) -> Value<'_> {
            match field {
                "total" => Value::Number(Number::I64(self.total)),
                "sku" => Value::String(self.sku),
                _ => Value::None,
            }
        }
    }

    struct Address {
        city: &'static str,
    }

    impl Seekable for Address {
        fn schema() -> &'static Schema {
            &ADDRESS
        }

        fn seeker_field_value(&self, field: &str) -> Value<'_> {
            match field {
                "city" => Value::String(self.city),
                _ => Value::None,
            }
        }
    }

    struct Person {
        age: i64,
        name: &'static str,
        nick: Option<&'static str>,
        active: bool,
        status: u32,
        tags: Vec<&'static str>,
        address: Option<Address>,
        orders: Vec<Order>,
    }

    impl Seekable for Person {
        fn schema() -> &'static Schema {
            &PERSON
        }

        fn seeker_field_value(&self, field: &str) -> Value<'_> {
            match field {
                "age" => Value::Number(Number::I64(self.age)),
                "name" => Value::String(self.name),
                "nick" => self.nick.map(Value::String).unwrap_or(Value::None),
                "active" => Value::Bool(self.active),
                "status" => Value::Enum(self.status),
                "tags" => Value::List(self.tags.iter().map(|t| Value::String(t)).collect()),
                "address" => match &self.address {
                    Some(a) => Value::Object(a),
                    None => Value::None,
                },
                "orders" => Value::List(self.orders.iter().map(|o| Value::Object(o)).collect()),
                _ => Value::None,
            }
        }
    }

    fn person() -> Person {
        Person {
            age: 25,
            name: "John",
            nick: None,
            active: true,
            status: 1,
            tags: vec!["vip", "x"],
            address: Some(Address { city: "New York" }),
            orders: vec![
                Order { total: 50, sku: "A-1" },
                Order { total: 150, sku: "B-2" },
            ],
        }
    }

    fn check(filter: JsonValue) -> bool {
        compile(&PERSON, &filter).unwrap().matches(&person())
    }

    #[test]
    fn range_and_implicit_eq() {
        assert!(check(json!({"age": {"$gte": 18, "$lt": 30}})));
        assert!(!check(json!({"age": {"$gte": 30}})));
        assert!(check(json!({"name": "John", "active": true})));
        assert!(check(json!({"AGE": 25})));
    }

    #[test]
    fn combinators() {
        assert!(check(json!({"$or": [{"age": 1}, {"name": "John"}]})));
        assert!(!check(json!({"$AND": [{"age": 25}, {"name": "Mark"}]})));
        assert!(check(json!({"age": {"$or": [{"$lt": 5}, {"$gt": 20}]}})));
        assert!(check(json!({})));
    }

    #[test]
    fn string_operators() {
        assert!(check(json!({"name": {"$startsWithI": "jo"}})));
        assert!(!check(json!({"name": {"$startsWith": "jo"}})));
        assert!(check(json!({"name": {"$eqI": "JOHN"}})));
        assert!(check(json!({"name": {"$notContains": "x"}})));
        assert!(!check(json!({"name": {"$notContainsI": "OH"}})));
        assert!(check(json!({"name": {"$regex": "^J.hn$"}})));
    }

    #[test]
    fn membership_and_between() {
        assert!(check(json!({"age": {"$in": [24, 25]}})));
        assert!(check(json!({"age": [25, 26]})));
        assert!(check(json!({"age": {"$notIn": [1, 2]}})));
        assert!(check(json!({"age": {"$between": [25, 30]}})));
        assert!(!check(json!({"age": {"$between": [26, 30]}})));
        assert!(check(json!({"status": {"$in": ["active"]}})));
    }

    #[test]
    fn nested_and_collections() {
        assert!(check(json!({"address": {"city": {"$containsI": "york"}}})));
        assert!(check(json!({"address.city": "New York"})));
        assert!(check(json!({"orders": {"total": {"$gt": 100}}})));
        assert!(!check(json!({"orders": {"total": {"$gt": 500}}})));
        assert!(check(json!({"orders.sku": "B-2"})));
        assert!(check(json!({"tags": {"$any": {"$eq": "vip"}}})));
        assert!(check(json!({"tags": {"$any": "x"}})));
        assert!(check(json!({"orders": {"$any": {"sku": {"$startsWith": "A"}}}})));
    }

    #[test]
    fn null_nested_object_is_false() {
        let mut p = person();
        p.address = None;
        let node = compile(&PERSON, &json!({"address": {"city": {"$ne": "x"}}})).unwrap();
        assert!(!node.matches(&p));
    }

    #[test]
    fn nullable_eq_null() {
        assert!(check(json!({"nick": null})));
        assert!(!check(json!({"nick": {"$ne": null}})));
    }

    #[test]
    fn negations_agree_on_null() {
        assert!(person().nick.is_none());
        let ne = check(json!({"nick": {"$ne": "x"}}));
        let not_in = check(json!({"nick": {"$notIn": ["x"]}}));
        let not_contains = check(json!({"nick": {"$notContains": "x"}}));
        assert!(ne);
        assert_eq!(ne, not_in);
        assert_eq!(ne, not_contains);
    }

    #[test]
    fn operators_need_the_dollar_prefix() {
        assert!(matches!(
            compile(&PERSON, &json!({"nick": {"eq": "x"}})),
            Err(SeekError::InvalidOperator { ref token }) if token == "eq"
        ));
    }

    #[test]
    fn ambiguous_collection_filters() {
        for filter in [
            json!({"tags": {"$contains": "x"}}),
            json!({"tags": "x"}),
            json!({"orders": {"$gt": 1}}),
            json!({"tags": {"label": "x"}}),
        ] {
            assert!(
                matches!(
                    compile(&PERSON, &filter),
                    Err(SeekError::AmbiguousCollectionFilter { .. })
                ),
                "expected ambiguity error for {filter}"
            );
        }
    }

    #[test]
    fn operator_errors() {
        assert!(matches!(
            compile(&PERSON, &json!({"age": {"$like": 1}})),
            Err(SeekError::InvalidOperator { token }) if token == "$like"
        ));
        assert!(matches!(
            compile(&PERSON, &json!({"$eq": 1})),
            Err(SeekError::InvalidOperator { .. })
        ));
        assert!(matches!(
            compile(&PERSON, &json!({"active": {"$between": [false, true]}})),
            Err(SeekError::InvalidOperatorForType { op: "between", value_type: "bool" })
        ));
        assert!(matches!(
            compile(&PERSON, &json!({"age": {"$contains": "1"}})),
            Err(SeekError::InvalidOperatorForType { op: "contains", .. })
        ));
        assert!(matches!(
            compile(&PERSON, &json!({"age": {"$between": [1]}})),
            Err(SeekError::MalformedFilter(_))
        ));
        assert!(matches!(
            compile(&PERSON, &json!({"age": "old"})),
            Err(SeekError::Coercion { .. })
        ));
        assert!(matches!(
            compile(&PERSON, &json!({"height": 1})),
            Err(SeekError::FieldNotFound { .. })
        ));
        assert!(matches!(
            compile(&PERSON, &json!({"name": {"$regex": "("}})),
            Err(SeekError::InvalidRegex(_))
        ));
        assert!(compile(&PERSON, &json!([1])).is_err());
    }

    #[test]
    fn canonical_rendering() {
        let node = compile(
            &PERSON,
            &json!({"address": {"city": "Oslo"}, "tags": {"$any": {"$eqI": "a"}}}),
        )
        .unwrap();
        insta::assert_snapshot!(node.to_string(), @r#"(address {city $eq "Oslo"} AND tags ANY {@ $eqi "a"})"#);
    }
}
