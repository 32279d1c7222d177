//! Free-text search over string fields.
//!
//! A keyword becomes a case-insensitive `contains` clause on every target
//! field, OR-ed together. Targets are either the caller's list (non-string
//! or unknown paths are skipped) or every string field reachable within
//! `depth` hops through nested records and collections.

use tracing::{debug, trace};

use crate::clause::ClauseValue;
use crate::error::{Result, SeekError};
use crate::filter::FilterNode;
use crate::op::Op;
use crate::schema::{FieldDef, FieldMeta, Schema};

/// Compiles a search predicate.
///
/// Returns `Const(false)` when no field qualifies. Blank keywords are the
/// caller's concern; this function searches for whatever it is given.
pub fn compile(
    schema: &Schema,
    keyword: &str,
    fields: Option<&[String]>,
    depth: i32,
) -> Result<FilterNode> {
    if depth < 0 {
        return Err(SeekError::InvalidSearchDepth(depth));
    }

    let targets = match fields.filter(|f| !f.is_empty()) {
        Some(paths) => explicit_targets(schema, paths),
        None => {
            let mut found = Vec::new();
            discover(schema, depth, &mut Vec::new(), &mut found);
            found
        }
    };

    if targets.is_empty() {
        debug!(schema = schema.name, keyword, "no searchable fields, search matches nothing");
        return Ok(FilterNode::Const(false));
    }

    let nodes = targets
        .iter()
        .map(|meta| {
            FilterNode::at_path(
                meta,
                Op::Contains,
                ClauseValue::String(keyword.to_string()),
                true,
            )
        })
        .collect();
    let node = FilterNode::any(nodes);
    debug!(schema = schema.name, fields = targets.len(), search = %node, "compiled search");
    Ok(node)
}

fn explicit_targets(schema: &Schema, paths: &[String]) -> Vec<FieldMeta> {
    let mut targets: Vec<FieldMeta> = Vec::with_capacity(paths.len());
    for path in paths {
        match schema.resolve(path) {
            Ok(meta) if meta.leaf().is_string() => {
                if targets.iter().all(|t| t.path() != meta.path()) {
                    targets.push(meta);
                }
            }
            Ok(_) => debug!(path = %path, "search target is not a string field, skipped"),
            Err(_) => debug!(path = %path, "unknown search target, skipped"),
        }
    }
    targets
}

/// Collects string fields depth-first; `depth` counts the nested hops left.
fn discover(schema: &Schema, depth: i32, prefix: &mut Vec<FieldDef>, found: &mut Vec<FieldMeta>) {
    for field in schema.fields {
        prefix.push(*field);
        if field.is_string() {
            if let Some(meta) = FieldMeta::from_hops(prefix.clone()) {
                trace!(path = %meta.path(), "discovered search field");
                found.push(meta);
            }
        } else if depth > 0 {
            if let Some(nested) = field.nested_schema() {
                discover(nested, depth - 1, prefix, found);
            }
        }
        prefix.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Seekable;
    use crate::value::Value;

    static PET: Schema = Schema::new(
        "Pet",
        &[FieldDef::string("name"), FieldDef::object("owner", person)],
    );

    fn pet() -> &'static Schema {
        &PET
    }

    static PERSON: Schema = Schema::new(
        "Person",
        &[
            FieldDef::number("age"),
            FieldDef::string("name"),
            FieldDef::string("aliases").list(),
            FieldDef::object("pets", pet).list(),
        ],
    );

    fn person() -> &'static Schema {
        &PERSON
    }

    struct Pet {
        name: &'static str,
    }

    impl Seekable for Pet {
        fn schema() -> &'static Schema {
            &PET
        }

        fn seeker_field_value(&self, field: &str) -> Value<'_> {
            match field {
                "name" => Value::String(self.name),
                _ => Value::None,
            }
        }
    }

    struct Person {
        name: &'static str,
        aliases: Vec<&'static str>,
        pets: Vec<Pet>,
    }

    impl Seekable for Person {
        fn schema() -> &'static Schema {
            &PERSON
        }

        fn seeker_field_value(&self, field: &str) -> Value<'_> {
            match field {
                "name" => Value::String(self.name),
                "aliases" => Value::List(self.aliases.iter().map(|a| Value::String(a)).collect()),
                "pets" => Value::List(self.pets.iter().map(|p| Value::Object(p)).collect()),
                _ => Value::None,
            }
        }
    }

    fn paths(node: &FilterNode) -> String {
        node.to_string()
    }

    #[test]
    fn explicit_fields_skip_non_strings() {
        let fields = vec!["name".to_string(), "age".to_string(), "nope".to_string()];
        let node = compile(&PERSON, "jo", Some(&fields), 0).unwrap();
        assert_eq!(paths(&node), r#"name $containsi "jo""#);
    }

    #[test]
    fn depth_zero_only_direct_fields() {
        let node = compile(&PERSON, "x", None, 0).unwrap();
        assert_eq!(
            paths(&node),
            r#"(name $containsi "x" OR aliases ANY {@ $containsi "x"})"#
        );
    }

    #[test]
    fn depth_one_reaches_collection_elements() {
        let node = compile(&PERSON, "rex", None, 1).unwrap();
        let rendered = paths(&node);
        assert!(rendered.contains(r#"pets ANY {name $containsi "rex"}"#));
        assert!(!rendered.contains("owner"));

        let owner = Person {
            name: "Mark",
            aliases: vec![],
            pets: vec![Pet { name: "Rex" }],
        };
        assert!(node.matches(&owner));
    }

    #[test]
    fn matches_case_insensitively() {
        let fields = vec!["name".to_string()];
        let node = compile(&PERSON, "jo", Some(&fields), 0).unwrap();
        let hits: Vec<bool> = ["John", "Joanna", "Mark"]
            .into_iter()
            .map(|name| {
                node.matches(&Person {
                    name,
                    aliases: vec![],
                    pets: vec![],
                })
            })
            .collect();
        assert_eq!(hits, vec![true, true, false]);
    }

    #[test]
    fn no_fields_matches_nothing() {
        let fields = vec!["age".to_string()];
        let node = compile(&PERSON, "jo", Some(&fields), 0).unwrap();
        assert_eq!(node, FilterNode::Const(false));
    }

    #[test]
    fn negative_depth_is_an_error() {
        assert!(matches!(
            compile(&PERSON, "jo", None, -1),
            Err(SeekError::InvalidSearchDepth(-1))
        ));
    }
}
