//! Depth-first traversal of a [`Model`] back into flat `(key, value)` pairs.
//!
//! Emission order is fixed: mapping entries in insertion order, sequence
//! elements by ascending index, holes skipped. Scalars inside a plain
//! sequence are emitted under `key[]` and containers under `key[i]`, so that
//! building from the emitted stream picks the same container kinds again.

use tracing::trace;

use crate::arena::{Model, Node, NodeRef};
use crate::constants::APPEND_MARKER;
use crate::types::Value;
use crate::{Error, Result};

/// Emit every leaf of `model` in traversal order.
pub fn walk<F>(model: &Model, mut emit: F)
where
    F: FnMut(&str, &Value),
{
    let mut key = String::new();
    for (name, node) in model.root().entries() {
        key.clear();
        key.push_str(name);
        walk_node(node, &mut key, &mut emit);
    }
}

/// Collect the traversal into owned pairs.
pub fn pairs(model: &Model) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    walk(model, |key, value| out.push((key.to_string(), value.clone())));
    out
}

/// Emit a JSON document: an object is walked like a model, an array is read
/// as pre-flattened `{"name": .., "value": ..}` records and emitted as is.
pub fn walk_json<F>(json: &serde_json::Value, mut emit: F) -> Result<()>
where
    F: FnMut(&str, &Value),
{
    match json {
        serde_json::Value::Array(records) => {
            for (index, record) in records.iter().enumerate() {
                let (name, value) = read_record(record).ok_or_else(|| {
                    Error::shape(format!(
                        "record {index} must be an object with a string `name` and a scalar `value`"
                    ))
                })?;
                emit(name, &value);
            }
            Ok(())
        }
        _ => {
            let model = Model::from_json(json)?;
            walk(&model, emit);
            Ok(())
        }
    }
}

fn read_record(record: &serde_json::Value) -> Option<(&str, Value)> {
    let name = record.get("name")?.as_str()?;
    let value = match record.get("value") {
        None | Some(serde_json::Value::Null) => Value::Null,
        Some(serde_json::Value::Bool(b)) => Value::Bool(*b),
        Some(serde_json::Value::Number(n)) => Value::Number(n.clone()),
        Some(serde_json::Value::String(s)) => Value::String(s.clone()),
        Some(_) => return None,
    };
    Some((name, value))
}

fn walk_node<F>(node: NodeRef<'_>, key: &mut String, emit: &mut F)
where
    F: FnMut(&str, &Value),
{
    match node.node() {
        Node::Sequence(_) if key.ends_with(APPEND_MARKER) => {
            for element in node.elements().flatten() {
                walk_node(element, key, emit);
            }
        }
        Node::Sequence(_) => {
            let mark = key.len();
            let mut buffer = itoa::Buffer::new();
            for (index, element) in node.elements().enumerate() {
                let Some(element) = element else {
                    continue;
                };
                key.push('[');
                if element.is_container() {
                    key.push_str(buffer.format(index));
                }
                key.push(']');
                walk_node(element, key, emit);
                key.truncate(mark);
            }
        }
        Node::Mapping(_) => {
            let mark = key.len();
            for (name, child) in node.entries() {
                key.push('[');
                key.push_str(name);
                key.push(']');
                walk_node(child, key, emit);
                key.truncate(mark);
            }
        }
        Node::Leaf(value) if value.is_aggregate() => {
            for item in value.aggregate_items() {
                trace!(key = key.as_str(), "emit aggregate item");
                emit(key, &item);
            }
        }
        Node::Leaf(value) => {
            trace!(key = key.as_str(), kind = value.type_name(), "emit leaf");
            emit(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    use crate::build::build;
    use crate::types::{FileHandle, FileList};
    use crate::BuildOptions;

    fn keys(model: &Model) -> Vec<String> {
        pairs(model).into_iter().map(|(key, _)| key).collect()
    }

    #[rstest]
    fn test_scalar_sequence_uses_append_marker() {
        let model = Model::from_json(&json!({"a": {"b": [1, 2]}})).unwrap();
        assert_eq!(
            pairs(&model),
            vec![
                ("a[b][]".to_string(), Value::from(1)),
                ("a[b][]".to_string(), Value::from(2)),
            ]
        );
        assert_eq!(build(pairs(&model), &BuildOptions::default()), model);
    }

    #[rstest]
    fn test_container_elements_get_explicit_index() {
        let model = Model::from_json(&json!({"items": [{"id": 1}, {"id": 2, "tags": ["x"]}]}))
            .unwrap();
        assert_eq!(
            keys(&model),
            vec!["items[0][id]", "items[1][id]", "items[1][tags][]"]
        );
    }

    #[rstest]
    fn test_holes_are_skipped() {
        let mut model = Model::new();
        model.set("a[0]", "x");
        model.set("a[2]", "y");
        assert_eq!(keys(&model), vec!["a[]", "a[]"]);
    }

    #[rstest]
    fn test_top_level_fields_are_bare() {
        let model = Model::from_json(&json!({"name": "ada", "age": 36})).unwrap();
        assert_eq!(keys(&model), vec!["name", "age"]);
    }

    #[rstest]
    fn test_sequence_under_append_key_is_flattened() {
        let model = Model::from_json(&json!({"a": {"": [1, 2]}})).unwrap();
        assert_eq!(keys(&model), vec!["a[]", "a[]"]);
    }

    #[rstest]
    fn test_file_list_emits_each_item() {
        let a = FileHandle::named("a.txt", b"a".to_vec());
        let b = FileHandle::named("b.txt", b"b".to_vec());
        let files: FileList = vec![a.clone(), b.clone()].into_iter().collect();
        let mut model = Model::new();
        model.set("docs", files);
        assert_eq!(
            pairs(&model),
            vec![
                ("docs".to_string(), Value::File(a)),
                ("docs".to_string(), Value::File(b)),
            ]
        );
    }

    #[rstest]
    fn test_walk_json_records() {
        let records = json!([
            {"name": "a[]", "value": 1},
            {"name": "b", "value": "x"},
            {"name": "c"}
        ]);
        let mut seen = Vec::new();
        walk_json(&records, |key, value| seen.push((key.to_string(), value.clone()))).unwrap();
        assert_eq!(
            seen,
            vec![
                ("a[]".to_string(), Value::from(1)),
                ("b".to_string(), Value::from("x")),
                ("c".to_string(), Value::Null),
            ]
        );
    }

    #[rstest]
    #[case(json!([{"value": 1}]))]
    #[case(json!([{"name": "a", "value": [1]}]))]
    #[case(json!("scalar"))]
    fn test_walk_json_rejects_bad_shapes(#[case] input: serde_json::Value) {
        let err = walk_json(&input, |_, _| {}).unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::Shape);
    }

    #[rstest]
    #[case(json!({"a": {"b": {"c": [1, {"d": true}, [2, 3]]}}}))]
    #[case(json!({"m": [[1, 2], [3]], "e": "", "n": null}))]
    #[case(json!({"x": [{"y": []}], "z": {}}))]
    fn test_second_round_trip_is_stable(#[case] source: serde_json::Value) {
        let model = Model::from_json(&source).unwrap();
        let once = build(pairs(&model), &BuildOptions::default());
        let twice = build(pairs(&once), &BuildOptions::default());
        assert_eq!(once, twice);
    }
}
