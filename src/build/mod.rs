//! Folding flat `(key, value)` pairs into a [`Model`].
//!
//! Container kinds are decided the first time a path position is written:
//!
//! - a position followed by `[]` becomes a sequence, whether or not the
//!   append is the last segment;
//! - a position followed by a numeric segment becomes a sequence pre-sized to
//!   `index + 1`, unless arrays-as-objects mode is on or the index exceeds the
//!   sequence limit;
//! - anything else becomes a mapping.
//!
//! An existing container keeps its kind. Numeric and append segments that
//! reach a mapping are stored under string keys; a named segment that reaches
//! a sequence cannot be stored and skips the pair.

use smol_str::SmolStr;
use tracing::{debug, trace, warn};

use crate::arena::{Model, Node, NodeId, Slot};
use crate::codec::structured::{JsonText, StructuredText};
use crate::path::{self, Path, Segment, SegmentKind};
use crate::types::Value;
use crate::BuildOptions;

/// One flat entry as produced by an adapter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pair {
    pub key: Option<String>,
    /// `None` means the value is intentionally absent; the pair is skipped.
    pub value: Option<Value>,
    /// The value is structured text and is decoded before insertion.
    pub structured: bool,
}

impl Pair {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: Some(key.into()),
            value: Some(value.into()),
            structured: false,
        }
    }

    pub fn absent(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: None,
            structured: false,
        }
    }

    pub fn structured(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: Some(Value::String(text.into())),
            structured: true,
        }
    }
}

impl<K: Into<String>, V: Into<Value>> From<(K, V)> for Pair {
    fn from((key, value): (K, V)) -> Self {
        Pair::new(key, value)
    }
}

/// What gets stored at the end of a path.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Value(Value),
    /// A decoded structured value; containers become model nodes.
    Tree(serde_json::Value),
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Value(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingKey,
    /// The key normalized to no segments.
    EmptyPath,
    AbsentValue,
    /// A named segment addressed an existing sequence.
    ShapeConflict,
    /// A numeric segment would grow a sequence past the configured limit.
    IndexLimit,
    /// The structured-text codec rejected the value.
    StructuredText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Inserted,
    Skipped(SkipReason),
}

impl Outcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, Outcome::Inserted)
    }
}

/// Insert `payload` at `path`.
pub fn insert(
    model: &mut Model,
    path: &Path,
    payload: impl Into<Payload>,
    options: &BuildOptions,
) -> Outcome {
    let payload = payload.into();
    let segments = path.segments();
    let Some((terminal, parents)) = segments.split_last() else {
        return skipped(path, SkipReason::EmptyPath);
    };

    let mut current = NodeId::ROOT;
    let mut link: Option<(NodeId, Slot)> = None;
    for (depth, segment) in parents.iter().enumerate() {
        let next = &segments[depth + 1];
        let slot = match resolve_slot(model, current, segment, options) {
            Ok(slot) => slot,
            Err(reason) => return skipped(path, reason),
        };
        let (child, slot) = match model.child(current, &slot) {
            Some(id) if model.node(id).is_container() => (id, slot),
            _ => {
                let node = materialize(next, options);
                trace!(key = %path, depth, kind = ?node.kind(), "materialized container");
                let id = model.alloc(node);
                let slot = model.attach(current, slot, id);
                (id, slot)
            }
        };
        link = Some((current, slot));
        current = child;
    }

    let slot = match resolve_slot(model, current, terminal, options) {
        Ok(slot) => slot,
        Err(reason) => return skipped(path, reason),
    };

    if let (Slot::Append, Payload::Value(Value::Files(files)), Some((parent, parent_slot))) =
        (&slot, &payload, &link)
    {
        if matches!(model.node(current), Node::Sequence(items) if items.is_empty()) {
            trace!(key = %path, files = files.len(), "file list replaces empty sequence");
            let id = model.alloc(Node::Leaf(Value::Files(files.clone())));
            model.attach(*parent, parent_slot.clone(), id);
            return Outcome::Inserted;
        }
    }

    let id = match payload {
        Payload::Value(value) => match model.child(current, &slot) {
            Some(existing) if matches!(model.node(existing), Node::Leaf(_)) => {
                model.replace_leaf(existing, value);
                return Outcome::Inserted;
            }
            _ => model.alloc(Node::Leaf(value)),
        },
        Payload::Tree(tree) => model.graft(&tree),
    };
    model.attach(current, slot, id);
    Outcome::Inserted
}

/// Parse `key` and insert `value`; an empty key or absent value is skipped.
pub fn insert_key(
    model: &mut Model,
    key: &str,
    value: Option<Value>,
    options: &BuildOptions,
) -> Outcome {
    let Some(value) = value else {
        debug!(key, "skipping pair without value");
        return Outcome::Skipped(SkipReason::AbsentValue);
    };
    if key.is_empty() {
        debug!("skipping pair without key");
        return Outcome::Skipped(SkipReason::MissingKey);
    }
    insert(model, &path::parse(key), value, options)
}

/// Build a fresh model from a pair stream.
pub fn build<I, P>(pairs: I, options: &BuildOptions) -> Model
where
    I: IntoIterator<Item = P>,
    P: Into<Pair>,
{
    let mut model = Model::new();
    ModelBuilder::new(&mut model)
        .with_options(*options)
        .extend(pairs);
    model
}

/// Accumulates pair streams into a caller-owned model.
pub struct ModelBuilder<'m, 'c> {
    model: &'m mut Model,
    options: BuildOptions,
    codec: &'c dyn StructuredText,
}

impl<'m> ModelBuilder<'m, 'static> {
    pub fn new(model: &'m mut Model) -> Self {
        Self {
            model,
            options: BuildOptions::default(),
            codec: &JsonText,
        }
    }
}

impl<'m, 'c> ModelBuilder<'m, 'c> {
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_codec<'d>(self, codec: &'d dyn StructuredText) -> ModelBuilder<'m, 'd> {
        ModelBuilder {
            model: self.model,
            options: self.options,
            codec,
        }
    }

    pub fn push(&mut self, pair: impl Into<Pair>) -> Outcome {
        let Pair {
            key,
            value,
            structured,
        } = pair.into();
        let Some(key) = key.filter(|key| !key.is_empty()) else {
            debug!("skipping pair without key");
            return Outcome::Skipped(SkipReason::MissingKey);
        };
        let Some(value) = value else {
            debug!(%key, "skipping pair without value");
            return Outcome::Skipped(SkipReason::AbsentValue);
        };
        let path = path::parse(&key);
        if path.is_empty() {
            return skipped(&path, SkipReason::EmptyPath);
        }
        let payload = match value {
            Value::String(text) if structured => match self.codec.decode(&text) {
                Ok(tree) => Payload::Tree(tree),
                Err(err) => {
                    warn!(%key, error = %err, "structured value failed to decode");
                    return Outcome::Skipped(SkipReason::StructuredText);
                }
            },
            other => Payload::Value(other),
        };
        insert(self.model, &path, payload, &self.options)
    }

    /// Push every pair; returns how many were inserted.
    pub fn extend<I, P>(&mut self, pairs: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<Pair>,
    {
        pairs
            .into_iter()
            .map(|pair| self.push(pair))
            .filter(Outcome::is_inserted)
            .count()
    }
}

fn resolve_slot(
    model: &Model,
    container: NodeId,
    segment: &Segment,
    options: &BuildOptions,
) -> Result<Slot, SkipReason> {
    match (model.node(container), segment.kind) {
        (Node::Mapping(map), SegmentKind::DynamicAppend) => {
            let mut next = map.len();
            let mut buffer = itoa::Buffer::new();
            loop {
                let key = buffer.format(next);
                if !map.contains_key(key) {
                    return Ok(Slot::Key(SmolStr::new(key)));
                }
                next += 1;
            }
        }
        (Node::Mapping(_), _) => Ok(Slot::Key(segment.name.clone())),
        (Node::Sequence(_), SegmentKind::DynamicAppend) => Ok(Slot::Append),
        (Node::Sequence(items), SegmentKind::Indexed(index)) => {
            if index >= items.len() && index > options.sequence_limit {
                return Err(SkipReason::IndexLimit);
            }
            Ok(Slot::Index(index))
        }
        (Node::Sequence(_), SegmentKind::Named) | (Node::Leaf(_), _) => {
            Err(SkipReason::ShapeConflict)
        }
    }
}

fn materialize(next: &Segment, options: &BuildOptions) -> Node {
    if next.is_append() {
        return Node::Sequence(Vec::new());
    }
    match next.kind {
        SegmentKind::Indexed(index)
            if !options.arrays_as_objects && index <= options.sequence_limit =>
        {
            Node::Sequence(vec![None; index + 1])
        }
        _ => Node::Mapping(Default::default()),
    }
}

fn skipped(path: &Path, reason: SkipReason) -> Outcome {
    debug!(key = %path, ?reason, "skipping pair");
    Outcome::Skipped(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    use crate::types::{FileHandle, FileList};

    fn build_json(pairs: Vec<(&str, Value)>) -> serde_json::Value {
        build(pairs, &BuildOptions::default()).to_json()
    }

    #[rstest]
    fn test_holes_fill_between_indices() {
        let model = build(
            vec![("a[0]", Value::from("x")), ("a[2]", Value::from("y"))],
            &BuildOptions::default(),
        );
        let seq = model.field("a").unwrap();
        assert!(seq.is_sequence());
        assert_eq!(seq.len(), 3);
        assert!(seq.at(1).is_none());
        assert_eq!(model.to_json(), json!({"a": ["x", null, "y"]}));
    }

    #[rstest]
    fn test_append_preserves_order() {
        let value = build_json(vec![("a[]", Value::from(1)), ("a[]", Value::from(2))]);
        assert_eq!(value, json!({"a": [1, 2]}));
    }

    #[rstest]
    fn test_append_never_overwrites_indexed_slot() {
        let value = build_json(vec![
            ("a[1]", Value::from("one")),
            ("a[]", Value::from("tail")),
        ]);
        assert_eq!(value, json!({"a": [null, "one", "tail"]}));
    }

    #[rstest]
    fn test_nested_mapping() {
        let value = build_json(vec![
            ("user[name]", Value::from("ada")),
            ("user[address][city]", Value::from("london")),
        ]);
        assert_eq!(
            value,
            json!({"user": {"name": "ada", "address": {"city": "london"}}})
        );
    }

    #[rstest]
    fn test_sequence_of_mappings() {
        let value = build_json(vec![
            ("items[0][id]", Value::from(1)),
            ("items[1][id]", Value::from(2)),
            ("items[0][qty]", Value::from(5)),
        ]);
        assert_eq!(
            value,
            json!({"items": [{"id": 1, "qty": 5}, {"id": 2}]})
        );
    }

    #[rstest]
    fn test_arrays_as_objects_forces_mappings() {
        let options = BuildOptions::default().with_arrays_as_objects(true);
        let model = build(
            vec![
                ("a[0]", Value::from("x")),
                ("a[2]", Value::from("y")),
                ("b[]", Value::from(1)),
            ],
            &options,
        );
        assert_eq!(
            model.to_json(),
            json!({"a": {"0": "x", "2": "y"}, "b": [1]})
        );
    }

    #[rstest]
    fn test_mapping_keeps_kind_for_numeric_segment() {
        let value = build_json(vec![
            ("a[x]", Value::from(1)),
            ("a[0]", Value::from(2)),
        ]);
        assert_eq!(value, json!({"a": {"x": 1, "0": 2}}));
    }

    #[rstest]
    fn test_append_onto_mapping_uses_next_free_key() {
        let value = build_json(vec![
            ("a[x]", Value::from(1)),
            ("a[1]", Value::from(2)),
            ("a[]", Value::from(3)),
        ]);
        assert_eq!(value, json!({"a": {"x": 1, "1": 2, "2": 3}}));
    }

    #[rstest]
    fn test_named_segment_on_sequence_is_skipped() {
        let mut model = Model::new();
        assert!(model.set("a[0]", 1).is_inserted());
        assert_eq!(
            model.set("a[name]", 2),
            Outcome::Skipped(SkipReason::ShapeConflict)
        );
        assert_eq!(model.to_json(), json!({"a": [1]}));
    }

    #[rstest]
    fn test_leaf_is_replaced_by_container() {
        let value = build_json(vec![("a", Value::from(1)), ("a[b]", Value::from(2))]);
        assert_eq!(value, json!({"a": {"b": 2}}));
    }

    #[rstest]
    fn test_terminal_overwrites_container() {
        let value = build_json(vec![("a[b]", Value::from(2)), ("a", Value::from(1))]);
        assert_eq!(value, json!({"a": 1}));
    }

    #[rstest]
    fn test_sequence_limit() {
        let options = BuildOptions::default().with_sequence_limit(5);
        let mut model = Model::new();
        assert_eq!(
            insert(&mut model, &path::parse("big[100]"), Value::from(1), &options),
            Outcome::Inserted
        );
        assert_eq!(
            insert(&mut model, &path::parse("small[0]"), Value::from(1), &options),
            Outcome::Inserted
        );
        assert_eq!(
            insert(&mut model, &path::parse("small[6]"), Value::from(2), &options),
            Outcome::Skipped(SkipReason::IndexLimit)
        );
        assert_eq!(model.to_json(), json!({"big": {"100": 1}, "small": [1]}));
    }

    #[rstest]
    fn test_non_terminal_append_materializes_sequence() {
        let value = build_json(vec![
            ("a[][b]", Value::from(1)),
            ("a[][b]", Value::from(2)),
            ("c[x][][y]", Value::from(3)),
            ("d[][]", Value::from(4)),
        ]);
        assert_eq!(
            value,
            json!({
                "a": [{"b": 1}, {"b": 2}],
                "c": {"x": [{"y": 3}]},
                "d": [[4]]
            })
        );
    }

    #[rstest]
    fn test_non_terminal_append_on_existing_mapping() {
        let value = build_json(vec![
            ("a[x]", Value::from(1)),
            ("a[][b]", Value::from(2)),
        ]);
        assert_eq!(value, json!({"a": {"x": 1, "1": {"b": 2}}}));
    }

    #[rstest]
    fn test_non_terminal_append_on_sequence() {
        let mut model = Model::new();
        model.set("a[]", "first");
        model.set("a[][b]", 1);
        assert_eq!(model.to_json(), json!({"a": ["first", {"b": 1}]}));
    }

    #[rstest]
    #[case(Pair::absent("a"), SkipReason::AbsentValue)]
    #[case(Pair { key: None, value: Some(Value::from(1)), structured: false }, SkipReason::MissingKey)]
    #[case(Pair::new("", 1), SkipReason::MissingKey)]
    #[case(Pair::new("[]", 1), SkipReason::EmptyPath)]
    #[case(Pair::structured("a", "{broken"), SkipReason::StructuredText)]
    fn test_skip_conditions(#[case] pair: Pair, #[case] reason: SkipReason) {
        let mut model = Model::new();
        let outcome = ModelBuilder::new(&mut model).push(pair);
        assert_eq!(outcome, Outcome::Skipped(reason));
        assert!(model.is_empty());
    }

    #[rstest]
    #[case(Value::from(""))]
    #[case(Value::from(false))]
    #[case(Value::from(0))]
    #[case(Value::Null)]
    fn test_falsy_values_are_kept(#[case] value: Value) {
        let mut model = Model::new();
        let outcome = ModelBuilder::new(&mut model).push(Pair::new("a", value.clone()));
        assert!(outcome.is_inserted());
        assert_eq!(model.field("a").and_then(|node| node.as_value()), Some(&value));
    }

    #[rstest]
    fn test_structured_values_are_grafted() {
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        builder.push(Pair::structured("meta", r#"{"tags":["a","b"]}"#));
        builder.push(Pair::structured("empty", ""));
        builder.push(Pair::structured("list[]", "3"));
        assert!(model.get("meta[tags]").unwrap().is_sequence());
        assert_eq!(
            model.to_json(),
            json!({"meta": {"tags": ["a", "b"]}, "empty": null, "list": [3]})
        );
    }

    #[rstest]
    fn test_file_list_replaces_empty_append_target() {
        let files: FileList = vec![
            FileHandle::named("a.txt", b"a".to_vec()),
            FileHandle::named("b.txt", b"b".to_vec()),
        ]
        .into_iter()
        .collect();
        let mut model = Model::new();
        ModelBuilder::new(&mut model).push(Pair::new("upload[docs][]", files.clone()));
        let node = model.get("upload[docs]").unwrap();
        assert_eq!(node.as_value(), Some(&Value::Files(files)));
    }

    #[rstest]
    fn test_file_list_appends_to_non_empty_sequence() {
        let files: FileList = vec![FileHandle::named("a.txt", b"a".to_vec())]
            .into_iter()
            .collect();
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        builder.push(("docs[]", "note"));
        builder.push(Pair::new("docs[]", files.clone()));
        let docs = model.field("docs").unwrap();
        assert!(docs.is_sequence());
        assert_eq!(docs.len(), 2);
        assert_eq!(docs.at(1).and_then(|n| n.as_value()), Some(&Value::Files(files)));
    }

    #[rstest]
    fn test_extend_counts_inserted_pairs() {
        let mut model = Model::new();
        let inserted = ModelBuilder::new(&mut model).extend(vec![
            Pair::new("a", 1),
            Pair::absent("b"),
            Pair::new("c[]", 2),
        ]);
        assert_eq!(inserted, 2);
    }

    #[rstest]
    fn test_streams_accumulate_into_shared_model() {
        let mut model = Model::new();
        ModelBuilder::new(&mut model).extend(vec![("a[]", 1)]);
        ModelBuilder::new(&mut model).extend(vec![("a[]", 2), ("b", 3)]);
        assert_eq!(model.to_json(), json!({"a": [1, 2], "b": 3}));
    }

    #[rstest]
    fn test_insert_key_skips_absent_value() {
        let mut model = Model::new();
        let outcome = insert_key(&mut model, "a", None, &BuildOptions::default());
        assert_eq!(outcome, Outcome::Skipped(SkipReason::AbsentValue));
    }
}
