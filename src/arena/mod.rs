//! The nested model, stored as an arena of nodes addressed by [`NodeId`].
//!
//! Node 0 is always the root mapping. Containers refer to their children by
//! id, so a container's kind is fixed at allocation and children can be
//! replaced without touching the rest of the tree. Overwritten subtrees stay
//! allocated but become unreachable.

use std::fmt;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use smol_str::SmolStr;

use crate::build::{self, Outcome};
use crate::path::{self, Path, SegmentKind};
use crate::types::Value;
use crate::{BuildOptions, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Sequence,
    Mapping,
    Leaf,
}

#[derive(Debug, Clone)]
pub enum Node {
    /// Index-addressed children; `None` is a hole.
    Sequence(Vec<Option<NodeId>>),
    Mapping(IndexMap<SmolStr, NodeId>),
    Leaf(Value),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Sequence(_) => NodeKind::Sequence,
            Node::Mapping(_) => NodeKind::Mapping,
            Node::Leaf(_) => NodeKind::Leaf,
        }
    }

    pub fn is_container(&self) -> bool {
        !matches!(self, Node::Leaf(_))
    }
}

/// Where a child sits inside its container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Slot {
    Key(SmolStr),
    Index(usize),
    Append,
}

#[derive(Clone)]
pub struct Model {
    nodes: Vec<Node>,
}

impl Model {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::Mapping(IndexMap::new())],
        }
    }

    pub fn root(&self) -> NodeRef<'_> {
        self.node_ref(NodeId::ROOT)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_ref(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { model: self, id }
    }

    /// Number of top-level fields.
    pub fn len(&self) -> usize {
        self.root().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Top-level field by its literal name.
    pub fn field(&self, name: &str) -> Option<NodeRef<'_>> {
        self.root().get(name)
    }

    /// Resolve a bracket/dot key such as `user[tags][0]`.
    pub fn get(&self, key: &str) -> Option<NodeRef<'_>> {
        self.get_path(&path::parse(key))
    }

    pub fn get_path(&self, path: &Path) -> Option<NodeRef<'_>> {
        if path.is_empty() {
            return None;
        }
        let mut current = self.root();
        for segment in path {
            current = match (current.node(), segment.kind) {
                (Node::Mapping(map), _) => self.node_ref(*map.get(segment.name.as_str())?),
                (Node::Sequence(items), SegmentKind::Indexed(index)) => {
                    self.node_ref((*items.get(index)?)?)
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Insert `value` at `key` with default build options.
    ///
    /// Overwriting a scalar reuses its node. Replacing a container with a
    /// scalar (or the reverse) leaves the old subtree allocated but
    /// unreachable until the model is dropped.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Outcome {
        build::insert(
            self,
            &path::parse(key),
            value.into(),
            &BuildOptions::default(),
        )
    }

    /// Build a model from a JSON object; arrays become sequences and objects
    /// become mappings.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(fields) = json else {
            return Err(Error::shape(format!(
                "model root must be an object, found {}",
                json_type_name(json)
            )));
        };
        let mut model = Model::new();
        for (name, value) in fields {
            let id = model.graft(value);
            model.attach(NodeId::ROOT, Slot::Key(SmolStr::new(name)), id);
        }
        Ok(model)
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.root().to_json()
    }

    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Allocated nodes, reachable or not.
    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Copy a JSON tree into the arena and return its root.
    pub(crate) fn graft(&mut self, json: &serde_json::Value) -> NodeId {
        let node = match json {
            serde_json::Value::Array(items) => {
                let children = items.iter().map(|item| Some(self.graft(item))).collect();
                Node::Sequence(children)
            }
            serde_json::Value::Object(fields) => {
                let children = fields
                    .iter()
                    .map(|(name, value)| (SmolStr::new(name), self.graft(value)))
                    .collect();
                Node::Mapping(children)
            }
            serde_json::Value::Null => Node::Leaf(Value::Null),
            serde_json::Value::Bool(b) => Node::Leaf(Value::Bool(*b)),
            serde_json::Value::Number(n) => Node::Leaf(Value::Number(n.clone())),
            serde_json::Value::String(s) => Node::Leaf(Value::String(s.clone())),
        };
        self.alloc(node)
    }

    pub(crate) fn child(&self, container: NodeId, slot: &Slot) -> Option<NodeId> {
        match (self.node(container), slot) {
            (Node::Mapping(map), Slot::Key(key)) => map.get(key).copied(),
            (Node::Sequence(items), Slot::Index(index)) => items.get(*index).copied().flatten(),
            _ => None,
        }
    }

    /// Store `child` in `container` and return the concrete slot it landed in.
    pub(crate) fn attach(&mut self, container: NodeId, slot: Slot, child: NodeId) -> Slot {
        match (self.node_mut(container), slot) {
            (Node::Mapping(map), Slot::Key(key)) => {
                map.insert(key.clone(), child);
                Slot::Key(key)
            }
            (Node::Sequence(items), Slot::Index(index)) => {
                if index >= items.len() {
                    items.resize(index + 1, None);
                }
                items[index] = Some(child);
                Slot::Index(index)
            }
            (Node::Sequence(items), Slot::Append) => {
                items.push(Some(child));
                Slot::Index(items.len() - 1)
            }
            (_, slot) => {
                debug_assert!(false, "slot {slot:?} does not fit container {container:?}");
                slot
            }
        }
    }

    pub(crate) fn replace_leaf(&mut self, id: NodeId, value: Value) {
        *self.node_mut(id) = Node::Leaf(value);
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.root() == other.root()
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Model({})", self.to_json())
    }
}

impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.root().serialize(serializer)
    }
}

/// Borrowed view of one node and everything below it.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    model: &'a Model,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn model(&self) -> &'a Model {
        self.model
    }

    pub fn node(&self) -> &'a Node {
        self.model.node(self.id)
    }

    pub fn kind(&self) -> NodeKind {
        self.node().kind()
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self.node(), Node::Sequence(_))
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self.node(), Node::Mapping(_))
    }

    pub fn is_container(&self) -> bool {
        self.node().is_container()
    }

    pub fn as_value(&self) -> Option<&'a Value> {
        match self.node() {
            Node::Leaf(value) => Some(value),
            _ => None,
        }
    }

    /// Slots for a sequence (holes included), entries for a mapping, items
    /// for a file list and zero for other leaves.
    pub fn len(&self) -> usize {
        match self.node() {
            Node::Sequence(items) => items.len(),
            Node::Mapping(map) => map.len(),
            Node::Leaf(Value::Files(files)) => files.len(),
            Node::Leaf(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mapping entry by key, or sequence element by decimal index text.
    pub fn get(&self, key: &str) -> Option<NodeRef<'a>> {
        match self.node() {
            Node::Mapping(map) => map.get(key).map(|id| self.model.node_ref(*id)),
            Node::Sequence(_) => self.at(key.parse().ok()?),
            Node::Leaf(_) => None,
        }
    }

    /// Sequence element; `None` for holes, out-of-range indices and
    /// non-sequences.
    pub fn at(&self, index: usize) -> Option<NodeRef<'a>> {
        match self.node() {
            Node::Sequence(items) => items
                .get(index)
                .copied()
                .flatten()
                .map(|id| self.model.node_ref(id)),
            _ => None,
        }
    }

    pub fn elements(&self) -> Elements<'a> {
        let items: &'a [Option<NodeId>] = match self.node() {
            Node::Sequence(items) => items.as_slice(),
            _ => &[],
        };
        Elements {
            model: self.model,
            items: items.iter(),
        }
    }

    pub fn entries(&self) -> Entries<'a> {
        let map = match self.node() {
            Node::Mapping(map) => Some(map.iter()),
            _ => None,
        };
        Entries {
            model: self.model,
            map,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self.node() {
            Node::Sequence(_) => serde_json::Value::Array(
                self.elements()
                    .map(|element| element.map_or(serde_json::Value::Null, |node| node.to_json()))
                    .collect(),
            ),
            Node::Mapping(_) => serde_json::Value::Object(
                self.entries()
                    .map(|(key, node)| (key.to_string(), node.to_json()))
                    .collect(),
            ),
            Node::Leaf(value) => value.to_json(),
        }
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self.node(), other.node()) {
            (Node::Leaf(a), Node::Leaf(b)) => a == b,
            (Node::Sequence(a), Node::Sequence(b)) => {
                a.len() == b.len()
                    && self
                        .elements()
                        .zip(other.elements())
                        .all(|(left, right)| left == right)
            }
            (Node::Mapping(a), Node::Mapping(b)) => {
                a.len() == b.len()
                    && self
                        .entries()
                        .zip(other.entries())
                        .all(|((ka, va), (kb, vb))| ka == kb && va == vb)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Serialize for NodeRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.node() {
            Node::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for element in self.elements() {
                    seq.serialize_element(&element)?;
                }
                seq.end()
            }
            Node::Mapping(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, node) in self.entries() {
                    out.serialize_entry(key, &node)?;
                }
                out.end()
            }
            Node::Leaf(value) => value.serialize(serializer),
        }
    }
}

pub struct Elements<'a> {
    model: &'a Model,
    items: std::slice::Iter<'a, Option<NodeId>>,
}

impl<'a> Iterator for Elements<'a> {
    type Item = Option<NodeRef<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.items.next()?;
        Some(slot.map(|id| self.model.node_ref(id)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

pub struct Entries<'a> {
    model: &'a Model,
    map: Option<indexmap::map::Iter<'a, SmolStr, NodeId>>,
}

impl<'a> Iterator for Entries<'a> {
    type Item = (&'a str, NodeRef<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, id) = self.map.as_mut()?.next()?;
        Some((key.as_str(), self.model.node_ref(*id)))
    }
}

fn json_type_name(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
