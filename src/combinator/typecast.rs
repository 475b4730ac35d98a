use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use super::Scope;
use crate::arena::{Model, Node, NodeId, Slot};
use crate::build;
use crate::constants::is_true_word;
use crate::num::number::{leading_float, leading_int, number_from_f64, parse_number};
use crate::path;
use crate::types::Value;
use crate::BuildOptions;

type TransformFn = dyn Fn(Option<Value>, &Scope<'_>) -> Option<Value> + Send + Sync;

/// A value transform. The input is `None` when the field is absent; an output
/// of `None` leaves the field untouched.
#[derive(Clone)]
pub struct Transform(Arc<TransformFn>);

impl Transform {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(Option<Value>, &Scope<'_>) -> Option<Value> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn apply(&self, value: Option<Value>, scope: &Scope<'_>) -> Option<Value> {
        (self.0)(value, scope)
    }

    /// Substitute `fallback` for an absent or null value.
    pub fn default_value(fallback: impl Into<Value>) -> Self {
        let fallback = fallback.into();
        Self::custom(move |value, _| match value {
            None | Some(Value::Null) => Some(fallback.clone()),
            other => other,
        })
    }

    /// `true`, `on`, `yes` and `1` (any case) are true; other strings are
    /// false; everything else follows truthiness.
    pub fn boolean() -> Self {
        Self::custom(|value, _| {
            Some(Value::Bool(match value {
                Some(Value::String(text)) => is_true_word(text.trim()),
                Some(other) => other.is_truthy(),
                None => false,
            }))
        })
    }

    /// Integer prefix of the value's text, `0` when there is none.
    pub fn int() -> Self {
        Self::custom(|value, _| {
            let int = match &value {
                Some(Value::Number(n)) if n.is_f64() => {
                    n.as_f64().map(f64::trunc).and_then(number_from_f64)
                }
                Some(Value::Number(n)) => Some(n.clone()),
                Some(other) => leading_int(&other.to_text()),
                None => None,
            };
            Some(int.map_or(Value::from(0), Value::Number))
        })
    }

    /// Float prefix of the value's text, `0` when there is none.
    pub fn float() -> Self {
        Self::custom(|value, _| {
            let float = match &value {
                Some(Value::Number(n)) => n.as_f64(),
                Some(other) => leading_float(&other.to_text()),
                None => None,
            };
            Some(float.and_then(number_from_f64).map_or(Value::from(0), Value::Number))
        })
    }

    pub fn string() -> Self {
        Self::custom(|value, _| Some(Value::String(value.map(|v| v.to_text()).unwrap_or_default())))
    }

    /// Raise numeric values below `min` to `min`.
    pub fn min(min: f64) -> Self {
        Self::custom(move |value, _| match value.as_ref().and_then(numeric) {
            Some(n) if n < min => Some(Value::from(min)),
            _ => value,
        })
    }

    /// Lower numeric values above `max` to `max`.
    pub fn max(max: f64) -> Self {
        Self::custom(move |value, _| match value.as_ref().and_then(numeric) {
            Some(n) if n > max => Some(Value::from(max)),
            _ => value,
        })
    }

    pub fn clamp(min: f64, max: f64) -> Self {
        Self::composite([Self::max(max), Self::min(min)])
    }

    /// Chain transforms right to left: the last one runs first.
    pub fn composite(transforms: impl IntoIterator<Item = Transform>) -> Self {
        let chain: Vec<Transform> = transforms.into_iter().collect();
        Self::custom(move |value, scope| {
            chain
                .iter()
                .rev()
                .fold(value, |acc, transform| transform.apply(acc, scope))
        })
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(text) => parse_number(text.trim()).and_then(|n| n.as_f64()),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}

#[derive(Clone)]
enum Cast {
    Field(Transform),
    Each(Transform),
}

/// Ordered field-to-transform map.
#[derive(Clone, Default)]
pub struct Typecast {
    entries: IndexMap<String, Cast>,
}

impl Typecast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: impl Into<String>, transform: Transform) -> Self {
        self.entries.insert(key.into(), Cast::Field(transform));
        self
    }

    /// Apply `transform` to every element of the sequence at `key`.
    pub fn each(mut self, key: impl Into<String>, transform: Transform) -> Self {
        self.entries.insert(key.into(), Cast::Each(transform));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

enum Update {
    Replace(NodeId, Value),
    Fill(NodeId, usize, Value),
    Insert(Value),
}

/// Apply each transform in declaration order, rewriting the model in place.
pub fn typecast(model: &mut Model, casts: &Typecast) {
    for (key, cast) in &casts.entries {
        let path = path::parse(key);
        if path.is_empty() {
            continue;
        }
        let updates = plan(model, key, &path, cast);
        for update in updates {
            match update {
                Update::Replace(id, value) => model.replace_leaf(id, value),
                Update::Fill(sequence, index, value) => {
                    let id = model.alloc(Node::Leaf(value));
                    model.attach(sequence, Slot::Index(index), id);
                }
                Update::Insert(value) => {
                    build::insert(model, &path, value, &BuildOptions::default());
                }
            }
        }
    }
}

fn plan(model: &Model, key: &str, path: &path::Path, cast: &Cast) -> Vec<Update> {
    let scope = Scope::new(key, model);
    let node = model.get_path(path);
    match cast {
        Cast::Field(transform) => match node {
            None => transform
                .apply(None, &scope)
                .map(Update::Insert)
                .into_iter()
                .collect(),
            Some(node) => match node.as_value() {
                Some(value) => transform
                    .apply(Some(value.clone()), &scope)
                    .map(|value| Update::Replace(node.id(), value))
                    .into_iter()
                    .collect(),
                None => {
                    debug!(key, "typecast skips container field");
                    Vec::new()
                }
            },
        },
        Cast::Each(transform) => {
            let Some(sequence) = node.filter(|node| node.is_sequence()) else {
                debug!(key, "element-wise typecast needs a sequence");
                return Vec::new();
            };
            let mut updates = Vec::with_capacity(sequence.len());
            for (index, element) in sequence.elements().enumerate() {
                let scope = scope.with_element(index, sequence);
                match element {
                    None => {
                        if let Some(value) = transform.apply(None, &scope) {
                            updates.push(Update::Fill(sequence.id(), index, value));
                        }
                    }
                    Some(element) => {
                        let Some(current) = element.as_value() else {
                            continue;
                        };
                        if let Some(value) = transform.apply(Some(current.clone()), &scope) {
                            updates.push(Update::Replace(element.id(), value));
                        }
                    }
                }
            }
            updates
        }
    }
}
