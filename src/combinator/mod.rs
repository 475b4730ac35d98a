//! Post-build coercion and validation over a finished [`Model`].
//!
//! Both facilities are driven by an ordered map from field key to
//! combinator. Field keys use the same bracket/dot notation as form keys, so
//! `address[city]` reaches into nested mappings.

pub mod expr;
mod typecast;
mod validate;

pub use typecast::{typecast, Transform, Typecast};
pub use validate::{validate, validate_with_prefix, Errors, FieldError, Rules, Validator};

use std::borrow::Cow;
use std::cell::OnceCell;

use crate::arena::{Model, NodeRef};

/// Context handed to every combinator call.
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    /// Field key as declared in the combinator map.
    pub key: &'a str,
    /// Field key with the validation prefix applied.
    pub model_key: &'a str,
    pub model: &'a Model,
    /// Element position for element-wise combinators.
    pub index: Option<usize>,
    /// The sequence being iterated for element-wise combinators.
    pub sequence: Option<NodeRef<'a>>,
    /// JSON view of `model`, filled on first use and shared by every field
    /// of one validation pass.
    pub model_json: Option<&'a OnceCell<serde_json::Value>>,
}

impl<'a> Scope<'a> {
    pub fn new(key: &'a str, model: &'a Model) -> Self {
        Self {
            key,
            model_key: key,
            model,
            index: None,
            sequence: None,
            model_json: None,
        }
    }

    pub fn with_model_key(mut self, model_key: &'a str) -> Self {
        self.model_key = model_key;
        self
    }

    pub fn with_element(mut self, index: usize, sequence: NodeRef<'a>) -> Self {
        self.index = Some(index);
        self.sequence = Some(sequence);
        self
    }

    pub fn with_model_json(mut self, cache: &'a OnceCell<serde_json::Value>) -> Self {
        self.model_json = Some(cache);
        self
    }

    /// The model as JSON. Without a cache every call converts it anew.
    pub fn model_json(&self) -> Cow<'a, serde_json::Value> {
        match self.model_json {
            Some(cache) => Cow::Borrowed(cache.get_or_init(|| self.model.to_json())),
            None => Cow::Owned(self.model.to_json()),
        }
    }
}
