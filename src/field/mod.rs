//! Pair extraction from snapshots of HTML form controls.
//!
//! A [`FormControl`] captures what a browser exposes for one input element:
//! its type, attributes, current value, checked state, selected index and
//! chosen files. [`collect_pairs`] turns a list of controls into the flat
//! pair stream the builder consumes.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::debug;

use crate::arena::Model;
use crate::build::{ModelBuilder, Pair};
use crate::constants::{DEFAULT_JSON_ATTRIBUTE, DEFAULT_KEY_ATTRIBUTE, DEFAULT_VALUE_ATTRIBUTE};
use crate::text::string::is_blank;
use crate::types::{FileList, Value};
use crate::BuildOptions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlKind {
    Text,
    Textarea,
    Checkbox,
    Radio,
    Select,
    File,
    Hidden,
    /// Any other `type` attribute or tag name, lowercased.
    Other(SmolStr),
}

impl ControlKind {
    /// Kind from an input `type` attribute or a tag name.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "text" => ControlKind::Text,
            "textarea" => ControlKind::Textarea,
            "checkbox" => ControlKind::Checkbox,
            "radio" => ControlKind::Radio,
            "select" | "select-one" | "select-multiple" => ControlKind::Select,
            "file" => ControlKind::File,
            "hidden" => ControlKind::Hidden,
            other => ControlKind::Other(SmolStr::new(other)),
        }
    }

    fn is_checkable(&self) -> bool {
        matches!(self, ControlKind::Checkbox | ControlKind::Radio)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormControl {
    kind: ControlKind,
    attributes: IndexMap<SmolStr, String>,
    value: Option<String>,
    checked: bool,
    selected_index: Option<usize>,
    files: Option<FileList>,
}

impl FormControl {
    pub fn new(kind: ControlKind) -> Self {
        Self {
            kind,
            attributes: IndexMap::new(),
            value: None,
            checked: false,
            selected_index: None,
            files: None,
        }
    }

    pub fn text(name: &str, value: &str) -> Self {
        Self::new(ControlKind::Text)
            .with_attribute("name", name)
            .with_value(value)
    }

    pub fn checkbox(name: &str, value: &str, checked: bool) -> Self {
        Self::new(ControlKind::Checkbox)
            .with_attribute("name", name)
            .with_attribute("value", value)
            .with_checked(checked)
    }

    pub fn select(name: &str, selected: Option<(usize, &str)>) -> Self {
        let control = Self::new(ControlKind::Select).with_attribute("name", name);
        match selected {
            Some((index, value)) => control.with_selected_index(index).with_value(value),
            None => control,
        }
    }

    pub fn file(name: &str, files: FileList) -> Self {
        Self::new(ControlKind::File)
            .with_attribute("name", name)
            .with_files(files)
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(SmolStr::new(name), value.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn with_selected_index(mut self, index: usize) -> Self {
        self.selected_index = Some(index);
        self
    }

    pub fn with_files(mut self, files: FileList) -> Self {
        self.files = Some(files);
        self
    }

    pub fn kind(&self) -> &ControlKind {
        &self.kind
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected_index
    }

    pub fn files(&self) -> Option<&FileList> {
        self.files.as_ref()
    }

    /// The live value: the explicit value, else the `value` attribute, else
    /// `on` for checkboxes and radios.
    pub fn current_value(&self) -> &str {
        self.value
            .as_deref()
            .or_else(|| self.attribute("value"))
            .unwrap_or(if self.kind.is_checkable() { "on" } else { "" })
    }
}

pub type KeyFn = dyn Fn(&FormControl) -> Option<String> + Send + Sync;
pub type ValueFn = dyn Fn(&FormControl) -> Option<Value> + Send + Sync;

/// Where a control's key comes from.
#[derive(Clone)]
pub enum KeyExtractor {
    Attribute(SmolStr),
    Custom(Arc<KeyFn>),
}

impl KeyExtractor {
    pub fn attribute(name: &str) -> Self {
        KeyExtractor::Attribute(SmolStr::new(name))
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&FormControl) -> Option<String> + Send + Sync + 'static,
    {
        KeyExtractor::Custom(Arc::new(f))
    }

    pub fn resolve(&self) -> Arc<KeyFn> {
        match self {
            KeyExtractor::Custom(f) => Arc::clone(f),
            KeyExtractor::Attribute(name) => {
                let name = name.clone();
                Arc::new(move |control: &FormControl| control.attribute(&name).map(str::to_string))
            }
        }
    }
}

impl Default for KeyExtractor {
    fn default() -> Self {
        KeyExtractor::attribute(DEFAULT_KEY_ATTRIBUTE)
    }
}

impl fmt::Debug for KeyExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyExtractor::Attribute(name) => f.debug_tuple("Attribute").field(name).finish(),
            KeyExtractor::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Where a control's value comes from.
///
/// The `value` attribute name reads the live value. In strict mode an
/// unchecked checkbox or radio, a select without selection and a blank text
/// field or textarea produce no value; otherwise only the unchecked
/// checkbox or radio is dropped.
#[derive(Clone)]
pub enum ValueExtractor {
    Attribute { name: SmolStr, strict: bool },
    Custom(Arc<ValueFn>),
}

impl ValueExtractor {
    pub fn attribute(name: &str, strict: bool) -> Self {
        ValueExtractor::Attribute {
            name: SmolStr::new(name),
            strict,
        }
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&FormControl) -> Option<Value> + Send + Sync + 'static,
    {
        ValueExtractor::Custom(Arc::new(f))
    }

    pub fn resolve(&self) -> Arc<ValueFn> {
        match self {
            ValueExtractor::Custom(f) => Arc::clone(f),
            ValueExtractor::Attribute { name, strict } => {
                let name = name.clone();
                let strict = *strict;
                Arc::new(move |control: &FormControl| read_value(control, &name, strict))
            }
        }
    }
}

impl Default for ValueExtractor {
    fn default() -> Self {
        ValueExtractor::attribute(DEFAULT_VALUE_ATTRIBUTE, true)
    }
}

impl fmt::Debug for ValueExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueExtractor::Attribute { name, strict } => f
                .debug_struct("Attribute")
                .field("name", name)
                .field("strict", strict)
                .finish(),
            ValueExtractor::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn read_value(control: &FormControl, name: &str, strict: bool) -> Option<Value> {
    let live = name == DEFAULT_VALUE_ATTRIBUTE;
    if live && control.kind == ControlKind::File {
        if let Some(files) = &control.files {
            return Some(Value::Files(files.clone()));
        }
    }
    let text = if live {
        control.current_value()
    } else {
        control.attribute(name).unwrap_or_default()
    };

    if control.kind.is_checkable() && !control.checked {
        return None;
    }
    if strict {
        let skip = match control.kind {
            ControlKind::Select => control.selected_index.is_none(),
            ControlKind::Text | ControlKind::Textarea => is_blank(text),
            _ => false,
        };
        if skip {
            return None;
        }
    }
    Some(Value::String(text.to_string()))
}

#[derive(Debug, Clone)]
pub struct FieldOptions {
    pub key: KeyExtractor,
    pub value: ValueExtractor,
    /// Attribute marking a control whose value is structured text.
    pub json_attribute: Option<SmolStr>,
    /// Leading key component to remove, e.g. `user` turns `user[name]` into
    /// `name`.
    pub prefix: Option<SmolStr>,
}

impl FieldOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: KeyExtractor) -> Self {
        self.key = key;
        self
    }

    pub fn with_value(mut self, value: ValueExtractor) -> Self {
        self.value = value;
        self
    }

    pub fn with_json_attribute(mut self, attribute: Option<&str>) -> Self {
        self.json_attribute = attribute.map(SmolStr::new);
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(SmolStr::new(prefix));
        self
    }
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self {
            key: KeyExtractor::default(),
            value: ValueExtractor::default(),
            json_attribute: Some(SmolStr::new(DEFAULT_JSON_ATTRIBUTE)),
            prefix: None,
        }
    }
}

/// Remove `prefix` when it is followed by `.` or `[`; other keys are kept.
pub fn strip_prefix<'k>(key: &'k str, prefix: &str) -> &'k str {
    match key.strip_prefix(prefix) {
        Some(rest) if rest.starts_with('.') || rest.starts_with('[') => rest,
        _ => key,
    }
}

/// One pair per control. Controls without key or value yield pairs the
/// builder skips.
pub fn collect_pairs<'c, I>(controls: I, options: &FieldOptions) -> Vec<Pair>
where
    I: IntoIterator<Item = &'c FormControl>,
{
    let key_of = options.key.resolve();
    let value_of = options.value.resolve();
    controls
        .into_iter()
        .map(|control| {
            let key = key_of(control).map(|key| match &options.prefix {
                Some(prefix) => strip_prefix(&key, prefix).to_string(),
                None => key,
            });
            let value = value_of(control);
            if value.is_none() {
                debug!(key = key.as_deref().unwrap_or_default(), "control has no value");
            }
            let structured = options
                .json_attribute
                .as_deref()
                .and_then(|attribute| control.attribute(attribute))
                .is_some_and(|flag| !flag.is_empty());
            Pair {
                key,
                value,
                structured,
            }
        })
        .collect()
}

/// Extract pairs from `controls` and insert them into `model`. Returns how
/// many pairs were inserted.
pub fn to_model<'c, I>(
    controls: I,
    model: &mut Model,
    options: &FieldOptions,
    build: &BuildOptions,
) -> usize
where
    I: IntoIterator<Item = &'c FormControl>,
{
    ModelBuilder::new(model)
        .with_options(*build)
        .extend(collect_pairs(controls, options))
}
