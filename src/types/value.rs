use std::{fmt, sync::Arc};

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Number;

use crate::num::number::{format_number, number_from_f64};

struct FilePayload {
    name: Option<String>,
    content_type: Option<String>,
    bytes: Arc<[u8]>,
}

/// Opaque handle to one uploaded file.
///
/// Cloning shares the payload; two handles are equal only when they point at
/// the same payload.
#[derive(Clone)]
pub struct FileHandle {
    inner: Arc<FilePayload>,
}

impl FileHandle {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            inner: Arc::new(FilePayload {
                name: None,
                content_type: None,
                bytes: bytes.into(),
            }),
        }
    }

    pub fn named(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            inner: Arc::new(FilePayload {
                name: Some(name.into()),
                content_type: None,
                bytes: bytes.into(),
            }),
        }
    }

    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        let payload = FilePayload {
            name: self.inner.name.clone(),
            content_type: Some(content_type.into()),
            bytes: Arc::clone(&self.inner.bytes),
        };
        Self {
            inner: Arc::new(payload),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.inner.content_type.as_deref()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.inner.bytes
    }

    pub fn len(&self) -> usize {
        self.inner.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.bytes.is_empty()
    }

    pub fn same_file(&self, other: &FileHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for FileHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_file(other)
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("name", &self.inner.name)
            .field("content_type", &self.inner.content_type)
            .field("len", &self.inner.bytes.len())
            .finish()
    }
}

impl Serialize for FileHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("name", &self.inner.name)?;
        map.serialize_entry("type", &self.inner.content_type)?;
        map.serialize_entry("size", &self.inner.bytes.len())?;
        map.end()
    }
}

/// Aggregate leaf holding several files that travel as one value.
#[derive(Clone, Debug, PartialEq)]
pub struct FileList {
    items: Arc<[FileHandle]>,
}

impl FileList {
    pub fn new(items: impl Into<Arc<[FileHandle]>>) -> Self {
        Self {
            items: items.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FileHandle> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileHandle> {
        self.items.iter()
    }
}

impl Default for FileList {
    fn default() -> Self {
        Self {
            items: Arc::from(Vec::new()),
        }
    }
}

impl FromIterator<FileHandle> for FileList {
    fn from_iter<I: IntoIterator<Item = FileHandle>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a FileList {
    type Item = &'a FileHandle;
    type IntoIter = std::slice::Iter<'a, FileHandle>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl Serialize for FileList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.items.iter())
    }
}

/// A leaf stored in the model.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    File(FileHandle),
    Files(FileList),
}

impl Value {
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub const fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// File lists are traversed item by item; every other leaf is atomic.
    pub const fn is_aggregate(&self) -> bool {
        matches!(self, Value::Files(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileHandle> {
        match self {
            Value::File(file) => Some(file),
            _ => None,
        }
    }

    pub fn as_files(&self) -> Option<&FileList> {
        match self {
            Value::Files(files) => Some(files),
            _ => None,
        }
    }

    /// Items of an aggregate leaf as individual values; empty for atomic
    /// leaves.
    pub fn aggregate_items(&self) -> impl Iterator<Item = Value> + '_ {
        self.as_files()
            .into_iter()
            .flatten()
            .map(|file| Value::File(file.clone()))
    }

    /// Loose truthiness: `null`, `false`, `0`, `NaN`, `""` and empty file
    /// lists are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
            Value::String(s) => !s.is_empty(),
            Value::File(_) => true,
            Value::Files(files) => !files.is_empty(),
        }
    }

    /// Text form used in flat key/value streams.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(n),
            Value::String(s) => s.clone(),
            Value::File(file) => file.name().unwrap_or_default().to_string(),
            Value::Files(files) => files
                .iter()
                .map(|file| file.name().unwrap_or_default())
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::File(file) => serde_json::to_value(file).unwrap_or_default(),
            Value::Files(files) => serde_json::to_value(files).unwrap_or_default(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::File(_) => "file",
            Value::Files(_) => "files",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            other => write!(f, "{}", other.to_text()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::File(file) => file.serialize(serializer),
            Value::Files(files) => files.serialize(serializer),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(Number::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(Number::from(value))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Number(Number::from(value))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(Number::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        number_from_f64(value).map_or(Value::Null, Value::Number)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<FileHandle> for Value {
    fn from(value: FileHandle) -> Self {
        Value::File(value)
    }
}

impl From<FileList> for Value {
    fn from(value: FileList) -> Self {
        Value::Files(value)
    }
}
