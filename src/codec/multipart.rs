//! `multipart/form-data` encoding of a walked model.

use std::fmt;

use tracing::trace;
use uuid::Uuid;

use crate::arena::Model;
use crate::constants::MULTIPART_BOUNDARY_PREFIX;
use crate::text::string::escape_disposition_into;
use crate::types::{FileHandle, Value};
use crate::walk::walk;
use crate::MultipartOptions;

const CRLF: &[u8] = b"\r\n";
const DEFAULT_FILE_NAME: &str = "blob";
const DEFAULT_FILE_TYPE: &str = "application/octet-stream";

/// An encoded multipart payload and the boundary it was framed with.
#[derive(Clone, PartialEq, Eq)]
pub struct MultipartBody {
    boundary: String,
    bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }
}

impl fmt::Debug for MultipartBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipartBody")
            .field("boundary", &self.boundary)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Writes parts one at a time; call [`MultipartWriter::finish`] to close.
pub struct MultipartWriter {
    boundary: String,
    bytes: Vec<u8>,
    header: String,
}

impl MultipartWriter {
    pub fn new(options: &MultipartOptions) -> Self {
        let boundary = options.boundary.clone().unwrap_or_else(|| {
            format!("{MULTIPART_BOUNDARY_PREFIX}{}", Uuid::new_v4().simple())
        });
        Self {
            boundary,
            bytes: Vec::new(),
            header: String::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Append one part: files become file parts, anything else a text part.
    pub fn push(&mut self, name: &str, value: &Value) {
        if value.is_aggregate() {
            for item in value.aggregate_items() {
                self.push(name, &item);
            }
            return;
        }
        match value {
            Value::File(file) => self.push_file(name, file),
            other => self.push_text(name, &other.to_text()),
        }
    }

    pub fn push_text(&mut self, name: &str, text: &str) {
        self.start_part(name, None);
        self.bytes.extend_from_slice(text.as_bytes());
        self.bytes.extend_from_slice(CRLF);
    }

    pub fn push_file(&mut self, name: &str, file: &FileHandle) {
        trace!(name, size = file.len(), "multipart file part");
        self.start_part(name, Some(file));
        self.bytes.extend_from_slice(file.bytes());
        self.bytes.extend_from_slice(CRLF);
    }

    pub fn finish(mut self) -> MultipartBody {
        self.bytes.extend_from_slice(b"--");
        self.bytes.extend_from_slice(self.boundary.as_bytes());
        self.bytes.extend_from_slice(b"--");
        self.bytes.extend_from_slice(CRLF);
        MultipartBody {
            boundary: self.boundary,
            bytes: self.bytes,
        }
    }

    fn start_part(&mut self, name: &str, file: Option<&FileHandle>) {
        let header = &mut self.header;
        header.clear();
        header.push_str("--");
        header.push_str(&self.boundary);
        header.push_str("\r\nContent-Disposition: form-data; name=\"");
        escape_disposition_into(header, name);
        header.push('"');
        if let Some(file) = file {
            header.push_str("; filename=\"");
            escape_disposition_into(header, file.name().unwrap_or(DEFAULT_FILE_NAME));
            header.push_str("\"\r\nContent-Type: ");
            header.push_str(file.content_type().unwrap_or(DEFAULT_FILE_TYPE));
        }
        header.push_str("\r\n\r\n");
        self.bytes.extend_from_slice(header.as_bytes());
    }
}

/// Walk `model` and encode every emitted pair as a part.
pub fn encode_multipart(model: &Model, options: &MultipartOptions) -> MultipartBody {
    let mut writer = MultipartWriter::new(options);
    walk(model, |key, value| writer.push(key, value));
    writer.finish()
}
