pub mod arena;
pub mod build;
pub mod codec;
pub mod combinator;
pub mod constants;
pub mod error;
pub mod field;
pub mod num;
pub mod options;
pub mod path;
pub mod text;
pub mod types;
pub mod walk;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use crate::arena::{Model, Node, NodeId, NodeKind, NodeRef};
pub use crate::build::{build, insert, ModelBuilder, Outcome, Pair, Payload, SkipReason};
pub use crate::codec::{
    decode_pairs, encode_multipart, encode_pairs, from_urlencoded, to_urlencoded, JsonText,
    MultipartBody, StructuredText,
};
pub use crate::combinator::{
    typecast, validate, validate_with_prefix, Errors, FieldError, Rules, Scope, Transform,
    Typecast, Validator,
};
pub use crate::error::{Error, ErrorKind, ErrorStage, Location};
pub use crate::field::{FieldOptions, FormControl, KeyExtractor, ValueExtractor};
pub use crate::options::{BuildOptions, MultipartOptions, UrlDecodeOptions};
pub use crate::path::{parse as parse_path, Path, Segment, SegmentKind};
pub use crate::types::{FileHandle, FileList, Value};
pub use crate::walk::{pairs, walk, walk_json};

pub type Result<T> = std::result::Result<T, Error>;

/// Deserialize `T` from an urlencoded query, coercing numeric and literal
/// values.
pub fn from_str<T: DeserializeOwned>(input: &str) -> Result<T> {
    from_str_with_options(input, &UrlDecodeOptions::default().with_coerce(true))
}

pub fn from_str_with_options<T: DeserializeOwned>(
    input: &str,
    options: &UrlDecodeOptions,
) -> Result<T> {
    from_model(&from_urlencoded(input, options))
}

pub fn from_model<T: DeserializeOwned>(model: &Model) -> Result<T> {
    serde_json::from_value(model.to_json()).map_err(|err| Error::deserialize(err.to_string()))
}

/// Serialize `value` into a model. `value` must serialize to a map.
pub fn to_model<T: Serialize>(value: &T) -> Result<Model> {
    let json = serde_json::to_value(value).map_err(|err| Error::serialize(err.to_string()))?;
    Model::from_json(&json).map_err(|err| err.with_stage(ErrorStage::Walk))
}

/// Serialize `value` as an urlencoded query.
pub fn to_string<T: Serialize>(value: &T) -> Result<String> {
    Ok(to_urlencoded(&to_model(value)?))
}
