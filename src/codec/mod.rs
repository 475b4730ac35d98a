pub mod multipart;
pub mod structured;
pub mod urlencoded;

pub use multipart::{encode_multipart, MultipartBody, MultipartWriter};
pub use structured::{JsonText, StructuredText};
pub use urlencoded::{coerce_text, decode_pairs, encode_pairs, from_urlencoded, to_urlencoded};
