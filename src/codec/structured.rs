use crate::{Error, Result};

/// Codec for leaf values that travel as structured text inside a single
/// form field.
pub trait StructuredText {
    fn encode(&self, value: &serde_json::Value) -> Result<String>;

    /// Decode `text`; empty text must decode to `null`.
    fn decode(&self, text: &str) -> Result<serde_json::Value>;
}

/// JSON structured-text codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonText;

impl StructuredText for JsonText {
    fn encode(&self, value: &serde_json::Value) -> Result<String> {
        serde_json::to_string(value)
            .map_err(|err| Error::structured_text(format!("encode failed: {err}")))
    }

    fn decode(&self, text: &str) -> Result<serde_json::Value> {
        if text.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(text)
            .map_err(|err| Error::structured_text(format!("decode failed: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn test_empty_text_decodes_to_null() {
        assert_eq!(JsonText.decode("").unwrap(), json!(null));
    }

    #[rstest]
    fn test_decode_object() {
        assert_eq!(
            JsonText.decode(r#"{"a":[1,2]}"#).unwrap(),
            json!({"a": [1, 2]})
        );
    }

    #[rstest]
    fn test_decode_failure_is_structured_text_error() {
        let err = JsonText.decode("{nope").unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::StructuredText);
    }

    #[rstest]
    fn test_encode_round_trips() {
        let value = json!({"k": "v", "n": 1.5});
        let text = JsonText.encode(&value).unwrap();
        assert_eq!(JsonText.decode(&text).unwrap(), value);
    }
}
