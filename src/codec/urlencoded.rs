//! `application/x-www-form-urlencoded` pair streams.

use url::form_urlencoded;

use crate::arena::Model;
use crate::build::{build, Pair};
use crate::num::number::parse_number;
use crate::types::Value;
use crate::walk::walk;
use crate::UrlDecodeOptions;

/// Encode pairs as `k1=v1&k2=v2`; spaces become `+`.
pub fn encode_pairs<K, I>(pairs: I) -> String
where
    K: AsRef<str>,
    I: IntoIterator<Item = (K, Value)>,
{
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key.as_ref(), &value.to_text());
    }
    serializer.finish()
}

/// Walk `model` and encode every emitted pair.
pub fn to_urlencoded(model: &Model) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    walk(model, |key, value| {
        serializer.append_pair(key, &value.to_text());
    });
    serializer.finish()
}

/// Split and percent-decode `input`. A leading `?` is ignored.
pub fn decode_pairs(input: &str, coerce: bool) -> Vec<Pair> {
    let input = input.strip_prefix('?').unwrap_or(input);
    form_urlencoded::parse(input.as_bytes())
        .map(|(key, value)| Pair {
            key: Some(key.into_owned()),
            value: if coerce {
                coerce_text(&value)
            } else {
                Some(Value::String(value.into_owned()))
            },
            structured: false,
        })
        .collect()
}

pub fn from_urlencoded(input: &str, options: &UrlDecodeOptions) -> Model {
    build(decode_pairs(input, options.coerce), &options.build)
}

/// Typed view of a decoded text value. `undefined` maps to the absent
/// sentinel so the pair is skipped.
pub fn coerce_text(text: &str) -> Option<Value> {
    match text {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "null" => Some(Value::Null),
        "undefined" => None,
        _ => Some(parse_number(text).map_or_else(|| Value::from(text), Value::Number)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn test_encode_escapes_keys_and_values() {
        let encoded = encode_pairs([("a[b]", Value::from("x y&z")), ("n", Value::from(1))]);
        assert_eq!(encoded, "a%5Bb%5D=x+y%26z&n=1");
    }

    #[rstest]
    fn test_model_encodes_in_walk_order() {
        let model = Model::from_json(&json!({"user": {"name": "ada", "tags": ["a", "b"]}, "ok": true}))
            .unwrap();
        assert_eq!(
            to_urlencoded(&model),
            "user%5Bname%5D=ada&user%5Btags%5D%5B%5D=a&user%5Btags%5D%5B%5D=b&ok=true"
        );
    }

    #[rstest]
    fn test_null_encodes_as_empty() {
        assert_eq!(encode_pairs([("a", Value::Null)]), "a=");
    }

    #[rstest]
    fn test_decode_plain() {
        let pairs = decode_pairs("?a=1&b=hello+world&c=%26", false);
        assert_eq!(
            pairs,
            vec![
                Pair::new("a", "1"),
                Pair::new("b", "hello world"),
                Pair::new("c", "&"),
            ]
        );
    }

    #[rstest]
    #[case("true", Some(Value::Bool(true)))]
    #[case("false", Some(Value::Bool(false)))]
    #[case("null", Some(Value::Null))]
    #[case("undefined", None)]
    #[case("42", Some(Value::from(42)))]
    #[case("-1.5", Some(Value::from(-1.5)))]
    #[case("007", Some(Value::from(7)))]
    #[case("1e3", Some(Value::from(1000)))]
    #[case("12abc", Some(Value::from("12abc")))]
    #[case("", Some(Value::from("")))]
    #[case("True", Some(Value::from("True")))]
    fn test_coerce_text(#[case] text: &str, #[case] expected: Option<Value>) {
        assert_eq!(coerce_text(text), expected);
    }

    #[rstest]
    fn test_from_urlencoded_builds_model() {
        let options = UrlDecodeOptions::default().with_coerce(true);
        let model = from_urlencoded(
            "user[name]=ada&user[age]=36&tags[]=a&tags[]=b&gone=undefined",
            &options,
        );
        assert_eq!(
            model.to_json(),
            json!({"user": {"name": "ada", "age": 36}, "tags": ["a", "b"]})
        );
    }

    #[rstest]
    fn test_round_trip_through_text() {
        let source = Model::from_json(&json!({"a": {"b": [1, 2]}, "c": [{"d": "x y"}]})).unwrap();
        let options = UrlDecodeOptions::default().with_coerce(true);
        let decoded = from_urlencoded(&to_urlencoded(&source), &options);
        assert_eq!(decoded, source);
    }
}
