use std::borrow::Cow;
use std::cell::OnceCell;
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use super::expr::{Expression, Resolve, Symbol};
use super::Scope;
use crate::arena::{Model, Node, NodeRef};
use crate::num::number::parse_number;
use crate::types::Value;
use crate::{Error, Result};

type ValidatorFn = dyn Fn(Option<NodeRef<'_>>, &Scope<'_>) -> bool + Send + Sync;

/// A predicate over a field. The node is `None` when the field (or the
/// sequence element) is absent.
#[derive(Clone)]
pub struct Validator(Arc<ValidatorFn>);

impl Validator {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(Option<NodeRef<'_>>, &Scope<'_>) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn check(&self, node: Option<NodeRef<'_>>, scope: &Scope<'_>) -> bool {
        (self.0)(node, scope)
    }

    pub fn pass() -> Self {
        Self::custom(|_, _| true)
    }

    pub fn fail() -> Self {
        Self::custom(|_, _| false)
    }

    pub fn not(inner: Validator) -> Self {
        Self::custom(move |node, scope| !inner.check(node, scope))
    }

    /// All validators must pass; stops at the first failure.
    pub fn and(validators: impl IntoIterator<Item = Validator>) -> Self {
        let all: Vec<Validator> = validators.into_iter().collect();
        Self::custom(move |node, scope| all.iter().all(|v| v.check(node, scope)))
    }

    /// At least one validator must pass; stops at the first success.
    pub fn either(validators: impl IntoIterator<Item = Validator>) -> Self {
        let any: Vec<Validator> = validators.into_iter().collect();
        Self::custom(move |node, scope| any.iter().any(|v| v.check(node, scope)))
    }

    pub fn iif(condition: Validator, then: Validator, otherwise: Validator) -> Self {
        Self::custom(move |node, scope| {
            if condition.check(node, scope) {
                then.check(node, scope)
            } else {
                otherwise.check(node, scope)
            }
        })
    }

    /// Non-empty strings, sequences and file lists; any non-null value
    /// otherwise.
    pub fn required() -> Self {
        Self::custom(|node, _| {
            let Some(node) = node else {
                return false;
            };
            match node.node() {
                Node::Sequence(items) => !items.is_empty(),
                Node::Mapping(_) => true,
                Node::Leaf(Value::Null) => false,
                Node::Leaf(Value::String(text)) => !text.is_empty(),
                Node::Leaf(Value::Files(files)) => !files.is_empty(),
                Node::Leaf(_) => true,
            }
        })
    }

    /// Compare another field of the model against `expected`. Strict
    /// comparison needs the same value type; loose comparison compares text.
    pub fn is(field: impl Into<String>, expected: impl Into<Value>, strict: bool) -> Self {
        let field = field.into();
        let expected = expected.into();
        Self::custom(move |_, scope| {
            let Some(actual) = scope.model.get(&field).and_then(|node| node.as_value()) else {
                return false;
            };
            if strict {
                match (actual, &expected) {
                    (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
                    _ => actual == &expected,
                }
            } else {
                actual.to_text() == expected.to_text()
            }
        })
    }

    /// Numeric range check; `strict` excludes both bounds.
    pub fn between(min: f64, max: f64, strict: bool) -> Self {
        Self::custom(move |node, _| {
            let Some(n) = node.and_then(|node| node.as_value()).and_then(numeric) else {
                return false;
            };
            if strict {
                min < n && n < max
            } else {
                min <= n && n <= max
            }
        })
    }

    pub fn matches(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)?;
        Ok(Self::custom(move |node, _| {
            node.and_then(|node| node.as_value())
                .is_some_and(|value| regex.is_match(&value.to_text()))
        }))
    }

    /// Compile `source` with the symbols `value`, `key`, `model`, `index` and
    /// `model_key` in scope.
    pub fn expression(source: &str) -> Result<Self> {
        let expression = Expression::compile(source)?;
        Ok(Self::custom(move |node, scope| {
            expression.test(&ScopeSymbols { node, scope })
        }))
    }
}

impl Not for Validator {
    type Output = Validator;

    fn not(self) -> Validator {
        Validator::not(self)
    }
}

impl BitAnd for Validator {
    type Output = Validator;

    fn bitand(self, rhs: Validator) -> Validator {
        Validator::and([self, rhs])
    }
}

impl BitOr for Validator {
    type Output = Validator;

    fn bitor(self, rhs: Validator) -> Validator {
        Validator::either([self, rhs])
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(text) => parse_number(text.trim()).and_then(|n| n.as_f64()),
        _ => None,
    }
}

struct ScopeSymbols<'s, 'a> {
    node: Option<NodeRef<'a>>,
    scope: &'s Scope<'a>,
}

impl Resolve for ScopeSymbols<'_, '_> {
    fn resolve(&self, symbol: Symbol) -> Cow<'_, serde_json::Value> {
        match symbol {
            Symbol::Value => Cow::Owned(
                self.node
                    .map_or(serde_json::Value::Null, |node| node.to_json()),
            ),
            Symbol::Key => Cow::Owned(serde_json::Value::String(self.scope.key.to_string())),
            Symbol::Model => self.scope.model_json(),
            Symbol::Index => Cow::Owned(
                self.scope
                    .index
                    .map_or(serde_json::Value::Null, serde_json::Value::from),
            ),
            Symbol::ModelKey => {
                Cow::Owned(serde_json::Value::String(self.scope.model_key.to_string()))
            }
        }
    }
}

#[derive(Clone)]
struct Rule {
    validator: Validator,
    message: String,
    each: bool,
}

/// Ordered field-to-validator map with the error message for each field.
#[derive(Clone, Default)]
pub struct Rules {
    entries: IndexMap<String, Rule>,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(
        mut self,
        key: impl Into<String>,
        validator: Validator,
        message: impl Into<String>,
    ) -> Self {
        self.entries.insert(
            key.into(),
            Rule {
                validator,
                message: message.into(),
                each: false,
            },
        );
        self
    }

    /// Check every element of the sequence at `key`. A missing or
    /// non-sequence field fails as a whole.
    pub fn each(
        mut self,
        key: impl Into<String>,
        validator: Validator,
        message: impl Into<String>,
    ) -> Self {
        self.entries.insert(
            key.into(),
            Rule {
                validator,
                message: message.into(),
                each: true,
            },
        );
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldError {
    Message(String),
    /// One slot per sequence element; `None` where the element passed.
    Elements(Vec<Option<String>>),
}

pub type Errors = IndexMap<String, FieldError>;

/// Run every rule against `model`, recording failures in `errors`. Returns
/// whether all rules passed.
pub fn validate(model: &Model, rules: &Rules, errors: &mut Errors) -> bool {
    validate_with_prefix(model, rules, errors, "")
}

/// Like [`validate`], with `prefix` prepended to every recorded error key.
pub fn validate_with_prefix(
    model: &Model,
    rules: &Rules,
    errors: &mut Errors,
    prefix: &str,
) -> bool {
    let model_json = OnceCell::new();
    let mut valid = true;
    for (key, rule) in &rules.entries {
        let model_key = format!("{prefix}{key}");
        let scope = Scope::new(key, model)
            .with_model_key(&model_key)
            .with_model_json(&model_json);
        let node = model.get(key);

        let failure = if rule.each {
            check_each(node, rule, &scope)
        } else if rule.validator.check(node, &scope) {
            None
        } else {
            Some(FieldError::Message(rule.message.clone()))
        };

        if let Some(failure) = failure {
            debug!(field = model_key.as_str(), "validation failed");
            errors.insert(model_key, failure);
            valid = false;
        }
    }
    valid
}

fn check_each(node: Option<NodeRef<'_>>, rule: &Rule, scope: &Scope<'_>) -> Option<FieldError> {
    let Some(sequence) = node.filter(|node| node.is_sequence()) else {
        return Some(FieldError::Message(rule.message.clone()));
    };
    let mut failed = false;
    let elements: Vec<Option<String>> = sequence
        .elements()
        .enumerate()
        .map(|(index, element)| {
            let scope = scope.with_element(index, sequence);
            if rule.validator.check(element, &scope) {
                None
            } else {
                failed = true;
                Some(rule.message.clone())
            }
        })
        .collect();
    failed.then_some(FieldError::Elements(elements))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn model(json: serde_json::Value) -> Model {
        Model::from_json(&json).unwrap()
    }

    fn check(validator: &Validator, model: &Model, key: &str) -> bool {
        validator.check(model.get(key), &Scope::new(key, model))
    }

    fn check_with(validator: &Validator, scope: &Scope<'_>) -> bool {
        validator.check(scope.model.get(scope.key), scope)
    }

    #[rstest]
    fn test_between_reports_message() {
        let model = model(json!({"age": 15}));
        let rules = Rules::new().field("age", Validator::between(18.0, 65.0, false), "too young");
        let mut errors = Errors::new();
        assert!(!validate(&model, &rules, &mut errors));
        assert_eq!(errors.get("age"), Some(&FieldError::Message("too young".into())));
    }

    #[rstest]
    #[case(18, false, true)]
    #[case(18, true, false)]
    #[case(40, true, true)]
    fn test_between_bounds(#[case] age: i64, #[case] strict: bool, #[case] expected: bool) {
        let model = model(json!({"age": age}));
        assert_eq!(
            check(&Validator::between(18.0, 65.0, strict), &model, "age"),
            expected
        );
    }

    #[rstest]
    #[case(json!({"f": "x"}), true)]
    #[case(json!({"f": ""}), false)]
    #[case(json!({"f": []}), false)]
    #[case(json!({"f": [0]}), true)]
    #[case(json!({"f": {}}), true)]
    #[case(json!({"f": null}), false)]
    #[case(json!({"f": false}), true)]
    #[case(json!({}), false)]
    fn test_required(#[case] source: serde_json::Value, #[case] expected: bool) {
        assert_eq!(check(&Validator::required(), &model(source), "f"), expected);
    }

    #[rstest]
    fn test_is_compares_other_field() {
        let model = model(json!({"kind": "1", "count": 1}));
        assert!(check(&Validator::is("kind", 1, false), &model, "x"));
        assert!(!check(&Validator::is("kind", 1, true), &model, "x"));
        assert!(check(&Validator::is("count", 1.0, true), &model, "x"));
        assert!(!check(&Validator::is("missing", "", false), &model, "x"));
    }

    #[rstest]
    fn test_matches_and_bad_pattern() {
        let model = model(json!({"zip": "01234", "code": 77}));
        let digits = Validator::matches("^[0-9]{5}$").unwrap();
        assert!(check(&digits, &model, "zip"));
        assert!(!check(&digits, &model, "code"));
        assert!(!check(&digits, &model, "missing"));

        let err = Validator::matches("(").err().unwrap();
        assert_eq!(err.kind, crate::ErrorKind::Pattern);
    }

    #[rstest]
    fn test_composition_and_operators() {
        let model = model(json!({"n": 5}));
        let in_range = Validator::between(1.0, 10.0, false);
        assert!(check(&(in_range.clone() & Validator::required()), &model, "n"));
        assert!(check(&(Validator::fail() | in_range.clone()), &model, "n"));
        assert!(!check(&!in_range.clone(), &model, "n"));
        assert!(check(
            &Validator::iif(Validator::fail(), Validator::fail(), Validator::pass()),
            &model,
            "n"
        ));
        assert!(!check(&Validator::and([Validator::pass(), Validator::fail()]), &model, "n"));
        assert!(check(&Validator::either([Validator::fail(), Validator::pass()]), &model, "n"));
    }

    #[rstest]
    fn test_expression_sees_scope() {
        let model = model(json!({"password": "secret", "confirm": "secret"}));
        let same = Validator::expression("value == model.password && key == 'confirm'").unwrap();
        assert!(check(&same, &model, "confirm"));

        let err = Validator::expression("value ==").err().unwrap();
        assert_eq!(err.kind, crate::ErrorKind::Expression);
    }

    #[rstest]
    fn test_each_collects_element_errors() {
        let model = model(json!({"scores": [5, 50, 7]}));
        let rules = Rules::new().each("scores", Validator::between(0.0, 10.0, false), "out of range");
        let mut errors = Errors::new();
        assert!(!validate(&model, &rules, &mut errors));
        assert_eq!(
            errors.get("scores"),
            Some(&FieldError::Elements(vec![
                None,
                Some("out of range".into()),
                None
            ]))
        );
    }

    #[rstest]
    fn test_each_on_absent_field_fails() {
        let model = model(json!({}));
        let rules = Rules::new().each("scores", Validator::pass(), "missing");
        let mut errors = Errors::new();
        assert!(!validate(&model, &rules, &mut errors));
        assert_eq!(errors.get("scores"), Some(&FieldError::Message("missing".into())));
    }

    #[rstest]
    fn test_each_passes_index_to_expression() {
        let model = model(json!({"steps": [0, 1, 5]}));
        let rules = Rules::new().each("steps", Validator::expression("value == index").unwrap(), "order");
        let mut errors = Errors::new();
        assert!(!validate(&model, &rules, &mut errors));
        assert_eq!(
            errors.get("steps"),
            Some(&FieldError::Elements(vec![None, None, Some("order".into())]))
        );
    }

    #[rstest]
    fn test_each_reads_model_from_shared_json() {
        let model = model(json!({"limit": 3, "items": [1, 4, 2, 9]}));
        let rules = Rules::new()
            .each("items", Validator::expression("value <= model.limit").unwrap(), "over")
            .field("limit", Validator::expression("model.items.length == 4").unwrap(), "count");
        let mut errors = Errors::new();
        assert!(!validate(&model, &rules, &mut errors));
        assert_eq!(
            errors.get("items"),
            Some(&FieldError::Elements(vec![
                None,
                Some("over".into()),
                None,
                Some("over".into())
            ]))
        );
        assert!(!errors.contains_key("limit"));
    }

    #[rstest]
    fn test_model_json_is_converted_once_per_cache() {
        let model = model(json!({"a": [1, 2]}));
        let cache = OnceCell::new();
        let scope = Scope::new("a", &model).with_model_json(&cache);
        assert!(cache.get().is_none());

        assert!(check_with(&Validator::expression("model.a[1] == 2").unwrap(), &scope));
        assert_eq!(cache.get(), Some(&json!({"a": [1, 2]})));
        assert!(matches!(scope.model_json(), Cow::Borrowed(_)));
        assert!(matches!(Scope::new("a", &model).model_json(), Cow::Owned(_)));
    }

    #[rstest]
    fn test_prefix_is_applied_to_error_keys() {
        let model = model(json!({"name": ""}));
        let rules = Rules::new().field(
            "name",
            Validator::expression("model_key == 'person.name' && value != ''").unwrap(),
            "required",
        );
        let mut errors = Errors::new();
        assert!(!validate_with_prefix(&model, &rules, &mut errors, "person."));
        assert!(errors.contains_key("person.name"));
    }

    #[rstest]
    fn test_passing_model_records_nothing() {
        let model = model(json!({"email": "a@b", "age": 30}));
        let rules = Rules::new()
            .field("email", Validator::matches("@").unwrap(), "invalid")
            .field("age", Validator::between(18.0, 65.0, false), "range");
        let mut errors = Errors::new();
        assert!(validate(&model, &rules, &mut errors));
        assert!(errors.is_empty());
    }

    #[rstest]
    fn test_errors_serialize_untagged() {
        let mut errors = Errors::new();
        errors.insert("a".into(), FieldError::Message("bad".into()));
        errors.insert("b".into(), FieldError::Elements(vec![None, Some("x".into())]));
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({"a": "bad", "b": [null, "x"]})
        );
    }
}
