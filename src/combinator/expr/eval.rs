use std::borrow::Cow;
use std::cmp::Ordering;

use serde_json::Value as Json;

use super::parser::{BinaryOp, Builtin, Expr, UnaryOp};
use super::Resolve;
use crate::num::number::{format_number, number_from_f64};

/// Evaluate `expr`; type mismatches produce `null` rather than failing.
///
/// Literals, symbols and member or index paths into them stay borrowed, so
/// `model.a.b` never copies the whole model.
pub fn evaluate<'a>(expr: &'a Expr, symbols: &'a dyn Resolve) -> Cow<'a, Json> {
    match expr {
        Expr::Literal(value) => Cow::Borrowed(value),
        Expr::Symbol(symbol) => symbols.resolve(*symbol),
        Expr::Member(target, name) => member(evaluate(target, symbols), name),
        Expr::Index(target, index) => {
            let index = evaluate(index, symbols);
            element(evaluate(target, symbols), &index)
        }
        Expr::Call(builtin, argument) => Cow::Owned(call(*builtin, &evaluate(argument, symbols))),
        Expr::Matches(subject, regex) => {
            let matched = match evaluate(subject, symbols).as_ref() {
                Json::String(text) => regex.is_match(text),
                Json::Number(n) => regex.is_match(&format_number(n)),
                _ => false,
            };
            Cow::Owned(Json::Bool(matched))
        }
        Expr::Unary(UnaryOp::Not, operand) => {
            Cow::Owned(Json::Bool(!truthy(&evaluate(operand, symbols))))
        }
        Expr::Unary(UnaryOp::Negate, operand) => {
            Cow::Owned(number(-to_number(&evaluate(operand, symbols))))
        }
        Expr::Binary(op, left, right) => {
            let left = evaluate(left, symbols);
            let right = evaluate(right, symbols);
            Cow::Owned(binary(*op, &left, &right))
        }
        Expr::And(left, right) => {
            let left = evaluate(left, symbols);
            if truthy(&left) {
                evaluate(right, symbols)
            } else {
                left
            }
        }
        Expr::Or(left, right) => {
            let left = evaluate(left, symbols);
            if truthy(&left) {
                left
            } else {
                evaluate(right, symbols)
            }
        }
        Expr::Conditional(condition, then, otherwise) => {
            if truthy(&evaluate(condition, symbols)) {
                evaluate(then, symbols)
            } else {
                evaluate(otherwise, symbols)
            }
        }
    }
}

pub fn truthy(value: &Json) -> bool {
    match value {
        Json::Null => false,
        Json::Bool(b) => *b,
        Json::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Json::String(s) => !s.is_empty(),
        Json::Array(_) | Json::Object(_) => true,
    }
}

fn to_number(value: &Json) -> f64 {
    match value {
        Json::Null => 0.0,
        Json::Bool(b) => f64::from(u8::from(*b)),
        Json::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Json::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        Json::Array(_) | Json::Object(_) => f64::NAN,
    }
}

fn number(value: f64) -> Json {
    number_from_f64(value).map_or(Json::Null, Json::Number)
}

fn to_text(value: &Json) -> String {
    match value {
        Json::Null => String::new(),
        Json::Bool(b) => b.to_string(),
        Json::Number(n) => format_number(n),
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn length(value: &Json) -> Json {
    match value {
        Json::String(s) => Json::from(s.chars().count()),
        Json::Array(items) => Json::from(items.len()),
        Json::Object(fields) => Json::from(fields.len()),
        _ => Json::Null,
    }
}

fn member<'v>(target: Cow<'v, Json>, name: &str) -> Cow<'v, Json> {
    if let Cow::Borrowed(Json::Object(fields)) = target {
        if let Some(found) = fields.get(name) {
            return Cow::Borrowed(found);
        }
    }
    Cow::Owned(match target.as_ref() {
        Json::Object(fields) => fields.get(name).cloned().unwrap_or(Json::Null),
        Json::String(_) | Json::Array(_) if name == "length" => length(&target),
        _ => Json::Null,
    })
}

fn element<'v>(target: Cow<'v, Json>, index: &Json) -> Cow<'v, Json> {
    if let Cow::Borrowed(container) = target {
        if let Some(found) = slot(container, index) {
            return Cow::Borrowed(found);
        }
    }
    Cow::Owned(
        slot(&target, index)
            .cloned()
            .unwrap_or_else(|| char_at(&target, index)),
    )
}

fn slot<'v>(target: &'v Json, index: &Json) -> Option<&'v Json> {
    match target {
        Json::Object(fields) => fields.get(&to_text(index)),
        Json::Array(items) => as_index(index).and_then(|i| items.get(i)),
        _ => None,
    }
}

fn char_at(target: &Json, index: &Json) -> Json {
    match target {
        Json::String(s) => as_index(index)
            .and_then(|i| s.chars().nth(i))
            .map_or(Json::Null, |c| Json::String(c.to_string())),
        _ => Json::Null,
    }
}

fn as_index(index: &Json) -> Option<usize> {
    let n = to_number(index);
    (n >= 0.0 && n.fract() == 0.0).then_some(n as usize)
}

fn call(builtin: Builtin, argument: &Json) -> Json {
    match (builtin, argument) {
        (Builtin::Len, value) => length(value),
        (Builtin::Lower, Json::String(s)) => Json::String(s.to_lowercase()),
        (Builtin::Upper, Json::String(s)) => Json::String(s.to_uppercase()),
        (Builtin::Trim, Json::String(s)) => Json::String(s.trim().to_string()),
        (Builtin::Num, value) => number(to_number(value)),
        (Builtin::Str, value) => Json::String(to_text(value)),
        _ => Json::Null,
    }
}

fn binary(op: BinaryOp, left: &Json, right: &Json) -> Json {
    match op {
        BinaryOp::Add => match (left, right) {
            (Json::String(_), _) | (_, Json::String(_)) => {
                let mut text = to_text(left);
                text.push_str(&to_text(right));
                Json::String(text)
            }
            _ => number(to_number(left) + to_number(right)),
        },
        BinaryOp::Sub => number(to_number(left) - to_number(right)),
        BinaryOp::Mul => number(to_number(left) * to_number(right)),
        BinaryOp::Div => number(to_number(left) / to_number(right)),
        BinaryOp::Rem => number(to_number(left) % to_number(right)),
        BinaryOp::Less => Json::Bool(compare(left, right) == Some(Ordering::Less)),
        BinaryOp::LessEqual => Json::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Greater => Json::Bool(compare(left, right) == Some(Ordering::Greater)),
        BinaryOp::GreaterEqual => Json::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Equal => Json::Bool(loose_equal(left, right)),
        BinaryOp::NotEqual => Json::Bool(!loose_equal(left, right)),
        BinaryOp::StrictEqual => Json::Bool(strict_equal(left, right)),
        BinaryOp::StrictNotEqual => Json::Bool(!strict_equal(left, right)),
    }
}

fn compare(left: &Json, right: &Json) -> Option<Ordering> {
    match (left, right) {
        (Json::String(a), Json::String(b)) => Some(a.cmp(b)),
        _ => to_number(left).partial_cmp(&to_number(right)),
    }
}

fn strict_equal(left: &Json, right: &Json) -> bool {
    match (left, right) {
        (Json::Number(a), Json::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn loose_equal(left: &Json, right: &Json) -> bool {
    match (left, right) {
        (Json::Null, Json::Null) => true,
        (Json::Null, _) | (_, Json::Null) => false,
        (Json::String(a), Json::String(b)) => a == b,
        (Json::Array(_) | Json::Object(_), _) | (_, Json::Array(_) | Json::Object(_)) => {
            left == right
        }
        _ => to_number(left) == to_number(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!(null), false)]
    #[case(json!(0), false)]
    #[case(json!(""), false)]
    #[case(json!("0"), true)]
    #[case(json!([]), true)]
    #[case(json!({}), true)]
    fn test_truthiness(#[case] value: Json, #[case] expected: bool) {
        assert_eq!(truthy(&value), expected);
    }

    #[rstest]
    #[case(BinaryOp::Add, json!(1), json!(2), json!(3))]
    #[case(BinaryOp::Add, json!("a"), json!(1), json!("a1"))]
    #[case(BinaryOp::Sub, json!("5"), json!(2), json!(3))]
    #[case(BinaryOp::Div, json!(1), json!(0), json!(null))]
    #[case(BinaryOp::Mul, json!("x"), json!(2), json!(null))]
    #[case(BinaryOp::Rem, json!(7), json!(4), json!(3))]
    #[case(BinaryOp::Equal, json!("1"), json!(1), json!(true))]
    #[case(BinaryOp::StrictEqual, json!("1"), json!(1), json!(false))]
    #[case(BinaryOp::StrictEqual, json!(2), json!(2.0), json!(true))]
    #[case(BinaryOp::Equal, json!(null), json!(0), json!(false))]
    #[case(BinaryOp::Less, json!("abc"), json!("abd"), json!(true))]
    #[case(BinaryOp::Less, json!("10"), json!(9), json!(false))]
    #[case(BinaryOp::GreaterEqual, json!("x"), json!(1), json!(false))]
    fn test_binary(#[case] op: BinaryOp, #[case] left: Json, #[case] right: Json, #[case] expected: Json) {
        assert_eq!(binary(op, &left, &right), expected);
    }

    fn owned_member(target: Json, name: &str) -> Json {
        member(Cow::Owned(target), name).into_owned()
    }

    fn owned_element(target: Json, index: Json) -> Json {
        element(Cow::Owned(target), &index).into_owned()
    }

    #[rstest]
    fn test_member_length() {
        assert_eq!(owned_member(json!("héllo"), "length"), json!(5));
        assert_eq!(owned_member(json!([1, 2]), "length"), json!(2));
        assert_eq!(owned_member(json!({"length": "own"}), "length"), json!("own"));
        assert_eq!(owned_member(json!(3), "length"), json!(null));
    }

    #[rstest]
    fn test_element_access() {
        assert_eq!(owned_element(json!([1, 2, 3]), json!(1)), json!(2));
        assert_eq!(owned_element(json!({"1": "one"}), json!(1)), json!("one"));
        assert_eq!(owned_element(json!("abc"), json!(2)), json!("c"));
        assert_eq!(owned_element(json!([1]), json!(-1)), json!(null));
    }

    #[rstest]
    fn test_paths_into_borrowed_values_stay_borrowed() {
        let doc = json!({"user": {"tags": ["a", "b"]}});
        let user = member(Cow::Borrowed(&doc), "user");
        let tags = member(user, "tags");
        let tag = element(tags, &json!(1));
        assert!(matches!(tag, Cow::Borrowed(value) if value == "b"));
        assert!(matches!(member(Cow::Borrowed(&doc), "missing"), Cow::Owned(Json::Null)));
    }

    #[rstest]
    #[case(Builtin::Lower, json!("ABC"), json!("abc"))]
    #[case(Builtin::Trim, json!("  x "), json!("x"))]
    #[case(Builtin::Trim, json!(3), json!(null))]
    #[case(Builtin::Num, json!(" 4.5 "), json!(4.5))]
    #[case(Builtin::Str, json!(4), json!("4"))]
    #[case(Builtin::Str, json!(null), json!(""))]
    #[case(Builtin::Len, json!({"a": 1}), json!(1))]
    fn test_builtins(#[case] builtin: Builtin, #[case] argument: Json, #[case] expected: Json) {
        assert_eq!(call(builtin, &argument), expected);
    }
}
