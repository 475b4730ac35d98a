use serde_json::Number;

/// Render a number the way it appears in a flat form value: integers verbatim,
/// floats in plain decimal notation without exponent or trailing zeros.
pub fn format_number(number: &Number) -> String {
    if let Some(value) = number.as_i64() {
        let mut buffer = itoa::Buffer::new();
        return buffer.format(value).to_string();
    }
    if let Some(value) = number.as_u64() {
        let mut buffer = itoa::Buffer::new();
        return buffer.format(value).to_string();
    }
    match number.as_f64() {
        Some(value) => format_f64(value),
        None => String::new(),
    }
}

pub fn format_f64(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let mut buffer = ryu::Buffer::new();
    let raw = buffer.format(value);
    if raw.contains('e') || raw.contains('E') {
        return expand_exponent(raw);
    }
    trim_number(raw.to_string())
}

/// Number from an `f64`, folding integral values into the integer variants.
pub fn number_from_f64(value: f64) -> Option<Number> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        return Some(Number::from(value as i64));
    }
    Number::from_f64(value)
}

/// Parse text that is entirely a decimal number (`-12`, `3.5`, `1e3`).
pub fn parse_number(text: &str) -> Option<Number> {
    if !is_numeric_text(text) {
        return None;
    }
    if let Ok(value) = text.parse::<i64>() {
        return Some(Number::from(value));
    }
    if let Ok(value) = text.parse::<u64>() {
        return Some(Number::from(value));
    }
    text.parse::<f64>().ok().and_then(number_from_f64)
}

/// Integer prefix of `text` after leading whitespace (`"42px"` -> 42).
/// Digit runs past the `u64` range are truncated from their float value.
pub fn leading_int(text: &str) -> Option<Number> {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    let digits = &trimmed[..end];
    if let Ok(value) = digits.parse::<i64>() {
        return Some(Number::from(value));
    }
    if let Ok(value) = digits.trim_start_matches('+').parse::<u64>() {
        return Some(Number::from(value));
    }
    leading_float(digits).map(f64::trunc).and_then(number_from_f64)
}

/// Float prefix of `text` after leading whitespace (`"2.5kg"` -> 2.5).
pub fn leading_float(text: &str) -> Option<f64> {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
        end = 1;
    }
    let mut digits = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        digits += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return None;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'-') | Some(b'+')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    trimmed[..end].parse::<f64>().ok()
}

fn is_numeric_text(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    if bytes.first() == Some(&b'-') {
        i = 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == int_start {
        return false;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == frac_start {
            return false;
        }
    }
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        i += 1;
        if matches!(bytes.get(i), Some(b'-') | Some(b'+')) {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }
    i == bytes.len()
}

fn expand_exponent(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut i = 0;
    let mut negative = false;
    if bytes.get(i) == Some(&b'-') {
        negative = true;
        i += 1;
    }

    let mut digits = String::new();
    let mut dot_pos = None;
    while i < bytes.len() {
        match bytes[i] {
            b'0'..=b'9' => {
                digits.push(bytes[i] as char);
                i += 1;
            }
            b'.' => {
                dot_pos = Some(digits.len());
                i += 1;
            }
            b'e' | b'E' => {
                i += 1;
                break;
            }
            _ => {
                i += 1;
            }
        }
    }

    let mut exp_sign = 1i32;
    if i < bytes.len() {
        if bytes[i] == b'-' {
            exp_sign = -1;
            i += 1;
        } else if bytes[i] == b'+' {
            i += 1;
        }
    }

    let mut exp: i32 = 0;
    while i < bytes.len() {
        if let b'0'..=b'9' = bytes[i] {
            exp = exp
                .saturating_mul(10)
                .saturating_add((bytes[i] - b'0') as i32);
        }
        i += 1;
    }
    exp *= exp_sign;

    let dot_pos = dot_pos.unwrap_or(digits.len());
    let new_pos = dot_pos as i32 + exp;
    let mut out = String::new();
    if negative {
        out.push('-');
    }

    if new_pos <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat_n('0', (-new_pos) as usize));
        out.push_str(&digits);
        return trim_number(out);
    }

    if new_pos as usize >= digits.len() {
        out.push_str(&digits);
        out.extend(std::iter::repeat_n('0', new_pos as usize - digits.len()));
        return trim_number(out);
    }

    let pos = new_pos as usize;
    out.push_str(&digits[..pos]);
    out.push('.');
    out.push_str(&digits[pos..]);
    trim_number(out)
}

fn trim_number(mut value: String) -> String {
    if let Some(dot) = value.find('.') {
        let mut end = value.len();
        while end > dot + 1 && value.as_bytes()[end - 1] == b'0' {
            end -= 1;
        }
        value.truncate(end);
        if value.ends_with('.') {
            value.pop();
        }
    }
    if value
        .trim_start_matches('-')
        .bytes()
        .all(|b| b == b'0' || b == b'.')
    {
        return "0".to_string();
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Number::from(42), "42")]
    #[case(Number::from(-7), "-7")]
    #[case(Number::from_f64(1.5).unwrap(), "1.5")]
    #[case(Number::from_f64(1e21).unwrap(), "1000000000000000000000")]
    #[case(Number::from_f64(1.25e-7).unwrap(), "0.000000125")]
    fn test_format_number(#[case] number: Number, #[case] expected: &str) {
        assert_eq!(format_number(&number), expected);
    }

    #[rstest]
    #[case("12", Some(Number::from(12)))]
    #[case("-3", Some(Number::from(-3)))]
    #[case("2.0", Some(Number::from(2)))]
    #[case("1e3", Some(Number::from(1000)))]
    #[case("0.5", Number::from_f64(0.5))]
    #[case("1.", None)]
    #[case("abc", None)]
    #[case("", None)]
    #[case("12px", None)]
    fn test_parse_number(#[case] input: &str, #[case] expected: Option<Number>) {
        assert_eq!(parse_number(input), expected);
    }

    #[rstest]
    #[case("42px", Some(42))]
    #[case("  -8", Some(-8))]
    #[case("3.9", Some(3))]
    #[case("px", None)]
    #[case("-", None)]
    fn test_leading_int(#[case] input: &str, #[case] expected: Option<i64>) {
        assert_eq!(leading_int(input), expected.map(Number::from));
    }

    #[rstest]
    #[case("18446744073709551615", Number::from(u64::MAX))]
    #[case("99999999999999999999", Number::from_f64(1e20).unwrap())]
    #[case("-99999999999999999999x", Number::from_f64(-1e20).unwrap())]
    fn test_leading_int_past_i64(#[case] input: &str, #[case] expected: Number) {
        assert_eq!(leading_int(input), Some(expected));
    }

    #[rstest]
    #[case("2.5kg", Some(2.5))]
    #[case(".5", Some(0.5))]
    #[case("1e2x", Some(100.0))]
    #[case("1e", Some(1.0))]
    #[case("kg", None)]
    fn test_leading_float(#[case] input: &str, #[case] expected: Option<f64>) {
        assert_eq!(leading_float(input), expected);
    }
}
