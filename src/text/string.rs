/// True when `text` is one or more ASCII decimal digits.
pub fn is_index_text(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// True for empty or whitespace-only text.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Append `value` to `out` in the form used inside a quoted
/// `Content-Disposition` parameter: `"` and line breaks become percent escapes.
pub fn escape_disposition_into(out: &mut String, value: &str) {
    let bytes = value.as_bytes();
    let mut start = 0;
    for (idx, byte) in bytes.iter().enumerate() {
        let escaped = match byte {
            b'"' => "%22",
            b'\r' => "%0D",
            b'\n' => "%0A",
            _ => continue,
        };
        if start < idx {
            out.push_str(&value[start..idx]);
        }
        out.push_str(escaped);
        start = idx + 1;
    }
    if start < value.len() {
        out.push_str(&value[start..]);
    }
}
