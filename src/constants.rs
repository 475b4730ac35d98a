/// Bracket pair that marks a dynamic-append segment in flat keys.
pub const APPEND_MARKER: &str = "[]";

/// Words `Transform::boolean` treats as true (compared case-insensitively).
pub const TRUE_WORDS: &[&str] = &["true", "on", "yes", "1"];

pub const DEFAULT_SEQUENCE_LIMIT: usize = 10_000;

pub const DEFAULT_KEY_ATTRIBUTE: &str = "name";

pub const DEFAULT_VALUE_ATTRIBUTE: &str = "value";

pub const DEFAULT_JSON_ATTRIBUTE: &str = "json-encoded";

pub const MULTIPART_BOUNDARY_PREFIX: &str = "----formnest";

#[inline]
pub fn is_true_word(s: &str) -> bool {
    TRUE_WORDS.iter().any(|word| word.eq_ignore_ascii_case(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    #[case("true", true)]
    #[case("On", true)]
    #[case("YES", true)]
    #[case("1", true)]
    #[case("0", false)]
    #[case("off", false)]
    #[case("", false)]
    fn test_is_true_word(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_true_word(input), expected);
    }
}
