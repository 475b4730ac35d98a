use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    String(String),
    Ident(String),
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    Question,
    Colon,
    Bang,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    And,
    Or,
    Eof,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::String(s) => format!("string {s:?}"),
            Token::Ident(name) => format!("identifier `{name}`"),
            Token::Eof => "end of expression".to_string(),
            other => format!("`{}`", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::LeftBracket => "[",
            Token::RightBracket => "]",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Question => "?",
            Token::Colon => ":",
            Token::Bang => "!",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Less => "<",
            Token::LessEqual => "<=",
            Token::Greater => ">",
            Token::GreaterEqual => ">=",
            Token::Equal => "==",
            Token::NotEqual => "!=",
            Token::StrictEqual => "===",
            Token::StrictNotEqual => "!==",
            Token::And => "&&",
            Token::Or => "||",
            Token::Number(_) | Token::String(_) | Token::Ident(_) | Token::Eof => "",
        }
    }
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub struct Scanner<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, position: 0 }
    }

    /// Tokenize the whole input; the last token is always [`Token::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<Spanned>> {
        let mut tokens = Vec::new();
        loop {
            let spanned = self.scan_token()?;
            let done = spanned.token == Token::Eof;
            tokens.push(spanned);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.input[self.position..].chars().nth(ahead)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn scan_token(&mut self) -> Result<Spanned> {
        self.skip_whitespace();
        let offset = self.position;
        let Some(ch) = self.peek() else {
            return Ok(Spanned {
                token: Token::Eof,
                offset,
            });
        };

        let token = match ch {
            '0'..='9' => self.scan_number()?,
            '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.scan_number()?,
            '"' | '\'' => self.scan_string(ch)?,
            c if c.is_alphabetic() || c == '_' || c == '$' => self.scan_ident(),
            _ => self.scan_operator()?,
        };
        Ok(Spanned { token, offset })
    }

    fn scan_number(&mut self) -> Result<Token> {
        let start = self.position;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let sign = matches!(self.peek_at(1), Some('+') | Some('-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    self.advance();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }
        let text = &self.input[start..self.position];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| Error::expression(format!("invalid number literal `{text}`"), start))
    }

    fn scan_string(&mut self, quote: char) -> Result<Token> {
        let start = self.position;
        self.advance();
        let mut out = String::new();
        loop {
            match self.advance() {
                None => return Err(Error::expression("unterminated string literal", start)),
                Some(c) if c == quote => return Ok(Token::String(out)),
                Some('\\') => {
                    let escape_at = self.position - 1;
                    match self.advance() {
                        Some('n') => out.push('\n'),
                        Some('t') => out.push('\t'),
                        Some('r') => out.push('\r'),
                        Some('0') => out.push('\0'),
                        Some(c @ ('\\' | '"' | '\'' | '/')) => out.push(c),
                        Some(other) => {
                            return Err(Error::expression(
                                format!("unknown escape `\\{other}`"),
                                escape_at,
                            ))
                        }
                        None => {
                            return Err(Error::expression("unterminated string literal", start))
                        }
                    }
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn scan_ident(&mut self) -> Token {
        let start = self.position;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
        {
            self.advance();
        }
        Token::Ident(self.input[start..self.position].to_string())
    }

    fn scan_operator(&mut self) -> Result<Token> {
        let start = self.position;
        let rest = &self.input[start..];
        let (token, len) = if rest.starts_with("===") {
            (Token::StrictEqual, 3)
        } else if rest.starts_with("!==") {
            (Token::StrictNotEqual, 3)
        } else if rest.starts_with("==") {
            (Token::Equal, 2)
        } else if rest.starts_with("!=") {
            (Token::NotEqual, 2)
        } else if rest.starts_with("<=") {
            (Token::LessEqual, 2)
        } else if rest.starts_with(">=") {
            (Token::GreaterEqual, 2)
        } else if rest.starts_with("&&") {
            (Token::And, 2)
        } else if rest.starts_with("||") {
            (Token::Or, 2)
        } else {
            let single = match rest.chars().next() {
                Some('(') => Token::LeftParen,
                Some(')') => Token::RightParen,
                Some('[') => Token::LeftBracket,
                Some(']') => Token::RightBracket,
                Some(',') => Token::Comma,
                Some('.') => Token::Dot,
                Some('?') => Token::Question,
                Some(':') => Token::Colon,
                Some('!') => Token::Bang,
                Some('+') => Token::Plus,
                Some('-') => Token::Minus,
                Some('*') => Token::Star,
                Some('/') => Token::Slash,
                Some('%') => Token::Percent,
                Some('<') => Token::Less,
                Some('>') => Token::Greater,
                Some(other) => {
                    return Err(Error::expression(
                        format!("unexpected character `{other}`"),
                        start,
                    ))
                }
                None => Token::Eof,
            };
            (single, 1)
        };
        self.position += len;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tokens(input: &str) -> Vec<Token> {
        Scanner::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|spanned| spanned.token)
            .collect()
    }

    #[rstest]
    fn test_operators_prefer_longest_match() {
        assert_eq!(
            tokens("a !== b == c"),
            vec![
                Token::Ident("a".into()),
                Token::StrictNotEqual,
                Token::Ident("b".into()),
                Token::Equal,
                Token::Ident("c".into()),
                Token::Eof,
            ]
        );
    }

    #[rstest]
    #[case("12", 12.0)]
    #[case("2.5", 2.5)]
    #[case(".5", 0.5)]
    #[case("1e3", 1000.0)]
    fn test_numbers(#[case] input: &str, #[case] expected: f64) {
        assert_eq!(tokens(input), vec![Token::Number(expected), Token::Eof]);
    }

    #[rstest]
    fn test_strings_with_escapes() {
        assert_eq!(
            tokens(r#"'it\'s' "a\"b""#),
            vec![
                Token::String("it's".into()),
                Token::String("a\"b".into()),
                Token::Eof,
            ]
        );
    }

    #[rstest]
    fn test_member_dot_is_not_a_number() {
        assert_eq!(
            tokens("value.length"),
            vec![
                Token::Ident("value".into()),
                Token::Dot,
                Token::Ident("length".into()),
                Token::Eof,
            ]
        );
    }

    #[rstest]
    #[case("'open", 0)]
    #[case("a # b", 2)]
    #[case("'\\q'", 1)]
    fn test_errors_carry_offset(#[case] input: &str, #[case] offset: usize) {
        let err = Scanner::new(input).tokenize().unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::Expression);
        assert_eq!(err.location.map(|loc| loc.offset), Some(offset));
    }
}
