use regex::Regex;

use super::scanner::{Scanner, Spanned, Token};
use crate::num::number::number_from_f64;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Value,
    Key,
    Model,
    Index,
    ModelKey,
}

impl Symbol {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "value" => Some(Symbol::Value),
            "key" => Some(Symbol::Key),
            "model" => Some(Symbol::Model),
            "index" => Some(Symbol::Index),
            "model_key" => Some(Symbol::ModelKey),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Lower,
    Upper,
    Trim,
    Num,
    Str,
}

impl Builtin {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "len" => Some(Builtin::Len),
            "lower" => Some(Builtin::Lower),
            "upper" => Some(Builtin::Upper),
            "trim" => Some(Builtin::Trim),
            "num" => Some(Builtin::Num),
            "str" => Some(Builtin::Str),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(serde_json::Value),
    Symbol(Symbol),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Builtin, Box<Expr>),
    /// `matches(text, "pattern")`; the pattern is compiled while parsing.
    Matches(Box<Expr>, Regex),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

pub fn parse(source: &str) -> Result<Expr> {
    let tokens = Scanner::new(source).tokenize()?;
    let mut parser = Parser {
        tokens,
        position: 0,
    };
    let expr = parser.parse_conditional()?;
    parser.expect(&Token::Eof)?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.position)
            .map_or(&Token::Eof, |spanned| &spanned.token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .map_or(0, |spanned| spanned.offset)
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.eat(token) {
            return Ok(());
        }
        Err(self.unexpected(&format!("expected {}", token.describe())))
    }

    fn unexpected(&self, context: &str) -> Error {
        Error::expression(
            format!("{context}, found {}", self.peek().describe()),
            self.offset(),
        )
    }

    fn parse_conditional(&mut self) -> Result<Expr> {
        let condition = self.parse_or()?;
        if !self.eat(&Token::Question) {
            return Ok(condition);
        }
        let then = self.parse_conditional()?;
        self.expect(&Token::Colon)?;
        let otherwise = self.parse_conditional()?;
        Ok(Expr::Conditional(
            Box::new(condition),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::And) {
            let right = self.parse_equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Token::Equal => BinaryOp::Equal,
                Token::NotEqual => BinaryOp::NotEqual,
                Token::StrictEqual => BinaryOp::StrictEqual,
                Token::StrictNotEqual => BinaryOp::StrictNotEqual,
                _ => return Ok(left),
            };
            self.bump();
            let right = self.parse_comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Less => BinaryOp::Less,
                Token::LessEqual => BinaryOp::LessEqual,
                Token::Greater => BinaryOp::Greater,
                Token::GreaterEqual => BinaryOp::GreaterEqual,
                _ => return Ok(left),
            };
            self.bump();
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.bump();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.bump();
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Negate,
            _ => return self.parse_postfix(),
        };
        self.bump();
        let operand = self.parse_unary()?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&Token::Dot) {
                match self.bump() {
                    Token::Ident(name) => expr = Expr::Member(Box::new(expr), name),
                    _ => {
                        self.position -= 1;
                        return Err(self.unexpected("expected property name after `.`"));
                    }
                }
            } else if self.eat(&Token::LeftBracket) {
                let index = self.parse_conditional()?;
                self.expect(&Token::RightBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.peek() == &Token::LeftParen {
                return Err(self.unexpected("only builtin functions can be called"));
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let offset = self.offset();
        match self.bump() {
            Token::Number(n) => Ok(Expr::Literal(
                number_from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number),
            )),
            Token::String(s) => Ok(Expr::Literal(serde_json::Value::String(s))),
            Token::LeftParen => {
                let inner = self.parse_conditional()?;
                self.expect(&Token::RightParen)?;
                Ok(inner)
            }
            Token::Ident(name) => self.parse_identifier(name, offset),
            _ => {
                self.position -= 1;
                Err(self.unexpected("expected a value"))
            }
        }
    }

    fn parse_identifier(&mut self, name: String, offset: usize) -> Result<Expr> {
        match name.as_str() {
            "true" => return Ok(Expr::Literal(serde_json::Value::Bool(true))),
            "false" => return Ok(Expr::Literal(serde_json::Value::Bool(false))),
            "null" | "undefined" => return Ok(Expr::Literal(serde_json::Value::Null)),
            _ => {}
        }
        if self.eat(&Token::LeftParen) {
            return self.parse_call(&name, offset);
        }
        Symbol::lookup(&name)
            .map(Expr::Symbol)
            .ok_or_else(|| Error::expression(format!("unknown symbol `{name}`"), offset))
    }

    fn parse_call(&mut self, name: &str, offset: usize) -> Result<Expr> {
        if name == "matches" {
            let subject = self.parse_conditional()?;
            self.expect(&Token::Comma)?;
            let pattern_at = self.offset();
            let Token::String(pattern) = self.bump() else {
                return Err(Error::expression(
                    "matches() expects a string literal pattern",
                    pattern_at,
                ));
            };
            let regex = Regex::new(&pattern).map_err(|err| Error::pattern(&err))?;
            self.expect(&Token::RightParen)?;
            return Ok(Expr::Matches(Box::new(subject), regex));
        }
        let builtin = Builtin::lookup(name)
            .ok_or_else(|| Error::expression(format!("unknown function `{name}`"), offset))?;
        let argument = self.parse_conditional()?;
        if self.peek() == &Token::Comma {
            return Err(self.unexpected(&format!("`{name}` takes one argument")));
        }
        self.expect(&Token::RightParen)?;
        Ok(Expr::Call(builtin, Box::new(argument)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use rstest::rstest;

    #[rstest]
    fn test_precedence() {
        let expr = parse("1 + 2 * 3 > 6 && !false").unwrap();
        let Expr::And(left, right) = expr else {
            panic!("expected &&");
        };
        assert!(matches!(*left, Expr::Binary(BinaryOp::Greater, _, _)));
        assert!(matches!(*right, Expr::Unary(UnaryOp::Not, _)));
    }

    #[rstest]
    fn test_conditional_is_right_associative() {
        let expr = parse("value ? 1 : index ? 2 : 3").unwrap();
        let Expr::Conditional(_, _, otherwise) = expr else {
            panic!("expected ?:");
        };
        assert!(matches!(*otherwise, Expr::Conditional(_, _, _)));
    }

    #[rstest]
    fn test_member_and_index_chain() {
        let expr = parse("model.items[index].name").unwrap();
        assert!(matches!(expr, Expr::Member(_, ref name) if name == "name"));
    }

    #[rstest]
    #[case("nope == 1", 0, "unknown symbol `nope`")]
    #[case("value == ", 9, "expected a value")]
    #[case("exec(value)", 0, "unknown function `exec`")]
    #[case("(value", 6, "expected `)`")]
    #[case("value.+", 6, "expected property name")]
    #[case("len(value, 2)", 9, "takes one argument")]
    #[case("value 1", 6, "expected end of expression")]
    fn test_syntax_errors(#[case] source: &str, #[case] offset: usize, #[case] fragment: &str) {
        let err = parse(source).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Expression);
        assert_eq!(err.location.map(|loc| loc.offset), Some(offset));
        assert!(
            err.message.contains(fragment),
            "{:?} does not mention {fragment:?}",
            err.message
        );
    }

    #[rstest]
    fn test_bad_pattern_is_pattern_error() {
        let err = parse("matches(value, '(')").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Pattern);
    }

    #[rstest]
    fn test_pattern_must_be_literal() {
        let err = parse("matches(value, key)").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Expression);
    }
}
