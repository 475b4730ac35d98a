//! A small sandboxed expression language for validators.
//!
//! Sources are compiled once into an AST; evaluation only reads the symbols
//! supplied by a [`Resolve`] implementation and cannot fail.

mod eval;
mod parser;
mod scanner;

use std::borrow::Cow;
use std::fmt;

pub use eval::truthy;
pub use parser::Symbol;

use crate::Result;

/// Supplies symbol values at evaluation time.
pub trait Resolve {
    /// Borrow the value where it already exists; large symbols such as the
    /// model are then read in place on every evaluation.
    fn resolve(&self, symbol: Symbol) -> Cow<'_, serde_json::Value>;
}

#[derive(Clone)]
pub struct Expression {
    source: String,
    ast: parser::Expr,
}

impl Expression {
    /// Compile `source`. Syntax errors, unknown symbols and unknown functions
    /// are reported here with their byte offset.
    pub fn compile(source: &str) -> Result<Self> {
        let ast = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            ast,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate(&self, symbols: &dyn Resolve) -> serde_json::Value {
        eval::evaluate(&self.ast, symbols).into_owned()
    }

    pub fn test(&self, symbols: &dyn Resolve) -> bool {
        truthy(&eval::evaluate(&self.ast, symbols))
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expression").field(&self.source).finish()
    }
}
