//! Compiler for `call:` directives.
//!
//! A directive is one line of an action block that asks the agent to run a
//! tool, e.g. `call:fs.read_file("/etc/hosts", 10)`. The grammar is
//! deliberately tiny:
//!
//! ```text
//! call        := dotted-name [ "(" arg-list? ")" ]
//! dotted-name := IDENT ( "." IDENT )*
//! arg-list    := literal ( "," literal )*
//! literal     := INT | FLOAT | STRING | BOOL
//! ```
//!
//! Arguments are kept as source text; tools decide how to interpret them.

mod lexer;
mod parser;

use std::fmt::{self, Display};
use std::str::FromStr;

pub use lexer::TokenKind;
pub use parser::ParseError;

/// The prefix that marks a line as a directive.
pub const DIRECTIVE_PREFIX: &str = "call:";

/// The namespace used when a directive names only a function.
pub const DEFAULT_NAMESPACE: &str = "std";

/// The kind of a literal argument, as the lexer recognized it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    /// Digits without a decimal point.
    Int,
    /// Digits with exactly one decimal point.
    Float,
    /// A quoted string, stored without its quotes.
    String,
    /// `true` or `false`.
    Bool,
}

/// A literal argument of a call expression.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Literal {
    kind: LiteralKind,
    text: String,
}

impl Literal {
    #[inline]
    pub(crate) fn new<S: Into<String>>(kind: LiteralKind, text: S) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    /// Returns the kind of this literal.
    #[inline]
    pub fn kind(&self) -> LiteralKind {
        self.kind
    }

    /// Returns the source text of this literal.
    ///
    /// Strings are returned without the surrounding quotes, but escape
    /// sequences are kept verbatim.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Parses the source text into `T`.
    #[inline]
    pub fn parse<T: FromStr>(&self) -> Result<T, T::Err> {
        self.text.parse()
    }
}

impl From<&str> for Literal {
    #[inline]
    fn from(text: &str) -> Self {
        Self::new(LiteralKind::String, text)
    }
}

impl From<String> for Literal {
    #[inline]
    fn from(text: String) -> Self {
        Self::new(LiteralKind::String, text)
    }
}

impl From<i64> for Literal {
    #[inline]
    fn from(value: i64) -> Self {
        Self::new(LiteralKind::Int, value.to_string())
    }
}

impl From<bool> for Literal {
    #[inline]
    fn from(value: bool) -> Self {
        Self::new(LiteralKind::Bool, value.to_string())
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A compiled directive.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallExpression {
    /// Dotted namespace, [`DEFAULT_NAMESPACE`] if the directive had none.
    pub namespace: String,
    /// Name of the function to call.
    pub function: String,
    /// Arguments in source order.
    pub arguments: Vec<Literal>,
}

impl CallExpression {
    /// Returns the `namespace.function` key used to look up tools.
    #[inline]
    pub fn key(&self) -> String {
        format!("{}.{}", self.namespace, self.function)
    }
}

impl Display for CallExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.namespace, self.function)?;
        for (i, arg) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

/// Compiles one directive into a call expression.
///
/// A leading [`DIRECTIVE_PREFIX`] is accepted and ignored.
pub fn compile(input: &str) -> Result<CallExpression, ParseError> {
    let input = input.strip_prefix(DIRECTIVE_PREFIX).unwrap_or(input);
    let mut expr = parser::parse_call(input)?;
    if expr.namespace.is_empty() {
        expr.namespace = DEFAULT_NAMESPACE.to_owned();
    }
    Ok(expr)
}
