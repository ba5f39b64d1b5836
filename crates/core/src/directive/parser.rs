use std::error::Error;
use std::fmt::{self, Display};

use super::lexer::{LexError, Lexer, Token, TokenKind};
use super::{CallExpression, Literal, LiteralKind};

/// Describes why a directive failed to compile.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParseError {
    /// A character that cannot start any token.
    IllegalCharacter(char),
    /// A string literal without its closing quote.
    UnterminatedString,
    /// An identifier was expected, e.g. at the start or after a `.`.
    ExpectedName {
        /// The token found instead.
        found: TokenKind,
    },
    /// The name must be followed by `(` or the end of input.
    ExpectedCallOrEnd {
        /// The token found instead.
        found: TokenKind,
        /// Its source text.
        literal: String,
    },
    /// A literal argument was expected.
    ExpectedArgument {
        /// The token found instead.
        found: TokenKind,
        /// Its source text.
        literal: String,
    },
    /// An argument must be followed by `,` or `)`.
    ExpectedCommaOrClose {
        /// The token found instead.
        found: TokenKind,
        /// Its source text.
        literal: String,
    },
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::IllegalCharacter(ch) => {
                write!(f, "illegal character '{ch}'")
            }
            ParseError::UnterminatedString => {
                write!(f, "unterminated string literal")
            }
            ParseError::ExpectedName { found } => {
                write!(f, "expected function name, got {found}")
            }
            ParseError::ExpectedCallOrEnd { found, literal } => {
                write!(f, "expected '(' or end of input, got {found} {literal}")
            }
            ParseError::ExpectedArgument { found, literal } => write!(
                f,
                "expected argument, got type: {found} value: {literal}, \
                 argument should be int, string, bool or float"
            ),
            ParseError::ExpectedCommaOrClose { found, literal } => {
                write!(f, "expected ',' or ')', got {found} {literal}")
            }
        }
    }
}

impl Error for ParseError {}

impl From<LexError> for ParseError {
    #[inline]
    fn from(err: LexError) -> Self {
        match err {
            LexError::Illegal(ch) => ParseError::IllegalCharacter(ch),
            LexError::UnterminatedString => ParseError::UnterminatedString,
        }
    }
}

/// Parses a call expression. The namespace is left empty when the input
/// names only a function.
pub fn parse_call(input: &str) -> Result<CallExpression, ParseError> {
    let mut lexer = Lexer::new(input);

    let mut names = vec![expect_name(lexer.next_token()?)?];
    let mut tok = lexer.next_token()?;
    while tok.kind == TokenKind::Point {
        names.push(expect_name(lexer.next_token()?)?);
        tok = lexer.next_token()?;
    }

    let arguments = match tok.kind {
        TokenKind::Eof => vec![],
        TokenKind::LParen => parse_arguments(&mut lexer)?,
        found => {
            return Err(ParseError::ExpectedCallOrEnd {
                found,
                literal: tok.literal.to_owned(),
            });
        }
    };

    // `names` always holds at least one identifier here.
    let function = names.pop().unwrap_or_default().to_owned();
    Ok(CallExpression {
        namespace: names.join("."),
        function,
        arguments,
    })
}

fn expect_name<'a>(tok: Token<'a>) -> Result<&'a str, ParseError> {
    match tok.kind {
        TokenKind::Ident => Ok(tok.literal),
        found => Err(ParseError::ExpectedName { found }),
    }
}

/// Parses the argument list after the opening parenthesis, up to and
/// including the closing one. Tokens after `)` are ignored.
fn parse_arguments(lexer: &mut Lexer<'_>) -> Result<Vec<Literal>, ParseError> {
    let mut arguments = vec![];

    let mut tok = lexer.next_token()?;
    if tok.kind == TokenKind::RParen {
        return Ok(arguments);
    }
    loop {
        arguments.push(expect_literal(tok)?);
        let next = lexer.next_token()?;
        match next.kind {
            TokenKind::RParen => return Ok(arguments),
            TokenKind::Comma => tok = lexer.next_token()?,
            found => {
                return Err(ParseError::ExpectedCommaOrClose {
                    found,
                    literal: next.literal.to_owned(),
                });
            }
        }
    }
}

fn expect_literal(tok: Token<'_>) -> Result<Literal, ParseError> {
    let kind = match tok.kind {
        TokenKind::Int => LiteralKind::Int,
        TokenKind::Float => LiteralKind::Float,
        TokenKind::Str => LiteralKind::String,
        TokenKind::Bool => LiteralKind::Bool,
        found => {
            return Err(ParseError::ExpectedArgument {
                found,
                literal: tok.literal.to_owned(),
            });
        }
    };
    Ok(Literal::new(kind, tok.literal))
}
