use std::fmt::{self, Display};

/// The kind of a token in a directive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// An identifier.
    Ident,
    /// An integer literal.
    Int,
    /// A float literal.
    Float,
    /// A quoted string literal.
    Str,
    /// `true` or `false`.
    Bool,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `.`
    Point,
    /// End of input.
    Eof,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Ident => "ident",
            TokenKind::Int => "int",
            TokenKind::Float => "float",
            TokenKind::Str => "string",
            TokenKind::Bool => "bool",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::Comma => ",",
            TokenKind::Point => ".",
            TokenKind::Eof => "eof",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Source text of the token. Strings exclude their quotes.
    pub literal: &'a str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LexError {
    Illegal(char),
    UnterminatedString,
}

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    #[inline]
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    #[inline]
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    #[inline]
    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if !pred(ch) {
                break;
            }
            self.pos += ch.len_utf8();
        }
        &self.input[start..self.pos]
    }

    pub fn next_token(&mut self) -> Result<Token<'a>, LexError> {
        self.eat_while(char::is_whitespace);

        let start = self.pos;
        let Some(ch) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                literal: "",
            });
        };

        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Point,
            '0'..='9' => return Ok(self.read_number()),
            '"' | '\'' | '`' => return self.read_string(ch),
            ch if ch.is_alphabetic() => return Ok(self.read_identifier()),
            ch => return Err(LexError::Illegal(ch)),
        };
        self.bump();
        Ok(Token {
            kind,
            literal: &self.input[start..self.pos],
        })
    }

    fn read_identifier(&mut self) -> Token<'a> {
        let literal =
            self.eat_while(|ch| ch.is_alphanumeric() || ch == '_' || ch == '-');
        let kind = match literal {
            "true" | "false" => TokenKind::Bool,
            _ => TokenKind::Ident,
        };
        Token { kind, literal }
    }

    fn read_number(&mut self) -> Token<'a> {
        let start = self.pos;
        let mut seen_point = false;
        while let Some(ch) = self.peek() {
            if ch == '.' && !seen_point {
                seen_point = true;
            } else if !ch.is_ascii_digit() {
                break;
            }
            self.pos += ch.len_utf8();
        }
        Token {
            kind: if seen_point {
                TokenKind::Float
            } else {
                TokenKind::Int
            },
            literal: &self.input[start..self.pos],
        }
    }

    fn read_string(&mut self, quote: char) -> Result<Token<'a>, LexError> {
        self.bump();
        let start = self.pos;
        loop {
            match self.bump() {
                None => return Err(LexError::UnterminatedString),
                Some('\\') => {
                    // The escaped character is kept verbatim. Running out of
                    // input here is caught by the next iteration.
                    self.bump();
                }
                Some(ch) if ch == quote => {
                    let end = self.pos - quote.len_utf8();
                    return Ok(Token {
                        kind: TokenKind::Str,
                        literal: &self.input[start..end],
                    });
                }
                Some(_) => {}
            }
        }
    }
}
