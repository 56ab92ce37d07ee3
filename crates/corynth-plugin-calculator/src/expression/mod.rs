//! Arithmetic expression evaluation.
//!
//! Expressions are tokenised and then parsed by recursive descent with the
//! usual precedence: unary signs bind tightest, then `*`, `/`, `%`, then
//! `+` and `-`, all left-associative. Only numeric literals, parentheses,
//! and the constants `pi` and `e` are accepted; nothing is ever executed.

use std::f64::consts;
use std::iter::Peekable;
use std::str::CharIndices;

use thiserror::Error;

/// Deepest parenthesis or unary-sign nesting accepted.
const MAX_DEPTH: usize = 256;

/// Reasons an expression cannot be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    /// The expression contained no tokens.
    #[error("expression is empty")]
    Empty,

    /// A character that is not part of the grammar.
    #[error("unexpected character '{found}' at position {position}")]
    UnexpectedCharacter {
        /// Offending character.
        found: char,
        /// Byte offset in the expression.
        position: usize,
    },

    /// A token in a place the grammar does not allow.
    #[error("unexpected '{found}' at position {position}")]
    UnexpectedToken {
        /// Offending token text.
        found: String,
        /// Byte offset in the expression.
        position: usize,
    },

    /// The expression stopped where an operand or `)` was required.
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    /// A numeric literal that does not parse.
    #[error("invalid number '{text}'")]
    InvalidNumber {
        /// Literal text.
        text: String,
    },

    /// A name other than `pi` or `e`.
    #[error("undefined identifier: {name}")]
    UndefinedIdentifier {
        /// Identifier text.
        name: String,
    },

    /// Right operand of `/` was zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Right operand of `%` was zero.
    #[error("modulo by zero")]
    ModuloByZero,

    /// Nesting exceeded the supported depth.
    #[error("expression nests more than {MAX_DEPTH} levels deep")]
    TooDeep,

    /// The result overflowed to infinity or is not a number.
    #[error("result is not a finite number")]
    NonFinite,
}

/// Evaluates an arithmetic expression.
///
/// # Errors
///
/// Returns an [`ExpressionError`] describing the first problem found.
///
/// # Example
///
/// ```
/// use corynth_plugin_calculator::expression::evaluate;
///
/// assert_eq!(evaluate("2 + 2 * 3"), Ok(8.0));
/// assert!(evaluate("1 / 0").is_err());
/// ```
pub fn evaluate(expression: &str) -> Result<f64, ExpressionError> {
    let tokens = tokenise(expression)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }
    let mut parser = Parser {
        tokens,
        cursor: 0,
        depth: 0,
    };
    let value = parser.sum()?;
    if let Some(token) = parser.peek() {
        return Err(token.unexpected());
    }
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ExpressionError::NonFinite)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Kind {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Open,
    Close,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: Kind,
    position: usize,
}

impl Token {
    fn unexpected(&self) -> ExpressionError {
        let found = match &self.kind {
            Kind::Number(value) => value.to_string(),
            Kind::Ident(name) => name.clone(),
            Kind::Plus => String::from("+"),
            Kind::Minus => String::from("-"),
            Kind::Star => String::from("*"),
            Kind::Slash => String::from("/"),
            Kind::Percent => String::from("%"),
            Kind::Open => String::from("("),
            Kind::Close => String::from(")"),
        };
        ExpressionError::UnexpectedToken {
            found,
            position: self.position,
        }
    }
}

fn tokenise(expression: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = expression.char_indices().peekable();

    while let Some(&(position, ch)) = chars.peek() {
        let kind = match ch {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            c if c.is_ascii_digit() || c == '.' => Kind::Number(number(&mut chars)?),
            c if c.is_ascii_alphabetic() || c == '_' => Kind::Ident(identifier(&mut chars)),
            '+' | '-' | '*' | '/' | '%' | '(' | ')' => {
                chars.next();
                match ch {
                    '+' => Kind::Plus,
                    '-' => Kind::Minus,
                    '*' => Kind::Star,
                    '/' => Kind::Slash,
                    '%' => Kind::Percent,
                    '(' => Kind::Open,
                    _ => Kind::Close,
                }
            }
            found => return Err(ExpressionError::UnexpectedCharacter { found, position }),
        };
        tokens.push(Token { kind, position });
    }
    Ok(tokens)
}

fn number(chars: &mut Peekable<CharIndices<'_>>) -> Result<f64, ExpressionError> {
    let mut text = String::new();
    while let Some(&(_, ch)) = chars.peek() {
        if ch.is_ascii_digit() || ch == '.' {
            text.push(ch);
            chars.next();
        } else {
            break;
        }
    }

    // An exponent needs at least one digit; `2e` leaves `e` for the parser.
    if let Some(&(_, marker @ ('e' | 'E'))) = chars.peek() {
        let mut lookahead = chars.clone();
        lookahead.next();
        let sign = match lookahead.peek() {
            Some(&(_, sign @ ('+' | '-'))) => {
                lookahead.next();
                Some(sign)
            }
            _ => None,
        };
        if lookahead.peek().is_some_and(|&(_, ch)| ch.is_ascii_digit()) {
            text.push(marker);
            text.extend(sign);
            *chars = lookahead;
            while let Some(&(_, ch)) = chars.peek() {
                if !ch.is_ascii_digit() {
                    break;
                }
                text.push(ch);
                chars.next();
            }
        }
    }

    text.parse::<f64>()
        .map_err(|_| ExpressionError::InvalidNumber { text })
}

fn identifier(chars: &mut Peekable<CharIndices<'_>>) -> String {
    let mut name = String::new();
    while let Some(&(_, ch)) = chars.peek() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            name.push(ch);
            chars.next();
        } else {
            break;
        }
    }
    name
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn descend(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExpressionError::TooDeep);
        }
        Ok(())
    }

    const fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    #[expect(clippy::float_arithmetic, reason = "evaluating arithmetic is the point")]
    fn sum(&mut self) -> Result<f64, ExpressionError> {
        let mut total = self.product()?;
        loop {
            match self.peek().map(|token| &token.kind) {
                Some(Kind::Plus) => {
                    self.advance();
                    total += self.product()?;
                }
                Some(Kind::Minus) => {
                    self.advance();
                    total -= self.product()?;
                }
                _ => return Ok(total),
            }
        }
    }

    #[expect(clippy::float_arithmetic, reason = "evaluating arithmetic is the point")]
    fn product(&mut self) -> Result<f64, ExpressionError> {
        let mut total = self.unary()?;
        loop {
            match self.peek().map(|token| &token.kind) {
                Some(Kind::Star) => {
                    self.advance();
                    total *= self.unary()?;
                }
                Some(Kind::Slash) => {
                    self.advance();
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(ExpressionError::DivisionByZero);
                    }
                    total /= divisor;
                }
                Some(Kind::Percent) => {
                    self.advance();
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(ExpressionError::ModuloByZero);
                    }
                    total %= divisor;
                }
                _ => return Ok(total),
            }
        }
    }

    #[expect(clippy::float_arithmetic, reason = "negation of an operand")]
    fn unary(&mut self) -> Result<f64, ExpressionError> {
        match self.peek().map(|token| &token.kind) {
            Some(Kind::Plus) => {
                self.advance();
                self.nested(Self::unary)
            }
            Some(Kind::Minus) => {
                self.advance();
                self.nested(Self::unary).map(|operand| -operand)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<f64, ExpressionError> {
        let token = self.advance().ok_or(ExpressionError::UnexpectedEnd)?;
        match token.kind {
            Kind::Number(value) => Ok(value),
            Kind::Ident(name) => match name.as_str() {
                "pi" => Ok(consts::PI),
                "e" => Ok(consts::E),
                _ => Err(ExpressionError::UndefinedIdentifier { name }),
            },
            Kind::Open => {
                let value = self.nested(Self::sum)?;
                match self.advance() {
                    Some(Token {
                        kind: Kind::Close, ..
                    }) => Ok(value),
                    Some(other) => Err(other.unexpected()),
                    None => Err(ExpressionError::UnexpectedEnd),
                }
            }
            Kind::Plus
            | Kind::Minus
            | Kind::Star
            | Kind::Slash
            | Kind::Percent
            | Kind::Close => Err(token.unexpected()),
        }
    }

    fn nested(
        &mut self,
        rule: fn(&mut Self) -> Result<f64, ExpressionError>,
    ) -> Result<f64, ExpressionError> {
        self.descend()?;
        let value = rule(self);
        self.ascend();
        value
    }
}
