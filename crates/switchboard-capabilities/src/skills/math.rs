//! The `math` skill: arithmetic on a spoken expression.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '%') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := primary (('**' | '^') unary)?
//! primary := number | '(' expr ')'
//! ```
//!
//! Power is right-associative and binds tighter than unary minus, so
//! `-2 ** 2` is `-4`.

use serde_json::Value;
use switchboard_types::{FunctionResult, ParamType, ParameterSpec};

use super::config_object;
use crate::capability::{Capability, LocalHandler};
use crate::error::{HandlerError, SkillError};

const SKILL: &str = "math";
const MAX_EXPRESSION_LEN: usize = 256;
const MAX_DEPTH: usize = 32;

pub(super) fn capabilities(config: &Value) -> Result<Vec<Capability>, SkillError> {
    config_object(SKILL, config)?;

    Ok(vec![Capability::skill(
        SKILL,
        config,
        "calculate",
        "Evaluate an arithmetic expression. Supports + - * / % ** and parentheses.",
        vec![ParameterSpec::new(
            "expression",
            ParamType::String,
            "The expression to evaluate, e.g. (12 + 3) * 4",
            true,
        )],
        LocalHandler::new(|args, _| async move {
            let expression = args
                .get("expression")
                .and_then(Value::as_str)
                .unwrap_or_default();
            match evaluate(expression) {
                Ok(value) => Ok(FunctionResult::new(format!(
                    "{} equals {}.",
                    expression.trim(),
                    format_number(value)
                ))),
                Err(err) => Err(HandlerError::spoken(
                    format!("could not evaluate '{expression}': {err}"),
                    format!("I couldn't calculate that: {err}."),
                )),
            }
        }),
    )])
}

/// Why an expression could not be evaluated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MathError {
    #[error("the expression is empty")]
    Empty,
    #[error("the expression is too long")]
    TooLong,
    #[error("the expression is nested too deeply")]
    TooDeep,
    #[error("unexpected '{0}'")]
    Unexpected(String),
    #[error("the expression ended too early")]
    UnexpectedEnd,
    #[error("division by zero")]
    DivisionByZero,
    #[error("the result is not a finite number")]
    NotFinite,
}

/// Evaluates an arithmetic expression.
pub fn evaluate(expression: &str) -> Result<f64, MathError> {
    if expression.len() > MAX_EXPRESSION_LEN {
        return Err(MathError::TooLong);
    }
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(MathError::Empty);
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(token) = parser.peek() {
        return Err(MathError::Unexpected(token.to_string()));
    }
    if !value.is_finite() {
        return Err(MathError::NotFinite);
    }
    Ok(value)
}

/// Integers print without a decimal point; other values are rounded to
/// six places with trailing zeros removed.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let text = format!("{value:.6}");
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Power,
    Open,
    Close,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Percent => f.write_str("%"),
            Token::Power => f.write_str("**"),
            Token::Open => f.write_str("("),
            Token::Close => f.write_str(")"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, MathError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &input[start..end];
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| MathError::Unexpected(literal.to_string()))?;
                tokens.push(Token::Number(number));
            }
            '*' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, '*'))) {
                    chars.next();
                    tokens.push(Token::Power);
                } else {
                    tokens.push(Token::Star);
                }
            }
            _ => {
                chars.next();
                tokens.push(match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '^' => Token::Power,
                    '(' => Token::Open,
                    ')' => Token::Close,
                    other => return Err(MathError::Unexpected(other.to_string())),
                });
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn descend(&mut self) -> Result<(), MathError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(MathError::TooDeep);
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<f64, MathError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, MathError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    value *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(MathError::DivisionByZero);
                    }
                    value /= divisor;
                }
                Some(Token::Percent) => {
                    self.pos += 1;
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(MathError::DivisionByZero);
                    }
                    value %= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<f64, MathError> {
        self.descend()?;
        let value = match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                -self.unary()?
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()?
            }
            _ => self.power()?,
        };
        self.depth -= 1;
        Ok(value)
    }

    fn power(&mut self) -> Result<f64, MathError> {
        let base = self.primary()?;
        if matches!(self.peek(), Some(Token::Power)) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64, MathError> {
        match self.next().cloned() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Open) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(value),
                    Some(other) => Err(MathError::Unexpected(other.to_string())),
                    None => Err(MathError::UnexpectedEnd),
                }
            }
            Some(other) => Err(MathError::Unexpected(other.to_string())),
            None => Err(MathError::UnexpectedEnd),
        }
    }
}
