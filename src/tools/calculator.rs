use super::traits::{Tool, ToolResult, required_str};
use serde_json::json;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

const ALLOWED_CHARS: &str = "0123456789+-*/.() ";
const MAX_EXPRESSION_CHARS: usize = 4096;
const MAX_DEPTH: usize = 256;

/// Arithmetic over a fixed character whitelist.
///
/// Accepts `+ - * / // **`, parentheses and unary signs. This narrows the
/// input, it is not a sandbox.
pub struct CalculatorTool;

impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Perform a mathematical calculation. Supports +, -, *, /, parentheses and decimals."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "Arithmetic expression to evaluate, e.g. \"15 * 23\""
                }
            },
            "required": ["expression"]
        })
    }

    fn execute<'a>(
        &'a self,
        args: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ToolResult>> + Send + 'a>> {
        Box::pin(async move {
            let expression = required_str(&args, "expression")?;
            if !expression.chars().all(|ch| ALLOWED_CHARS.contains(ch)) {
                return Ok(ToolResult::failed("Invalid characters in expression"));
            }
            Ok(match evaluate(expression) {
                Ok(value) => ToolResult::ok(format!("Result: {value}")),
                Err(error) => ToolResult::failed(error.to_string()),
            })
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    #[allow(clippy::cast_precision_loss)]
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(value) => value as f64,
            Self::Float(value) => value,
        }
    }

    #[allow(clippy::float_cmp)]
    fn is_zero(self) -> bool {
        match self {
            Self::Int(value) => value == 0,
            Self::Float(value) => value == 0.0,
        }
    }
}

impl fmt::Display for Number {
    #[allow(clippy::float_cmp)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value)
                if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 =>
            {
                write!(f, "{value:.1}")
            }
            Self::Float(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalcError {
    Empty,
    Syntax(String),
    DivisionByZero,
    Overflow,
}

impl fmt::Display for CalcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty expression"),
            Self::Syntax(detail) => write!(f, "invalid syntax: {detail}"),
            Self::DivisionByZero => f.write_str("division by zero"),
            Self::Overflow => f.write_str("numeric overflow"),
        }
    }
}

impl std::error::Error for CalcError {}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(Number),
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, CalcError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            ' ' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::DoubleStar);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                tokens.push(Token::Num(parse_number(&literal)?));
            }
            other => return Err(CalcError::Syntax(format!("unexpected character {other:?}"))),
        }
    }

    Ok(tokens)
}

fn parse_number(literal: &str) -> Result<Number, CalcError> {
    if literal.contains('.') {
        if literal == "." || literal.matches('.').count() > 1 {
            return Err(CalcError::Syntax(format!("bad number {literal:?}")));
        }
        literal
            .parse::<f64>()
            .map(Number::Float)
            .map_err(|_| CalcError::Syntax(format!("bad number {literal:?}")))
    } else {
        literal
            .parse::<i64>()
            .map(Number::Int)
            .map_err(|_| CalcError::Overflow)
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Count one level of recursion; the caller must pair it with `leave`.
    fn enter(&mut self) -> Result<(), CalcError> {
        if self.depth >= MAX_DEPTH {
            return Err(CalcError::Syntax("expression nested too deeply".to_string()));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<Number, CalcError> {
        let mut value = self.term()?;
        while let Some(token @ (Token::Plus | Token::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if token == Token::Plus {
                add(value, rhs)?
            } else {
                sub(value, rhs)?
            };
        }
        Ok(value)
    }

    // term := unary (('*' | '/' | '//') unary)*
    fn term(&mut self) -> Result<Number, CalcError> {
        let mut value = self.unary()?;
        while let Some(token @ (Token::Star | Token::Slash | Token::DoubleSlash)) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = match token {
                Token::Star => mul(value, rhs)?,
                Token::Slash => div(value, rhs)?,
                _ => floor_div(value, rhs)?,
            };
        }
        Ok(value)
    }

    // unary := ('+' | '-') unary | power
    fn unary(&mut self) -> Result<Number, CalcError> {
        self.enter()?;
        let value = match self.peek() {
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            Some(Token::Minus) => {
                self.pos += 1;
                self.unary().and_then(negate)
            }
            _ => self.power(),
        };
        self.leave();
        value
    }

    // power := atom ('**' unary)?
    fn power(&mut self) -> Result<Number, CalcError> {
        let base = self.atom()?;
        if self.peek() == Some(Token::DoubleStar) {
            self.pos += 1;
            let exponent = self.unary()?;
            return pow(base, exponent);
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Number, CalcError> {
        match self.next() {
            Some(Token::Num(value)) => Ok(value),
            Some(Token::LParen) => {
                self.enter()?;
                let value = self.expr();
                self.leave();
                let value = value?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(CalcError::Syntax("expected ')'".to_string())),
                }
            }
            Some(token) => Err(CalcError::Syntax(format!("unexpected {token:?}"))),
            None => Err(CalcError::Syntax("unexpected end of expression".to_string())),
        }
    }
}

fn add(lhs: Number, rhs: Number) -> Result<Number, CalcError> {
    match (lhs, rhs) {
        (Number::Int(a), Number::Int(b)) => {
            a.checked_add(b).map(Number::Int).ok_or(CalcError::Overflow)
        }
        _ => Ok(Number::Float(lhs.as_f64() + rhs.as_f64())),
    }
}

fn sub(lhs: Number, rhs: Number) -> Result<Number, CalcError> {
    match (lhs, rhs) {
        (Number::Int(a), Number::Int(b)) => {
            a.checked_sub(b).map(Number::Int).ok_or(CalcError::Overflow)
        }
        _ => Ok(Number::Float(lhs.as_f64() - rhs.as_f64())),
    }
}

fn mul(lhs: Number, rhs: Number) -> Result<Number, CalcError> {
    match (lhs, rhs) {
        (Number::Int(a), Number::Int(b)) => {
            a.checked_mul(b).map(Number::Int).ok_or(CalcError::Overflow)
        }
        _ => Ok(Number::Float(lhs.as_f64() * rhs.as_f64())),
    }
}

fn div(lhs: Number, rhs: Number) -> Result<Number, CalcError> {
    if rhs.is_zero() {
        return Err(CalcError::DivisionByZero);
    }
    Ok(Number::Float(lhs.as_f64() / rhs.as_f64()))
}

fn floor_div(lhs: Number, rhs: Number) -> Result<Number, CalcError> {
    if rhs.is_zero() {
        return Err(CalcError::DivisionByZero);
    }
    match (lhs, rhs) {
        (Number::Int(a), Number::Int(b)) => {
            let quotient = a.checked_div(b).ok_or(CalcError::Overflow)?;
            let adjust = i64::from(a % b != 0 && (a < 0) != (b < 0));
            Ok(Number::Int(quotient - adjust))
        }
        _ => Ok(Number::Float((lhs.as_f64() / rhs.as_f64()).floor())),
    }
}

fn negate(value: Number) -> Result<Number, CalcError> {
    match value {
        Number::Int(a) => a.checked_neg().map(Number::Int).ok_or(CalcError::Overflow),
        Number::Float(a) => Ok(Number::Float(-a)),
    }
}

fn pow(base: Number, exponent: Number) -> Result<Number, CalcError> {
    if let (Number::Int(b), Number::Int(e)) = (base, exponent)
        && e >= 0
    {
        let e = u32::try_from(e).map_err(|_| CalcError::Overflow)?;
        return b.checked_pow(e).map(Number::Int).ok_or(CalcError::Overflow);
    }
    if base.is_zero() && exponent.as_f64() < 0.0 {
        return Err(CalcError::DivisionByZero);
    }
    let result = base.as_f64().powf(exponent.as_f64());
    if result.is_nan() {
        return Err(CalcError::Syntax("result is not a real number".to_string()));
    }
    if result.is_infinite() {
        return Err(CalcError::Overflow);
    }
    Ok(Number::Float(result))
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expression: &str) -> Result<Number, CalcError> {
    if expression.len() > MAX_EXPRESSION_CHARS {
        return Err(CalcError::Syntax(format!(
            "expression longer than {MAX_EXPRESSION_CHARS} characters"
        )));
    }
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(CalcError::Empty);
    }
    let mut parser = Parser::new(tokens);
    let value = parser.expr()?;
    if let Some(token) = parser.peek() {
        return Err(CalcError::Syntax(format!("unexpected {token:?}")));
    }
    Ok(value)
}
