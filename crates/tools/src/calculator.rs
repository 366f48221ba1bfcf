//! Calculator tool — evaluates arithmetic expressions.
//!
//! Supports `+`, `-`, `*`, `/`, parentheses, decimals and unary negation
//! through a small recursive-descent parser.

use async_trait::async_trait;
use clawloop_core::error::ToolError;
use clawloop_core::state::AgentState;
use clawloop_core::tool::{Tool, ToolMetadata};
use serde_json::{Value, json};

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports +, -, *, /, parentheses, and decimal numbers."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The expression to evaluate, e.g. '(2 + 3) * 4'"
                }
            },
            "required": ["expression"]
        })
    }

    fn example(&self) -> Option<&str> {
        Some(r#"{"expression":"(2 + 3) * 4"}"#)
    }

    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::category("math").with_version("0.1")
    }

    async fn execute(&self, arguments: Value, _state: &AgentState) -> Result<Value, ToolError> {
        let expr = arguments["expression"]
            .as_str()
            .ok_or_else(|| ToolError::ArgumentDecode {
                tool_name: self.name().into(),
                reason: "missing 'expression' argument".into(),
            })?;

        let value = evaluate(expr).map_err(|e| ToolError::failed(self.name(), e))?;
        Ok(json!({ "result": value, "formatted": format_number(value) }))
    }
}

/// Render integral values without a trailing `.0`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

// ── Recursive-descent evaluator ─────────────────────────────────────────

/// Evaluate an arithmetic expression.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser { tokens: &tokens, pos: 0 };
    let value = parser.expr()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(value),
        Some(tok) => Err(format!("Unexpected token at position {}: {tok:?}", parser.pos)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Op(char),
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '+' | '-' | '*' | '/' => Token::Op(c),
            '(' => Token::Open,
            ')' => Token::Close,
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, d)) = chars.peek() {
                    if !(d.is_ascii_digit() || d == '.') {
                        break;
                    }
                    end = i + d.len_utf8();
                    chars.next();
                }
                let literal = &input[start..end];
                Token::Num(
                    literal
                        .parse()
                        .map_err(|_| format!("Invalid number: {literal}"))?,
                )
            }
            c => return Err(format!("Unexpected character: '{c}'")),
        };
        tokens.push(token);
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl Parser<'_> {
    fn next_if_op(&mut self, ops: &[char]) -> Option<char> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(op)) if ops.contains(op) => {
                self.pos += 1;
                Some(*op)
            }
            _ => None,
        }
    }

    // expr = term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, String> {
        let mut acc = self.term()?;
        while let Some(op) = self.next_if_op(&['+', '-']) {
            let rhs = self.term()?;
            acc = if op == '+' { acc + rhs } else { acc - rhs };
        }
        Ok(acc)
    }

    // term = unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<f64, String> {
        let mut acc = self.unary()?;
        while let Some(op) = self.next_if_op(&['*', '/']) {
            let rhs = self.unary()?;
            if op == '*' {
                acc *= rhs;
            } else if rhs == 0.0 {
                return Err("Division by zero".into());
            } else {
                acc /= rhs;
            }
        }
        Ok(acc)
    }

    // unary = '-' unary | primary
    fn unary(&mut self) -> Result<f64, String> {
        if self.next_if_op(&['-']).is_some() {
            return Ok(-self.unary()?);
        }
        self.primary()
    }

    // primary = NUMBER | '(' expr ')'
    fn primary(&mut self) -> Result<f64, String> {
        let token = self.tokens.get(self.pos).copied();
        self.pos += 1;
        match token {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::Open) => {
                let value = self.expr()?;
                match self.tokens.get(self.pos) {
                    Some(Token::Close) => {
                        self.pos += 1;
                        Ok(value)
                    }
                    _ => Err("Expected closing parenthesis".into()),
                }
            }
            Some(tok) => Err(format!("Unexpected token: {tok:?}")),
            None => Err("Unexpected end of expression".into()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
