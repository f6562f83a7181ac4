//! Safe arithmetic expression evaluator (C1).
//!
//! Grammar: decimal literals, named identifiers, `+ - * /`, and parentheses.
//! No unary minus, no exponentiation, no function calls, no bitwise ops.
//! Deliberately this small: the repository expresses unit conversions
//! declaratively, so there is never a reason to run anything more expressive
//! than four-function arithmetic against a raw field value.

use std::collections::HashMap;

use crate::error::ExprError;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(src: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
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
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| ExprError::MalformedToken(text.clone()))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::Ident(text));
            }
            other => {
                return Err(ExprError::MalformedToken(other.to_string()));
            }
        }
    }
    Ok(tokens)
}

fn precedence(t: &Token) -> u8 {
    match t {
        Token::Plus | Token::Minus => 1,
        Token::Star | Token::Slash => 2,
        _ => 0,
    }
}

fn is_operator(t: &Token) -> bool {
    matches!(t, Token::Plus | Token::Minus | Token::Star | Token::Slash)
}

fn to_postfix(tokens: Vec<Token>) -> Result<Vec<Token>, ExprError> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut ops: Vec<Token> = Vec::new();

    for tok in tokens {
        match tok {
            Token::Number(_) | Token::Ident(_) => output.push(tok),
            Token::LParen => ops.push(tok),
            Token::RParen => {
                loop {
                    match ops.pop() {
                        Some(Token::LParen) => break,
                        Some(op) => output.push(op),
                        None => return Err(ExprError::UnbalancedParens),
                    }
                }
            }
            ref op if is_operator(op) => {
                while let Some(top) = ops.last() {
                    if is_operator(top) && precedence(top) >= precedence(op) {
                        output.push(ops.pop().unwrap());
                    } else {
                        break;
                    }
                }
                ops.push(tok);
            }
            _ => unreachable!("tokenizer never emits other variants here"),
        }
    }

    while let Some(op) = ops.pop() {
        if matches!(op, Token::LParen | Token::RParen) {
            return Err(ExprError::UnbalancedParens);
        }
        output.push(op);
    }

    Ok(output)
}

fn evaluate_postfix(postfix: &[Token], bindings: &HashMap<String, f64>) -> Result<f64, ExprError> {
    let mut stack: Vec<f64> = Vec::new();

    for tok in postfix {
        match tok {
            Token::Number(n) => stack.push(*n),
            Token::Ident(name) => {
                let v = bindings
                    .get(name)
                    .ok_or_else(|| ExprError::UnknownIdentifier(name.clone()))?;
                stack.push(*v);
            }
            op if is_operator(op) => {
                let b = stack.pop().ok_or(ExprError::ArityMismatch)?;
                let a = stack.pop().ok_or(ExprError::ArityMismatch)?;
                let result = match op {
                    Token::Plus => a + b,
                    Token::Minus => a - b,
                    Token::Star => a * b,
                    Token::Slash => {
                        if b == 0.0 {
                            return Err(ExprError::DivisionByZero);
                        }
                        a / b
                    }
                    _ => unreachable!(),
                };
                stack.push(result);
            }
            _ => unreachable!("parens never reach evaluation"),
        }
    }

    if stack.len() != 1 {
        return Err(ExprError::ArityMismatch);
    }
    Ok(stack[0])
}

/// A parsed arithmetic expression, compiled once at repository-load time and
/// evaluated repeatedly per message. Compiling up front means a malformed
/// `forward_expr`/`reverse_expr` is rejected at load, not on the first
/// message that happens to hit it.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    postfix: Vec<Token>,
    source: String,
}

impl Expr {
    /// Parse and validate an expression string.
    pub fn parse(src: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(src)?;
        if tokens.is_empty() {
            return Err(ExprError::EmptyExpression);
        }
        let postfix = to_postfix(tokens)?;
        Ok(Expr {
            postfix,
            source: src.to_owned(),
        })
    }

    /// The original source text, for logging/diagnostics.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a set of named bindings.
    pub fn eval(&self, bindings: &HashMap<String, f64>) -> Result<f64, ExprError> {
        evaluate_postfix(&self.postfix, bindings)
    }

    /// Convenience: evaluate with a single `value` binding (the common case
    /// for codec conversions, where the raw/packed integer is the only
    /// input).
    pub fn eval_one(&self, var: &str, value: f64) -> Result<f64, ExprError> {
        let mut bindings = HashMap::with_capacity(1);
        bindings.insert(var.to_owned(), value);
        self.eval(&bindings)
    }
}

/// One-shot evaluation without a pre-parsed `Expr`, for ad hoc use.
pub fn evaluate(expr: &str, bindings: &HashMap<String, f64>) -> Result<f64, ExprError> {
    Expr::parse(expr)?.eval(bindings)
}
