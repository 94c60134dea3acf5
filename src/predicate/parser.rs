//! Expression string parser
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr   := term ('|' term)*
//! term   := factor ('&' factor)*
//! factor := ('~' | '!') factor | '(' expr ')' | group | leaf
//! group  := '(' '&' ')' | '(' '|' ')' | '(' factor '&' ')' | '(' factor '|' ')'
//! leaf   := lookup '=' literal
//! ```
//!
//! `group` spells out empty and single-child AND / OR nodes. Nesting through
//! parentheses and negation is limited to [`MAX_NESTING`] levels.
//!
//! Literals: `"quoted"`, integers, floats, `true`, `false`, `null`,
//! `F(field)`, `date("YYYY-MM-DD")`, `[literal, ...]`. A single word
//! without spaces or quotes is taken as a bare string.

use crate::error::{ComposerError, Result};
use crate::predicate::ast::{Expression, Operand};
use crate::predicate::compose::lookup;
use crate::value::Value;
use chrono::NaiveDate;
use smallvec::SmallVec;

/// Deepest accepted nesting of groups and negations
pub const MAX_NESTING: usize = 256;

/// Parse an expression string into a tree.
///
/// Grouping is kept as written: `a & (b & c)` yields a nested AND.
pub fn parse(text: &str) -> Result<Expression> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ComposerError::InvalidExpression(
            "Empty expression".to_string(),
        ));
    }

    let tokens = tokenize(text)?;
    parse_tokens(&tokens, 0)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Leaf(String),
    And,
    Or,
    Not,
    OpenParen,
    CloseParen,
}

fn flush(current: &mut String, tokens: &mut Vec<Token>) {
    let leaf = current.trim();
    if !leaf.is_empty() {
        tokens.push(Token::Leaf(leaf.to_string()));
    }
    current.clear();
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut paren_depth = 0i32;
    // Parentheses and brackets that belong to a leaf literal, e.g. F(x)
    let mut leaf_depth = 0i32;
    let mut in_quote = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quote = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_quote = true;
                current.push(c);
            }
            '(' | '[' if !current.trim().is_empty() => {
                leaf_depth += 1;
                current.push(c);
            }
            ')' | ']' if leaf_depth > 0 => {
                leaf_depth -= 1;
                current.push(c);
            }
            '(' => {
                flush(&mut current, &mut tokens);
                tokens.push(Token::OpenParen);
                paren_depth += 1;
            }
            ')' => {
                flush(&mut current, &mut tokens);
                tokens.push(Token::CloseParen);
                paren_depth -= 1;
                if paren_depth < 0 {
                    return Err(ComposerError::InvalidExpression(
                        "Unbalanced parentheses".to_string(),
                    ));
                }
            }
            '&' if leaf_depth == 0 => {
                flush(&mut current, &mut tokens);
                tokens.push(Token::And);
            }
            '|' if leaf_depth == 0 => {
                flush(&mut current, &mut tokens);
                tokens.push(Token::Or);
            }
            '~' | '!' if leaf_depth == 0 && current.trim().is_empty() => {
                tokens.push(Token::Not);
            }
            _ => current.push(c),
        }
    }

    if in_quote {
        return Err(ComposerError::InvalidExpression(
            "Unterminated string literal".to_string(),
        ));
    }
    if paren_depth != 0 || leaf_depth != 0 {
        return Err(ComposerError::InvalidExpression(
            "Unbalanced parentheses".to_string(),
        ));
    }

    flush(&mut current, &mut tokens);
    Ok(tokens)
}

fn split_at_positions<'t>(tokens: &'t [Token], positions: &[usize]) -> Vec<&'t [Token]> {
    let mut segments = Vec::with_capacity(positions.len() + 1);
    let mut start = 0;
    for &pos in positions {
        segments.push(&tokens[start..pos]);
        start = pos + 1;
    }
    segments.push(&tokens[start..]);
    segments
}

/// Index of the parenthesis closing the one at `tokens[0]`
fn matching_close(tokens: &[Token]) -> Option<usize> {
    let mut depth = 0;
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::OpenParen => depth += 1,
            Token::CloseParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Positions of the `|` and `&` tokens outside any parentheses
fn top_level_operators(tokens: &[Token]) -> (SmallVec<[usize; 4]>, SmallVec<[usize; 4]>) {
    let mut paren_depth = 0;
    let mut or_pos = SmallVec::new();
    let mut and_pos = SmallVec::new();

    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::OpenParen => paren_depth += 1,
            Token::CloseParen => paren_depth -= 1,
            Token::Or if paren_depth == 0 => or_pos.push(i),
            Token::And if paren_depth == 0 => and_pos.push(i),
            _ => {}
        }
    }
    (or_pos, and_pos)
}

fn parse_tokens(tokens: &[Token], depth: usize) -> Result<Expression> {
    if tokens.is_empty() {
        return Err(ComposerError::InvalidExpression(
            "Missing operand".to_string(),
        ));
    }
    if depth > MAX_NESTING {
        return Err(ComposerError::InvalidExpression(format!(
            "Expression nested deeper than {} levels",
            MAX_NESTING
        )));
    }

    // OR binds loosest, then AND
    let (or_pos, and_pos) = top_level_operators(tokens);

    if !or_pos.is_empty() {
        let children = split_at_positions(tokens, &or_pos)
            .into_iter()
            .map(|segment| parse_tokens(segment, depth + 1))
            .collect::<Result<Vec<_>>>()?;
        return Ok(Expression::Or(children));
    }

    if !and_pos.is_empty() {
        let children = split_at_positions(tokens, &and_pos)
            .into_iter()
            .map(|segment| parse_tokens(segment, depth + 1))
            .collect::<Result<Vec<_>>>()?;
        return Ok(Expression::And(children));
    }

    // NOT binds tightest
    if tokens[0] == Token::Not {
        let child = parse_tokens(&tokens[1..], depth + 1)?;
        return Ok(Expression::Not(Box::new(child)));
    }

    // Parenthesized group spanning the whole slice
    if tokens[0] == Token::OpenParen && matching_close(tokens) == Some(tokens.len() - 1) {
        let inner = &tokens[1..tokens.len() - 1];
        return match inner {
            [Token::And] => Ok(Expression::And(Vec::new())),
            [Token::Or] => Ok(Expression::Or(Vec::new())),
            [only @ .., Token::And] => Ok(Expression::And(vec![parse_single(only, depth)?])),
            [only @ .., Token::Or] => Ok(Expression::Or(vec![parse_single(only, depth)?])),
            _ => parse_tokens(inner, depth + 1),
        };
    }

    if let [Token::Leaf(leaf)] = tokens {
        return parse_leaf(leaf);
    }

    Err(ComposerError::InvalidExpression(format!(
        "Cannot parse tokens: {:?}",
        tokens
    )))
}

/// The child of a `(x &)` or `(x |)` group, which must not itself be a
/// bare AND / OR
fn parse_single(tokens: &[Token], depth: usize) -> Result<Expression> {
    let (or_pos, and_pos) = top_level_operators(tokens);
    if !or_pos.is_empty() || !and_pos.is_empty() {
        return Err(ComposerError::InvalidExpression(format!(
            "Dangling operator after: {:?}",
            tokens
        )));
    }
    parse_tokens(tokens, depth + 1)
}

fn parse_leaf(leaf: &str) -> Result<Expression> {
    let (key, literal) = leaf.split_once('=').ok_or_else(|| {
        ComposerError::InvalidExpression(format!("No `=` found in: {}", leaf))
    })?;

    let key = key.trim();
    let valid_key = |c: char| c.is_alphanumeric() || c == '_' || c == '.';
    if key.is_empty() || !key.chars().all(valid_key) {
        return Err(ComposerError::InvalidExpression(format!(
            "Invalid lookup key in: {}",
            leaf
        )));
    }

    lookup(key, parse_operand(literal.trim())?)
}

fn parse_operand(literal: &str) -> Result<Operand> {
    if let Some(inner) = literal.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let values = split_list(inner)?
            .into_iter()
            .map(parse_value)
            .collect::<Result<Vec<_>>>()?;
        return Ok(Operand::List(values));
    }

    if let Some(name) = literal.strip_prefix("F(").and_then(|s| s.strip_suffix(')')) {
        let name = name.trim();
        if name.is_empty() {
            return Err(ComposerError::InvalidExpression(
                "Empty field reference".to_string(),
            ));
        }
        return Ok(Operand::Field(name.to_string()));
    }

    parse_value(literal).map(Operand::Value)
}

fn parse_value(literal: &str) -> Result<Value> {
    let literal = literal.trim();

    if literal.starts_with('"') {
        return parse_quoted(literal).map(Value::Str);
    }

    if let Some(inner) = literal.strip_prefix("date(").and_then(|s| s.strip_suffix(')')) {
        let raw = parse_quoted(inner.trim())?;
        return NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|e| ComposerError::InvalidExpression(format!("Invalid date {}: {}", raw, e)));
    }

    match literal {
        "" => {
            return Err(ComposerError::InvalidExpression(
                "Missing value".to_string(),
            ))
        }
        "null" => return Ok(Value::Null),
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }

    if let Ok(i) = literal.parse::<i64>() {
        return Ok(Value::Int(i));
    }

    if let Ok(x) = literal.parse::<f64>() {
        return Ok(Value::Float(x));
    }

    if literal.contains(|c: char| c.is_whitespace() || matches!(c, '=' | '"' | '(' | ')')) {
        return Err(ComposerError::InvalidExpression(format!(
            "Invalid literal: {}",
            literal
        )));
    }

    // Bare word
    Ok(Value::Str(literal.to_string()))
}

/// Decode a complete `"..."` literal
fn parse_quoted(literal: &str) -> Result<String> {
    let body = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| {
            ComposerError::InvalidExpression(format!("Malformed string literal: {}", literal))
        })?;

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {
                    return Err(ComposerError::InvalidExpression(format!(
                        "Dangling escape in: {}",
                        literal
                    )))
                }
            },
            '"' => {
                return Err(ComposerError::InvalidExpression(format!(
                    "Unescaped quote in: {}",
                    literal
                )))
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Split list items on commas outside quotes
fn split_list(inner: &str) -> Result<Vec<&str>> {
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut items = Vec::new();
    let mut start = 0;
    let mut in_quote = false;
    let mut escaped = false;

    for (i, c) in inner.char_indices() {
        if in_quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quote = false;
            }
            continue;
        }
        match c {
            '"' => in_quote = true,
            ',' => {
                items.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&inner[start..]);

    if items.iter().any(|item| item.trim().is_empty()) {
        return Err(ComposerError::InvalidExpression(format!(
            "Empty list item in: [{}]",
            inner
        )));
    }
    Ok(items)
}
