//! Expression evaluator

use crate::config::{EvalOptions, MissingFieldPolicy};
use crate::error::{ComposerError, Result};
use crate::observer::EvalObserver;
use crate::predicate::ast::{Expression, Operand, Operator, Predicate};
use crate::value::{FieldSource, Value};

static NULL: Value = Value::Null;

/// Evaluates expressions against records with a fixed set of options and
/// an optional observer
#[derive(Clone, Copy, Default)]
pub struct Evaluator<'o> {
    options: EvalOptions,
    observer: Option<&'o dyn EvalObserver>,
}

impl<'o> Evaluator<'o> {
    pub fn new(options: EvalOptions) -> Self {
        Self {
            options,
            observer: None,
        }
    }

    /// Report every predicate and record outcome to `observer`
    pub fn with_observer(mut self, observer: &'o dyn EvalObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    #[inline]
    pub fn options(&self) -> &EvalOptions {
        &self.options
    }

    #[inline]
    pub(crate) fn observer(&self) -> Option<&'o dyn EvalObserver> {
        self.observer
    }

    /// Evaluate an expression against one record
    pub fn evaluate<R: FieldSource + ?Sized>(&self, expr: &Expression, record: &R) -> Result<bool> {
        match expr {
            Expression::Predicate(p) => {
                let matched = self.check_predicate(p, record)?;
                if let Some(observer) = self.observer {
                    observer.on_predicate(p, matched);
                }
                Ok(matched)
            }
            Expression::And(children) => {
                for child in children {
                    if !self.evaluate(child, record)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Expression::Or(children) => {
                for child in children {
                    if self.evaluate(child, record)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Expression::Not(child) => Ok(!self.evaluate(child, record)?),
        }
    }

    fn resolve<'r, R: FieldSource + ?Sized>(&self, record: &'r R, field: &str) -> Result<&'r Value> {
        match record.field(field) {
            Some(value) => Ok(value),
            None => match self.options.missing_field {
                MissingFieldPolicy::Null => Ok(&NULL),
                MissingFieldPolicy::Error => Err(ComposerError::FieldNotFound(field.to_string())),
            },
        }
    }

    fn check_predicate<R: FieldSource + ?Sized>(&self, p: &Predicate, record: &R) -> Result<bool> {
        let value = self.resolve(record, p.field())?;

        let operand = match p.operand() {
            Operand::Value(v) => v,
            Operand::Field(name) => self.resolve(record, name)?,
            Operand::List(items) => return check_in(p, value, items),
        };

        match p.operator() {
            Operator::Exact => equals(p, value, operand),
            Operator::NotEqual => equals(p, value, operand).map(|eq| !eq),
            Operator::Greater => ordered(p, value, operand, |o| o.is_gt()),
            Operator::GreaterEqual => ordered(p, value, operand, |o| o.is_ge()),
            Operator::Less => ordered(p, value, operand, |o| o.is_lt()),
            Operator::LessEqual => ordered(p, value, operand, |o| o.is_le()),
            Operator::IExact => text(p, value, operand, |v, o| v == o),
            Operator::Contains | Operator::IContains => text(p, value, operand, |v, o| v.contains(o)),
            Operator::StartsWith | Operator::IStartsWith => {
                text(p, value, operand, |v, o| v.starts_with(o))
            }
            Operator::EndsWith | Operator::IEndsWith => text(p, value, operand, |v, o| v.ends_with(o)),
            Operator::Regex | Operator::IRegex => Ok(check_regex(p, value)),
            Operator::IsNull => match operand {
                Value::Bool(expected) => Ok(value.is_null() == *expected),
                _ => Err(mismatch(p, value, operand)),
            },
            // List operands returned above
            Operator::In => Err(mismatch(p, value, operand)),
        }
    }
}

fn mismatch(p: &Predicate, value: &Value, operand: &Value) -> ComposerError {
    ComposerError::TypeMismatch {
        field: p.field().to_string(),
        operator: p.operator().as_str(),
        value: value.kind(),
        operand: operand.kind(),
    }
}

fn equals(p: &Predicate, value: &Value, operand: &Value) -> Result<bool> {
    match (value, operand) {
        (Value::Null, Value::Null) => Ok(true),
        (Value::Null, _) | (_, Value::Null) => Ok(false),
        _ if value.is_comparable_with(operand) => Ok(value.loosely_equals(operand)),
        _ => Err(mismatch(p, value, operand)),
    }
}

fn ordered(
    p: &Predicate,
    value: &Value,
    operand: &Value,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<bool> {
    if value.is_null() || operand.is_null() {
        return Ok(false);
    }
    if !value.is_comparable_with(operand) {
        return Err(mismatch(p, value, operand));
    }
    Ok(value.compare(operand).is_some_and(accept))
}

fn text(
    p: &Predicate,
    value: &Value,
    operand: &Value,
    accept: impl Fn(&str, &str) -> bool,
) -> Result<bool> {
    match (value, operand) {
        (Value::Null, _) | (_, Value::Null) => Ok(false),
        (Value::Str(v), Value::Str(o)) if p.operator().is_case_insensitive() => {
            Ok(accept(&v.to_lowercase(), &o.to_lowercase()))
        }
        (Value::Str(v), Value::Str(o)) => Ok(accept(v, o)),
        _ => Err(mismatch(p, value, operand)),
    }
}

fn check_regex(p: &Predicate, value: &Value) -> bool {
    let Some(matcher) = p.matcher() else {
        return false;
    };
    match value {
        Value::Null => false,
        Value::Str(s) => matcher.is_match(s),
        other => matcher.is_match(&other.to_string()),
    }
}

fn check_in(p: &Predicate, value: &Value, items: &[Value]) -> Result<bool> {
    if value.is_null() {
        return Ok(false);
    }
    for item in items {
        if item.is_null() {
            continue;
        }
        if !value.is_comparable_with(item) {
            return Err(mismatch(p, value, item));
        }
        if value.loosely_equals(item) {
            return Ok(true);
        }
    }
    Ok(false)
}

impl Expression {
    /// Evaluate with default options
    pub fn evaluate<R: FieldSource + ?Sized>(&self, record: &R) -> Result<bool> {
        Evaluator::default().evaluate(self, record)
    }
}

/// Evaluate an expression against a record with default options
pub fn evaluate<R: FieldSource + ?Sized>(expr: &Expression, record: &R) -> Result<bool> {
    expr.evaluate(record)
}
