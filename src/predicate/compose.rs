//! Building and combining expressions

use crate::error::{ComposerError, Result};
use crate::predicate::ast::{Expression, Operand, Operator, Predicate};
use std::ops::{BitAnd, BitOr, Not};

/// Build a leaf expression
pub fn predicate(
    field: impl Into<String>,
    operator: Operator,
    operand: impl Into<Operand>,
) -> Result<Expression> {
    Predicate::new(field, operator, operand).map(Expression::Predicate)
}

/// Build a leaf from a `field__operator` lookup key.
///
/// A key without `__` means `exact`. Otherwise the part after the last `__`
/// must name an operator, so `restaurant__name__regex` targets the field
/// `restaurant__name`.
pub fn lookup(key: &str, operand: impl Into<Operand>) -> Result<Expression> {
    let (field, operator) = match key.rsplit_once("__") {
        Some((field, op)) => (field, op.parse::<Operator>()?),
        None => (key, Operator::Exact),
    };

    if field.is_empty() {
        return Err(ComposerError::InvalidExpression(format!(
            "Lookup without field: {}",
            key
        )));
    }

    predicate(field, operator, operand)
}

/// Conjunction of all expressions, flattening nested ANDs
pub fn and<I: IntoIterator<Item = Expression>>(exprs: I) -> Expression {
    let mut children = Vec::new();
    for expr in exprs {
        match expr {
            Expression::And(nested) => children.extend(nested),
            other => children.push(other),
        }
    }
    Expression::And(children)
}

/// Disjunction of all expressions, flattening nested ORs
pub fn or<I: IntoIterator<Item = Expression>>(exprs: I) -> Expression {
    let mut children = Vec::new();
    for expr in exprs {
        match expr {
            Expression::Or(nested) => children.extend(nested),
            other => children.push(other),
        }
    }
    Expression::Or(children)
}

/// Negation. Double negation is kept as written; see `simplify`.
pub fn not(expr: Expression) -> Expression {
    Expression::Not(Box::new(expr))
}

impl BitAnd for Expression {
    type Output = Expression;

    fn bitand(self, rhs: Expression) -> Expression {
        and([self, rhs])
    }
}

impl BitAnd for &Expression {
    type Output = Expression;

    fn bitand(self, rhs: &Expression) -> Expression {
        and([self.clone(), rhs.clone()])
    }
}

impl BitOr for Expression {
    type Output = Expression;

    fn bitor(self, rhs: Expression) -> Expression {
        or([self, rhs])
    }
}

impl BitOr for &Expression {
    type Output = Expression;

    fn bitor(self, rhs: &Expression) -> Expression {
        or([self.clone(), rhs.clone()])
    }
}

impl Not for Expression {
    type Output = Expression;

    fn not(self) -> Expression {
        not(self)
    }
}

impl Not for &Expression {
    type Output = Expression;

    fn not(self) -> Expression {
        not(self.clone())
    }
}
