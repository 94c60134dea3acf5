//! Canonicalizing simplification pass

use crate::predicate::ast::Expression;

impl Expression {
    /// Return a canonical, semantically identical tree.
    ///
    /// Collapses double negation, flattens nested and single-child AND/OR,
    /// and drops structurally equal duplicate children (first one wins).
    /// Applying it twice gives the same tree as applying it once.
    pub fn simplify(&self) -> Expression {
        match self {
            Expression::Predicate(_) => self.clone(),
            Expression::Not(child) => match child.simplify() {
                Expression::Not(inner) => *inner,
                other => Expression::Not(Box::new(other)),
            },
            Expression::And(children) => simplify_group(children, true),
            Expression::Or(children) => simplify_group(children, false),
        }
    }
}

/// Simplify an expression; see [`Expression::simplify`]
pub fn simplify(expr: &Expression) -> Expression {
    expr.simplify()
}

fn simplify_group(children: &[Expression], is_and: bool) -> Expression {
    let mut flat: Vec<Expression> = Vec::with_capacity(children.len());

    for child in children {
        match (child.simplify(), is_and) {
            (Expression::And(nested), true) | (Expression::Or(nested), false) => {
                for grandchild in nested {
                    push_distinct(&mut flat, grandchild);
                }
            }
            (other, _) => push_distinct(&mut flat, other),
        }
    }

    if flat.len() == 1 {
        if let Some(only) = flat.pop() {
            return only;
        }
    }

    if is_and {
        Expression::And(flat)
    } else {
        Expression::Or(flat)
    }
}

#[inline]
fn push_distinct(flat: &mut Vec<Expression>, expr: Expression) {
    if !flat.contains(&expr) {
        flat.push(expr);
    }
}
