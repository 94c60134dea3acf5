//! Text form of expressions, readable back by [`parse`](crate::predicate::parse)

use crate::predicate::ast::{Expression, Operand, Operator, Predicate};
use crate::value::Value;
use std::fmt;

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Predicate(p) => write!(f, "{}", p),
            Expression::And(children) => write_group(f, children, "&"),
            Expression::Or(children) => write_group(f, children, "|"),
            Expression::Not(child) => {
                f.write_str("~")?;
                write_nested(f, child)
            }
        }
    }
}

/// Empty and single-child groups carry their connective inside parentheses,
/// `(&)` and `(a=1 &)`, so they read back as groups rather than leaves
fn write_group(f: &mut fmt::Formatter<'_>, children: &[Expression], connective: &str) -> fmt::Result {
    match children {
        [] => write!(f, "({})", connective),
        [only] => {
            f.write_str("(")?;
            write_nested(f, only)?;
            write!(f, " {})", connective)
        }
        _ => {
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    write!(f, " {} ", connective)?;
                }
                write_nested(f, child)?;
            }
            Ok(())
        }
    }
}

/// Groups are parenthesized when nested so the written shape parses back
fn write_nested(f: &mut fmt::Formatter<'_>, expr: &Expression) -> fmt::Result {
    match expr {
        Expression::And(children) | Expression::Or(children) if children.len() > 1 => {
            write!(f, "({})", expr)
        }
        _ => write!(f, "{}", expr),
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())?;
        // A dunder field needs the explicit suffix, or its tail reads as an operator
        if self.operator() != Operator::Exact || self.field().contains("__") {
            write!(f, "__{}", self.operator())?;
        }
        write!(f, "={}", self.operand())
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(v) => write_literal(f, v),
            Operand::Field(name) => write!(f, "F({})", name),
            Operand::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_literal(f, item)?;
                }
                f.write_str("]")
            }
        }
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null => f.write_str("null"),
        Value::Bool(b) => write!(f, "{}", b),
        Value::Int(i) => write!(f, "{}", i),
        // Debug keeps the decimal point, so floats read back as floats
        Value::Float(x) => write!(f, "{:?}", x),
        Value::Str(s) => {
            f.write_str("\"")?;
            for c in s.chars() {
                match c {
                    '"' => f.write_str("\\\"")?,
                    '\\' => f.write_str("\\\\")?,
                    '\n' => f.write_str("\\n")?,
                    '\t' => f.write_str("\\t")?,
                    c => write!(f, "{}", c)?,
                }
            }
            f.write_str("\"")
        }
        Value::Date(d) => write!(f, "date(\"{}\")", d.format("%Y-%m-%d")),
    }
}
