//! Predicate and expression tree types

use crate::error::{ComposerError, Result};
use crate::value::Value;
use chrono::NaiveDate;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Comparison operators, named after their lookup suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// Equal (exact, alias eq)
    #[serde(rename = "exact", alias = "eq")]
    Exact,
    /// Case-insensitive equal (iexact)
    #[serde(rename = "iexact")]
    IExact,
    /// Not equal (ne)
    #[serde(rename = "ne")]
    NotEqual,
    /// Greater than (gt)
    #[serde(rename = "gt")]
    Greater,
    /// Greater than or equal (gte)
    #[serde(rename = "gte")]
    GreaterEqual,
    /// Less than (lt)
    #[serde(rename = "lt")]
    Less,
    /// Less than or equal (lte)
    #[serde(rename = "lte")]
    LessEqual,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "icontains")]
    IContains,
    #[serde(rename = "startswith")]
    StartsWith,
    #[serde(rename = "istartswith")]
    IStartsWith,
    #[serde(rename = "endswith")]
    EndsWith,
    #[serde(rename = "iendswith")]
    IEndsWith,
    /// Unanchored regex search
    #[serde(rename = "regex")]
    Regex,
    #[serde(rename = "iregex")]
    IRegex,
    /// Set membership
    #[serde(rename = "in")]
    In,
    #[serde(rename = "isnull")]
    IsNull,
}

impl Operator {
    pub const ALL: [Operator; 17] = [
        Operator::Exact,
        Operator::IExact,
        Operator::NotEqual,
        Operator::Greater,
        Operator::GreaterEqual,
        Operator::Less,
        Operator::LessEqual,
        Operator::Contains,
        Operator::IContains,
        Operator::StartsWith,
        Operator::IStartsWith,
        Operator::EndsWith,
        Operator::IEndsWith,
        Operator::Regex,
        Operator::IRegex,
        Operator::In,
        Operator::IsNull,
    ];

    /// Lookup name of the operator
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Exact => "exact",
            Operator::IExact => "iexact",
            Operator::NotEqual => "ne",
            Operator::Greater => "gt",
            Operator::GreaterEqual => "gte",
            Operator::Less => "lt",
            Operator::LessEqual => "lte",
            Operator::Contains => "contains",
            Operator::IContains => "icontains",
            Operator::StartsWith => "startswith",
            Operator::IStartsWith => "istartswith",
            Operator::EndsWith => "endswith",
            Operator::IEndsWith => "iendswith",
            Operator::Regex => "regex",
            Operator::IRegex => "iregex",
            Operator::In => "in",
            Operator::IsNull => "isnull",
        }
    }

    #[inline]
    pub fn is_case_insensitive(self) -> bool {
        matches!(
            self,
            Operator::IExact
                | Operator::IContains
                | Operator::IStartsWith
                | Operator::IEndsWith
                | Operator::IRegex
        )
    }

    fn expected_operand(self) -> &'static str {
        match self {
            Operator::Exact | Operator::NotEqual => "a scalar or field reference",
            Operator::Greater | Operator::GreaterEqual | Operator::Less | Operator::LessEqual => {
                "a number, string, date or field reference"
            }
            Operator::IExact
            | Operator::Contains
            | Operator::IContains
            | Operator::StartsWith
            | Operator::IStartsWith
            | Operator::EndsWith
            | Operator::IEndsWith => "a string or field reference",
            Operator::Regex | Operator::IRegex => "a pattern string",
            Operator::In => "a list",
            Operator::IsNull => "a bool",
        }
    }
}

impl FromStr for Operator {
    type Err = ComposerError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "eq" {
            return Ok(Operator::Exact);
        }
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| ComposerError::InvalidOperator(s.to_string()))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    /// Literal value
    Value(Value),
    /// Another field of the same record
    Field(String),
    /// Set of literal values for `in`
    List(Vec<Value>),
}

impl Operand {
    pub fn kind(&self) -> &'static str {
        match self {
            Operand::Value(v) => v.kind(),
            Operand::Field(_) => "field reference",
            Operand::List(_) => "list",
        }
    }

    /// Build a list operand from anything convertible to values
    pub fn list<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Operand::List(values.into_iter().map(Into::into).collect())
    }
}

/// Reference another field of the record being tested
pub fn field_ref(name: impl Into<String>) -> Operand {
    Operand::Field(name.into())
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Operand::Value(Value::from(s))
    }
}

impl From<String> for Operand {
    fn from(s: String) -> Self {
        Operand::Value(Value::Str(s))
    }
}

impl From<i64> for Operand {
    fn from(i: i64) -> Self {
        Operand::Value(Value::Int(i))
    }
}

impl From<i32> for Operand {
    fn from(i: i32) -> Self {
        Operand::Value(Value::from(i))
    }
}

impl From<f64> for Operand {
    fn from(x: f64) -> Self {
        Operand::Value(Value::Float(x))
    }
}

impl From<bool> for Operand {
    fn from(b: bool) -> Self {
        Operand::Value(Value::Bool(b))
    }
}

impl From<NaiveDate> for Operand {
    fn from(d: NaiveDate) -> Self {
        Operand::Value(Value::Date(d))
    }
}

impl From<Vec<Value>> for Operand {
    fn from(values: Vec<Value>) -> Self {
        Operand::List(values)
    }
}

pub(crate) fn operand_mismatch(operator: Operator, operand: &Operand) -> ComposerError {
    ComposerError::TypeOperandMismatch {
        operator: operator.as_str(),
        expected: operator.expected_operand(),
        found: operand.kind(),
    }
}

/// A validated leaf condition: field, operator, operand.
///
/// Regex patterns are compiled once, when the predicate is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "PredicateRepr", into = "PredicateRepr")]
pub struct Predicate {
    field: String,
    operator: Operator,
    operand: Operand,
    matcher: Option<Regex>,
}

impl Predicate {
    pub fn new(field: impl Into<String>, operator: Operator, operand: impl Into<Operand>) -> Result<Self> {
        let field = field.into();
        if field.is_empty() {
            return Err(ComposerError::InvalidExpression(
                "Predicate without field".to_string(),
            ));
        }
        let operand = operand.into();
        let matcher = validate(operator, &operand)?;
        Ok(Self {
            field,
            operator,
            operand,
            matcher,
        })
    }

    #[inline]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[inline]
    pub fn operator(&self) -> Operator {
        self.operator
    }

    #[inline]
    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    #[inline]
    pub(crate) fn matcher(&self) -> Option<&Regex> {
        self.matcher.as_ref()
    }
}

/// Structural equality; the compiled regex follows from the operand
impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field && self.operator == other.operator && self.operand == other.operand
    }
}

fn validate(operator: Operator, operand: &Operand) -> Result<Option<Regex>> {
    use Operator::*;

    match (operator, operand) {
        (Exact | NotEqual, Operand::Value(_) | Operand::Field(_)) => Ok(None),
        (Greater | GreaterEqual | Less | LessEqual, Operand::Field(_)) => Ok(None),
        (
            Greater | GreaterEqual | Less | LessEqual,
            Operand::Value(Value::Int(_) | Value::Float(_) | Value::Str(_) | Value::Date(_)),
        ) => Ok(None),
        (
            IExact | Contains | IContains | StartsWith | IStartsWith | EndsWith | IEndsWith,
            Operand::Value(Value::Str(_)) | Operand::Field(_),
        ) => Ok(None),
        (Regex | IRegex, Operand::Value(Value::Str(pattern))) => RegexBuilder::new(pattern)
            .case_insensitive(operator == IRegex)
            .build()
            .map(Some)
            .map_err(|source| ComposerError::RegexCompile {
                pattern: pattern.clone(),
                source,
            }),
        (In, Operand::List(_)) => Ok(None),
        (IsNull, Operand::Value(Value::Bool(_))) => Ok(None),
        _ => Err(operand_mismatch(operator, operand)),
    }
}

/// Serialized form of a predicate
#[derive(Serialize, Deserialize)]
struct PredicateRepr {
    field: String,
    op: Operator,
    operand: Operand,
}

impl TryFrom<PredicateRepr> for Predicate {
    type Error = ComposerError;

    fn try_from(repr: PredicateRepr) -> Result<Self> {
        Predicate::new(repr.field, repr.op, repr.operand)
    }
}

impl From<Predicate> for PredicateRepr {
    fn from(p: Predicate) -> Self {
        PredicateRepr {
            field: p.field,
            op: p.operator,
            operand: p.operand,
        }
    }
}

/// A boolean filter expression.
///
/// Trees are never mutated by composition: `and`, `or`, `not` and the
/// `&`, `|`, `!` operators all build new nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    /// Leaf condition
    Predicate(Predicate),
    /// All children hold; empty is `true`
    And(Vec<Expression>),
    /// Any child holds; empty is `false`
    Or(Vec<Expression>),
    /// Negation of the single child
    Not(Box<Expression>),
}

impl Expression {
    #[inline]
    pub fn is_predicate(&self) -> bool {
        matches!(self, Expression::Predicate(_))
    }

    /// Field names referenced anywhere in the tree, including field-ref
    /// operands, in first-seen order
    pub fn fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        collect_fields(self, &mut fields);
        fields
    }

    /// Number of predicates in the tree
    pub fn predicate_count(&self) -> usize {
        match self {
            Expression::Predicate(_) => 1,
            Expression::And(children) | Expression::Or(children) => {
                children.iter().map(Expression::predicate_count).sum()
            }
            Expression::Not(child) => child.predicate_count(),
        }
    }
}

fn collect_fields<'a>(expr: &'a Expression, fields: &mut Vec<&'a str>) {
    fn push_unique<'a>(fields: &mut Vec<&'a str>, name: &'a str) {
        if !fields.contains(&name) {
            fields.push(name);
        }
    }

    match expr {
        Expression::Predicate(p) => {
            push_unique(fields, p.field());
            if let Operand::Field(other) = p.operand() {
                push_unique(fields, other);
            }
        }
        Expression::And(children) | Expression::Or(children) => {
            for child in children {
                collect_fields(child, fields);
            }
        }
        Expression::Not(child) => collect_fields(child, fields),
    }
}

impl From<Predicate> for Expression {
    fn from(p: Predicate) -> Self {
        Expression::Predicate(p)
    }
}
