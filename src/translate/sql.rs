//! Parameterized SQL `WHERE` fragments

use crate::error::Result;
use crate::predicate::{operand_mismatch, Expression, Operand, Operator, Predicate};
use crate::translate::{compile, Translator};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// SQL flavor to generate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// `$1` placeholders, `ILIKE`, `~` regex
    #[default]
    Postgres,
    /// `?` placeholders, `GLOB`/`LIKE`, `REGEXP`
    Sqlite,
}

/// A SQL condition and its bound parameters, in placeholder order.
///
/// Values never appear inside `sql`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<Value>,
    /// The condition can be NULL for rows with NULL columns
    #[serde(skip)]
    nullable: bool,
}

impl SqlFragment {
    fn new(sql: String, params: Vec<Value>, nullable: bool) -> Self {
        Self {
            sql,
            params,
            nullable,
        }
    }

    fn constant(sql: &str) -> Self {
        Self::new(sql.to_string(), Vec::new(), false)
    }

    /// Whether the condition can be NULL rather than true or false
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

/// Translate an expression to SQL for one dialect
pub fn to_sql(expr: &Expression, dialect: Dialect) -> Result<SqlFragment> {
    compile(expr, &mut SqlTranslator::new(dialect))
}

/// Builds [`SqlFragment`]s; placeholders are numbered across one compile
#[derive(Debug, Clone)]
pub struct SqlTranslator {
    dialect: Dialect,
    bound: usize,
}

#[derive(Clone, Copy)]
enum Position {
    Anywhere,
    Start,
    End,
}

impl SqlTranslator {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect, bound: 0 }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn placeholder(&mut self, value: Value, params: &mut Vec<Value>) -> String {
        self.bound += 1;
        params.push(value);
        match self.dialect {
            Dialect::Postgres => format!("${}", self.bound),
            Dialect::Sqlite => "?".to_string(),
        }
    }

    /// Right-hand side: a placeholder for literals, a column for field refs
    fn rhs(&mut self, p: &Predicate, params: &mut Vec<Value>) -> Result<String> {
        match p.operand() {
            Operand::Value(v) => Ok(self.placeholder(v.clone(), params)),
            Operand::Field(name) => Ok(quote_ident(name)),
            Operand::List(_) => Err(operand_mismatch(p.operator(), p.operand())),
        }
    }

    fn null_safe_eq(&self, negated: bool) -> &'static str {
        match (self.dialect, negated) {
            (Dialect::Postgres, false) => "IS NOT DISTINCT FROM",
            (Dialect::Postgres, true) => "IS DISTINCT FROM",
            (Dialect::Sqlite, false) => "IS",
            (Dialect::Sqlite, true) => "IS NOT",
        }
    }

    fn pattern(
        &mut self,
        p: &Predicate,
        column: &str,
        position: Position,
        params: &mut Vec<Value>,
    ) -> Result<String> {
        let insensitive = p.operator().is_case_insensitive();
        // Sqlite LIKE ignores ASCII case, GLOB does not
        let (keyword, wildcard) = match (self.dialect, insensitive) {
            (Dialect::Postgres, false) => ("LIKE", "%"),
            (Dialect::Postgres, true) => ("ILIKE", "%"),
            (Dialect::Sqlite, false) => ("GLOB", "*"),
            (Dialect::Sqlite, true) => ("LIKE", "%"),
        };
        let escape = if keyword == "LIKE" && self.dialect == Dialect::Sqlite {
            " ESCAPE '\\'"
        } else {
            ""
        };

        match p.operand() {
            Operand::Value(Value::Str(s)) => {
                let escaped = match keyword {
                    "GLOB" => escape_glob(s),
                    _ => escape_like(s),
                };
                let pattern = match position {
                    Position::Anywhere => format!("{wildcard}{escaped}{wildcard}"),
                    Position::Start => format!("{escaped}{wildcard}"),
                    Position::End => format!("{wildcard}{escaped}"),
                };
                let ph = self.placeholder(Value::Str(pattern), params);
                Ok(format!("{column} {keyword} {ph}{escape}"))
            }
            Operand::Field(name) => {
                // The other column is matched literally, as in memory
                let other = match keyword {
                    "GLOB" => escape_glob_column(&quote_ident(name)),
                    _ => escape_like_column(&quote_ident(name)),
                };
                let pattern = match position {
                    Position::Anywhere => format!("'{wildcard}' || {other} || '{wildcard}'"),
                    Position::Start => format!("{other} || '{wildcard}'"),
                    Position::End => format!("'{wildcard}' || {other}"),
                };
                Ok(format!("{column} {keyword} ({pattern}){escape}"))
            }
            _ => Err(operand_mismatch(p.operator(), p.operand())),
        }
    }
}

impl Translator for SqlTranslator {
    type Output = SqlFragment;

    fn predicate(&mut self, p: &Predicate) -> Result<SqlFragment> {
        let column = quote_ident(p.field());
        let mut params = Vec::new();

        let sql = match (p.operator(), p.operand()) {
            (Operator::Exact, Operand::Value(Value::Null)) => format!("{column} IS NULL"),
            (Operator::NotEqual, Operand::Value(Value::Null)) => format!("{column} IS NOT NULL"),
            (Operator::Exact, Operand::Value(_)) => {
                format!("{column} = {}", self.rhs(p, &mut params)?)
            }
            (Operator::Exact, _) => {
                let rhs = self.rhs(p, &mut params)?;
                format!("{column} {} {rhs}", self.null_safe_eq(false))
            }
            (Operator::NotEqual, _) => {
                let rhs = self.rhs(p, &mut params)?;
                format!("{column} {} {rhs}", self.null_safe_eq(true))
            }
            (Operator::IExact, _) => {
                format!("LOWER({column}) = LOWER({})", self.rhs(p, &mut params)?)
            }
            (Operator::Greater, _) => format!("{column} > {}", self.rhs(p, &mut params)?),
            (Operator::GreaterEqual, _) => format!("{column} >= {}", self.rhs(p, &mut params)?),
            (Operator::Less, _) => format!("{column} < {}", self.rhs(p, &mut params)?),
            (Operator::LessEqual, _) => format!("{column} <= {}", self.rhs(p, &mut params)?),
            (Operator::Contains | Operator::IContains, _) => {
                self.pattern(p, &column, Position::Anywhere, &mut params)?
            }
            (Operator::StartsWith | Operator::IStartsWith, _) => {
                self.pattern(p, &column, Position::Start, &mut params)?
            }
            (Operator::EndsWith | Operator::IEndsWith, _) => {
                self.pattern(p, &column, Position::End, &mut params)?
            }
            (Operator::Regex | Operator::IRegex, Operand::Value(Value::Str(pattern))) => {
                let insensitive = p.operator() == Operator::IRegex;
                match self.dialect {
                    Dialect::Postgres => {
                        let op = if insensitive { "~*" } else { "~" };
                        let ph = self.placeholder(Value::Str(pattern.clone()), &mut params);
                        format!("{column} {op} {ph}")
                    }
                    Dialect::Sqlite => {
                        let pattern = if insensitive {
                            format!("(?i){pattern}")
                        } else {
                            pattern.clone()
                        };
                        let ph = self.placeholder(Value::Str(pattern), &mut params);
                        format!("{column} REGEXP {ph}")
                    }
                }
            }
            (Operator::In, Operand::List(items)) if items.is_empty() => "1 = 0".to_string(),
            (Operator::In, Operand::List(items)) => {
                let mut sql = format!("{column} IN (");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    let ph = self.placeholder(item.clone(), &mut params);
                    sql.push_str(&ph);
                }
                sql.push(')');
                sql
            }
            (Operator::IsNull, Operand::Value(Value::Bool(true))) => format!("{column} IS NULL"),
            (Operator::IsNull, Operand::Value(Value::Bool(false))) => {
                format!("{column} IS NOT NULL")
            }
            (op, operand) => return Err(operand_mismatch(op, operand)),
        };

        Ok(SqlFragment::new(sql, params, can_be_unknown(p)))
    }

    fn and(&mut self, parts: Vec<SqlFragment>) -> Result<SqlFragment> {
        Ok(join(parts, " AND ", "1 = 1"))
    }

    fn or(&mut self, parts: Vec<SqlFragment>) -> Result<SqlFragment> {
        Ok(join(parts, " OR ", "1 = 0"))
    }

    /// NULL counts as false before negating, matching in-memory evaluation
    /// where a comparison against a missing or null field is false
    fn not(&mut self, part: SqlFragment) -> Result<SqlFragment> {
        let sql = if part.nullable {
            format!("NOT COALESCE({}, FALSE)", part.sql)
        } else {
            format!("NOT ({})", part.sql)
        };
        Ok(SqlFragment::new(sql, part.params, false))
    }
}

/// Whether the SQL emitted for `p` yields NULL on NULL columns
fn can_be_unknown(p: &Predicate) -> bool {
    match (p.operator(), p.operand()) {
        // IS [NOT] NULL and IS [NOT] DISTINCT FROM
        (Operator::Exact | Operator::NotEqual, Operand::Value(Value::Null)) => false,
        (Operator::Exact, Operand::Field(_)) | (Operator::NotEqual, _) | (Operator::IsNull, _) => {
            false
        }
        (Operator::In, Operand::List(items)) => !items.is_empty(),
        _ => true,
    }
}

fn join(parts: Vec<SqlFragment>, separator: &str, empty: &str) -> SqlFragment {
    match parts.len() {
        0 => SqlFragment::constant(empty),
        1 => parts.into_iter().next().unwrap_or_else(|| SqlFragment::constant(empty)),
        _ => {
            let mut sql = String::from("(");
            let mut params = Vec::new();
            let mut nullable = false;
            for (i, part) in parts.into_iter().enumerate() {
                if i > 0 {
                    sql.push_str(separator);
                }
                sql.push_str(&part.sql);
                params.extend(part.params);
                nullable |= part.nullable;
            }
            sql.push(')');
            SqlFragment::new(sql, params, nullable)
        }
    }
}

/// Double-quote an identifier, doubling embedded quotes
fn quote_ident(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for c in name.chars() {
        if c == '"' {
            quoted.push('"');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// SQL that escapes LIKE wildcards held in a column
fn escape_like_column(column: &str) -> String {
    format!(r"REPLACE(REPLACE(REPLACE({column}, '\', '\\'), '%', '\%'), '_', '\_')")
}

/// SQL that escapes GLOB wildcards held in a column
fn escape_glob_column(column: &str) -> String {
    format!("REPLACE(REPLACE(REPLACE({column}, '[', '[[]'), '*', '[*]'), '?', '[?]')")
}

fn escape_glob(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '*' | '?' | '[' => {
                let _ = write!(out, "[{}]", c);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{and, field_ref, lookup, not, or, parse};
    use crate::value::Record;

    #[test]
    fn test_or_of_equalities() {
        let expr = lookup("restaurant_type", "italian").unwrap()
            | lookup("restaurant_type", "mexican").unwrap();
        let fragment = to_sql(&expr, Dialect::Postgres).unwrap();

        assert_eq!(fragment.sql, r#"("restaurant_type" = $1 OR "restaurant_type" = $2)"#);
        assert_eq!(fragment.params, vec![Value::from("italian"), Value::from("mexican")]);

        let fragment = to_sql(&expr, Dialect::Sqlite).unwrap();
        assert_eq!(fragment.sql, r#"("restaurant_type" = ? OR "restaurant_type" = ?)"#);
    }

    #[test]
    fn test_values_are_never_interpolated() {
        let hostile = "x'; DROP TABLE restaurant; --";
        let fragment = to_sql(&lookup("name", hostile).unwrap(), Dialect::Sqlite).unwrap();
        assert!(!fragment.sql.contains("DROP"));
        assert_eq!(fragment.params, vec![Value::from(hostile)]);
    }

    #[test]
    fn test_pattern_lookups() {
        let grill = to_sql(&lookup("name__icontains", "grill").unwrap(), Dialect::Postgres).unwrap();
        assert_eq!(grill.sql, r#""name" ILIKE $1"#);
        assert_eq!(grill.params, vec![Value::from("%grill%")]);

        let cafe = to_sql(&lookup("name__endswith", "Cafe").unwrap(), Dialect::Postgres).unwrap();
        assert_eq!(cafe.sql, r#""name" LIKE $1"#);
        assert_eq!(cafe.params, vec![Value::from("%Cafe")]);

        let percent = to_sql(&lookup("name__startswith", "100%_").unwrap(), Dialect::Postgres).unwrap();
        assert_eq!(percent.params, vec![Value::from("100\\%\\_%")]);

        let glob = to_sql(&lookup("name__contains", "24/7*").unwrap(), Dialect::Sqlite).unwrap();
        assert_eq!(glob.sql, r#""name" GLOB ?"#);
        assert_eq!(glob.params, vec![Value::from("*24/7[*]*")]);

        let like = to_sql(&lookup("name__istartswith", "the").unwrap(), Dialect::Sqlite).unwrap();
        assert_eq!(like.sql, r#""name" LIKE ? ESCAPE '\'"#);
    }

    #[test]
    fn test_regex_lookups() {
        let digits = to_sql(&lookup("name__regex", "[0-9]+").unwrap(), Dialect::Postgres).unwrap();
        assert_eq!(digits.sql, r#""name" ~ $1"#);
        assert_eq!(digits.params, vec![Value::from("[0-9]+")]);

        let digits = to_sql(&lookup("name__iregex", "cafe$").unwrap(), Dialect::Sqlite).unwrap();
        assert_eq!(digits.sql, r#""name" REGEXP ?"#);
        assert_eq!(digits.params, vec![Value::from("(?i)cafe$")]);
    }

    #[test]
    fn test_field_reference_binds_nothing() {
        let profitable = lookup("income__gt", field_ref("expenditure")).unwrap();
        let fragment = to_sql(&profitable, Dialect::Postgres).unwrap();
        assert_eq!(fragment.sql, r#""income" > "expenditure""#);
        assert!(fragment.params.is_empty());

        let same = lookup("a", field_ref("b")).unwrap();
        assert_eq!(
            to_sql(&same, Dialect::Sqlite).unwrap().sql,
            r#""a" IS "b""#
        );
    }

    #[test]
    fn test_nulls_and_sets() {
        let fragment = to_sql(&lookup("owner", Value::Null).unwrap(), Dialect::Postgres).unwrap();
        assert_eq!(fragment.sql, r#""owner" IS NULL"#);
        assert!(fragment.params.is_empty());

        let fragment = to_sql(&lookup("owner__ne", "Li").unwrap(), Dialect::Postgres).unwrap();
        assert_eq!(fragment.sql, r#""owner" IS DISTINCT FROM $1"#);

        let fragment = to_sql(&lookup("owner__isnull", false).unwrap(), Dialect::Sqlite).unwrap();
        assert_eq!(fragment.sql, r#""owner" IS NOT NULL"#);

        let fragment = to_sql(
            &lookup("rating__in", vec![Value::Int(4), Value::Int(5)]).unwrap(),
            Dialect::Postgres,
        )
        .unwrap();
        assert_eq!(fragment.sql, r#""rating" IN ($1, $2)"#);

        let fragment = to_sql(&lookup("rating__in", Vec::<Value>::new()).unwrap(), Dialect::Postgres).unwrap();
        assert_eq!(fragment.sql, "1 = 0");
    }

    #[test]
    fn test_placeholder_numbering_follows_tree_order() {
        let expr = parse(
            r#"(restaurant_type="italian" | restaurant_type="mexican") & ~date_opened__gte=date("2024-05-01") & name__regex="[0-9]+""#,
        )
        .unwrap();
        let fragment = to_sql(&expr, Dialect::Postgres).unwrap();

        assert_eq!(
            fragment.sql,
            r#"(("restaurant_type" = $1 OR "restaurant_type" = $2) AND NOT COALESCE("date_opened" >= $3, FALSE) AND "name" ~ $4)"#
        );
        assert_eq!(fragment.params.len(), 4);
        assert_eq!(fragment.params[3], Value::from("[0-9]+"));
    }

    #[test]
    fn test_negation_treats_null_as_false() {
        let recent = lookup("date_opened__gte", 5).unwrap();
        let negated = not(recent.clone());

        // In memory a null or missing column fails `gte`, so the negation holds
        assert!(negated.evaluate(&Record::new().with("date_opened", Value::Null)).unwrap());
        assert!(negated.evaluate(&Record::new()).unwrap());

        let fragment = to_sql(&negated, Dialect::Postgres).unwrap();
        assert_eq!(fragment.sql, r#"NOT COALESCE("date_opened" >= $1, FALSE)"#);
        assert!(!fragment.is_nullable());

        let group = not(or([recent.clone(), lookup("name__contains", "Grill").unwrap()]));
        assert_eq!(
            to_sql(&group, Dialect::Sqlite).unwrap().sql,
            r#"NOT COALESCE(("date_opened" >= ? OR "name" GLOB ?), FALSE)"#
        );

        // Already two-valued conditions negate plainly
        let owned = not(lookup("owner__isnull", true).unwrap());
        assert_eq!(to_sql(&owned, Dialect::Postgres).unwrap().sql, r#"NOT ("owner" IS NULL)"#);

        let other = not(lookup("owner__ne", "Li").unwrap());
        assert_eq!(
            to_sql(&other, Dialect::Postgres).unwrap().sql,
            r#"NOT ("owner" IS DISTINCT FROM $1)"#
        );

        let twice = not(not(recent));
        assert_eq!(
            to_sql(&twice, Dialect::Postgres).unwrap().sql,
            r#"NOT (NOT COALESCE("date_opened" >= $1, FALSE))"#
        );

        let mixed = and([lookup("owner__isnull", false).unwrap(), lookup("rating__gt", 3).unwrap()]);
        assert!(to_sql(&mixed, Dialect::Postgres).unwrap().is_nullable());
    }

    #[test]
    fn test_field_reference_patterns_escape_wildcards() {
        let expr = lookup("title__contains", field_ref("tag")).unwrap();

        // A tag of "50%" must match literally, as it does in memory
        let record = Record::new().with("title", "50 off").with("tag", "50%");
        assert!(!expr.evaluate(&record).unwrap());

        assert_eq!(
            to_sql(&expr, Dialect::Postgres).unwrap().sql,
            r#""title" LIKE ('%' || REPLACE(REPLACE(REPLACE("tag", '', '\'), '%', '\%'), '_', '\_') || '%')"#
        );
        assert_eq!(
            to_sql(&expr, Dialect::Sqlite).unwrap().sql,
            r#""title" GLOB ('*' || REPLACE(REPLACE(REPLACE("tag", '[', '[[]'), '*', '[*]'), '?', '[?]') || '*')"#
        );

        let expr = lookup("title__istartswith", field_ref("tag")).unwrap();
        assert_eq!(
            to_sql(&expr, Dialect::Sqlite).unwrap().sql,
            r#""title" LIKE (REPLACE(REPLACE(REPLACE("tag", '', '\'), '%', '\%'), '_', '\_') || '%') ESCAPE ''"#
        );
        assert!(to_sql(&expr, Dialect::Sqlite).unwrap().params.is_empty());
    }

    #[test]
    fn test_empty_groups_and_quoting() {
        assert_eq!(to_sql(&crate::predicate::and([]), Dialect::Postgres).unwrap().sql, "1 = 1");
        assert_eq!(to_sql(&not(or([])), Dialect::Postgres).unwrap().sql, "NOT (1 = 0)");

        let odd = to_sql(&lookup("we\"ird", 1).unwrap(), Dialect::Postgres).unwrap();
        assert_eq!(odd.sql, r#""we""ird" = $1"#);
    }
}
