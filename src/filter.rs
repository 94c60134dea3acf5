//! Streaming record filtering
//!
//! [`filter_records`] wraps any iterator of records and yields only the
//! matching ones, in input order, evaluating lazily as it is pulled. The
//! filter is `Clone` whenever its source is, so a filter over a slice can
//! be restarted. [`RecordSet::find`] is the read-only entry point for code
//! that owns an in-memory collection.

use crate::error::Result;
use crate::predicate::{Evaluator, Expression};
use crate::value::{FieldSource, Record};
use serde::{Deserialize, Serialize};
use std::slice;

/// Lazy iterator over the records matching an expression.
///
/// Yields `Err` for a record whose evaluation fails and then continues;
/// collecting into `Result<Vec<_>>` stops at the first error.
#[derive(Clone)]
pub struct Filter<'a, I> {
    expression: &'a Expression,
    evaluator: Evaluator<'a>,
    records: I,
}

impl<'a, I> Filter<'a, I> {
    pub fn new(expression: &'a Expression, evaluator: Evaluator<'a>, records: I) -> Self {
        Self {
            expression,
            evaluator,
            records,
        }
    }
}

impl<'a, I> Iterator for Filter<'a, I>
where
    I: Iterator,
    I::Item: FieldSource,
{
    type Item = Result<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        for record in self.records.by_ref() {
            let matched = match self.evaluator.evaluate(self.expression, &record) {
                Ok(matched) => matched,
                Err(e) => return Some(Err(e)),
            };
            if let Some(observer) = self.evaluator.observer() {
                observer.on_record(matched);
            }
            if matched {
                return Some(Ok(record));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.records.size_hint().1)
    }
}

/// Filter records with default evaluation options
pub fn filter_records<'a, I>(expression: &'a Expression, records: I) -> Filter<'a, I::IntoIter>
where
    I: IntoIterator,
    I::Item: FieldSource,
{
    Filter::new(expression, Evaluator::default(), records.into_iter())
}

impl<'o> Evaluator<'o> {
    /// Filter records with this evaluator's options and observer
    pub fn filter<I>(&self, expression: &'o Expression, records: I) -> Filter<'o, I::IntoIter>
    where
        I: IntoIterator,
        I::Item: FieldSource,
    {
        Filter::new(expression, *self, records.into_iter())
    }
}

/// An in-memory collection of records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Parse a JSON array of flat objects
    pub fn from_json_str(json: &str) -> Result<Self> {
        let rows: Vec<serde_json::Value> = serde_json::from_str(json)?;
        rows.iter()
            .map(Record::from_json)
            .collect::<Result<Vec<_>>>()
            .map(Self::from)
    }

    /// Records matching `expression`, lazily, in insertion order
    pub fn find<'a>(&'a self, expression: &'a Expression) -> Filter<'a, slice::Iter<'a, Record>> {
        filter_records(expression, &self.records)
    }

    /// Same as [`find`](Self::find) with an explicit evaluator
    pub fn find_with<'a>(
        &'a self,
        expression: &'a Expression,
        evaluator: Evaluator<'a>,
    ) -> Filter<'a, slice::Iter<'a, Record>> {
        Filter::new(expression, evaluator, self.records.iter())
    }

    /// Collect all matches, failing on the first evaluation error
    pub fn find_all<'a>(&'a self, expression: &'a Expression) -> Result<Vec<&'a Record>> {
        self.find(expression).collect()
    }

    pub fn count(&self, expression: &Expression) -> Result<usize> {
        self.find(expression)
            .try_fold(0, |n, record| record.map(|_| n + 1))
    }
}

impl From<Vec<Record>> for RecordSet {
    fn from(records: Vec<Record>) -> Self {
        Self { records }
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Record;
    type IntoIter = slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvalOptions;
    use crate::error::ComposerError;
    use crate::observer::CountingObserver;
    use crate::predicate::{field_ref, lookup, not, parse, predicate, Operator};
    use crate::value::Value;
    use chrono::NaiveDate;

    fn restaurants() -> RecordSet {
        RecordSet::from_json_str(
            r#"[
                {"name": "Mario's Italian Kitchen", "restaurant_type": "italian"},
                {"name": "Taco Bell Express", "restaurant_type": "mexican"},
                {"name": "Dragon Wok", "restaurant_type": "chinese"}
            ]"#,
        )
        .unwrap()
    }

    fn names<'a>(records: &[&'a Record]) -> Vec<&'a str> {
        records
            .iter()
            .copied()
            .filter_map(|r| r.get("name").and_then(Value::as_str))
            .collect()
    }

    #[test]
    fn test_italian_or_mexican() {
        let set = restaurants();
        let expr = predicate("restaurant_type", Operator::Exact, "italian").unwrap()
            | predicate("restaurant_type", Operator::Exact, "mexican").unwrap();

        let found = set.find_all(&expr).unwrap();
        assert_eq!(names(&found), vec!["Mario's Italian Kitchen", "Taco Bell Express"]);
    }

    #[test]
    fn test_name_has_digit() {
        let set: RecordSet = ["Pizza Palace 123", "Sunset Cafe"]
            .into_iter()
            .map(|name| Record::new().with("name", name))
            .collect();
        let expr = predicate("name", Operator::Regex, "[0-9]+").unwrap();

        assert_eq!(names(&set.find_all(&expr).unwrap()), vec!["Pizza Palace 123"]);
    }

    #[test]
    fn test_profitable_sales() {
        let sales: RecordSet = vec![
            Record::new().with("income", 5000).with("expenditure", 3000),
            Record::new().with("income", 1500).with("expenditure", 1800),
        ]
        .into();
        let profitable = predicate("income", Operator::Greater, field_ref("expenditure")).unwrap();

        let found = set_values(&sales.find_all(&profitable).unwrap(), "income");
        assert_eq!(found, vec![Value::Int(5000)]);
    }

    fn set_values(records: &[&Record], field: &str) -> Vec<Value> {
        records.iter().filter_map(|r| r.get(field).cloned()).collect()
    }

    #[test]
    fn test_demo_combinations() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 6, d).unwrap();
        let set: RecordSet = vec![
            Record::new().with("name", "Pizza Palace 123").with("restaurant_type", "italian").with("date_opened", day(20)),
            Record::new().with("name", "The Sports Grill").with("restaurant_type", "american").with("date_opened", day(1)),
            Record::new().with("name", "Burger Grill 24/7").with("restaurant_type", "american").with("date_opened", day(25)),
            Record::new().with("name", "Le Petit Cafe").with("restaurant_type", "french").with("date_opened", day(2)),
        ]
        .into();

        let last_30_days = lookup("date_opened__gte", day(15)).unwrap();
        let italian_mexican = parse(r#"restaurant_type="italian" | restaurant_type="mexican""#).unwrap();

        let recent_or_italian = &italian_mexican | &last_30_days;
        assert_eq!(
            names(&set.find_all(&recent_or_italian).unwrap()),
            vec!["Pizza Palace 123", "Burger Grill 24/7"]
        );

        let older_grills = lookup("name__icontains", "grill").unwrap() & not(last_30_days.clone());
        assert_eq!(names(&set.find_all(&older_grills).unwrap()), vec!["The Sports Grill"]);

        let cafes = lookup("name__endswith", "Cafe").unwrap();
        assert_eq!(set.count(&cafes).unwrap(), 1);

        // Operands survive composition untouched
        assert_eq!(last_30_days, lookup("date_opened__gte", day(15)).unwrap());
    }

    #[test]
    fn test_filter_is_lazy_and_restartable() {
        let set = restaurants();
        let expr = lookup("restaurant_type__in", vec![Value::from("italian"), Value::from("chinese")]).unwrap();

        let mut filter = set.find(&expr);
        let restart = filter.clone();

        let first = filter.next().unwrap().unwrap();
        assert_eq!(first.get("restaurant_type"), Some(&Value::from("italian")));

        let all: Vec<_> = restart.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(all.len(), 2);

        let remaining: Vec<_> = filter.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[test]
    fn test_filter_consumes_only_what_is_requested() {
        let mut pulled = 0;
        let source = (0..1_000).map(|i| {
            pulled += 1;
            Record::new().with("id", i)
        });
        let expr = lookup("id__gte", 10).unwrap();

        let first_two: Vec<_> = filter_records(&expr, source).take(2).collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(first_two.len(), 2);
        assert_eq!(pulled, 12);
    }

    #[test]
    fn test_filter_surfaces_errors() {
        let set = restaurants();
        let strict = Evaluator::new(EvalOptions::strict());
        let expr = lookup("rating__gt", 3).unwrap();

        let mut filter = set.find_with(&expr, strict);
        assert!(matches!(filter.next(), Some(Err(ComposerError::FieldNotFound(_)))));

        let err = set.find_with(&expr, strict).collect::<Result<Vec<_>>>().unwrap_err();
        assert!(matches!(err, ComposerError::FieldNotFound(f) if f == "rating"));
    }

    #[test]
    fn test_observer_counts_records() {
        let set = restaurants();
        let observer = CountingObserver::new();
        let evaluator = Evaluator::default().with_observer(&observer);
        let expr = lookup("name__icontains", "o").unwrap();

        let found = evaluator.filter(&expr, &set).collect::<Result<Vec<_>>>().unwrap();
        let counts = observer.counts();
        assert_eq!(counts.records, 3);
        assert_eq!(counts.matched, found.len());
        assert_eq!(counts.predicates, 3);
    }
}
