//! Compiling expressions into backend-specific filters
//!
//! A [`Translator`] supplies one callback per node kind; [`compile`] walks
//! the tree depth-first, left to right, and feeds each callback the
//! already-translated children.

mod sql;

pub use sql::*;

use crate::error::Result;
use crate::predicate::{Expression, Predicate};

/// Per-node callbacks producing a backend fragment of type `Output`
pub trait Translator {
    type Output;

    fn predicate(&mut self, predicate: &Predicate) -> Result<Self::Output>;

    fn and(&mut self, parts: Vec<Self::Output>) -> Result<Self::Output>;

    fn or(&mut self, parts: Vec<Self::Output>) -> Result<Self::Output>;

    fn not(&mut self, part: Self::Output) -> Result<Self::Output>;
}

/// Translate an expression with the given translator
pub fn compile<T: Translator + ?Sized>(expr: &Expression, translator: &mut T) -> Result<T::Output> {
    match expr {
        Expression::Predicate(p) => translator.predicate(p),
        Expression::And(children) => {
            let parts = compile_all(children, translator)?;
            translator.and(parts)
        }
        Expression::Or(children) => {
            let parts = compile_all(children, translator)?;
            translator.or(parts)
        }
        Expression::Not(child) => {
            let part = compile(child, translator)?;
            translator.not(part)
        }
    }
}

fn compile_all<T: Translator + ?Sized>(
    children: &[Expression],
    translator: &mut T,
) -> Result<Vec<T::Output>> {
    children
        .iter()
        .map(|child| compile(child, translator))
        .collect()
}

impl Expression {
    /// Translate this expression; see [`compile`]
    pub fn compile<T: Translator + ?Sized>(&self, translator: &mut T) -> Result<T::Output> {
        compile(self, translator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{lookup, not, or, Evaluator};
    use crate::value::Record;

    type Matcher = Box<dyn Fn(&Record) -> bool>;

    /// Compiles into an in-memory closure
    struct ClosureTranslator;

    impl Translator for ClosureTranslator {
        type Output = Matcher;

        fn predicate(&mut self, predicate: &Predicate) -> Result<Matcher> {
            let expr = Expression::Predicate(predicate.clone());
            Ok(Box::new(move |record| {
                Evaluator::default().evaluate(&expr, record).unwrap_or(false)
            }))
        }

        fn and(&mut self, parts: Vec<Matcher>) -> Result<Matcher> {
            Ok(Box::new(move |record| parts.iter().all(|part| part(record))))
        }

        fn or(&mut self, parts: Vec<Matcher>) -> Result<Matcher> {
            Ok(Box::new(move |record| parts.iter().any(|part| part(record))))
        }

        fn not(&mut self, part: Matcher) -> Result<Matcher> {
            Ok(Box::new(move |record| !part(record)))
        }
    }

    /// Records the visiting order
    #[derive(Default)]
    struct TraceTranslator {
        visited: Vec<String>,
    }

    impl Translator for TraceTranslator {
        type Output = ();

        fn predicate(&mut self, predicate: &Predicate) -> Result<()> {
            self.visited.push(predicate.field().to_string());
            Ok(())
        }

        fn and(&mut self, parts: Vec<()>) -> Result<()> {
            self.visited.push(format!("and/{}", parts.len()));
            Ok(())
        }

        fn or(&mut self, parts: Vec<()>) -> Result<()> {
            self.visited.push(format!("or/{}", parts.len()));
            Ok(())
        }

        fn not(&mut self, _part: ()) -> Result<()> {
            self.visited.push("not".to_string());
            Ok(())
        }
    }

    #[test]
    fn test_closure_translation_matches_evaluation() {
        let expr = or([
            lookup("restaurant_type", "italian").unwrap(),
            not(lookup("name__icontains", "grill").unwrap()),
        ]);
        let matcher = expr.compile(&mut ClosureTranslator).unwrap();

        let records = [
            Record::new().with("restaurant_type", "italian").with("name", "Grill Roma"),
            Record::new().with("restaurant_type", "american").with("name", "The Sports Grill"),
            Record::new().with("restaurant_type", "french").with("name", "Le Petit Cafe"),
        ];
        for record in &records {
            assert_eq!(matcher(record), expr.evaluate(record).unwrap());
        }
    }

    #[test]
    fn test_children_visited_left_to_right() {
        let expr = lookup("a", 1).unwrap()
            & not(lookup("b", 2).unwrap() | lookup("c", 3).unwrap());
        let mut tracer = TraceTranslator::default();
        compile(&expr, &mut tracer).unwrap();
        assert_eq!(tracer.visited, vec!["a", "b", "c", "or/2", "not", "and/2"]);
    }
}
