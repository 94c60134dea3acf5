//! Predicate Composer - composable boolean filters over records
//!
//! Build leaf predicates (`name__icontains="grill"`, `income > F(expenditure)`),
//! combine them with AND / OR / NOT, then evaluate the tree against in-memory
//! records or compile it into a backend filter such as a parameterized SQL
//! `WHERE` clause.
//!
//! ```
//! use predicate_composer::{field_ref, lookup, Record, RecordSet};
//!
//! let sales: RecordSet = vec![
//!     Record::new().with("income", 5000).with("expenditure", 3000),
//!     Record::new().with("income", 1500).with("expenditure", 1800),
//! ]
//! .into();
//!
//! let profitable = lookup("income__gt", field_ref("expenditure")).unwrap();
//! assert_eq!(sales.find_all(&profitable).unwrap().len(), 1);
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod observer;
pub mod predicate;
pub mod translate;
pub mod value;

pub use config::{EvalOptions, MissingFieldPolicy};
pub use error::{ComposerError, Result};
pub use filter::{filter_records, Filter, RecordSet};
pub use observer::{CountingObserver, EvalCounts, EvalObserver, TracingObserver};
pub use predicate::{
    and, evaluate, field_ref, lookup, not, or, parse, predicate, simplify, Evaluator, Expression,
    ExpressionCache, Operand, Operator, Predicate,
};
pub use translate::{compile, to_sql, Dialect, SqlFragment, SqlTranslator, Translator};
pub use value::{FieldSource, Record, Value};
