//! Predicate trees: building, evaluating, simplifying and parsing
//!
//! Expressions are built from leaf predicates such as `name__icontains="grill"`
//! and combined with AND / OR / NOT, either through [`and`], [`or`], [`not`]
//! or the `&`, `|`, `!` operators.

mod ast;
pub mod cache;
mod compose;
mod evaluator;
pub mod parser;
mod render;
mod simplify;


pub use ast::*;
pub use cache::*;
pub use compose::*;
pub use evaluator::*;
pub use parser::*;
pub use simplify::*;
