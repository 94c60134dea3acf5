//! Record values and field lookup

mod record;
mod scalar;

pub use record::*;
pub use scalar::*;
