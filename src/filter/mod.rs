pub mod predicate;
pub mod sql;

pub use predicate::{Field, Predicate};
pub use sql::{SqlResult, SqlWhere};
