mod aggregate;
mod filter;
mod predicate;
mod seq_scan;

pub use aggregate::{AggOp, Aggregate};
pub use filter::Filter;
pub use predicate::{Op, Predicate};
pub use seq_scan::SeqScan;
