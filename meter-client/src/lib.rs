pub mod aggregate;
pub mod domain;
pub mod query;

pub use aggregate::{AggregateSummary, ReportMode};
pub use domain::{Period, ReadingRecord};
pub use query::Selection;
