pub mod period;
pub mod reading;

pub use period::{Period, PeriodParseError};
pub use reading::ReadingRecord;
