use time::Date;

use super::Period;

/// One validated row of a period sheet.
///
/// `consumption` is the difference between consecutive meter readings and
/// is kept signed: negative values are data-entry corrections and are
/// excluded from totals, not clamped away.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadingRecord {
    pub date: Date,
    pub meter_value: f64,
    pub consumption: f64,
    pub status: Option<String>,
    pub period: Period,
}

impl ReadingRecord {
    pub fn is_zero(&self) -> bool {
        self.consumption == 0.0
    }

    pub fn is_positive(&self) -> bool {
        self.consumption > 0.0
    }

    /// A negative delta left behind by a corrected meter entry.
    pub fn is_correction(&self) -> bool {
        self.consumption < 0.0
    }
}
