use std::{cmp::Ordering, fmt, str::FromStr};

use time::{Date, Month};

const MONTHS_EN: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const MONTHS_PT: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PeriodParseError {
    #[error("period label '{0}' has no month/year separator")]
    MissingSeparator(String),
    #[error("unknown month '{0}'")]
    UnknownMonth(String),
    #[error("invalid year '{0}'")]
    InvalidYear(String),
}

/// A month-year reporting period. Each period maps to one sheet of the
/// source workbook, labelled like `Feb-2025`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Period {
    year: i32,
    month: Month,
}

impl Period {
    pub fn new(year: i32, month: Month) -> Self {
        Self { year, month }
    }

    pub fn of(date: Date) -> Self {
        Self::new(date.year(), date.month())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> Month {
        self.month
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl Ord for Period {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.year, self.month as u8).cmp(&(other.year, other.month as u8))
    }
}

impl PartialOrd for Period {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", LABELS[self.month as usize - 1], self.year)
    }
}

fn parse_month(s: &str) -> Option<Month> {
    let s = s.trim();
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse::<u8>().ok().and_then(|n| Month::try_from(n).ok());
    }

    let prefix: String = s.chars().take(3).flat_map(char::to_lowercase).collect();
    MONTHS_EN
        .iter()
        .position(|m| *m == prefix)
        .or_else(|| MONTHS_PT.iter().position(|m| *m == prefix))
        .and_then(|idx| Month::try_from(idx as u8 + 1).ok())
}

impl FromStr for Period {
    type Err = PeriodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (month_str, year_str) = trimmed
            .rsplit_once(['-', '/', ' '])
            .ok_or_else(|| PeriodParseError::MissingSeparator(trimmed.to_string()))?;

        let month = parse_month(month_str)
            .ok_or_else(|| PeriodParseError::UnknownMonth(month_str.trim().to_string()))?;

        let year_str = year_str.trim();
        let year: i32 = year_str
            .parse()
            .ok()
            .filter(|y| (1000..=9999).contains(y))
            .ok_or_else(|| PeriodParseError::InvalidYear(year_str.to_string()))?;

        Ok(Period::new(year, month))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        label.parse().map_err(serde::de::Error::custom)
    }
}
