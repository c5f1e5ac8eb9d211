//! Summary statistics over a filtered set of reading records.
//!
//! Every aggregate returns `None` for an empty input so callers can show a
//! "no data" placeholder instead of a misleading `0.00 m³`.
//!
//! Negative consumption (meter corrections) is excluded from totals but
//! included in the mean, which is the plain arithmetic mean of all records.

use time::Date;

use crate::domain::{Period, ReadingRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Which {
    Max,
    /// Smallest strictly positive consumption; zero days never count as lowest.
    MinPositive,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Extremum {
    pub value: f64,
    pub date: Date,
    pub period: Period,
}

impl From<&ReadingRecord> for Extremum {
    fn from(r: &ReadingRecord) -> Self {
        Extremum {
            value: r.consumption,
            date: r.date,
            period: r.period,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LastReading {
    pub meter_value: f64,
    pub consumption: f64,
    pub date: Date,
    /// The meter is read the morning after the day it covers.
    pub taken_on: Date,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct YearTotals {
    pub year: i32,
    pub total: f64,
    pub daily_mean: f64,
}

/// Whether the headline card shows the last reading of a running year or
/// the total of a closed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(tag = "kind", rename_all = "snake_case")
)]
pub enum ReportMode {
    FullYear { year: i32 },
    Running,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(tag = "kind", rename_all = "snake_case")
)]
pub enum Headline {
    LastReading(LastReading),
    YearTotal(YearTotals),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AggregateSummary {
    pub record_count: usize,
    pub total_consumption: Option<f64>,
    pub mean_consumption: Option<f64>,
    pub zero_consumption_days: Option<usize>,
    pub correction_days: Option<usize>,
    pub max_consumption: Option<Extremum>,
    pub min_positive_consumption: Option<Extremum>,
    pub current_period: Option<Period>,
    pub current_period_total: Option<f64>,
    pub headline: Option<Headline>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PeriodComparison {
    pub a: Period,
    pub b: Period,
    pub summary_a: AggregateSummary,
    pub summary_b: AggregateSummary,
    /// `total(b) - total(a)`, only when both sides have data.
    pub total_delta: Option<f64>,
    pub mean_delta: Option<f64>,
}

pub fn total(records: &[ReadingRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    Some(
        records
            .iter()
            .filter(|r| r.is_positive())
            .map(|r| r.consumption)
            .sum(),
    )
}

pub fn mean(records: &[ReadingRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    let sum: f64 = records.iter().map(|r| r.consumption).sum();
    Some(sum / records.len() as f64)
}

pub fn zero_days(records: &[ReadingRecord]) -> Option<usize> {
    if records.is_empty() {
        return None;
    }
    Some(records.iter().filter(|r| r.is_zero()).count())
}

pub fn correction_days(records: &[ReadingRecord]) -> Option<usize> {
    if records.is_empty() {
        return None;
    }
    Some(records.iter().filter(|r| r.is_correction()).count())
}

/// Largest consumption, or smallest positive one. Ties go to the earliest
/// date regardless of input order.
pub fn extremum(records: &[ReadingRecord], which: Which) -> Option<Extremum> {
    let mut best: Option<&ReadingRecord> = None;

    for r in records {
        if which == Which::MinPositive && !r.is_positive() {
            continue;
        }

        let replace = match best {
            None => true,
            Some(b) => {
                let beats = match which {
                    Which::Max => r.consumption > b.consumption,
                    Which::MinPositive => r.consumption < b.consumption,
                };
                beats || (r.consumption == b.consumption && r.date < b.date)
            }
        };

        if replace {
            best = Some(r);
        }
    }

    best.map(Extremum::from)
}

pub fn last_reading(records: &[ReadingRecord]) -> Option<LastReading> {
    records.iter().max_by_key(|r| r.date).map(|r| LastReading {
        meter_value: r.meter_value,
        consumption: r.consumption,
        date: r.date,
        taken_on: r.date.next_day().unwrap_or(r.date),
    })
}

/// Total and per-calendar-day mean of the records whose period falls in
/// `year`. A `Dec-2024` sheet counts towards 2024 even when its last row is
/// dated in January.
pub fn year_totals(records: &[ReadingRecord], year: i32) -> Option<YearTotals> {
    let in_year: Vec<ReadingRecord> = records
        .iter()
        .filter(|r| r.period.year() == year)
        .cloned()
        .collect();
    let total = total(&in_year)?;
    let days = time::util::days_in_year(year);

    Some(YearTotals {
        year,
        total,
        daily_mean: total / f64::from(days),
    })
}

pub fn summarize(records: &[ReadingRecord], mode: ReportMode) -> AggregateSummary {
    let current_period = records.iter().map(|r| r.period).max();
    let current_period_total = current_period.and_then(|p| {
        let current: Vec<ReadingRecord> = records.iter().filter(|r| r.period == p).cloned().collect();
        total(&current)
    });

    let headline = match mode {
        ReportMode::FullYear { year } => year_totals(records, year).map(Headline::YearTotal),
        ReportMode::Running => last_reading(records).map(Headline::LastReading),
    };

    AggregateSummary {
        record_count: records.len(),
        total_consumption: total(records),
        mean_consumption: mean(records),
        zero_consumption_days: zero_days(records),
        correction_days: correction_days(records),
        max_consumption: extremum(records, Which::Max),
        min_positive_consumption: extremum(records, Which::MinPositive),
        current_period,
        current_period_total,
        headline,
    }
}

fn delta(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(b? - a?)
}

pub fn compare(
    a: Period,
    records_a: &[ReadingRecord],
    b: Period,
    records_b: &[ReadingRecord],
) -> PeriodComparison {
    let summary_a = summarize(records_a, ReportMode::Running);
    let summary_b = summarize(records_b, ReportMode::Running);

    PeriodComparison {
        a,
        b,
        total_delta: delta(summary_a.total_consumption, summary_b.total_consumption),
        mean_delta: delta(summary_a.mean_consumption, summary_b.mean_consumption),
        summary_a,
        summary_b,
    }
}
