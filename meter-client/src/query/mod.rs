use std::collections::BTreeMap;

use crate::{
    aggregate::{self, ReportMode},
    domain::{Period, PeriodParseError, ReadingRecord},
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("invalid year '{0}'")]
    InvalidYear(String),
    #[error("invalid month: {0}")]
    InvalidMonth(#[from] PeriodParseError),
    #[error("month {month} is not in selected year {year}")]
    MonthOutsideYear { month: Period, year: i32 },
    #[error("comparison needs two periods")]
    IncompleteComparison,
}

/// The filter the dashboard applies before aggregating: an optional year,
/// an optional month, and an optional pair of months to compare.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Selection {
    pub year: Option<i32>,
    pub month: Option<Period>,
    pub compare: Option<(Period, Period)>,
}

fn filter_value(value: Option<&str>) -> Option<&str> {
    let v = value?.trim();
    if v.is_empty()
        || v.eq_ignore_ascii_case("all")
        || v.eq_ignore_ascii_case("todos")
        || v.eq_ignore_ascii_case("todas")
    {
        None
    } else {
        Some(v)
    }
}

impl Selection {
    /// Parse the raw string parameters supplied by the UI.
    ///
    /// A month may be a full label (`Feb-2025`) or, when a year is also
    /// selected, just the month (`Feb`, `Fevereiro`, `02`).
    pub fn parse(
        year: Option<&str>,
        month: Option<&str>,
        compare_a: Option<&str>,
        compare_b: Option<&str>,
    ) -> Result<Self, SelectionError> {
        let year = match filter_value(year) {
            Some(y) => Some(
                y.parse::<i32>()
                    .ok()
                    .filter(|y| (1000..=9999).contains(y))
                    .ok_or_else(|| SelectionError::InvalidYear(y.to_string()))?,
            ),
            None => None,
        };

        let month = match filter_value(month) {
            Some(m) => {
                let period = match (m.parse::<Period>(), year) {
                    (Ok(p), _) => p,
                    (Err(_), Some(y)) => format!("{m}-{y}").parse::<Period>()?,
                    (Err(e), None) => return Err(e.into()),
                };
                if let Some(y) = year {
                    if period.year() != y {
                        return Err(SelectionError::MonthOutsideYear { month: period, year: y });
                    }
                }
                Some(period)
            }
            None => None,
        };

        let compare = match (filter_value(compare_a), filter_value(compare_b)) {
            (Some(a), Some(b)) => Some((a.parse::<Period>()?, b.parse::<Period>()?)),
            (None, None) => None,
            _ => return Err(SelectionError::IncompleteComparison),
        };

        Ok(Selection { year, month, compare })
    }

    /// Does `record` belong to the main selection (comparison aside)?
    pub fn matches(&self, record: &ReadingRecord) -> bool {
        match (self.month, self.year) {
            (Some(m), _) => record.period == m,
            (None, Some(y)) => record.period.year() == y,
            (None, None) => true,
        }
    }

    /// Does `record` belong to the selection or to one side of the comparison?
    pub fn wants(&self, record: &ReadingRecord) -> bool {
        self.matches(record)
            || self
                .compare
                .is_some_and(|(a, b)| record.period == a || record.period == b)
    }

    /// Which periods of `collection` have to be loaded to answer this
    /// selection, in chronological order.
    pub fn periods_to_load(&self, collection: &[Period]) -> Vec<Period> {
        let mut out: Vec<Period> = match (self.month, self.year) {
            (Some(m), _) => vec![m],
            (None, Some(y)) => collection.iter().copied().filter(|p| p.year() == y).collect(),
            (None, None) => collection.to_vec(),
        };

        if let Some((a, b)) = self.compare {
            out.push(a);
            out.push(b);
        }

        out.sort();
        out.dedup();
        out
    }

    /// A whole past year is reported as a closed total; anything else as a
    /// running period ending at its last reading.
    pub fn mode(&self, current_year: i32) -> ReportMode {
        match (self.month, self.year) {
            (None, Some(y)) if y < current_year => ReportMode::FullYear { year: y },
            _ => ReportMode::Running,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PeriodTotal {
    pub period: Period,
    pub days: usize,
    pub total: f64,
    pub mean: f64,
}

/// Per-period totals in chronological order, for the bar chart.
pub fn period_totals(records: &[ReadingRecord]) -> Vec<PeriodTotal> {
    let mut grouped: BTreeMap<Period, Vec<ReadingRecord>> = BTreeMap::new();
    for r in records {
        grouped.entry(r.period).or_default().push(r.clone());
    }

    grouped
        .into_iter()
        .filter_map(|(period, rows)| {
            Some(PeriodTotal {
                period,
                days: rows.len(),
                total: aggregate::total(&rows)?,
                mean: aggregate::mean(&rows)?,
            })
        })
        .collect()
}

/// The records of one period ordered by date, for the daily line chart.
pub fn daily_profile(records: &[ReadingRecord], period: Period) -> Vec<ReadingRecord> {
    let mut rows: Vec<ReadingRecord> = records
        .iter()
        .filter(|r| r.period == period)
        .cloned()
        .collect();
    rows.sort_by_key(|r| r.date);
    rows
}

/// Order records by period then date and drop repeated dates within a
/// period, keeping the first occurrence.
pub fn normalize(mut records: Vec<ReadingRecord>) -> Vec<ReadingRecord> {
    records.sort_by(|a, b| (a.period, a.date).cmp(&(b.period, b.date)));
    records.dedup_by(|later, earlier| later.period == earlier.period && later.date == earlier.date);
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{macros::date, Date, Month};

    fn rec(date: Date, consumption: f64) -> ReadingRecord {
        ReadingRecord {
            date,
            meter_value: 500.0,
            consumption,
            status: Some("OK".to_string()),
            period: Period::of(date),
        }
    }

    fn p(label: &str) -> Period {
        label.parse().unwrap()
    }

    #[test]
    fn parse_treats_all_and_blank_as_unfiltered() {
        let s = Selection::parse(Some("2025"), Some("Todos"), None, Some(" ")).unwrap();
        assert_eq!(s, Selection { year: Some(2025), month: None, compare: None });

        let s = Selection::parse(None, None, None, None).unwrap();
        assert_eq!(s, Selection::default());
    }

    #[test]
    fn parse_accepts_bare_month_with_year() {
        let s = Selection::parse(Some("2025"), Some("Fevereiro"), None, None).unwrap();
        assert_eq!(s.month, Some(Period::new(2025, Month::February)));

        let s = Selection::parse(None, Some("Mar-2024"), None, None).unwrap();
        assert_eq!(s.month, Some(Period::new(2024, Month::March)));
    }

    #[test]
    fn parse_rejects_inconsistent_parameters() {
        assert!(matches!(
            Selection::parse(Some("twenty"), None, None, None),
            Err(SelectionError::InvalidYear(_))
        ));
        assert!(matches!(
            Selection::parse(Some("2024"), Some("Feb-2025"), None, None),
            Err(SelectionError::MonthOutsideYear { .. })
        ));
        assert!(matches!(
            Selection::parse(None, Some("Feb"), None, None),
            Err(SelectionError::InvalidMonth(_))
        ));
        assert!(matches!(
            Selection::parse(None, None, Some("Jan-2025"), None),
            Err(SelectionError::IncompleteComparison)
        ));
    }

    #[test]
    fn periods_to_load_follows_selection_and_adds_comparison() {
        let collection = vec![p("Nov-2024"), p("Dec-2024"), p("Jan-2025"), p("Feb-2025")];

        let by_year = Selection { year: Some(2025), ..Default::default() };
        assert_eq!(by_year.periods_to_load(&collection), vec![p("Jan-2025"), p("Feb-2025")]);

        let with_cmp = Selection {
            month: Some(p("Feb-2025")),
            compare: Some((p("Nov-2024"), p("Feb-2025"))),
            ..Default::default()
        };
        assert_eq!(with_cmp.periods_to_load(&collection), vec![p("Nov-2024"), p("Feb-2025")]);

        assert_eq!(Selection::default().periods_to_load(&collection), collection);
    }

    #[test]
    fn matches_and_wants() {
        let s = Selection {
            year: Some(2025),
            compare: Some((p("Dec-2024"), p("Jan-2025"))),
            ..Default::default()
        };
        let dec = rec(date!(2024 - 12 - 05), 1.0);
        let nov = rec(date!(2024 - 11 - 05), 1.0);
        let feb = rec(date!(2025 - 02 - 05), 1.0);

        assert!(s.matches(&feb));
        assert!(!s.matches(&dec));
        assert!(s.wants(&dec));
        assert!(!s.wants(&nov));
    }

    #[test]
    fn mode_is_full_year_only_for_past_whole_years() {
        let past = Selection { year: Some(2024), ..Default::default() };
        assert_eq!(past.mode(2025), ReportMode::FullYear { year: 2024 });
        assert_eq!(past.mode(2024), ReportMode::Running);

        let month = Selection { year: Some(2024), month: Some(p("Jan-2024")), compare: None };
        assert_eq!(month.mode(2025), ReportMode::Running);
    }

    #[test]
    fn period_totals_groups_chronologically() {
        let r = vec![
            rec(date!(2025 - 02 - 01), 4.0),
            rec(date!(2025 - 01 - 01), 2.0),
            rec(date!(2025 - 01 - 02), -1.0),
        ];
        let totals = period_totals(&r);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].period, p("Jan-2025"));
        assert_eq!(totals[0].total, 2.0);
        assert_eq!(totals[0].mean, 0.5);
        assert_eq!(totals[0].days, 2);
        assert_eq!(totals[1].total, 4.0);
    }

    #[test]
    fn normalize_sorts_and_keeps_first_duplicate() {
        let r = vec![
            rec(date!(2025 - 01 - 03), 3.0),
            rec(date!(2025 - 01 - 01), 1.0),
            rec(date!(2025 - 01 - 03), 99.0),
        ];
        let n = normalize(r);
        assert_eq!(n.len(), 2);
        assert_eq!(n[0].date, date!(2025 - 01 - 01));
        assert_eq!(n[1].consumption, 3.0);

        let profile = daily_profile(&n, p("Jan-2025"));
        assert_eq!(profile.len(), 2);
        assert!(daily_profile(&n, p("Feb-2025")).is_empty());
    }
}
