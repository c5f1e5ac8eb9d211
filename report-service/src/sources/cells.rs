//! Cell-level parsing shared by the workbook and CSV sources.
//!
//! Columns are positional: Date, Meter Reading, Consumption, Status.

use meter_client::domain::{Period, ReadingRecord};
use time::{macros::date, Date, Duration, Month};

use crate::pipeline::PipelineError;

pub const DATE_COL: usize = 0;
pub const METER_COL: usize = 1;
pub const CONSUMPTION_COL: usize = 2;
pub const STATUS_COL: usize = 3;

/// Spreadsheet day 0 in the 1900 date system (after the leap-year bug).
const EXCEL_EPOCH: Date = date!(1899 - 12 - 30);
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0; // 9999-12-31

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    /// A date cell, stored as a spreadsheet serial day number.
    DateSerial(f64),
}

impl CellValue {
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&calamine::Data> for CellValue {
    fn from(d: &calamine::Data) -> Self {
        use calamine::Data;

        match d {
            Data::Empty => CellValue::Empty,
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::DateTime(dt) => CellValue::DateSerial(dt.as_f64()),
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Bool(b) => CellValue::Text(b.to_string()),
            Data::Error(e) => CellValue::Text(e.to_string()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }
}

fn date_from_serial(serial: f64) -> Option<Date> {
    if !(1.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    EXCEL_EPOCH.checked_add(Duration::days(serial.floor() as i64))
}

fn date_from_parts(year: &str, month: &str, day: &str) -> Option<Date> {
    let year: i32 = year.trim().parse().ok()?;
    let month = Month::try_from(month.trim().parse::<u8>().ok()?).ok()?;
    let day: u8 = day.trim().parse().ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

/// Accepts `dd/mm/yyyy` and `yyyy-mm-dd`, the latter optionally followed by
/// a time part (` 00:00:00` or `T00:00:00`).
fn date_from_text(s: &str) -> Option<Date> {
    let s = s.trim();

    let mut slash = s.split('/');
    if let (Some(d), Some(m), Some(y), None) = (slash.next(), slash.next(), slash.next(), slash.next()) {
        return date_from_parts(y, m, d);
    }

    let day_part = s.split([' ', 'T']).next()?;
    let mut dash = day_part.split('-');
    match (dash.next(), dash.next(), dash.next(), dash.next()) {
        (Some(y), Some(m), Some(d), None) => date_from_parts(y, m, d),
        _ => None,
    }
}

pub fn parse_date(cell: &CellValue) -> Option<Date> {
    match cell {
        CellValue::DateSerial(f) | CellValue::Number(f) => date_from_serial(*f),
        CellValue::Text(s) => date_from_text(s),
        CellValue::Empty => None,
    }
}

/// Rewrite a text number to use `.` as the decimal separator.
///
/// When both `,` and `.` appear, the last one is the decimal separator and
/// the other groups thousands (`1.234,5`, `1,234.5`). A lone `,` is a
/// decimal comma. The decimal separator may appear only once.
fn normalize_decimal(s: &str) -> Option<String> {
    match (s.rfind(','), s.rfind('.')) {
        (Some(comma), Some(dot)) if dot > comma => (s.matches('.').count() == 1).then(|| s.replace(',', "")),
        (Some(_), _) => (s.matches(',').count() == 1).then(|| s.replace('.', "").replace(',', ".")),
        (None, _) => Some(s.to_string()),
    }
}

/// Numbers come either as numeric cells or as text using `.` or a
/// Brazilian-style decimal `,`.
pub fn parse_number(cell: &CellValue) -> Option<f64> {
    let value = match cell {
        CellValue::Number(f) => *f,
        CellValue::Text(s) => normalize_decimal(s.trim())?.parse().ok()?,
        CellValue::Empty | CellValue::DateSerial(_) => return None,
    };
    value.is_finite().then_some(value)
}

fn parse_status(cell: &CellValue) -> Option<String> {
    match cell {
        CellValue::Text(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        CellValue::Number(f) => Some(f.to_string()),
        CellValue::Empty | CellValue::DateSerial(_) => None,
    }
}

/// Turn one sheet row into a record. Blank rows yield `Ok(None)`; rows
/// with unparseable cells are `Rejected`.
pub fn reading_from_cells(period: Period, cells: &[CellValue]) -> Result<Option<ReadingRecord>, PipelineError> {
    if cells.iter().all(CellValue::is_blank) {
        return Ok(None);
    }

    let cell = |idx: usize| cells.get(idx).unwrap_or(&CellValue::Empty);

    let date = parse_date(cell(DATE_COL))
        .ok_or_else(|| PipelineError::Rejected(format!("{period}: invalid date {:?}", cell(DATE_COL))))?;
    let meter_value = parse_number(cell(METER_COL)).ok_or_else(|| {
        PipelineError::Rejected(format!("{period} {date}: invalid meter reading {:?}", cell(METER_COL)))
    })?;
    let consumption = parse_number(cell(CONSUMPTION_COL)).ok_or_else(|| {
        PipelineError::Rejected(format!("{period} {date}: invalid consumption {:?}", cell(CONSUMPTION_COL)))
    })?;

    Ok(Some(ReadingRecord {
        date,
        meter_value,
        consumption,
        status: parse_status(cell(STATUS_COL)),
        period,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feb() -> Period {
        Period::new(2025, Month::February)
    }

    #[test]
    fn parses_serial_and_text_dates() {
        assert_eq!(parse_date(&CellValue::DateSerial(45689.0)), Some(date!(2025 - 02 - 01)));
        assert_eq!(parse_date(&CellValue::DateSerial(45689.75)), Some(date!(2025 - 02 - 01)));
        assert_eq!(parse_date(&"01/02/2025".into()), Some(date!(2025 - 02 - 01)));
        assert_eq!(parse_date(&"1/2/2025".into()), Some(date!(2025 - 02 - 01)));
        assert_eq!(parse_date(&"2025-02-01".into()), Some(date!(2025 - 02 - 01)));
        assert_eq!(parse_date(&"2025-02-01 00:00:00".into()), Some(date!(2025 - 02 - 01)));
        assert_eq!(parse_date(&"2025-02-01T00:00:00".into()), Some(date!(2025 - 02 - 01)));
        assert_eq!(parse_date(&"31/02/2025".into()), None);
        assert_eq!(parse_date(&"Total".into()), None);
        assert_eq!(parse_date(&CellValue::DateSerial(-3.0)), None);
    }

    #[test]
    fn parses_numbers_in_both_decimal_styles() {
        assert_eq!(parse_number(&CellValue::Number(12.5)), Some(12.5));
        assert_eq!(parse_number(&"12.5".into()), Some(12.5));
        assert_eq!(parse_number(&"12,5".into()), Some(12.5));
        assert_eq!(parse_number(&"1.234,5".into()), Some(1234.5));
        assert_eq!(parse_number(&"1,234.5".into()), Some(1234.5));
        assert_eq!(parse_number(&"1.234.567,5".into()), Some(1_234_567.5));
        assert_eq!(parse_number(&"1,234,567.5".into()), Some(1_234_567.5));
        assert_eq!(parse_number(&"1,2,3".into()), None);
        assert_eq!(parse_number(&"1.2,3.4".into()), None);
        assert_eq!(parse_number(&" -3 ".into()), Some(-3.0));
        assert_eq!(parse_number(&"abc".into()), None);
        assert_eq!(parse_number(&CellValue::Number(f64::NAN)), None);
        assert_eq!(parse_number(&"inf".into()), None);
        assert_eq!(parse_number(&CellValue::Empty), None);
    }

    #[test]
    fn converts_full_row() {
        let cells = vec![
            CellValue::DateSerial(45689.0),
            CellValue::Number(1520.0),
            CellValue::Number(4.0),
            CellValue::Text(" OK ".to_string()),
        ];
        let r = reading_from_cells(feb(), &cells).unwrap().unwrap();
        assert_eq!(r.date, date!(2025 - 02 - 01));
        assert_eq!(r.meter_value, 1520.0);
        assert_eq!(r.consumption, 4.0);
        assert_eq!(r.status.as_deref(), Some("OK"));
        assert_eq!(r.period, feb());
    }

    #[test]
    fn status_column_is_optional() {
        let cells: Vec<CellValue> = vec!["02/02/2025".into(), "1524".into(), "4".into()];
        let r = reading_from_cells(feb(), &cells).unwrap().unwrap();
        assert!(r.status.is_none());
    }

    #[test]
    fn blank_rows_are_skipped_and_bad_rows_rejected() {
        let blank = vec![CellValue::Empty, CellValue::Text("  ".to_string())];
        assert!(reading_from_cells(feb(), &blank).unwrap().is_none());

        let bad: Vec<CellValue> = vec!["Total".into(), CellValue::Empty, CellValue::Number(88.0)];
        assert!(matches!(reading_from_cells(feb(), &bad), Err(PipelineError::Rejected(_))));

        let bad_consumption: Vec<CellValue> = vec!["03/02/2025".into(), "1530".into(), "n/a".into()];
        assert!(matches!(
            reading_from_cells(feb(), &bad_consumption),
            Err(PipelineError::Rejected(_))
        ));
    }
}
