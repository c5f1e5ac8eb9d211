use std::{
    cmp::Ordering,
    collections::HashMap,
    path::{Path, PathBuf},
};

use calamine::{open_workbook_auto, Data, Range, Reader};
use meter_client::domain::{Period, ReadingRecord};

use super::cells::{reading_from_cells, CellValue, CONSUMPTION_COL};
use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

/// Spreadsheet source for `ReadingRecord`s (`.xlsx`, `.xls`, `.ods`).
///
/// The workbook holds one sheet per period, named like `Feb-2025`. Each
/// sheet has a title row, a header row at `header_row` (0-based) and the
/// daily rows below it: Date, Meter Reading, Consumption, Status.
pub struct WorkbookSource {
    path: PathBuf,
    periods: Vec<Period>,
    header_row: usize,
}

impl WorkbookSource {
    pub fn new<P: Into<PathBuf>>(path: P, periods: Vec<Period>, header_row: usize) -> Self {
        Self {
            path: path.into(),
            periods,
            header_row,
        }
    }

    /// Every sheet whose name is a period label, in chronological order.
    pub fn list_periods<P: Into<PathBuf>>(path: P) -> Result<Vec<Period>, PipelineError> {
        let path = path.into();
        let workbook = open_workbook_auto(&path)
            .map_err(|e| PipelineError::Source(format!("failed to open workbook {}: {e}", path.display())))?;

        let mut periods: Vec<Period> = workbook
            .sheet_names()
            .iter()
            .filter_map(|name| match name.parse::<Period>() {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::debug!(sheet = %name, error = %e, "ignoring non-period sheet");
                    None
                }
            })
            .collect();
        periods.sort();
        periods.dedup();
        Ok(periods)
    }
}

/// Sheet names keyed by the period they parse to.
fn sheets_by_period(names: &[String]) -> HashMap<Period, String> {
    names
        .iter()
        .filter_map(|name| name.parse::<Period>().ok().map(|p| (p, name.clone())))
        .collect()
}

/// The data rows below the header row, with absolute column positions.
/// The header row must name at least the Date, Meter Reading and
/// Consumption columns.
///
/// calamine trims leading empty rows and columns off a range, so its
/// `start()` is added back before applying `header_row`.
fn data_rows(range: &Range<Data>, header_row: usize) -> Result<Vec<Vec<CellValue>>, String> {
    let Some((start_row, start_col)) = range.start() else {
        return Ok(Vec::new());
    };
    let start_row = start_row as usize;
    let start_col = start_col as usize;

    let mut header_columns = 0;
    let mut rows = Vec::new();
    for (i, row) in range.rows().enumerate() {
        let mut cells = vec![CellValue::Empty; start_col];
        cells.extend(row.iter().map(CellValue::from));

        match (start_row + i).cmp(&header_row) {
            Ordering::Less => {}
            Ordering::Equal => {
                header_columns = cells.iter().rposition(|c| !c.is_blank()).map_or(0, |last| last + 1);
            }
            Ordering::Greater => rows.push(cells),
        }
    }

    if !rows.is_empty() && header_columns <= CONSUMPTION_COL {
        return Err(format!(
            "expected at least {} header columns (Date, Meter Reading, Consumption), found {header_columns}",
            CONSUMPTION_COL + 1
        ));
    }

    Ok(rows)
}

/// Read every requested period into memory. A missing sheet is skipped;
/// an unreadable file or sheet aborts the load.
fn load_periods(
    path: &Path,
    periods: &[Period],
    header_row: usize,
) -> Result<Vec<(Period, Vec<Vec<CellValue>>)>, PipelineError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| PipelineError::Source(format!("failed to open workbook {}: {e}", path.display())))?;
    let sheets = sheets_by_period(&workbook.sheet_names());

    let mut loaded = Vec::with_capacity(periods.len());
    for &period in periods {
        let Some(sheet) = sheets.get(&period) else {
            tracing::warn!(%period, "no sheet for period, skipping");
            metrics::counter!("workbook_missing_periods_total").increment(1);
            continue;
        };

        let range = workbook
            .worksheet_range(sheet)
            .map_err(|e| PipelineError::Source(format!("failed to read sheet '{sheet}': {e}")))?;
        let rows = data_rows(&range, header_row)
            .map_err(|e| PipelineError::Source(format!("sheet '{sheet}': {e}")))?;

        tracing::debug!(%period, rows = rows.len(), "loaded sheet");
        loaded.push((period, rows));
    }

    Ok(loaded)
}

#[async_trait::async_trait]
impl Source<ReadingRecord> for WorkbookSource {
    async fn stream(&self) -> EnvelopeStream<ReadingRecord> {
        // calamine is blocking; the whole workbook is read before the first item.
        let loaded = load_periods(&self.path, &self.periods, self.header_row);

        let s = async_stream::stream! {
            let sheets = match loaded {
                Ok(sheets) => sheets,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            for (period, rows) in sheets {
                for cells in rows {
                    match reading_from_cells(period, &cells) {
                        Ok(Some(record)) => {
                            yield Ok(Envelope::new(record));
                        }
                        Ok(None) => {}
                        Err(e) => {
                            metrics::counter!("readings_parse_errors_total", "source" => "workbook").increment(1);
                            yield Err(e);
                        }
                    }
                }
            }
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use rust_xlsxwriter::Workbook;

    fn sheet(rows: &[&[Data]]) -> Range<Data> {
        let height = rows.len() as u32;
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(1) as u32;
        let mut range = Range::new((0, 0), (height - 1, width - 1));
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                range.set_value((r as u32, c as u32), value.clone());
            }
        }
        range
    }

    fn add_sheet(workbook: &mut Workbook, name: &str, rows: &[&[Data]]) {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let (r, c) = (r as u32, c as u16);
                match value {
                    Data::Empty => {}
                    Data::String(s) => {
                        worksheet.write_string(r, c, s.as_str()).unwrap();
                    }
                    Data::Float(f) => {
                        worksheet.write_number(r, c, *f).unwrap();
                    }
                    other => panic!("unsupported fixture cell {other:?}"),
                }
            }
        }
    }

    fn text(s: &str) -> Data {
        Data::String(s.to_string())
    }

    fn header() -> [Data; 4] {
        [text("Data"), text("Leitura"), text("Consumo"), text("Status")]
    }

    #[test]
    fn data_rows_skip_title_and_header() {
        let range = sheet(&[
            &[text("LEITURA DE HIDROMETROS")],
            &header(),
            &[text("01/02/2025"), Data::Float(1520.0), Data::Float(4.0), text("OK")],
            &[text("02/02/2025"), Data::Float(1520.0), Data::Int(0), Data::Empty],
        ]);

        let rows = data_rows(&range, 1).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], CellValue::Text("01/02/2025".into()));
        assert_eq!(rows[1][2], CellValue::Number(0.0));
    }

    #[test]
    fn data_rows_rejects_too_narrow_sheets() {
        let range = sheet(&[
            &[text("title")],
            &[text("Data"), text("Leitura")],
            &[text("01/02/2025"), Data::Float(1520.0)],
        ]);
        assert!(data_rows(&range, 1).is_err());
    }

    #[test]
    fn narrow_header_is_rejected_despite_stray_wide_cells() {
        let range = sheet(&[
            &[text("title")],
            &[text("Data"), text("Leitura")],
            &[text("01/02/2025"), Data::Float(1520.0), Data::Empty, Data::Empty, text("nota")],
        ]);
        let err = data_rows(&range, 1).unwrap_err();
        assert!(err.contains("found 2"), "{err}");
    }

    #[test]
    fn sheets_by_period_ignores_other_sheets() {
        let names = vec!["Resumo".to_string(), "Jan-2025".to_string(), "fev-2025".to_string()];
        let map = sheets_by_period(&names);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&"Feb-2025".parse().unwrap()).map(String::as_str), Some("fev-2025"));
    }

    #[tokio::test]
    async fn streams_requested_sheets_and_skips_missing_ones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leituras.xlsx");

        let mut workbook = Workbook::new();
        add_sheet(&mut workbook, "Resumo", &[&[text("not a period")]]);
        add_sheet(
            &mut workbook,
            "Jan-2025",
            &[
                &[text("LEITURA DE HIDROMETROS")],
                &header(),
                &[text("01/01/2025"), Data::Float(1500.0), Data::Float(4.0), text("OK")],
                &[],
                &[text("03/01/2025"), Data::Float(1500.0), text("n/a"), text("OK")],
                &[text("04/01/2025"), Data::Float(1512.0), Data::Float(12.0)],
            ],
        );
        workbook.save(&path).unwrap();

        assert_eq!(
            WorkbookSource::list_periods(&path).unwrap(),
            vec!["Jan-2025".parse::<Period>().unwrap()]
        );

        let periods = vec!["Jan-2025".parse().unwrap(), "Feb-2025".parse().unwrap()];
        let items: Vec<_> = WorkbookSource::new(&path, periods, 1).stream().await.collect().await;

        assert_eq!(items.len(), 3);
        let first = &items[0].as_ref().unwrap().payload;
        assert_eq!(first.date, time::macros::date!(2025 - 01 - 01));
        assert_eq!(first.consumption, 4.0);
        assert!(matches!(items[1], Err(PipelineError::Rejected(_))));
        let last = &items[2].as_ref().unwrap().payload;
        assert_eq!(last.meter_value, 1512.0);
        assert!(last.status.is_none());
    }

    #[tokio::test]
    async fn header_row_offset_applies_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offset.xlsx");

        let mut workbook = Workbook::new();
        add_sheet(
            &mut workbook,
            "Feb-2025",
            &[
                &[text("LEITURA DE HIDROMETROS")],
                &[text("Bloco A")],
                &[text("Unidade 101")],
                &header(),
                &[text("01/02/2025"), Data::Float(1520.0), Data::Float(4.0), text("OK")],
                &[text("02/02/2025"), Data::Float(1526.0), Data::Float(6.0), text("OK")],
            ],
        );
        workbook.save(&path).unwrap();
        let periods = vec!["Feb-2025".parse::<Period>().unwrap()];

        let items: Vec<_> = WorkbookSource::new(&path, periods.clone(), 3).stream().await.collect().await;
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(Result::is_ok));

        // Row 1 holds a single note cell, which is not a valid header.
        let items: Vec<_> = WorkbookSource::new(&path, periods, 1).stream().await.collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(PipelineError::Source(_))));
    }

    #[tokio::test]
    async fn missing_workbook_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let source = WorkbookSource::new(
            dir.path().join("no-such-workbook.xlsx"),
            vec!["Jan-2025".parse().unwrap()],
            1,
        );
        let items: Vec<_> = source.stream().await.collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(PipelineError::Source(_))));
    }
}
