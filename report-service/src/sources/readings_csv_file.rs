use std::{
    fs::File,
    path::{Path, PathBuf},
};

use csv::StringRecord;
use meter_client::domain::{Period, ReadingRecord};

use super::cells::{reading_from_cells, CellValue};
use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

pub const DATE_HEADER: &str = "Date";
pub const METER_HEADER: &str = "Meter Reading";
pub const CONSUMPTION_HEADER: &str = "Consumption";
pub const STATUS_HEADER: &str = "Status";
pub const PERIOD_HEADER: &str = "Period";

/// Flat CSV source for `ReadingRecord`s, the layout `CsvExportSink` writes.
///
/// Expected header columns (by name):
/// - Date (`dd/mm/yyyy` or `yyyy-mm-dd`)
/// - Meter Reading
/// - Consumption
/// - Status (optional)
/// - Period (label such as `Feb-2025`)
///
/// Rows of periods outside `restricted_to` are skipped before their cells
/// are parsed, so they never count as rejected.
pub struct CsvReadingsSource {
    path: PathBuf,
    periods: Option<Vec<Period>>,
}

impl CsvReadingsSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            periods: None,
        }
    }

    pub fn restricted_to(mut self, periods: Vec<Period>) -> Self {
        self.periods = Some(periods);
        self
    }

    /// Distinct periods present in the file, in chronological order.
    pub fn list_periods<P: Into<PathBuf>>(path: P) -> Result<Vec<Period>, PipelineError> {
        let path = path.into();
        let (headers, records) = read_all(&path)?;
        let idx = column(&headers, PERIOD_HEADER)?;

        let mut periods: Vec<Period> = records
            .iter()
            .filter_map(|r| r.get(idx).and_then(|label| label.parse().ok()))
            .collect();
        periods.sort();
        periods.dedup();
        Ok(periods)
    }
}

/// Position of a required header column.
fn column(headers: &StringRecord, name: &str) -> Result<usize, PipelineError> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| PipelineError::Source(format!("missing column '{name}' in CSV header")))
}

fn read_all(path: &Path) -> Result<(StringRecord, Vec<StringRecord>), PipelineError> {
    let file = File::open(path).map_err(|e| PipelineError::Source(format!("failed to open CSV file: {e}")))?;
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(file);
    let headers = rdr
        .headers()
        .map_err(|e| PipelineError::Source(format!("failed to read CSV headers: {e}")))?
        .clone();

    let records = rdr
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| PipelineError::Source(format!("failed to read CSV record: {e}")))?;

    Ok((headers, records))
}

struct Columns {
    date: usize,
    meter: usize,
    consumption: usize,
    status: Option<usize>,
    period: usize,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self, PipelineError> {
        Ok(Self {
            date: column(headers, DATE_HEADER)?,
            meter: column(headers, METER_HEADER)?,
            consumption: column(headers, CONSUMPTION_HEADER)?,
            status: column(headers, STATUS_HEADER).ok(),
            period: column(headers, PERIOD_HEADER)?,
        })
    }
}

fn record_to_reading(
    record: &StringRecord,
    cols: &Columns,
    periods: Option<&[Period]>,
) -> Result<Option<ReadingRecord>, PipelineError> {
    let get = |idx: usize| record.get(idx).unwrap_or("");

    let cells: Vec<CellValue> = [
        Some(cols.date),
        Some(cols.meter),
        Some(cols.consumption),
        cols.status,
    ]
    .into_iter()
    .map(|idx| idx.map(get).map(CellValue::from).unwrap_or(CellValue::Empty))
    .collect();

    if cells.iter().all(CellValue::is_blank) {
        return Ok(None);
    }

    let label = get(cols.period);
    let period: Period = label
        .parse()
        .map_err(|e| PipelineError::Rejected(format!("invalid period '{label}': {e}")))?;

    if periods.is_some_and(|ps| !ps.contains(&period)) {
        return Ok(None);
    }

    reading_from_cells(period, &cells)
}

#[async_trait::async_trait]
impl Source<ReadingRecord> for CsvReadingsSource {
    async fn stream(&self) -> EnvelopeStream<ReadingRecord> {
        // This source uses a blocking CSV reader; files are small enough to
        // read in one go.
        let loaded = read_all(&self.path).and_then(|(headers, records)| {
            let cols = Columns::from_headers(&headers)?;
            Ok((cols, records))
        });

        let periods = self.periods.clone();

        let s = async_stream::stream! {
            let (cols, records) = match loaded {
                Ok(v) => v,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            for record in records {
                match record_to_reading(&record, &cols, periods.as_deref()) {
                    Ok(Some(reading)) => {
                        yield Ok(Envelope::new(reading));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        metrics::counter!("readings_parse_errors_total", "source" => "csv").increment(1);
                        yield Err(e);
                    }
                }
            }
        };

        Box::pin(s)
    }
}
