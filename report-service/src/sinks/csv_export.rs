use std::path::PathBuf;

use futures::StreamExt;
use meter_client::{domain::ReadingRecord, query};

use crate::{
    pipeline::{Envelope, PipelineError, Sink},
    sources::readings_csv_file::{CONSUMPTION_HEADER, DATE_HEADER, METER_HEADER, PERIOD_HEADER, STATUS_HEADER},
};

/// Writes the filtered record sequence as CSV for external charting tools.
/// The output can be read back with `CsvReadingsSource`.
pub struct CsvExportSink {
    path: PathBuf,
}

impl CsvExportSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    fn write_all(&self, records: &[ReadingRecord]) -> Result<(), csv::Error> {
        let mut wtr = csv::Writer::from_path(&self.path)?;
        wtr.write_record([DATE_HEADER, METER_HEADER, CONSUMPTION_HEADER, STATUS_HEADER, PERIOD_HEADER])?;

        for r in records {
            wtr.write_record([
                r.date.to_string(),
                r.meter_value.to_string(),
                r.consumption.to_string(),
                r.status.clone().unwrap_or_default(),
                r.period.to_string(),
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Sink<ReadingRecord> for CsvExportSink {
    /// Number of records written.
    type Output = usize;

    async fn run<S>(&self, mut input: S) -> Result<Self::Output, PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<ReadingRecord>, PipelineError>> + Send + Unpin + 'static,
    {
        let mut records = Vec::new();

        while let Some(item) = input.next().await {
            match item {
                Ok(env) => records.push(env.payload),
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(error = %e, "dropping row from export");
                }
                Err(e) => {
                    tracing::error!(error = %e, "error in upstream pipeline for CsvExportSink");
                    return Err(e);
                }
            }
        }

        let records = query::normalize(records);
        self.write_all(&records).map_err(|e| {
            metrics::counter!("csv_export_errors_total").increment(1);
            PipelineError::Sink(format!("failed to write {}: {e}", self.path.display()))
        })?;

        tracing::info!(path = %self.path.display(), records = records.len(), "readings exported");
        Ok(records.len())
    }
}
