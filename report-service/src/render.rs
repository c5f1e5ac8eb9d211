//! One render: load the configured source afresh, validate, filter to the
//! selection and fold into a report (or an export file).

use std::{path::Path, sync::Arc};

use meter_client::{
    domain::{Period, ReadingRecord},
    query::Selection,
};

use crate::{
    config::{SourceFormat, WorkbookConfig},
    pipeline::{EnvelopeStream, Pipeline, PipelineError, Source, Transform},
    sinks::{ConsumptionReport, CsvExportSink, ReportSink},
    sources::{CsvReadingsSource, WorkbookSource},
    transform::{ReadingValidation, SelectionFilter},
};

type ReadingTransforms = Vec<Arc<dyn Transform<ReadingRecord, ReadingRecord> + Send + Sync>>;

enum ReadingSource {
    Workbook(WorkbookSource),
    Csv(CsvReadingsSource),
}

#[async_trait::async_trait]
impl Source<ReadingRecord> for ReadingSource {
    async fn stream(&self) -> EnvelopeStream<ReadingRecord> {
        match self {
            Self::Workbook(s) => s.stream().await,
            Self::Csv(s) => s.stream().await,
        }
    }
}

/// The ordered period collection: configured, or discovered from the file.
pub fn period_collection(cfg: &WorkbookConfig) -> Result<Vec<Period>, PipelineError> {
    if let Some(periods) = &cfg.periods {
        return Ok(periods.clone());
    }

    match cfg.format {
        SourceFormat::Xlsx => WorkbookSource::list_periods(&cfg.path),
        SourceFormat::Csv => CsvReadingsSource::list_periods(&cfg.path),
    }
}

fn prepare(
    cfg: &WorkbookConfig,
    selection: &Selection,
) -> Result<(ReadingSource, ReadingTransforms), PipelineError> {
    let collection = period_collection(cfg)?;
    let to_load = selection.periods_to_load(&collection);
    tracing::debug!(
        periods = ?to_load.iter().map(Period::label).collect::<Vec<_>>(),
        "periods selected for load"
    );

    let source = match cfg.format {
        SourceFormat::Xlsx => ReadingSource::Workbook(WorkbookSource::new(&cfg.path, to_load.clone(), cfg.header_row)),
        SourceFormat::Csv => ReadingSource::Csv(CsvReadingsSource::new(&cfg.path).restricted_to(to_load.clone())),
    };

    // Filter first so rows outside the selection never count as rejected.
    let transforms: ReadingTransforms = vec![
        Arc::new(SelectionFilter::new(selection.clone()).restricted_to(to_load)),
        Arc::new(ReadingValidation),
    ];

    Ok((source, transforms))
}

pub async fn build_report(
    cfg: &WorkbookConfig,
    selection: Selection,
    current_year: i32,
) -> Result<ConsumptionReport, PipelineError> {
    let (source, transforms) = prepare(cfg, &selection)?;
    let mode = selection.mode(current_year);

    let pipeline: Pipeline<_, ReadingRecord, _> = Pipeline {
        source,
        transforms,
        sink: ReportSink::new(selection, mode),
    };

    pipeline.run().await
}

/// Write the records of the main selection to `out` as CSV.
pub async fn export_readings(cfg: &WorkbookConfig, selection: Selection, out: &Path) -> Result<usize, PipelineError> {
    // Exports carry the selection only, not the comparison pair.
    let selection = Selection {
        compare: None,
        ..selection
    };
    let (source, transforms) = prepare(cfg, &selection)?;

    let pipeline: Pipeline<_, ReadingRecord, _> = Pipeline {
        source,
        transforms,
        sink: CsvExportSink::new(out),
    };

    pipeline.run().await
}

pub fn current_year() -> i32 {
    time::OffsetDateTime::now_utc().year()
}
