use std::time::SystemTime;

use futures::StreamExt;
use meter_client::{
    aggregate::{self, AggregateSummary, PeriodComparison, ReportMode},
    domain::ReadingRecord,
    query::{self, PeriodTotal, Selection},
};
use serde::Serialize;

use crate::pipeline::{Envelope, PipelineError, Sink};

/// Everything the dashboard needs for one render: the metric cards, the
/// per-period bars, the daily line and an optional month-vs-month view.
#[derive(Debug, Clone, Serialize)]
pub struct ConsumptionReport {
    pub selection: Selection,
    pub mode: ReportMode,
    pub summary: AggregateSummary,
    pub period_totals: Vec<PeriodTotal>,
    pub records: Vec<ReadingRecord>,
    pub comparison: Option<PeriodComparison>,
    pub rejected_rows: usize,
}

impl ConsumptionReport {
    pub fn from_records(
        selection: Selection,
        mode: ReportMode,
        records: Vec<ReadingRecord>,
        rejected_rows: usize,
    ) -> Self {
        let records = query::normalize(records);

        let comparison = selection.compare.map(|(a, b)| {
            let records_a = query::daily_profile(&records, a);
            let records_b = query::daily_profile(&records, b);
            aggregate::compare(a, &records_a, b, &records_b)
        });

        let selected: Vec<ReadingRecord> = records.into_iter().filter(|r| selection.matches(r)).collect();

        Self {
            summary: aggregate::summarize(&selected, mode),
            period_totals: query::period_totals(&selected),
            records: selected,
            selection,
            mode,
            comparison,
            rejected_rows,
        }
    }
}

/// Folds the loaded readings into a `ConsumptionReport`.
///
/// Rejected rows are logged and counted; any other upstream error aborts
/// the render.
pub struct ReportSink {
    selection: Selection,
    mode: ReportMode,
}

impl ReportSink {
    pub fn new(selection: Selection, mode: ReportMode) -> Self {
        Self { selection, mode }
    }
}

#[async_trait::async_trait]
impl Sink<ReadingRecord> for ReportSink {
    type Output = ConsumptionReport;

    async fn run<S>(&self, mut input: S) -> Result<Self::Output, PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<ReadingRecord>, PipelineError>> + Send + Unpin + 'static,
    {
        let mut records = Vec::new();
        let mut rejected = 0usize;
        let mut first_received: Option<SystemTime> = None;

        while let Some(item) = input.next().await {
            match item {
                Ok(env) => {
                    first_received = Some(first_received.map_or(env.received_at, |t| t.min(env.received_at)));
                    records.push(env.payload);
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(error = %e, "dropping row");
                    rejected += 1;
                }
                Err(e) => {
                    tracing::error!(error = %e, "error in upstream pipeline for ReportSink");
                    metrics::counter!("report_sink_errors_total").increment(1);
                    return Err(e);
                }
            }
        }

        let report = ConsumptionReport::from_records(self.selection.clone(), self.mode, records, rejected);

        metrics::counter!("reports_rendered_total").increment(1);
        if let Some(start) = first_received {
            if let Ok(dur) = SystemTime::now().duration_since(start) {
                metrics::histogram!("report_render_seconds").record(dur.as_secs_f64());
            }
        }

        tracing::info!(
            records = report.records.len(),
            rejected_rows = rejected,
            mode = ?report.mode,
            "consumption report built"
        );

        Ok(report)
    }
}
