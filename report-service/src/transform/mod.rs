use crate::pipeline::{Envelope, PipelineError, Transform};
use meter_client::{
    domain::{Period, ReadingRecord},
    query::Selection,
};
use time::macros::date;

/// Pure validation of a `ReadingRecord`.
///
/// Rules:
/// - meter value must be finite and non-negative.
/// - consumption must be finite (its sign is kept).
/// - date must be within a broad sanity window [2000-01-01, 2100-01-01).
pub fn validate_reading(env: Envelope<ReadingRecord>) -> Result<Envelope<ReadingRecord>, PipelineError> {
    let r = &env.payload;

    if !r.meter_value.is_finite() || r.meter_value < 0.0 {
        return Err(PipelineError::Rejected(format!(
            "{} {}: meter value must be non-negative",
            r.period, r.date
        )));
    }

    if !r.consumption.is_finite() {
        return Err(PipelineError::Rejected(format!(
            "{} {}: consumption must be finite",
            r.period, r.date
        )));
    }

    let min_date = date!(2000 - 01 - 01);
    let max_date = date!(2100 - 01 - 01);

    if r.date < min_date || r.date >= max_date {
        return Err(PipelineError::Rejected(format!(
            "{}: date {} out of allowed range",
            r.period, r.date
        )));
    }

    Ok(env)
}

#[derive(Clone, Default)]
pub struct ReadingValidation;

#[async_trait::async_trait]
impl Transform<ReadingRecord, ReadingRecord> for ReadingValidation {
    async fn apply(
        &self,
        input: Envelope<ReadingRecord>,
    ) -> Result<Option<Envelope<ReadingRecord>>, PipelineError> {
        match validate_reading(input) {
            Ok(env) => Ok(Some(env)),
            Err(e) => {
                metrics::counter!("validation_readings_rejected_total").increment(1);
                Err(e)
            }
        }
    }
}

/// Keeps the records the selection (or its comparison pair) asks for,
/// optionally limited to a fixed set of periods.
#[derive(Clone)]
pub struct SelectionFilter {
    selection: Selection,
    periods: Option<Vec<Period>>,
}

impl SelectionFilter {
    pub fn new(selection: Selection) -> Self {
        Self {
            selection,
            periods: None,
        }
    }

    pub fn restricted_to(mut self, periods: Vec<Period>) -> Self {
        self.periods = Some(periods);
        self
    }

    fn keeps(&self, record: &ReadingRecord) -> bool {
        let allowed = self.periods.as_ref().map_or(true, |ps| ps.contains(&record.period));
        allowed && self.selection.wants(record)
    }
}

#[async_trait::async_trait]
impl Transform<ReadingRecord, ReadingRecord> for SelectionFilter {
    async fn apply(
        &self,
        input: Envelope<ReadingRecord>,
    ) -> Result<Option<Envelope<ReadingRecord>>, PipelineError> {
        Ok(self.keeps(&input.payload).then_some(input))
    }
}
