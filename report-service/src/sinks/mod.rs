pub mod csv_export;
pub mod report;

pub use csv_export::CsvExportSink;
pub use report::{ConsumptionReport, ReportSink};
