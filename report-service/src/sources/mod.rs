pub mod cells;
pub mod readings_csv_file;
pub mod workbook_file;

pub use readings_csv_file::CsvReadingsSource;
pub use workbook_file::WorkbookSource;
