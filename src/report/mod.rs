pub mod aggregate;
pub mod cells;
pub mod sink;

pub use aggregate::upload;
pub use sink::CsvSheetSink;
