//! # excelstream-exporter
//!
//! Stream lazily produced rows into multi-sheet Excel workbooks.
//!
//! ## Features
//!
//! - **Pull-based sources**: every sheet pulls rows on demand until its source reports end of data
//! - **Channel adapter**: turn a push-style producer into a pull source with a rendezvous channel
//! - **Automatic splitting**: sheets longer than 1,048,576 rows continue on `<name>_1`, `<name>_2`, ...
//! - **Two write modes**: buffered random-access writes or forward-only streaming writes
//! - **Init hooks**: set up headers or column widths at the start of every physical sheet
//! - **Pluggable backends**: the bundled [`XlsxWorkbook`] or any [`WorkbookBackend`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use excelstream_exporter::{use_row_channel, Exporter, Row, SheetSpec};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let exporter = Exporter::new("orders.xlsx", true)?;
//!
//! let orders = use_row_channel(|tx| {
//!     tx.send(Row::new(["Order", "Amount"]))?;
//!     for id in 1..=10_i64 {
//!         tx.send(Row::new([id, id * 100]))?;
//!     }
//!     Ok(())
//! });
//!
//! let summary = exporter.export(vec![SheetSpec::new("Orders", orders)])?;
//! println!("wrote {} rows", summary.total_rows);
//! # Ok(())
//! # }
//! ```
//!
//! ### Write mode from the environment
//!
//! ```rust,no_run
//! use excelstream_exporter::{rows_from_iter, ExporterBuilder, Row, SheetSpec, WriteMode};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // MEMORY_LIMIT_MB below 1024 selects streaming
//! let exporter = ExporterBuilder::new("report.xlsx")
//!     .mode(WriteMode::from_env())
//!     .build()?;
//!
//! let rows = (0..1000).map(|i| Row::new([i]));
//! exporter.export(vec![SheetSpec::new("Numbers", rows_from_iter(rows))])?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod error;
pub mod exporter;
pub mod source;
pub mod strategy;
pub mod types;
pub mod xlsx;

pub use backend::{StreamWriter, WorkbookBackend};
pub use error::{ExcelError, Result};
pub use exporter::{ExportSummary, Exporter, ExporterBuilder, InitHook, SheetSpec, SheetSummary};
pub use source::{rows_from_iter, use_row_channel, ChannelSource, RowSender, RowSource};
pub use strategy::{BufferedWriter, StreamingWriter, WriteMode, WriterStrategy};
pub use types::{
    Cell, CellRef, CellStyle, CellValue, MergeRange, Pulled, Row, RowOptions, SHEET_MAX_ROWS,
};
pub use xlsx::XlsxWorkbook;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_imports() {
        let _ = CellValue::Empty;
        assert_eq!(SHEET_MAX_ROWS, 1_048_576);
        assert_eq!(WriteMode::from_streaming(true), WriteMode::Streaming);
        assert!(XlsxWorkbook::new().is_ok());
    }
}
