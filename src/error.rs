//! Error types for excelstream-exporter

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, ExcelError>;

/// Main error type for all export operations
#[derive(Error, Debug)]
pub enum ExcelError {
    /// Sheet name violates the workbook naming rules
    #[error("Invalid sheet name '{name}': {reason}")]
    InvalidSheetName { name: String, reason: &'static str },

    /// A sheet with this name already exists
    #[error("Sheet '{0}' already exists")]
    DuplicateSheet(String),

    /// Invalid sheet name or sheet not found
    #[error("Sheet '{sheet}' not found. Available sheets: {available}")]
    SheetNotFound { sheet: String, available: String },

    /// Invalid cell reference
    #[error("Invalid cell reference: {0}")]
    InvalidCell(String),

    /// Style id not registered in the workbook
    #[error("Style id {0} is not registered")]
    InvalidStyle(u32),

    /// Error occurred while writing workbook content
    #[error("Failed to write Excel file: {0}")]
    WriteError(String),

    /// Error occurred while writing a row
    #[error("Failed to write row {row} to sheet '{sheet}': {source}")]
    WriteRowError {
        row: u32,
        sheet: String,
        #[source]
        source: Box<ExcelError>,
    },

    /// Structural failure while preparing a sheet
    #[error("Failed while {stage} '{sheet}': {source}")]
    SheetError {
        stage: &'static str,
        sheet: String,
        #[source]
        source: Box<ExcelError>,
    },

    /// A row source reported a failure of its own
    #[error("Row source failed: {0}")]
    RowSource(String),

    /// Failure recorded by a channel producer
    #[error("Row producer failed: {0}")]
    Producer(#[source] Arc<ExcelError>),

    /// The producer thread panicked before finishing
    #[error("Row producer panicked: {0}")]
    ProducerPanicked(String),

    /// The consuming side of a row channel has gone away
    #[error("Row consumer is gone; export was aborted or finished")]
    ConsumerGone,

    /// The workbook could not be persisted
    #[error("Failed to save workbook to '{}': {source}", path.display())]
    SaveError {
        path: PathBuf,
        #[source]
        source: Box<ExcelError>,
    },

    /// Operation not allowed in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ExcelError {
    /// Attach the failing stage and sheet to an error
    pub(crate) fn in_sheet(self, stage: &'static str, sheet: &str) -> Self {
        ExcelError::SheetError {
            stage,
            sheet: sheet.to_string(),
            source: Box::new(self),
        }
    }

    /// Attach the row position to a write error
    pub(crate) fn at_row(self, row: u32, sheet: &str) -> Self {
        ExcelError::WriteRowError {
            row,
            sheet: sheet.to_string(),
            source: Box::new(self),
        }
    }
}

/// Convert an s-zip failure into a write error
pub(crate) fn zip_error(err: impl std::fmt::Display) -> ExcelError {
    ExcelError::WriteError(format!("zip: {}", err))
}
