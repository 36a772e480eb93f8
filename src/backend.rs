//! Workbook backend contract
//!
//! The exporter never touches the file format directly. It drives a
//! [`WorkbookBackend`] through a narrow set of primitives: sheet management,
//! random-access cell writes, forward-only stream writers and persistence.
//! [`crate::xlsx::XlsxWorkbook`] is the bundled implementation.

use std::path::Path;

use crate::error::{ExcelError, Result};
use crate::types::{Cell, CellRef, CellValue, MergeRange, RowOptions};

/// Name of the placeholder sheet every fresh workbook starts with
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

/// Maximum sheet name length accepted by Excel
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Forward-only writer bound to one sheet
///
/// Rows must arrive in strictly increasing row order. Merges and column
/// widths issued to a stream are only committed to the workbook by
/// [`StreamWriter::flush`].
pub trait StreamWriter {
    /// Write a whole row; `cells` map to consecutive columns from `start`
    fn set_row(&mut self, start: CellRef, cells: &[Cell], options: &RowOptions) -> Result<()>;

    /// Queue a merge for this sheet
    fn merge_cells(&mut self, range: &MergeRange) -> Result<()>;

    /// Set the width of columns `min..=max`; only allowed before the first row
    fn set_col_width(&mut self, min: u32, max: u32, width: f64) -> Result<()>;

    /// Commit rows, merges and column settings to the workbook
    fn flush(&mut self) -> Result<()>;
}

/// Primitives the exporter needs from a workbook implementation
pub trait WorkbookBackend {
    /// Stream writer type handed out by [`WorkbookBackend::open_stream_writer`]
    type Stream: StreamWriter;

    /// Number of sheets currently in the workbook
    fn sheet_count(&self) -> usize;

    /// Sheet names in workbook order
    fn sheet_names(&self) -> Vec<String>;

    /// Check whether a sheet exists
    fn contains_sheet(&self, name: &str) -> bool {
        self.sheet_names().iter().any(|s| s.eq_ignore_ascii_case(name))
    }

    /// Append a new, empty sheet
    fn create_sheet(&mut self, name: &str) -> Result<()>;

    /// Remove a sheet
    fn delete_sheet(&mut self, name: &str) -> Result<()>;

    /// Random-access value write
    fn set_cell_value(&mut self, sheet: &str, cell: CellRef, value: &CellValue) -> Result<()>;

    /// Random-access style write
    fn set_cell_style(&mut self, sheet: &str, cell: CellRef, style_id: u32) -> Result<()>;

    /// Random-access formula write
    fn set_cell_formula(&mut self, sheet: &str, cell: CellRef, formula: &str) -> Result<()>;

    /// Merge a rectangular range
    fn merge_cells(&mut self, sheet: &str, range: &MergeRange) -> Result<()>;

    /// Set the width of columns `min..=max`
    fn set_col_width(&mut self, sheet: &str, min: u32, max: u32, width: f64) -> Result<()>;

    /// Open a forward-only writer for `sheet`
    fn open_stream_writer(&mut self, sheet: &str) -> Result<Self::Stream>;

    /// Persist the workbook
    fn save_as(&mut self, path: &Path) -> Result<()>;

    /// Release backend resources; calling it more than once is a no-op
    fn close(&mut self) -> Result<()>;
}

/// Check a sheet name against Excel's naming rules
pub fn validate_sheet_name(name: &str) -> Result<()> {
    let invalid = |reason| ExcelError::InvalidSheetName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.chars().count() > MAX_SHEET_NAME_LEN {
        return Err(invalid("name is longer than 31 characters"));
    }
    if name.contains(['[', ']', ':', '*', '?', '/', '\\']) {
        return Err(invalid("name contains one of [ ] : * ? / \\"));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(invalid("name starts or ends with an apostrophe"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_sheet_names() {
        assert!(validate_sheet_name("Sheet1").is_ok());
        assert!(validate_sheet_name("Orders 2024_1").is_ok());
        assert!(validate_sheet_name(&"x".repeat(31)).is_ok());
    }

    #[test]
    fn test_invalid_sheet_names() {
        assert!(validate_sheet_name("").is_err());
        assert!(validate_sheet_name(&"x".repeat(32)).is_err());
        assert!(validate_sheet_name("a/b").is_err());
        assert!(validate_sheet_name("what?").is_err());
        assert!(validate_sheet_name("'quoted").is_err());
    }
}
