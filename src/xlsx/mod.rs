//! Bundled XLSX workbook backend
//!
//! [`XlsxWorkbook`] keeps random-access sheets in memory as a [`CellGrid`]
//! and spools streamed sheets to anonymous temporary files, so only the
//! buffered sheets cost memory. The package is assembled on
//! [`WorkbookBackend::save_as`] with inline strings and a preset style table
//! (see [`CellStyle`]).
//!
//! # Examples
//!
//! ```no_run
//! use excelstream_exporter::backend::{StreamWriter, WorkbookBackend};
//! use excelstream_exporter::types::{Cell, CellRef, RowOptions};
//! use excelstream_exporter::xlsx::XlsxWorkbook;
//!
//! let mut workbook = XlsxWorkbook::new()?;
//! let mut stream = workbook.open_stream_writer("Sheet1")?;
//! stream.set_row(CellRef::new(1, 1)?, &[Cell::new("Name"), Cell::new("Age")], &RowOptions::default())?;
//! stream.flush()?;
//! workbook.save_as("people.xlsx".as_ref())?;
//! workbook.close()?;
//! # Ok::<(), excelstream_exporter::ExcelError>(())
//! ```

pub mod grid;
mod package;
pub mod stream;
pub mod xml_writer;

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::backend::{validate_sheet_name, WorkbookBackend, DEFAULT_SHEET_NAME};
use crate::error::{ExcelError, Result};
use crate::types::{CellRef, CellStyle, CellValue, MergeRange};
use grid::{CellGrid, ColWidth};
use stream::StreamSlot;

pub use stream::XlsxStreamWriter;

/// Reject style ids outside the preset table
pub(crate) fn check_style(style_id: u32) -> Result<()> {
    if style_id > CellStyle::MAX_ID {
        return Err(ExcelError::InvalidStyle(style_id));
    }
    Ok(())
}

pub(crate) enum SheetBody {
    Grid(CellGrid),
    Streamed(StreamSlot),
}

pub(crate) struct Worksheet {
    pub name: String,
    pub body: SheetBody,
}

impl Worksheet {
    pub(crate) fn new(name: &str) -> Self {
        Worksheet {
            name: name.to_string(),
            body: SheetBody::Grid(CellGrid::new()),
        }
    }
}

/// In-process XLSX workbook
pub struct XlsxWorkbook {
    /// Keyed by lowercase name; Excel compares sheet names case-insensitively
    sheets: IndexMap<String, Worksheet>,
    closed: bool,
}

impl XlsxWorkbook {
    /// Create a workbook holding the empty placeholder sheet `Sheet1`
    pub fn new() -> Result<Self> {
        let mut sheets = IndexMap::new();
        sheets.insert(
            DEFAULT_SHEET_NAME.to_lowercase(),
            Worksheet::new(DEFAULT_SHEET_NAME),
        );
        Ok(XlsxWorkbook {
            sheets,
            closed: false,
        })
    }

    /// Whether [`WorkbookBackend::close`] has run
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Value held by a buffered sheet, for inspection before saving
    pub fn cell_value(&self, sheet: &str, cell: CellRef) -> Result<Option<&CellValue>> {
        match &self.sheet(sheet)?.body {
            SheetBody::Grid(grid) => Ok(grid.value(cell)),
            SheetBody::Streamed(_) => Err(ExcelError::InvalidState(format!(
                "sheet '{}' is written through a stream",
                sheet
            ))),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(ExcelError::InvalidState("workbook is closed".to_string()));
        }
        Ok(())
    }

    fn not_found(&self, sheet: &str) -> ExcelError {
        ExcelError::SheetNotFound {
            sheet: sheet.to_string(),
            available: self.sheet_names().join(", "),
        }
    }

    fn sheet(&self, name: &str) -> Result<&Worksheet> {
        self.sheets
            .get(&name.to_lowercase())
            .ok_or_else(|| self.not_found(name))
    }

    fn grid_mut(&mut self, name: &str) -> Result<&mut CellGrid> {
        self.ensure_open()?;
        let key = name.to_lowercase();
        if !self.sheets.contains_key(&key) {
            return Err(self.not_found(name));
        }
        match self.sheets.get_mut(&key).map(|ws| &mut ws.body) {
            Some(SheetBody::Grid(grid)) => Ok(grid),
            _ => Err(ExcelError::InvalidState(format!(
                "sheet '{}' is written through a stream; random-access writes are not allowed",
                name
            ))),
        }
    }
}

impl WorkbookBackend for XlsxWorkbook {
    type Stream = XlsxStreamWriter;

    fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.values().map(|ws| ws.name.clone()).collect()
    }

    fn contains_sheet(&self, name: &str) -> bool {
        self.sheets.contains_key(&name.to_lowercase())
    }

    fn create_sheet(&mut self, name: &str) -> Result<()> {
        self.ensure_open()?;
        validate_sheet_name(name)?;
        let key = name.to_lowercase();
        if self.sheets.contains_key(&key) {
            return Err(ExcelError::DuplicateSheet(name.to_string()));
        }
        self.sheets.insert(key, Worksheet::new(name));
        debug!(sheet = name, "sheet created");
        Ok(())
    }

    fn delete_sheet(&mut self, name: &str) -> Result<()> {
        self.ensure_open()?;
        if self.sheets.shift_remove(&name.to_lowercase()).is_none() {
            return Err(self.not_found(name));
        }
        debug!(sheet = name, "sheet deleted");
        Ok(())
    }

    fn set_cell_value(&mut self, sheet: &str, cell: CellRef, value: &CellValue) -> Result<()> {
        self.grid_mut(sheet)?.set_value(cell, value);
        Ok(())
    }

    fn set_cell_style(&mut self, sheet: &str, cell: CellRef, style_id: u32) -> Result<()> {
        check_style(style_id)?;
        self.grid_mut(sheet)?.set_style(cell, style_id);
        Ok(())
    }

    fn set_cell_formula(&mut self, sheet: &str, cell: CellRef, formula: &str) -> Result<()> {
        self.grid_mut(sheet)?.set_formula(cell, formula);
        Ok(())
    }

    fn merge_cells(&mut self, sheet: &str, range: &MergeRange) -> Result<()> {
        self.grid_mut(sheet)?.merge(*range)
    }

    fn set_col_width(&mut self, sheet: &str, min: u32, max: u32, width: f64) -> Result<()> {
        let width = ColWidth::new(min, max, width)?;
        self.grid_mut(sheet)?.set_col_width(width);
        Ok(())
    }

    fn open_stream_writer(&mut self, sheet: &str) -> Result<XlsxStreamWriter> {
        self.ensure_open()?;
        let key = sheet.to_lowercase();
        let Some(ws) = self.sheets.get_mut(&key) else {
            return Err(self.not_found(sheet));
        };

        // Anything written to the sheet before is replaced by the stream
        let slot: StreamSlot = Arc::new(Mutex::new(None));
        ws.body = SheetBody::Streamed(Arc::clone(&slot));
        let name = ws.name.clone();
        debug!(sheet = %name, "stream writer opened");
        XlsxStreamWriter::new(&name, slot)
    }

    fn save_as(&mut self, path: &Path) -> Result<()> {
        self.ensure_open()?;
        let sheets: Vec<&Worksheet> = self.sheets.values().collect();
        package::write_package(path, &sheets)?;
        info!(path = %path.display(), sheets = sheets.len(), "workbook saved");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        // Dropping the slots releases the spool files
        self.sheets.clear();
        self.closed = true;
        debug!("workbook closed");
        Ok(())
    }
}
