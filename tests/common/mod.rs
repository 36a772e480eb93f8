//! Recording workbook backend shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use excelstream_exporter::backend::{StreamWriter, WorkbookBackend};
use excelstream_exporter::types::{Cell, CellRef, CellValue, MergeRange, RowOptions};
use excelstream_exporter::{ExcelError, Result};
use parking_lot::Mutex;

/// Values are kept for the first rows of each sheet only
const KEPT_ROWS: u32 = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    CreateSheet(String),
    DeleteSheet(String),
    OpenStream(String),
    ColWidth(String),
    Flush(String),
    SaveAs,
    Close,
}

#[derive(Debug, Default)]
pub struct Journal {
    pub events: Vec<Event>,
    /// Highest row number written per sheet
    pub last_row: HashMap<String, u32>,
    /// Rows written per sheet
    pub rows: HashMap<String, u64>,
    /// Cell values of the first rows, keyed by sheet and row number
    pub values: HashMap<(String, u32), Vec<CellValue>>,
    pub merges: Vec<(String, MergeRange)>,
    /// Cells written so far, sampled each time a merge is requested
    pub cells_before_merge: Vec<u64>,
    pub cell_writes: u64,
    /// Style ids keyed by sheet, row and column
    pub styles: HashMap<(String, u32, u32), u32>,
    pub formulas: HashMap<(String, u32, u32), String>,
    /// Non-default row options keyed by sheet and row
    pub row_options: HashMap<(String, u32), RowOptions>,
    pub sheets_at_save: Vec<String>,
}

impl Journal {
    pub fn rows_in(&self, sheet: &str) -> u64 {
        self.rows.get(sheet).copied().unwrap_or(0)
    }

    pub fn value(&self, sheet: &str, row: u32, col: usize) -> Option<&CellValue> {
        self.values
            .get(&(sheet.to_string(), row))
            .and_then(|cells| cells.get(col - 1))
    }

    pub fn style(&self, sheet: &str, row: u32, col: u32) -> Option<u32> {
        self.styles.get(&(sheet.to_string(), row, col)).copied()
    }

    pub fn formula(&self, sheet: &str, row: u32, col: u32) -> Option<&str> {
        self.formulas
            .get(&(sheet.to_string(), row, col))
            .map(String::as_str)
    }

    pub fn count(&self, event: &Event) -> usize {
        self.events.iter().filter(|e| *e == event).count()
    }

    pub fn saved(&self) -> bool {
        self.events.contains(&Event::SaveAs)
    }

    pub fn closed(&self) -> bool {
        self.events.contains(&Event::Close)
    }

    fn record_row(&mut self, sheet: &str, row: u32, cells: Vec<CellValue>) {
        *self.rows.entry(sheet.to_string()).or_default() += 1;
        let last = self.last_row.entry(sheet.to_string()).or_default();
        *last = (*last).max(row);
        if row <= KEPT_ROWS {
            self.values.insert((sheet.to_string(), row), cells);
        }
    }
}

pub type SharedJournal = Arc<Mutex<Journal>>;

/// Backend that records every call instead of producing a file
pub struct RecordingBackend {
    sheets: Vec<String>,
    journal: SharedJournal,
    /// Fail the write of this row number, on any sheet
    pub fail_at_row: Option<u32>,
}

impl RecordingBackend {
    pub fn new() -> (Self, SharedJournal) {
        let journal = SharedJournal::default();
        let backend = RecordingBackend {
            sheets: vec!["Sheet1".to_string()],
            journal: Arc::clone(&journal),
            fail_at_row: None,
        };
        (backend, journal)
    }

    pub fn failing_at_row(row: u32) -> (Self, SharedJournal) {
        let (mut backend, journal) = Self::new();
        backend.fail_at_row = Some(row);
        (backend, journal)
    }

    fn check_row(&self, row: u32) -> Result<()> {
        if self.fail_at_row == Some(row) {
            return Err(ExcelError::WriteError(format!("injected failure at row {}", row)));
        }
        Ok(())
    }

    fn check_sheet(&self, sheet: &str) -> Result<()> {
        if !self.contains_sheet(sheet) {
            return Err(ExcelError::SheetNotFound {
                sheet: sheet.to_string(),
                available: self.sheets.join(", "),
            });
        }
        Ok(())
    }
}

impl WorkbookBackend for RecordingBackend {
    type Stream = RecordingStream;

    fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.clone()
    }

    fn create_sheet(&mut self, name: &str) -> Result<()> {
        if self.contains_sheet(name) {
            return Err(ExcelError::DuplicateSheet(name.to_string()));
        }
        self.sheets.push(name.to_string());
        self.journal
            .lock()
            .events
            .push(Event::CreateSheet(name.to_string()));
        Ok(())
    }

    fn delete_sheet(&mut self, name: &str) -> Result<()> {
        self.check_sheet(name)?;
        self.sheets.retain(|s| !s.eq_ignore_ascii_case(name));
        self.journal
            .lock()
            .events
            .push(Event::DeleteSheet(name.to_string()));
        Ok(())
    }

    fn set_cell_value(&mut self, sheet: &str, cell: CellRef, value: &CellValue) -> Result<()> {
        self.check_sheet(sheet)?;
        self.check_row(cell.row)?;
        let mut journal = self.journal.lock();
        journal.cell_writes += 1;
        if cell.col == 1 {
            journal.record_row(sheet, cell.row, Vec::new());
        }
        if cell.row <= KEPT_ROWS {
            let cells = journal
                .values
                .entry((sheet.to_string(), cell.row))
                .or_default();
            if cells.len() < cell.col as usize {
                cells.resize(cell.col as usize, CellValue::Empty);
            }
            cells[cell.col as usize - 1] = value.clone();
        }
        Ok(())
    }

    fn set_cell_style(&mut self, sheet: &str, cell: CellRef, style_id: u32) -> Result<()> {
        self.check_sheet(sheet)?;
        self.journal
            .lock()
            .styles
            .insert((sheet.to_string(), cell.row, cell.col), style_id);
        Ok(())
    }

    fn set_cell_formula(&mut self, sheet: &str, cell: CellRef, formula: &str) -> Result<()> {
        self.check_sheet(sheet)?;
        self.journal
            .lock()
            .formulas
            .insert((sheet.to_string(), cell.row, cell.col), formula.to_string());
        Ok(())
    }

    fn merge_cells(&mut self, sheet: &str, range: &MergeRange) -> Result<()> {
        self.check_sheet(sheet)?;
        let mut journal = self.journal.lock();
        let written = journal.cell_writes;
        journal.cells_before_merge.push(written);
        journal.merges.push((sheet.to_string(), *range));
        Ok(())
    }

    fn set_col_width(&mut self, sheet: &str, _min: u32, _max: u32, _width: f64) -> Result<()> {
        self.check_sheet(sheet)?;
        self.journal
            .lock()
            .events
            .push(Event::ColWidth(sheet.to_string()));
        Ok(())
    }

    fn open_stream_writer(&mut self, sheet: &str) -> Result<RecordingStream> {
        self.check_sheet(sheet)?;
        self.journal
            .lock()
            .events
            .push(Event::OpenStream(sheet.to_string()));
        Ok(RecordingStream {
            sheet: sheet.to_string(),
            journal: Arc::clone(&self.journal),
            fail_at_row: self.fail_at_row,
            pending_merges: Vec::new(),
        })
    }

    fn save_as(&mut self, _path: &Path) -> Result<()> {
        let mut journal = self.journal.lock();
        journal.events.push(Event::SaveAs);
        journal.sheets_at_save = self.sheets.clone();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.journal.lock().events.push(Event::Close);
        Ok(())
    }
}

pub struct RecordingStream {
    sheet: String,
    journal: SharedJournal,
    fail_at_row: Option<u32>,
    pending_merges: Vec<MergeRange>,
}

impl StreamWriter for RecordingStream {
    /// Records styles and formulas the way the bundled stream writer renders them
    fn set_row(&mut self, start: CellRef, cells: &[Cell], options: &RowOptions) -> Result<()> {
        if self.fail_at_row == Some(start.row) {
            return Err(ExcelError::WriteError(format!(
                "injected failure at row {}",
                start.row
            )));
        }
        let mut journal = self.journal.lock();
        if let Some(last) = journal.last_row.get(&self.sheet) {
            assert!(start.row > *last, "stream rows must ascend");
        }
        let values = if start.row <= KEPT_ROWS {
            cells.iter().map(|c| c.value.clone()).collect()
        } else {
            Vec::new()
        };
        journal.record_row(&self.sheet, start.row, values);
        journal.cell_writes += cells.len() as u64;

        for (offset, cell) in cells.iter().enumerate() {
            let key = (self.sheet.clone(), start.row, start.col + offset as u32);
            if let Some(style_id) = cell.style() {
                journal.styles.insert(key.clone(), style_id);
            }
            if let Some(formula) = cell.formula_text() {
                journal.formulas.insert(key, formula.to_string());
            }
        }
        if !options.is_default() {
            journal
                .row_options
                .insert((self.sheet.clone(), start.row), options.clone());
        }
        Ok(())
    }

    fn merge_cells(&mut self, range: &MergeRange) -> Result<()> {
        let mut journal = self.journal.lock();
        let written = journal.cell_writes;
        journal.cells_before_merge.push(written);
        self.pending_merges.push(*range);
        Ok(())
    }

    fn set_col_width(&mut self, _min: u32, _max: u32, _width: f64) -> Result<()> {
        self.journal
            .lock()
            .events
            .push(Event::ColWidth(self.sheet.clone()));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let mut journal = self.journal.lock();
        for range in self.pending_merges.drain(..) {
            journal.merges.push((self.sheet.clone(), range));
        }
        journal.events.push(Event::Flush(self.sheet.clone()));
        Ok(())
    }
}
