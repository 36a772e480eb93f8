//! Forward-only sheet writer spooling rows to a temporary file

use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::grid::{ColWidth, MergeSet};
use super::xml_writer::XmlWriter;
use super::check_style;
use crate::backend::StreamWriter;
use crate::error::{ExcelError, Result};
use crate::types::{Cell, CellRef, MergeRange, RowOptions, SHEET_MAX_COLUMNS};

/// Rows, merges and column widths committed by a flushed stream
pub(crate) struct StreamedSheet {
    pub spool: File,
    pub cols: Vec<ColWidth>,
    pub merges: Vec<MergeRange>,
    pub rows: u32,
}

/// Slot shared between a workbook sheet and its stream writer
pub(crate) type StreamSlot = Arc<Mutex<Option<StreamedSheet>>>;

/// Stream writer for one sheet of an [`super::XlsxWorkbook`]
///
/// Rows are serialized immediately into an anonymous temporary file.
/// Merges and column widths are held here until [`StreamWriter::flush`],
/// which hands everything to the workbook. A stream that is never flushed
/// leaves its sheet empty.
pub struct XlsxStreamWriter {
    sheet: String,
    xml: Option<XmlWriter<BufWriter<File>>>,
    slot: StreamSlot,
    cols: Vec<ColWidth>,
    merges: MergeSet,
    last_row: u32,
    rows: u32,
}

impl XlsxStreamWriter {
    pub(crate) fn new(sheet: &str, slot: StreamSlot) -> Result<Self> {
        let spool = tempfile::tempfile()?;
        Ok(XlsxStreamWriter {
            sheet: sheet.to_string(),
            xml: Some(XmlWriter::new(BufWriter::with_capacity(64 * 1024, spool))),
            slot,
            cols: Vec::new(),
            merges: MergeSet::new(),
            last_row: 0,
            rows: 0,
        })
    }

    /// Sheet this writer is bound to
    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    /// Last row number written, 0 if none
    pub fn last_row(&self) -> u32 {
        self.last_row
    }

    fn xml(&mut self) -> Result<&mut XmlWriter<BufWriter<File>>> {
        let sheet = &self.sheet;
        self.xml.as_mut().ok_or_else(|| {
            ExcelError::InvalidState(format!("stream writer for '{}' was already flushed", sheet))
        })
    }
}

impl StreamWriter for XlsxStreamWriter {
    fn set_row(&mut self, start: CellRef, cells: &[Cell], options: &RowOptions) -> Result<()> {
        if start.row <= self.last_row {
            return Err(ExcelError::WriteError(format!(
                "row {} must come after row {} in stream for '{}'",
                start.row, self.last_row, self.sheet
            )));
        }
        if cells.len() as u64 + start.col as u64 - 1 > SHEET_MAX_COLUMNS as u64 {
            return Err(ExcelError::InvalidCell(format!(
                "row {} has {} cells starting at column {}",
                start.row,
                cells.len(),
                start.col
            )));
        }
        for cell in cells {
            if let Some(style_id) = cell.style() {
                check_style(style_id)?;
            }
        }
        if options.style_id > 0 {
            check_style(options.style_id)?;
        }

        let xml = self.xml()?;
        xml.start_element("row")?;
        xml.attribute_int("r", start.row)?;
        if let Some(height) = options.height {
            xml.attribute_float("ht", height)?;
            xml.attribute("customHeight", "1")?;
        }
        if options.hidden {
            xml.attribute("hidden", "1")?;
        }
        if options.style_id > 0 {
            xml.attribute_int("s", options.style_id)?;
            xml.attribute("customFormat", "1")?;
        }
        if options.outline_level > 0 {
            xml.attribute_int("outlineLevel", options.outline_level.min(7))?;
        }
        xml.close_start_tag()?;

        for (offset, cell) in cells.iter().enumerate() {
            let coord = CellRef {
                col: start.col + offset as u32,
                row: start.row,
            };
            xml.write_cell(coord, &cell.value, cell.style_id, cell.formula_text())?;
        }
        xml.end_element("row")?;

        self.last_row = start.row;
        self.rows += 1;
        Ok(())
    }

    fn merge_cells(&mut self, range: &MergeRange) -> Result<()> {
        self.xml()?;
        self.merges.insert(*range)
    }

    fn set_col_width(&mut self, min: u32, max: u32, width: f64) -> Result<()> {
        self.xml()?;
        if self.last_row > 0 {
            return Err(ExcelError::WriteError(format!(
                "column widths for '{}' must be set before the first row",
                self.sheet
            )));
        }
        self.cols.push(ColWidth::new(min, max, width)?);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let Some(xml) = self.xml.take() else {
            return Ok(());
        };

        let spool = xml
            .into_inner()?
            .into_inner()
            .map_err(|e| ExcelError::IoError(e.into_error()))?;

        *self.slot.lock() = Some(StreamedSheet {
            spool,
            cols: std::mem::take(&mut self.cols),
            merges: std::mem::take(&mut self.merges).into_vec(),
            rows: self.rows,
        });
        debug!(sheet = %self.sheet, rows = self.rows, "stream committed");
        Ok(())
    }
}
