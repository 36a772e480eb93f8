//! In-memory sheet model for random-access writes

use std::collections::BTreeMap;
use std::io::Write;

use super::xml_writer::XmlWriter;
use crate::error::{ExcelError, Result};
use crate::types::{CellRef, CellValue, MergeRange, SHEET_MAX_COLUMNS};

/// Column width setting for `min..=max`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColWidth {
    pub min: u32,
    pub max: u32,
    pub width: f64,
}

impl ColWidth {
    /// Validate a column width request
    pub fn new(min: u32, max: u32, width: f64) -> Result<Self> {
        let (min, max) = (min.min(max), min.max(max));
        if min == 0 || max > SHEET_MAX_COLUMNS {
            return Err(ExcelError::InvalidCell(format!(
                "column range {}..={}",
                min, max
            )));
        }
        if !(0.0..=255.0).contains(&width) {
            return Err(ExcelError::WriteError(format!(
                "column width {} is outside 0..=255",
                width
            )));
        }
        Ok(ColWidth { min, max, width })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct GridCell {
    value: CellValue,
    style_id: u32,
    formula: Option<String>,
}

/// Cells of one sheet, kept sorted by row then column
#[derive(Debug, Default)]
pub struct CellGrid {
    rows: BTreeMap<u32, BTreeMap<u32, GridCell>>,
    merges: MergeSet,
    cols: Vec<ColWidth>,
}

impl CellGrid {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell_mut(&mut self, cell: CellRef) -> &mut GridCell {
        self.rows
            .entry(cell.row)
            .or_default()
            .entry(cell.col)
            .or_default()
    }

    pub fn set_value(&mut self, cell: CellRef, value: &CellValue) {
        self.cell_mut(cell).value = value.clone();
    }

    pub fn set_style(&mut self, cell: CellRef, style_id: u32) {
        self.cell_mut(cell).style_id = style_id;
    }

    pub fn set_formula(&mut self, cell: CellRef, formula: &str) {
        self.cell_mut(cell).formula = Some(formula.to_string());
    }

    /// Add a merge; overlapping an existing merge is an error
    pub fn merge(&mut self, range: MergeRange) -> Result<()> {
        self.merges.insert(range)
    }

    pub fn set_col_width(&mut self, width: ColWidth) {
        self.cols.push(width);
    }

    /// Number of rows holding at least one cell
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Value stored at `cell`, if any
    pub fn value(&self, cell: CellRef) -> Option<&CellValue> {
        self.rows
            .get(&cell.row)
            .and_then(|row| row.get(&cell.col))
            .map(|c| &c.value)
    }

    /// Render the complete worksheet part
    pub fn write_xml<W: Write>(&self, xml: &mut XmlWriter<W>) -> Result<()> {
        write_worksheet_start(xml, &self.cols)?;

        for (row_num, cells) in &self.rows {
            xml.start_element("row")?;
            xml.attribute_int("r", *row_num)?;
            xml.close_start_tag()?;
            for (col, cell) in cells {
                xml.write_cell(
                    CellRef {
                        col: *col,
                        row: *row_num,
                    },
                    &cell.value,
                    cell.style_id,
                    cell.formula.as_deref().filter(|f| !f.is_empty()),
                )?;
            }
            xml.end_element("row")?;
        }

        write_worksheet_end(xml, self.merges.as_slice())
    }
}

/// Merges of one sheet, indexed by top row for overlap checks
///
/// A candidate can only overlap merges whose top row lies within the
/// tallest merge's height above it, so single-row merges are checked
/// against their own row only.
#[derive(Debug, Default)]
pub(crate) struct MergeSet {
    ranges: Vec<MergeRange>,
    by_top_row: BTreeMap<u32, Vec<usize>>,
    tallest: u32,
}

impl MergeSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record `range` unless it overlaps an existing merge
    pub(crate) fn insert(&mut self, range: MergeRange) -> Result<()> {
        if let Some(existing) = self.overlapping(&range).next() {
            return Err(ExcelError::WriteError(format!(
                "merge {} overlaps existing merge {}",
                range, existing
            )));
        }

        let height = range.bottom_right.row - range.top_left.row + 1;
        self.tallest = self.tallest.max(height);
        self.by_top_row
            .entry(range.top_left.row)
            .or_default()
            .push(self.ranges.len());
        self.ranges.push(range);
        Ok(())
    }

    /// Existing merges that could share a row with `range`
    pub(crate) fn candidates<'a>(
        &'a self,
        range: &MergeRange,
    ) -> impl Iterator<Item = &'a MergeRange> + 'a {
        let lowest_top = range
            .top_left
            .row
            .saturating_sub(self.tallest.saturating_sub(1));
        self.by_top_row
            .range(lowest_top..=range.bottom_right.row)
            .flat_map(|(_, ids)| ids.iter())
            .map(move |&id| &self.ranges[id])
    }

    fn overlapping<'a>(&'a self, range: &'a MergeRange) -> impl Iterator<Item = &'a MergeRange> + 'a {
        self.candidates(range).filter(move |m| overlaps(m, range))
    }

    pub(crate) fn as_slice(&self) -> &[MergeRange] {
        &self.ranges
    }

    pub(crate) fn into_vec(self) -> Vec<MergeRange> {
        self.ranges
    }
}

fn overlaps(a: &MergeRange, b: &MergeRange) -> bool {
    a.top_left.col <= b.bottom_right.col
        && b.top_left.col <= a.bottom_right.col
        && a.top_left.row <= b.bottom_right.row
        && b.top_left.row <= a.bottom_right.row
}

/// Write everything up to and including `<sheetData>`
pub(crate) fn write_worksheet_start<W: Write>(xml: &mut XmlWriter<W>, cols: &[ColWidth]) -> Result<()> {
    xml.write_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n")?;
    xml.start_element("worksheet")?;
    xml.attribute(
        "xmlns",
        "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
    )?;
    xml.attribute(
        "xmlns:r",
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships",
    )?;
    xml.close_start_tag()?;

    if !cols.is_empty() {
        xml.write_str("<cols>")?;
        for col in cols {
            xml.start_element("col")?;
            xml.attribute_int("min", col.min)?;
            xml.attribute_int("max", col.max)?;
            xml.attribute_float("width", col.width)?;
            xml.attribute("customWidth", "1")?;
            xml.close_empty()?;
        }
        xml.write_str("</cols>")?;
    }

    xml.write_str("<sheetData>")
}

/// Write `</sheetData>`, merges and the closing tag
pub(crate) fn write_worksheet_end<W: Write>(
    xml: &mut XmlWriter<W>,
    merges: &[MergeRange],
) -> Result<()> {
    xml.write_str("</sheetData>")?;

    if !merges.is_empty() {
        xml.start_element("mergeCells")?;
        xml.attribute_int("count", merges.len())?;
        xml.close_start_tag()?;
        for range in merges {
            xml.start_element("mergeCell")?;
            xml.attribute("ref", &range.to_string())?;
            xml.close_empty()?;
        }
        xml.end_element("mergeCells")?;
    }

    xml.end_element("worksheet")?;
    xml.flush()
}
