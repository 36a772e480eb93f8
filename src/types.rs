//! Type definitions for exported rows and cells

use std::fmt;
use std::str::FromStr;

use crate::error::{ExcelError, Result};

/// Maximum number of data rows a single physical sheet may hold (.xlsx limit)
pub const SHEET_MAX_ROWS: u32 = 1 << 20;

/// Maximum number of columns a sheet may address (XFD)
pub const SHEET_MAX_COLUMNS: u32 = 16_384;

/// Cell style presets registered by the bundled workbook backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellStyle {
    /// Default style - no formatting
    Default = 0,
    /// Bold text for headers
    HeaderBold = 1,
    /// Integer format with thousand separator (#,##0)
    NumberInteger = 2,
    /// Decimal format with 2 places (#,##0.00)
    NumberDecimal = 3,
    /// Currency format ($#,##0.00)
    NumberCurrency = 4,
    /// Percentage format (0.00%)
    NumberPercentage = 5,
    /// Date format (MM/DD/YYYY)
    DateDefault = 6,
    /// DateTime format (MM/DD/YYYY HH:MM:SS)
    DateTimestamp = 7,
    /// Bold text for emphasis
    TextBold = 8,
    /// Italic text for notes
    TextItalic = 9,
    /// Yellow background highlight
    HighlightYellow = 10,
    /// Green background highlight
    HighlightGreen = 11,
    /// Red background highlight
    HighlightRed = 12,
    /// Thin borders on all sides
    BorderThin = 13,
}

impl CellStyle {
    /// Highest style id in the preset table
    pub const MAX_ID: u32 = CellStyle::BorderThin as u32;

    /// Get the style id used by the workbook
    pub fn index(&self) -> u32 {
        *self as u32
    }
}

impl From<CellStyle> for u32 {
    fn from(style: CellStyle) -> Self {
        style.index()
    }
}

/// A primitive cell value
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellValue {
    /// Empty cell
    #[default]
    Empty,
    /// String value
    String(String),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// DateTime value (Excel serial date number)
    DateTime(f64),
    /// Error value such as `#N/A`
    Error(String),
}

impl CellValue {
    /// Convert cell value to string
    pub fn as_string(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::String(s) => s.clone(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::DateTime(d) => d.to_string(),
            CellValue::Error(e) => e.clone(),
        }
    }

    /// Check if cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Int(i)
    }
}

impl From<i32> for CellValue {
    fn from(i: i32) -> Self {
        CellValue::Int(i as i64)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Float(f)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// A single cell of an exported row
///
/// A non-empty formula takes precedence over the literal value when the
/// workbook is displayed; the value then only serves as the cached result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    /// Literal value
    pub value: CellValue,
    /// Style id; `0` means no explicit style
    pub style_id: u32,
    /// Optional formula, e.g. `SUM(A1:A10)`
    pub formula: Option<String>,
}

impl Cell {
    /// Create an unstyled cell
    pub fn new(value: impl Into<CellValue>) -> Self {
        Cell {
            value: value.into(),
            style_id: 0,
            formula: None,
        }
    }

    /// Create a cell with one of the preset styles
    pub fn styled(value: impl Into<CellValue>, style: CellStyle) -> Self {
        Cell {
            value: value.into(),
            style_id: style.index(),
            formula: None,
        }
    }

    /// Create a formula cell without a cached value
    pub fn formula(formula: impl Into<String>) -> Self {
        Cell {
            value: CellValue::Empty,
            style_id: 0,
            formula: Some(formula.into()),
        }
    }

    /// Set an explicit style id
    pub fn with_style(mut self, style_id: u32) -> Self {
        self.style_id = style_id;
        self
    }

    /// Style id to apply, if any
    pub fn style(&self) -> Option<u32> {
        (self.style_id > 0).then_some(self.style_id)
    }

    /// Formula to apply, if any (empty formulas are ignored)
    pub fn formula_text(&self) -> Option<&str> {
        self.formula.as_deref().filter(|f| !f.is_empty())
    }
}

macro_rules! cell_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Cell {
                fn from(value: $ty) -> Self {
                    Cell::new(value)
                }
            }
        )*
    };
}

cell_from!(CellValue, &str, String, i64, i32, f64, bool);

/// A 1-based cell coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellRef {
    /// Column number (1 = A)
    pub col: u32,
    /// Row number (1-based)
    pub row: u32,
}

impl CellRef {
    /// Create a cell reference from 1-based column and row numbers
    pub fn new(col: u32, row: u32) -> Result<Self> {
        if col == 0 || col > SHEET_MAX_COLUMNS || row == 0 || row > SHEET_MAX_ROWS {
            return Err(ExcelError::InvalidCell(format!("column {} row {}", col, row)));
        }
        Ok(CellRef { col, row })
    }

    /// Append the column letters of `col` to `buffer` (1 -> A, 27 -> AA)
    pub fn push_column_letter(buffer: &mut Vec<u8>, mut col: u32) {
        let mut tmp = [0u8; 4];
        let mut len = 0;
        while col > 0 {
            let rem = (col - 1) % 26;
            tmp[len] = b'A' + rem as u8;
            len += 1;
            col = (col - 1) / 26;
        }
        buffer.extend(tmp[..len].iter().rev());
    }

    /// Convert column number to Excel letters
    pub fn column_name(col: u32) -> String {
        let mut buffer = Vec::with_capacity(3);
        Self::push_column_letter(&mut buffer, col);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::column_name(self.col), self.row)
    }
}

impl FromStr for CellRef {
    type Err = ExcelError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ExcelError::InvalidCell(s.to_string());
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (letters, digits) = s.split_at(split);
        if letters.is_empty() || letters.len() > 3 {
            return Err(invalid());
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            if !c.is_ascii_alphabetic() {
                return Err(invalid());
            }
            col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        }
        let row: u32 = digits.parse().map_err(|_| invalid())?;

        CellRef::new(col, row).map_err(|_| invalid())
    }
}

/// A rectangular merge instruction for the sheet being written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MergeRange {
    pub top_left: CellRef,
    pub bottom_right: CellRef,
}

impl MergeRange {
    /// Create a merge range; corners are normalized
    pub fn new(a: CellRef, b: CellRef) -> Self {
        MergeRange {
            top_left: CellRef {
                col: a.col.min(b.col),
                row: a.row.min(b.row),
            },
            bottom_right: CellRef {
                col: a.col.max(b.col),
                row: a.row.max(b.row),
            },
        }
    }

    /// Parse a merge range from two A1 references
    pub fn parse(top_left: &str, bottom_right: &str) -> Result<Self> {
        Ok(MergeRange::new(top_left.parse()?, bottom_right.parse()?))
    }
}

impl fmt::Display for MergeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.top_left, self.bottom_right)
    }
}

/// Row-level options applied by forward-only stream writers
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RowOptions {
    /// Custom row height in points
    pub height: Option<f64>,
    /// Hide the row
    pub hidden: bool,
    /// Default style id for the row; `0` means none
    pub style_id: u32,
    /// Outline (grouping) level, 0..=7
    pub outline_level: u8,
}

impl RowOptions {
    /// True when no option deviates from the defaults
    pub fn is_default(&self) -> bool {
        *self == RowOptions::default()
    }
}

/// One row of exported data
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    /// Cells mapped to consecutive columns starting at column 1
    pub cells: Vec<Cell>,
    /// Merges to apply once the row is written
    pub merges: Vec<MergeRange>,
    /// Row options (streaming writers only)
    pub options: RowOptions,
}

impl Row {
    /// Create a row from anything convertible into cells
    pub fn new<I, C>(cells: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Cell>,
    {
        Row {
            cells: cells.into_iter().map(Into::into).collect(),
            merges: Vec::new(),
            options: RowOptions::default(),
        }
    }

    /// Add a merge instruction
    pub fn with_merge(mut self, range: MergeRange) -> Self {
        self.merges.push(range);
        self
    }

    /// Replace the row options
    pub fn with_options(mut self, options: RowOptions) -> Self {
        self.options = options;
        self
    }

    /// Get number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check whether the row has zero cells (it is still a row)
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Result of pulling from a row source
#[derive(Debug, Clone, PartialEq)]
pub enum Pulled {
    /// Another row to write
    Row(Row),
    /// No further rows for this logical sheet
    EndOfData,
}

impl From<Row> for Pulled {
    fn from(row: Row) -> Self {
        Pulled::Row(row)
    }
}

impl From<Option<Row>> for Pulled {
    fn from(row: Option<Row>) -> Self {
        row.map_or(Pulled::EndOfData, Pulled::Row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_reference() {
        assert_eq!(CellRef::new(1, 1).unwrap().to_string(), "A1");
        assert_eq!(CellRef::new(26, 1).unwrap().to_string(), "Z1");
        assert_eq!(CellRef::new(27, 1).unwrap().to_string(), "AA1");
        assert_eq!(CellRef::new(16_384, 100).unwrap().to_string(), "XFD100");
    }

    #[test]
    fn test_parse_cell_reference() {
        let cell: CellRef = "AB12".parse().unwrap();
        assert_eq!(cell, CellRef { col: 28, row: 12 });
        assert_eq!("c3".parse::<CellRef>().unwrap().to_string(), "C3");

        assert!("12".parse::<CellRef>().is_err());
        assert!("A0".parse::<CellRef>().is_err());
        assert!("A".parse::<CellRef>().is_err());
        assert!("XFE1".parse::<CellRef>().is_err());
        assert!("A1B".parse::<CellRef>().is_err());
    }

    #[test]
    fn test_merge_range_normalized() {
        let range = MergeRange::parse("C3", "A1").unwrap();
        assert_eq!(range.to_string(), "A1:C3");
    }

    #[test]
    fn test_cell_style_and_formula_rules() {
        let cell = Cell::new(5);
        assert_eq!(cell.style(), None);
        assert_eq!(cell.formula_text(), None);

        let cell = Cell::styled("Total", CellStyle::HeaderBold);
        assert_eq!(cell.style(), Some(1));

        let mut cell = Cell::formula("");
        assert_eq!(cell.formula_text(), None);
        cell.formula = Some("SUM(A1:A3)".to_string());
        assert_eq!(cell.formula_text(), Some("SUM(A1:A3)"));
    }

    #[test]
    fn test_empty_row_is_not_end_of_data() {
        let row = Row::new(Vec::<Cell>::new());
        assert!(row.is_empty());
        assert_eq!(Pulled::from(row.clone()), Pulled::Row(row));
        assert_eq!(Pulled::from(None), Pulled::EndOfData);
    }
}
