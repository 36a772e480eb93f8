//! Writer strategies
//!
//! A strategy decides how a pulled [`Row`] reaches the workbook backend.
//! One strategy is selected per export:
//!
//! - [`BufferedWriter`]: random-access cell writes; the backend keeps the
//!   whole workbook in memory until it is saved.
//! - [`StreamingWriter`]: forward-only stream writers; constant memory per
//!   row, but rows must be written in order and every stream must be
//!   flushed before the next one is opened.

use tracing::debug;

use crate::backend::{StreamWriter, WorkbookBackend};
use crate::error::{ExcelError, Result};
use crate::types::{CellRef, Row};

/// Memory limit (MB) under which [`WriteMode::from_memory_mb`] picks streaming
const STREAMING_MEMORY_THRESHOLD_MB: usize = 1024;

/// Which writer strategy an export uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WriteMode {
    /// Random-access writes into the in-memory workbook
    #[default]
    Buffered,
    /// Forward-only stream writers
    Streaming,
}

impl WriteMode {
    /// Map the classic `use_streaming` flag to a mode
    pub fn from_streaming(use_streaming: bool) -> Self {
        if use_streaming {
            WriteMode::Streaming
        } else {
            WriteMode::Buffered
        }
    }

    /// Pick a mode from a memory limit in MB
    pub fn from_memory_mb(memory_mb: usize) -> Self {
        Self::from_streaming(memory_mb < STREAMING_MEMORY_THRESHOLD_MB)
    }

    /// Detect from environment variable MEMORY_LIMIT_MB
    pub fn from_env() -> Self {
        std::env::var("MEMORY_LIMIT_MB")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .map(Self::from_memory_mb)
            .unwrap_or_default()
    }

    pub(crate) fn into_strategy<B: WorkbookBackend + 'static>(self) -> Box<dyn WriterStrategy<B>> {
        match self {
            WriteMode::Buffered => Box::new(BufferedWriter),
            WriteMode::Streaming => Box::new(StreamingWriter::<B>::new()),
        }
    }
}

/// How rows are materialized into a workbook backend
pub trait WriterStrategy<B: WorkbookBackend> {
    /// Prepare `sheet` to receive rows starting at row 1
    fn begin_sheet(&mut self, backend: &mut B, sheet: &str) -> Result<()>;

    /// Write one row at the 1-based `row_number` of `sheet`
    fn write_row(&mut self, backend: &mut B, sheet: &str, row_number: u32, row: &Row)
        -> Result<()>;

    /// Called once after the last row of the last sheet
    fn finish(&mut self, backend: &mut B) -> Result<()>;

    /// The live stream writer, if this strategy uses one
    fn stream_mut(&mut self) -> Option<&mut B::Stream> {
        None
    }
}

/// Random-access strategy
#[derive(Debug, Default)]
pub struct BufferedWriter;

impl<B: WorkbookBackend> WriterStrategy<B> for BufferedWriter {
    fn begin_sheet(&mut self, _backend: &mut B, _sheet: &str) -> Result<()> {
        Ok(())
    }

    fn write_row(
        &mut self,
        backend: &mut B,
        sheet: &str,
        row_number: u32,
        row: &Row,
    ) -> Result<()> {
        for (col_idx, cell) in row.cells.iter().enumerate() {
            let coord = CellRef::new(col_idx as u32 + 1, row_number)?;
            backend.set_cell_value(sheet, coord, &cell.value)?;

            if let Some(style_id) = cell.style() {
                backend.set_cell_style(sheet, coord, style_id)?;
            }

            if let Some(formula) = cell.formula_text() {
                backend.set_cell_formula(sheet, coord, formula)?;
            }
        }

        for range in &row.merges {
            backend.merge_cells(sheet, range)?;
        }

        Ok(())
    }

    fn finish(&mut self, _backend: &mut B) -> Result<()> {
        Ok(())
    }
}

/// Forward-only strategy holding at most one live stream
pub struct StreamingWriter<B: WorkbookBackend> {
    stream: Option<B::Stream>,
}

impl<B: WorkbookBackend> StreamingWriter<B> {
    pub fn new() -> Self {
        StreamingWriter { stream: None }
    }
}

impl<B: WorkbookBackend> Default for StreamingWriter<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: WorkbookBackend> WriterStrategy<B> for StreamingWriter<B> {
    fn begin_sheet(&mut self, backend: &mut B, sheet: &str) -> Result<()> {
        // Pending merges and styles are lost unless flushed before the switch.
        if let Some(previous) = self.stream.as_mut() {
            previous.flush()?;
            debug!(next = sheet, "flushed stream before switching sheets");
        }
        self.stream = None;
        self.stream = Some(backend.open_stream_writer(sheet)?);
        Ok(())
    }

    fn write_row(
        &mut self,
        _backend: &mut B,
        sheet: &str,
        row_number: u32,
        row: &Row,
    ) -> Result<()> {
        let stream = self.stream.as_mut().ok_or_else(|| {
            ExcelError::InvalidState(format!("no stream writer open for sheet '{}'", sheet))
        })?;

        stream.set_row(CellRef::new(1, row_number)?, &row.cells, &row.options)?;
        for range in &row.merges {
            stream.merge_cells(range)?;
        }
        Ok(())
    }

    fn finish(&mut self, _backend: &mut B) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.flush()?;
        }
        Ok(())
    }

    fn stream_mut(&mut self) -> Option<&mut B::Stream> {
        self.stream.as_mut()
    }
}
