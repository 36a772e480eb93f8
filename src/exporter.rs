//! Multi-sheet export orchestration
//!
//! [`Exporter::export`] walks a list of [`SheetSpec`]s in order. For each
//! spec it creates the sheet, pulls rows from the spec's [`RowSource`] until
//! [`Pulled::EndOfData`], and writes them through the selected
//! [`WriterStrategy`]. When a physical sheet is full, the remaining rows go to
//! `<name>_1`, `<name>_2`, ... and the spec's init hook runs again for each
//! new sheet. The workbook is saved once every spec has been drained.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::backend::{validate_sheet_name, WorkbookBackend, DEFAULT_SHEET_NAME};
use crate::error::{ExcelError, Result};
use crate::source::RowSource;
use crate::strategy::{WriteMode, WriterStrategy};
use crate::types::{Pulled, SHEET_MAX_ROWS};
use crate::xlsx::XlsxWorkbook;

/// Hook run at the start of every physical sheet of a spec
pub type InitHook<B> = Box<dyn FnMut(&mut Exporter<B>) -> Result<()>>;

/// One logical sheet: a name, its rows, and an optional init hook
pub struct SheetSpec<'a, B: WorkbookBackend + 'static = XlsxWorkbook> {
    name: String,
    source: Box<dyn RowSource + 'a>,
    init: Option<InitHook<B>>,
}

impl<'a, B: WorkbookBackend + 'static> SheetSpec<'a, B> {
    /// Create a sheet spec without an init hook
    pub fn new(name: impl Into<String>, source: impl RowSource + 'a) -> Self {
        SheetSpec {
            name: name.into(),
            source: Box::new(source),
            init: None,
        }
    }

    /// Run `hook` whenever a physical sheet for this spec is started
    pub fn with_init<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut Exporter<B>) -> Result<()> + 'static,
    {
        self.init = Some(Box::new(hook));
        self
    }

    /// Logical sheet name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Rows written to one physical sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSummary {
    pub name: String,
    pub rows: u32,
}

/// Outcome of a successful export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Physical sheets in creation order
    pub sheets: Vec<SheetSummary>,
    /// Rows pulled across all sheets
    pub total_rows: u64,
}

/// Export session owning one workbook backend
///
/// The session is consumed by [`Exporter::export`]; the backend is closed
/// when the session is dropped, whether the export succeeded or not.
pub struct Exporter<B: WorkbookBackend + 'static = XlsxWorkbook> {
    backend: B,
    path: PathBuf,
    mode: WriteMode,
    strategy: Box<dyn WriterStrategy<B>>,
    current_sheet: String,
    sheet_max_rows: u32,
}

impl Exporter<XlsxWorkbook> {
    /// Create a session writing an `.xlsx` file to `path`
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use excelstream_exporter::{rows_from_iter, Exporter, Row, SheetSpec};
    ///
    /// let exporter = Exporter::new("report.xlsx", false)?;
    /// let rows = vec![Row::new(["Name", "Age"]), Row::new(["Alice", "30"])];
    /// exporter.export(vec![SheetSpec::new("People", rows_from_iter(rows))])?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new<P: AsRef<Path>>(path: P, use_streaming: bool) -> Result<Self> {
        ExporterBuilder::new(path)
            .mode(WriteMode::from_streaming(use_streaming))
            .build()
    }
}

impl<B: WorkbookBackend + 'static> Exporter<B> {
    /// Create a session on top of any workbook backend
    pub fn with_backend<P: AsRef<Path>>(backend: B, path: P, mode: WriteMode) -> Self {
        Exporter {
            backend,
            path: path.as_ref().to_path_buf(),
            mode,
            strategy: mode.into_strategy::<B>(),
            current_sheet: String::new(),
            sheet_max_rows: SHEET_MAX_ROWS,
        }
    }

    /// Physical sheet currently being written
    pub fn current_sheet(&self) -> &str {
        &self.current_sheet
    }

    /// Selected write mode
    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows per physical sheet before a split
    pub fn sheet_max_rows(&self) -> u32 {
        self.sheet_max_rows
    }

    /// Workbook backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable workbook backend, e.g. for column widths in an init hook
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Live stream writer of the current sheet (streaming mode only)
    pub fn stream_mut(&mut self) -> Option<&mut B::Stream> {
        self.strategy.stream_mut()
    }

    /// Run the export and save the workbook
    ///
    /// Any error aborts the whole export; the destination file must then be
    /// treated as unusable.
    pub fn export(mut self, sheets: Vec<SheetSpec<'_, B>>) -> Result<ExportSummary> {
        check_unique_names(&sheets)?;
        info!(
            path = %self.path.display(),
            mode = ?self.mode,
            sheets = sheets.len(),
            "starting export"
        );

        let mut summary = ExportSummary::default();
        for (i, spec) in sheets.into_iter().enumerate() {
            self.prepare_sheet(i, &spec.name)?;
            self.export_sheet(spec, &mut summary)?;
        }

        self.strategy
            .finish(&mut self.backend)
            .map_err(|e| e.in_sheet("flushing stream", &self.current_sheet))?;

        let path = self.path.clone();
        self.backend
            .save_as(&path)
            .map_err(|e| ExcelError::SaveError {
                path: path.clone(),
                source: Box::new(e),
            })?;

        info!(
            path = %path.display(),
            sheets = summary.sheets.len(),
            rows = summary.total_rows,
            "export completed"
        );
        Ok(summary)
    }

    /// Create the sheet for spec `index`; the first one also drops the placeholder
    fn prepare_sheet(&mut self, index: usize, name: &str) -> Result<()> {
        let reuse_placeholder = index == 0
            && name.eq_ignore_ascii_case(DEFAULT_SHEET_NAME)
            && self.backend.contains_sheet(name);
        if reuse_placeholder {
            debug!(sheet = name, "reusing placeholder sheet");
            return Ok(());
        }

        self.create_sheet(name)?;

        if index == 0
            && self.backend.sheet_count() > 1
            && self.backend.contains_sheet(DEFAULT_SHEET_NAME)
        {
            self.backend
                .delete_sheet(DEFAULT_SHEET_NAME)
                .map_err(|e| e.in_sheet("deleting default sheet", DEFAULT_SHEET_NAME))?;
            debug!(sheet = DEFAULT_SHEET_NAME, "deleted placeholder sheet");
        }
        Ok(())
    }

    fn create_sheet(&mut self, name: &str) -> Result<()> {
        validate_sheet_name(name)
            .and_then(|_| self.backend.create_sheet(name))
            .map_err(|e| e.in_sheet("creating sheet", name))?;
        debug!(sheet = name, "created sheet");
        Ok(())
    }

    fn start_physical_sheet(&mut self, name: &str, init: &mut Option<InitHook<B>>) -> Result<()> {
        self.current_sheet = name.to_string();
        self.strategy
            .begin_sheet(&mut self.backend, name)
            .map_err(|e| e.in_sheet("opening sheet", name))?;

        if let Some(hook) = init.as_mut() {
            hook(self).map_err(|e| e.in_sheet("initializing sheet", name))?;
        }
        Ok(())
    }

    fn export_sheet(&mut self, spec: SheetSpec<'_, B>, summary: &mut ExportSummary) -> Result<()> {
        let SheetSpec {
            name,
            mut source,
            mut init,
        } = spec;

        self.start_physical_sheet(&name, &mut init)?;

        let mut row_number: u32 = 1;
        let mut split_suffix: u32 = 0;
        let mut source_index: usize = 0;
        let mut physical = SheetSummary {
            name: name.clone(),
            rows: 0,
        };

        loop {
            let row = match source.pull(source_index) {
                Ok(Pulled::Row(row)) => row,
                Ok(Pulled::EndOfData) => break,
                Err(err) => {
                    warn!(sheet = %name, index = source_index, error = %err, "row source failed");
                    return Err(err);
                }
            };

            if row_number > self.sheet_max_rows {
                split_suffix += 1;
                row_number = 1;
                let next = format!("{}_{}", name, split_suffix);
                info!(sheet = %name, next = %next, "sheet is full, continuing on a new sheet");

                self.create_sheet(&next)?;
                summary.sheets.push(std::mem::replace(
                    &mut physical,
                    SheetSummary {
                        name: next.clone(),
                        rows: 0,
                    },
                ));
                self.start_physical_sheet(&next, &mut init)?;
            }

            self.strategy
                .write_row(&mut self.backend, &self.current_sheet, row_number, &row)
                .map_err(|e| e.at_row(row_number, &self.current_sheet))?;

            physical.rows += 1;
            summary.total_rows += 1;
            row_number += 1;
            source_index += 1;
        }

        debug!(sheet = %name, rows = source_index, splits = split_suffix, "sheet drained");
        summary.sheets.push(physical);
        Ok(())
    }
}

impl<B: WorkbookBackend + 'static> Drop for Exporter<B> {
    fn drop(&mut self) {
        if let Err(err) = self.backend.close() {
            warn!(error = %err, "failed to release workbook resources");
        }
    }
}

fn check_unique_names<B: WorkbookBackend + 'static>(sheets: &[SheetSpec<'_, B>]) -> Result<()> {
    let mut seen = HashSet::with_capacity(sheets.len());
    for spec in sheets {
        if !seen.insert(spec.name.to_lowercase()) {
            return Err(ExcelError::DuplicateSheet(spec.name.clone()));
        }
    }
    Ok(())
}

/// Builder for configured export sessions
pub struct ExporterBuilder {
    path: PathBuf,
    mode: WriteMode,
    sheet_max_rows: u32,
}

impl ExporterBuilder {
    /// Create a new builder
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ExporterBuilder {
            path: path.as_ref().to_path_buf(),
            mode: WriteMode::default(),
            sheet_max_rows: SHEET_MAX_ROWS,
        }
    }

    /// Select the writer strategy
    pub fn mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Shorthand for `mode(WriteMode::from_streaming(..))`
    pub fn streaming(self, use_streaming: bool) -> Self {
        self.mode(WriteMode::from_streaming(use_streaming))
    }

    /// Rows per physical sheet; clamped to `1..=SHEET_MAX_ROWS`
    pub fn sheet_max_rows(mut self, rows: u32) -> Self {
        self.sheet_max_rows = rows.clamp(1, SHEET_MAX_ROWS);
        self
    }

    /// Build a session writing through a fresh XLSX workbook
    pub fn build(self) -> Result<Exporter<XlsxWorkbook>> {
        Ok(self.build_with(XlsxWorkbook::new()?))
    }

    /// Build a session around an explicitly supplied backend
    pub fn build_with<B: WorkbookBackend + 'static>(self, backend: B) -> Exporter<B> {
        let mut exporter = Exporter::with_backend(backend, &self.path, self.mode);
        exporter.sheet_max_rows = self.sheet_max_rows;
        exporter
    }
}
