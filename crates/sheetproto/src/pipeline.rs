//! Workbook-to-artifacts driver.
//!
//! Each sheet named `<Record>-<suffix>` goes through a schema phase (header,
//! schema text, schema file, compiler) and a data phase (enum table, encode,
//! binary and text artifacts). The first failing sheet stops the run.

use std::fs;
use std::path::{Path, PathBuf};

use sheetproto_core::{
    EnumTable, MessageBinding, SheetError, SheetHeader, build_schema, encode_sheet,
};
use sheetproto_workbook::{CalamineWorkbook, GridError, MemoryGrid, WorkbookReader};
use thiserror::Error;

use crate::compiler::{CompileError, NoopCompiler, ProtocCompiler, SchemaCompiler};
use crate::config::SheetprotoConfig;
use crate::logging;

/// Error raised inside one phase of one sheet.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error(transparent)]
    Sheet(#[from] SheetError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Which phase a sheet failed in.
#[derive(Debug, Error)]
pub enum SheetFailure {
    #[error("schema phase failed: {0}")]
    Schema(#[source] PhaseError),

    #[error("data phase failed: {0}")]
    Data(#[source] PhaseError),
}

impl SheetFailure {
    /// Process exit code for this failure kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            SheetFailure::Schema(_) => -3,
            SheetFailure::Data(_) => -4,
        }
    }

    pub fn phase_error(&self) -> &PhaseError {
        match self {
            SheetFailure::Schema(e) | SheetFailure::Data(e) => e,
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to open workbook {path}: {source}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: GridError,
    },

    #[error("failed to set up run log under {path}: {source}")]
    Logging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sheet `{sheet}`: {failure}")]
    Sheet {
        sheet: String,
        #[source]
        failure: SheetFailure,
        /// Sheets finished before the failure.
        completed: RunSummary,
    },
}

/// Artifacts and counts for one finished sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetReport {
    pub sheet: String,
    pub record: String,
    /// Set when the schema phase ran.
    pub schema_path: Option<PathBuf>,
    /// Set when the data phase ran.
    pub binary_path: Option<PathBuf>,
    pub text_path: Option<PathBuf>,
    pub rows_encoded: usize,
    pub rows_skipped: usize,
}

impl SheetReport {
    fn new(sheet: &str, record: &str) -> Self {
        Self {
            sheet: sheet.to_string(),
            record: record.to_string(),
            schema_path: None,
            binary_path: None,
            text_path: None,
            rows_encoded: 0,
            rows_skipped: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sheets: Vec<SheetReport>,
    /// Sheets whose names do not follow `<Record>-<suffix>`.
    pub skipped: Vec<String>,
}

/// Splits `<Record>-<suffix>` into its record name.
///
/// Names with no dash, more than one dash, or a record part that is not a
/// valid message identifier yield `None`.
pub fn split_sheet_name(sheet: &str) -> Option<&str> {
    let mut parts = sheet.split('-');
    let record = parts.next()?.trim();
    parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let mut chars = record.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some(record)
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), PhaseError> {
    let io_err = |source: std::io::Error| PhaseError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, contents).map_err(io_err)
}

pub struct Pipeline {
    config: SheetprotoConfig,
    compiler: Box<dyn SchemaCompiler>,
}

impl Pipeline {
    /// Uses `protoc` when `config.compile` is set, otherwise no compiler.
    pub fn new(config: SheetprotoConfig) -> Self {
        let compiler: Box<dyn SchemaCompiler> = if config.compile {
            Box::new(ProtocCompiler::from_config(&config))
        } else {
            Box::new(NoopCompiler)
        };
        Self { config, compiler }
    }

    pub fn with_compiler(config: SheetprotoConfig, compiler: Box<dyn SchemaCompiler>) -> Self {
        Self { config, compiler }
    }

    pub fn config(&self) -> &SheetprotoConfig {
        &self.config
    }

    /// Opens the workbook and runs every sheet under a fresh run log.
    pub fn run_workbook(&self, path: &Path) -> Result<RunSummary, RunError> {
        let log = logging::init(&self.config).map_err(|source| RunError::Logging {
            path: self.config.log_dir(),
            source,
        })?;
        tracing::info!(workbook = %path.display(), mode = ?self.config.mode, "run started");
        let mut workbook = CalamineWorkbook::open(path).map_err(|source| RunError::Workbook {
            path: path.to_path_buf(),
            source,
        })?;
        let result = self.run_reader(&mut workbook);
        match &result {
            Ok(summary) => tracing::info!(
                sheets = summary.sheets.len(),
                skipped = summary.skipped.len(),
                log = %log.path().display(),
                "run finished"
            ),
            Err(err) => tracing::error!(error = %err, "run stopped"),
        }
        result
    }

    pub fn run_reader<W: WorkbookReader + ?Sized>(
        &self,
        reader: &mut W,
    ) -> Result<RunSummary, RunError> {
        let mut summary = RunSummary::default();
        for sheet in reader.sheet_names() {
            if split_sheet_name(&sheet).is_none() {
                tracing::warn!(sheet = %sheet, "sheet name is not <Record>-<suffix>, skipped");
                summary.skipped.push(sheet);
                continue;
            }
            let outcome = match reader.read_sheet(&sheet) {
                Ok(grid) => self.run_sheet(&sheet, &grid),
                Err(e) => Err(self.first_phase_failure(e.into())),
            };
            match outcome {
                Ok(Some(report)) => summary.sheets.push(report),
                Ok(None) => summary.skipped.push(sheet),
                Err(failure) => {
                    return Err(RunError::Sheet {
                        sheet,
                        failure,
                        completed: summary,
                    });
                }
            }
        }
        Ok(summary)
    }

    fn first_phase_failure(&self, err: PhaseError) -> SheetFailure {
        if self.config.mode.runs_schema() {
            SheetFailure::Schema(err)
        } else {
            SheetFailure::Data(err)
        }
    }

    /// Runs the configured phases for one sheet. `Ok(None)` when the sheet
    /// name does not name a record.
    pub fn run_sheet(
        &self,
        sheet: &str,
        grid: &MemoryGrid,
    ) -> Result<Option<SheetReport>, SheetFailure> {
        let Some(record) = split_sheet_name(sheet) else {
            return Ok(None);
        };
        let span = tracing::info_span!("sheet", sheet = %sheet, record = %record);
        let _enter = span.enter();

        let mode = self.config.mode;
        let mut report = SheetReport::new(sheet, record);
        let header = SheetHeader::read(grid);

        let binding = if mode.runs_schema() {
            let (path, binding) = self
                .schema_phase(&header, record)
                .map_err(SheetFailure::Schema)?;
            report.schema_path = Some(path);
            binding
        } else {
            build_schema(&header, record, &self.config.schema_options())
                .map_err(|e| SheetFailure::Data(e.into()))?
                .binding
        };

        if mode.runs_data() {
            self.data_phase(grid, &header, &binding, &mut report)
                .map_err(SheetFailure::Data)?;
        }
        Ok(Some(report))
    }

    fn schema_phase(
        &self,
        header: &SheetHeader,
        record: &str,
    ) -> Result<(PathBuf, MessageBinding), PhaseError> {
        let schema = build_schema(header, record, &self.config.schema_options())?;
        let path = self.config.schema_dir.join(&schema.file_name);
        write_file(&path, schema.text.as_bytes())?;
        tracing::debug!(path = %path.display(), "schema written");
        self.compiler.compile(&path)?;
        Ok((path, schema.binding))
    }

    fn load_enums(&self, header: &SheetHeader) -> Result<EnumTable, PhaseError> {
        if !header.has_enum_fields() {
            return Ok(EnumTable::new());
        }
        let path = self.config.enum_path();
        if !path.is_file() {
            tracing::warn!(path = %path.display(), "enum definitions not found");
            return Ok(EnumTable::new());
        }
        EnumTable::load(&path).map_err(|source| PhaseError::Io { path, source })
    }

    fn data_phase(
        &self,
        grid: &MemoryGrid,
        header: &SheetHeader,
        binding: &MessageBinding,
        report: &mut SheetReport,
    ) -> Result<(), PhaseError> {
        let enums = self.load_enums(header)?;
        let sheet = encode_sheet(grid, binding, &enums)?;

        let binary_path = self.config.binary_path(&report.record);
        write_file(&binary_path, &sheet.binary)?;
        let text_path = self.config.text_path(&report.record);
        write_file(&text_path, sheet.text.as_bytes())?;
        tracing::debug!(
            binary = %binary_path.display(),
            text = %text_path.display(),
            bytes = sheet.binary.len(),
            "records written"
        );

        report.rows_encoded = sheet.rows_encoded();
        report.rows_skipped = sheet.rows_skipped;
        report.binary_path = Some(binary_path);
        report.text_path = Some(text_path);
        Ok(())
    }
}
