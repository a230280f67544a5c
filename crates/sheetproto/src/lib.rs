//! Driver for the sheetproto compiler: configuration, run logging, the
//! external schema compiler and the per-sheet pipeline behind the
//! `sheetproto` binary.

pub mod compiler;
pub mod config;
pub mod logging;
pub mod pipeline;

pub use compiler::{CompileError, NoopCompiler, ProtocCompiler, SchemaCompiler};
pub use config::{CompileTarget, ConfigError, Mode, SheetprotoConfig};
pub use logging::LogContext;
pub use pipeline::{
    PhaseError, Pipeline, RunError, RunSummary, SheetFailure, SheetReport, split_sheet_name,
};
