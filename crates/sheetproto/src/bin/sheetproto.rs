use std::path::PathBuf;
use std::process::exit;

use anyhow::{Context, Result};
use clap::Parser;
use sheetproto::{Mode, Pipeline, RunError, SheetFailure, SheetReport, SheetprotoConfig};

const USAGE_EXIT: i32 = -1;

#[derive(Parser, Debug)]
#[command(
    name = "sheetproto",
    version,
    about = "Compile workbook sheets into protobuf schemas and binary records"
)]
struct Cli {
    /// Workbook to compile (.xlsx, .xlsm, .xls, .ods).
    workbook: PathBuf,

    /// YAML config file. Defaults to ./sheetproto.yaml when present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root directory for binary, text and generated code output.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Directory for generated schema sources.
    #[arg(long = "schema-dir")]
    schema_dir: Option<PathBuf>,

    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Write schemas without running the schema compiler.
    #[arg(long = "no-compile")]
    no_compile: bool,

    /// Path to the protoc executable.
    #[arg(long)]
    protoc: Option<PathBuf>,

    /// More log output on stderr (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log errors on stderr.
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn into_config(self) -> Result<(PathBuf, SheetprotoConfig)> {
        let mut config = SheetprotoConfig::discover(self.config.as_deref())
            .context("loading configuration")?;
        if let Some(dir) = self.output {
            config.output_dir = dir;
        }
        if let Some(dir) = self.schema_dir {
            config.schema_dir = dir;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if self.no_compile {
            config.compile = false;
        }
        if let Some(protoc) = self.protoc {
            config.protoc = protoc;
        }
        match (self.quiet, self.verbose) {
            (true, _) => config.log_level = "error".to_string(),
            (false, 1) => config.log_level = "debug".to_string(),
            (false, v) if v >= 2 => config.log_level = "trace".to_string(),
            _ => {}
        }
        Ok((self.workbook, config))
    }
}

fn print_report(report: &SheetReport) {
    if report.schema_path.is_some() {
        println!("[{}] Interpreter Success!!!", report.sheet);
    }
    if report.binary_path.is_some() {
        println!(
            "[{}] Parse Success!!! ({} rows)",
            report.sheet, report.rows_encoded
        );
    }
}

fn print_failure(sheet: &str, mode: Mode, failure: &SheetFailure) {
    match failure {
        SheetFailure::Schema(err) => {
            println!("[{sheet}] Interpreter Failed!!!");
            eprintln!("error: {err}");
        }
        SheetFailure::Data(err) => {
            if mode.runs_schema() {
                println!("[{sheet}] Interpreter Success!!!");
            }
            println!("[{sheet}] Parse Failed!!!");
            eprintln!("error: {err}");
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let (workbook, config) = cli.into_config()?;
    let mode = config.mode;
    let pipeline = Pipeline::new(config);
    match pipeline.run_workbook(&workbook) {
        Ok(summary) => {
            summary.sheets.iter().for_each(print_report);
            Ok(0)
        }
        Err(RunError::Sheet {
            sheet,
            failure,
            completed,
        }) => {
            completed.sheets.iter().for_each(print_report);
            print_failure(&sheet, mode, &failure);
            Ok(failure.exit_code())
        }
        Err(other) => Err(other).with_context(|| format!("compiling {}", workbook.display())),
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { USAGE_EXIT } else { 0 };
            let _ = err.print();
            exit(code);
        }
    };
    match run(cli) {
        Ok(code) => exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            exit(USAGE_EXIT);
        }
    }
}
