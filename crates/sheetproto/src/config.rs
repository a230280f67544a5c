//! Run configuration, read from YAML and overridden from the command line.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sheetproto_core::SchemaOptions;
use thiserror::Error;

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "sheetproto.yaml";

/// Which phases run for each sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Schema, compile, then data.
    #[default]
    All,
    /// Schema and compile only.
    Schema,
    /// Data only; bindings are rebuilt in memory from the header.
    Data,
}

impl Mode {
    pub fn runs_schema(self) -> bool {
        matches!(self, Mode::All | Mode::Schema)
    }

    pub fn runs_data(self) -> bool {
        matches!(self, Mode::All | Mode::Data)
    }
}

/// One `--<language>_out` output of the schema compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileTarget {
    pub language: String,
    /// Directory under the output root.
    pub dir: String,
}

impl CompileTarget {
    pub fn new(language: &str, dir: &str) -> Self {
        Self {
            language: language.to_string(),
            dir: dir.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SheetprotoConfig {
    /// Root of `bin/`, `log/` and compiler outputs.
    pub output_dir: PathBuf,
    /// Where generated schema sources are written; also the compiler's
    /// include path.
    pub schema_dir: PathBuf,
    pub package: String,
    /// Enum definitions file, relative to `schema_dir`.
    pub enum_import: String,
    pub schema_extension: String,
    pub mode: Mode,
    /// Run the external schema compiler after writing each schema.
    pub compile: bool,
    pub protoc: PathBuf,
    pub targets: Vec<CompileTarget>,
    /// Also write `<output>/desc/<Record>.pb` descriptor sets.
    pub descriptor_set: bool,
    /// stderr log filter, in `EnvFilter` syntax. `RUST_LOG` wins when set.
    pub log_level: String,
}

impl Default for SheetprotoConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("build_out"),
            schema_dir: PathBuf::from("protocol"),
            package: "cfg".to_string(),
            enum_import: "enum.proto".to_string(),
            schema_extension: "schema".to_string(),
            mode: Mode::All,
            compile: true,
            protoc: PathBuf::from("protoc"),
            targets: vec![
                CompileTarget::new("cpp", "cpp"),
                CompileTarget::new("python", "py"),
            ],
            descriptor_set: true,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl SheetprotoConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `explicit` if given, else [`DEFAULT_CONFIG_FILE`] from the
    /// working directory if it exists, else the defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        if fallback.is_file() {
            Self::load(fallback)
        } else {
            Ok(Self::default())
        }
    }

    pub fn schema_options(&self) -> SchemaOptions {
        SchemaOptions {
            package: self.package.clone(),
            enum_import: self.enum_import.clone(),
            extension: self.schema_extension.clone(),
        }
    }

    pub fn schema_path(&self, record: &str) -> PathBuf {
        self.schema_dir
            .join(format!("{record}.{}", self.schema_extension))
    }

    pub fn enum_path(&self) -> PathBuf {
        self.schema_dir.join(&self.enum_import)
    }

    pub fn binary_path(&self, record: &str) -> PathBuf {
        self.output_dir.join("bin").join(format!("{record}.bin"))
    }

    pub fn text_path(&self, record: &str) -> PathBuf {
        self.log_dir().join(format!("{record}.txt"))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.output_dir.join("log")
    }
}
