//! Invocation of the external schema compiler.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use crate::config::{CompileTarget, SheetprotoConfig};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("schema compiler failed on {schema}: {reason}")]
    SchemaCompileFailed { schema: PathBuf, reason: String },

    #[error("failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Turns a written schema file into target-language code.
pub trait SchemaCompiler {
    fn compile(&self, schema: &Path) -> Result<(), CompileError>;
}

/// Accepts every schema without doing anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCompiler;

impl SchemaCompiler for NoopCompiler {
    fn compile(&self, schema: &Path) -> Result<(), CompileError> {
        tracing::debug!(schema = %schema.display(), "schema compilation disabled");
        Ok(())
    }
}

/// Runs `protoc` once per schema with every configured output.
#[derive(Debug, Clone)]
pub struct ProtocCompiler {
    program: PathBuf,
    include_dir: PathBuf,
    output_dir: PathBuf,
    targets: Vec<CompileTarget>,
    descriptor_set: bool,
}

impl ProtocCompiler {
    pub fn from_config(config: &SheetprotoConfig) -> Self {
        Self {
            program: config.protoc.clone(),
            include_dir: config.schema_dir.clone(),
            output_dir: config.output_dir.clone(),
            targets: config.targets.clone(),
            descriptor_set: config.descriptor_set,
        }
    }

    fn ensure_dir(path: PathBuf) -> Result<PathBuf, CompileError> {
        fs::create_dir_all(&path).map_err(|source| CompileError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Arguments for one invocation. Output directories are created here.
    pub fn arguments(&self, schema: &Path) -> Result<Vec<String>, CompileError> {
        let mut args = vec![format!("-I={}", self.include_dir.display())];
        for target in &self.targets {
            let dir = Self::ensure_dir(self.output_dir.join(&target.dir))?;
            args.push(format!("--{}_out={}", target.language, dir.display()));
        }
        if self.descriptor_set {
            let dir = Self::ensure_dir(self.output_dir.join("desc"))?;
            let stem = schema
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            args.push(format!(
                "--descriptor_set_out={}",
                dir.join(format!("{stem}.pb")).display()
            ));
        }
        args.push(schema.display().to_string());
        Ok(args)
    }
}

impl SchemaCompiler for ProtocCompiler {
    fn compile(&self, schema: &Path) -> Result<(), CompileError> {
        let args = self.arguments(schema)?;
        tracing::debug!(program = %self.program.display(), ?args, "running schema compiler");
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| CompileError::SchemaCompileFailed {
                schema: schema.to_path_buf(),
                reason: format!("could not run {}: {e}", self.program.display()),
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CompileError::SchemaCompileFailed {
                schema: schema.to_path_buf(),
                reason: format!("{} ({})", stderr.trim(), output.status),
            });
        }
        tracing::info!(schema = %schema.display(), "schema compiled");
        Ok(())
    }
}
