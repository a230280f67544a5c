use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while opening a workbook or materialising a sheet.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("failed to open workbook {path}: {message}")]
    Open { path: PathBuf, message: String },

    #[error("sheet `{0}` not found in workbook")]
    MissingSheet(String),

    #[error("{backend} backend error: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },
}

impl GridError {
    pub fn from_backend<E: std::fmt::Display>(backend: &'static str, err: E) -> Self {
        GridError::Backend {
            backend,
            message: err.to_string(),
        }
    }
}
