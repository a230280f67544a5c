#![cfg(feature = "calamine")]

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use calamine::{Data, Range, Reader, Sheets, open_workbook_auto};

use crate::error::GridError;
use crate::memory::MemoryGrid;
use crate::traits::{Grid, WorkbookReader};

/// Workbook reader over `calamine` (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`).
pub struct CalamineWorkbook {
    path: PathBuf,
    workbook: Sheets<BufReader<File>>,
}

impl CalamineWorkbook {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GridError> {
        let path = path.as_ref().to_path_buf();
        let workbook = open_workbook_auto(&path).map_err(|e| GridError::Open {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Ok(Self { path, workbook })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cell_text(data: &Data) -> String {
        match data {
            Data::Empty => String::new(),
            Data::String(s) => s.clone(),
            Data::Float(f) => format_number(*f),
            Data::Int(i) => i.to_string(),
            Data::Bool(b) => b.to_string(),
            Data::DateTime(dt) => format_number(dt.as_f64()),
            other => other.to_string(),
        }
    }

    fn range_to_grid(range: &Range<Data>) -> MemoryGrid {
        let (start_row, start_col) = range.start().unwrap_or_default();
        let mut grid = MemoryGrid::new();
        for (row, col, value) in range.used_cells() {
            let text = Self::cell_text(value);
            if text.is_empty() {
                continue;
            }
            grid.set(row + start_row as usize, col + start_col as usize, text);
        }
        grid
    }
}

/// Integral floats render without a fractional part so `3.0` reads as `3`.
fn format_number(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

impl WorkbookReader for CalamineWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names()
    }

    fn read_sheet(&mut self, name: &str) -> Result<MemoryGrid, GridError> {
        if !self.workbook.sheet_names().iter().any(|s| s == name) {
            return Err(GridError::MissingSheet(name.to_string()));
        }
        let range = self
            .workbook
            .worksheet_range(name)
            .map_err(|e| GridError::from_backend("calamine", e))?;
        let grid = Self::range_to_grid(&range);
        tracing::debug!(
            sheet = name,
            rows = grid.row_count(),
            cols = grid.col_count(),
            "loaded sheet"
        );
        Ok(grid)
    }
}
