use crate::error::GridError;
use crate::traits::{Grid, WorkbookReader};

/// Owned, rectangular-on-read grid of strings.
///
/// Rows may be ragged; `col_count` is the width of the widest row and short
/// rows read as blank past their end.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryGrid {
    rows: Vec<Vec<String>>,
    width: usize,
}

impl MemoryGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from row-major cell text.
    pub fn from_rows<R, C, S>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows: Vec<Vec<String>> = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect())
            .collect();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        Self { rows, width }
    }

    /// Write one cell, growing the grid as needed.
    pub fn set(&mut self, row: usize, col: usize, value: impl Into<String>) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, String::new());
        }
        cells[col] = value.into();
        self.width = self.width.max(col + 1);
    }

    /// Append a row below the current last row.
    pub fn push_row<C, S>(&mut self, row: C)
    where
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cells: Vec<String> = row.into_iter().map(Into::into).collect();
        self.width = self.width.max(cells.len());
        self.rows.push(cells);
    }
}

impl Grid for MemoryGrid {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn col_count(&self) -> usize {
        self.width
    }

    fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Named sheets held in memory, mainly for tests and programmatic callers.
#[derive(Clone, Debug, Default)]
pub struct MemoryWorkbook {
    sheets: Vec<(String, MemoryGrid)>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, name: impl Into<String>, grid: MemoryGrid) {
        self.sheets.push((name.into(), grid));
    }

    pub fn with_sheet(mut self, name: impl Into<String>, grid: MemoryGrid) -> Self {
        self.add_sheet(name, grid);
        self
    }
}

impl WorkbookReader for MemoryWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.clone()).collect()
    }

    fn read_sheet(&mut self, name: &str) -> Result<MemoryGrid, GridError> {
        self.sheets
            .iter()
            .find(|(sheet, _)| sheet == name)
            .map(|(_, grid)| grid.clone())
            .ok_or_else(|| GridError::MissingSheet(name.to_string()))
    }
}
