use crate::error::GridError;
use crate::memory::MemoryGrid;

/// Read-only view over one sheet.
///
/// Lookups outside the populated area return `""`; callers never have to
/// distinguish a missing cell from a blank one.
pub trait Grid {
    fn row_count(&self) -> usize;
    fn col_count(&self) -> usize;
    fn cell(&self, row: usize, col: usize) -> &str;

    /// Cell content with surrounding whitespace removed.
    fn cell_trimmed(&self, row: usize, col: usize) -> &str {
        self.cell(row, col).trim()
    }

    fn is_blank(&self, row: usize, col: usize) -> bool {
        self.cell_trimmed(row, col).is_empty()
    }
}

impl<G: Grid + ?Sized> Grid for &G {
    fn row_count(&self) -> usize {
        (**self).row_count()
    }

    fn col_count(&self) -> usize {
        (**self).col_count()
    }

    fn cell(&self, row: usize, col: usize) -> &str {
        (**self).cell(row, col)
    }
}

/// Sheet-at-a-time workbook access.
pub trait WorkbookReader {
    /// Sheet names in workbook order.
    fn sheet_names(&self) -> Vec<String>;

    /// Load the named sheet into an owned grid.
    fn read_sheet(&mut self, name: &str) -> Result<MemoryGrid, GridError>;
}
