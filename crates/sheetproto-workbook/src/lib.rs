//! Spreadsheet grid access for the sheetproto compiler.
//!
//! Everything downstream sees a sheet as an immutable rectangle of strings
//! addressed by 0-based `(row, col)`. Blank cells read as `""`.

pub mod address;
pub mod backends;
pub mod error;
pub mod memory;
pub mod traits;

#[cfg(feature = "calamine")]
pub use backends::CalamineWorkbook;
pub use address::{cell_name, column_to_letters};
pub use error::GridError;
pub use memory::{MemoryGrid, MemoryWorkbook};
pub use traits::{Grid, WorkbookReader};
