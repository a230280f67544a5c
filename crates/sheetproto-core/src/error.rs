use std::fmt;

use thiserror::Error;

/// Which traversal raised an alignment failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Schema,
    Encode,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Pass::Schema => "schema",
            Pass::Encode => "encode",
        })
    }
}

/// Everything that can go wrong while interpreting or encoding one sheet.
///
/// Cell and column positions are rendered in A1 notation.
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("malformed header in column {column}: `{token}` ({reason})")]
    MalformedHeader {
        column: String,
        token: String,
        reason: String,
    },

    #[error("required repetition of `{field}` has no instances (count cell {cell})")]
    MissingRequiredRepeat { cell: String, field: String },

    #[error("cannot convert cell {cell} `{value}` to {kind}: {reason}")]
    CellConversion {
        cell: String,
        kind: String,
        value: String,
        reason: String,
    },

    #[error("column alignment diverged in {pass} pass: layout spans {expected} columns, consumed {consumed}")]
    ColumnAlignment {
        pass: Pass,
        expected: usize,
        consumed: usize,
    },

    #[error("field #{number} `{name}` has no matching binding in message `{message}`")]
    BindingMismatch {
        message: String,
        number: u32,
        name: String,
    },

    #[error("column {column} references unknown enum type `{name}`")]
    UnknownEnumType { column: String, name: String },

    #[error("malformed record bytes: {0}")]
    Decode(String),
}

impl SheetError {
    pub(crate) fn malformed(
        column: usize,
        token: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        SheetError::MalformedHeader {
            column: sheetproto_workbook::column_to_letters(column),
            token: token.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = SheetError> = std::result::Result<T, E>;
