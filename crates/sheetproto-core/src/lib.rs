//! Spreadsheet-authored schemas and records.
//!
//! A sheet's fixed header rows describe a message type; the rows below are
//! instances of it. [`build_schema`] turns the header into proto3 source plus
//! a [`MessageBinding`], and [`encode_sheet`] walks the data rows along the
//! same [`ColumnLayout`] to produce protobuf binary and text output.

pub mod binding;
pub mod convert;
pub mod cursor;
pub mod encoder;
pub mod enums;
pub mod error;
pub mod header;
pub mod layout;
pub mod record;
pub mod schema;
pub mod text_format;
pub mod wire;

pub use binding::{FieldBinding, FieldKind, Label, MessageBinding};
pub use encoder::{EncodedSheet, encode_row, encode_sheet, wrap_records};
pub use enums::EnumTable;
pub use error::{Pass, Result, SheetError};
pub use header::{FieldDescriptor, FieldType, RepeatKind, Rule, ScalarKind, SheetHeader, ValueType};
pub use layout::{ColumnLayout, FieldNode};
pub use record::{FieldAccess, FieldValue, Record, Value};
pub use schema::{SchemaOptions, SchemaOutput, build_schema};
pub use text_format::to_text;
