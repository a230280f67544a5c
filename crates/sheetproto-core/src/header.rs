//! Header Model: projection of the fixed header rows into per-column field
//! descriptors.
//!
//! Layout of the header rows (0-based):
//!
//! | row | scalar column | count column | struct column |
//! |-----|---------------|--------------|---------------|
//! | 0   | comment       | comment      | field name in parent |
//! | 1   | `[rule] type` | `N[]`        | `required_struct N` / `optional_struct N` |
//! | 2   | `name[=default]` | unused    | struct type name |
//!
//! Descriptors are parsed on demand so columns reserved for repeated
//! instances never need well-formed headers of their own.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use sheetproto_workbook::Grid;

use crate::error::{Result, SheetError};

pub const COMMENT_ROW: usize = 0;
pub const TYPE_ROW: usize = 1;
pub const NAME_ROW: usize = 2;
pub const FIRST_DATA_ROW: usize = 3;

/// Suffix marking a repeated column (`3[]`, `int32[]`).
pub const REPEAT_MARKER: &str = "[]";
/// Prefix marking an enum-typed column (`enum-Color`).
pub const ENUM_PREFIX: &str = "enum-";

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex must compile"));

/// Rule token found in the type row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    Optional,
    Repeated,
    RequiredStruct,
    OptionalStruct,
    Skip,
}

/// Protobuf scalar types accepted in the type row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Int32,
    Int64,
    UInt32,
    UInt64,
    SInt32,
    SInt64,
    Fixed32,
    Fixed64,
    SFixed32,
    SFixed64,
    Double,
    Float,
    Bool,
    String,
    Bytes,
}

impl ScalarKind {
    pub fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint32" => Self::UInt32,
            "uint64" => Self::UInt64,
            "sint32" => Self::SInt32,
            "sint64" => Self::SInt64,
            "fixed32" => Self::Fixed32,
            "fixed64" => Self::Fixed64,
            "sfixed32" => Self::SFixed32,
            "sfixed64" => Self::SFixed64,
            "double" => Self::Double,
            "float" => Self::Float,
            "bool" => Self::Bool,
            "string" => Self::String,
            "bytes" => Self::Bytes,
            _ => return None,
        })
    }

    pub fn proto_name(self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::SInt32 => "sint32",
            Self::SInt64 => "sint64",
            Self::Fixed32 => "fixed32",
            Self::Fixed64 => "fixed64",
            Self::SFixed32 => "sfixed32",
            Self::SFixed64 => "sfixed64",
            Self::Double => "double",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }

    pub fn is_signed_integer(self) -> bool {
        matches!(
            self,
            Self::Int32 | Self::Int64 | Self::SInt32 | Self::SInt64 | Self::SFixed32 | Self::SFixed64
        )
    }

    pub fn is_unsigned_integer(self) -> bool {
        matches!(
            self,
            Self::UInt32 | Self::UInt64 | Self::Fixed32 | Self::Fixed64
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, Self::Double | Self::Float)
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.proto_name())
    }
}

/// Element type of a value-carrying column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Scalar(ScalarKind),
    Enum(String),
}

impl ValueType {
    pub fn parse(token: &str) -> Option<Self> {
        if let Some(name) = token.strip_prefix(ENUM_PREFIX) {
            return IDENTIFIER
                .is_match(name)
                .then(|| ValueType::Enum(name.to_string()));
        }
        ScalarKind::parse(token).map(ValueType::Scalar)
    }

    /// Type name as written in the schema source.
    pub fn proto_name(&self) -> &str {
        match self {
            ValueType::Scalar(kind) => kind.proto_name(),
            ValueType::Enum(name) => name,
        }
    }

    pub fn enum_name(&self) -> Option<&str> {
        match self {
            ValueType::Enum(name) => Some(name),
            ValueType::Scalar(_) => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Scalar(kind) => write!(f, "{kind}"),
            ValueType::Enum(name) => write!(f, "{ENUM_PREFIX}{name}"),
        }
    }
}

/// How a repetition marker is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepeatKind {
    /// Count column: the next field is laid out `max` times.
    Bounded(usize),
    /// Values joined by a delimiter inside one cell.
    Inline(ValueType),
}

/// Parsed type-row content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Scalar(ScalarKind),
    EnumRef(String),
    Repeated(RepeatKind),
    Struct { name: String, count: usize },
    Blank,
}

impl FieldType {
    /// Element type for scalar and enum columns.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            FieldType::Scalar(kind) => Some(ValueType::Scalar(*kind)),
            FieldType::EnumRef(name) => Some(ValueType::Enum(name.clone())),
            _ => None,
        }
    }
}

/// One column's header, fully parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub column: usize,
    pub rule: Rule,
    pub field_type: FieldType,
    /// Field name; for struct columns, the name under which the struct is
    /// embedded in its parent.
    pub name: String,
    pub default: Option<String>,
    pub comment: String,
}

/// The header rows of one sheet.
#[derive(Debug, Clone)]
pub struct SheetHeader {
    comments: Vec<String>,
    types: Vec<String>,
    names: Vec<String>,
    row_count: usize,
}

impl SheetHeader {
    pub fn read<G: Grid + ?Sized>(grid: &G) -> Self {
        let cols = grid.col_count();
        let row = |r: usize| -> Vec<String> {
            (0..cols).map(|c| grid.cell(r, c).to_string()).collect()
        };
        Self {
            comments: row(COMMENT_ROW),
            types: row(TYPE_ROW),
            names: row(NAME_ROW),
            row_count: grid.row_count(),
        }
    }

    pub fn column_count(&self) -> usize {
        self.types.len()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// First column with a non-blank type cell; data rows blank in this
    /// column are skipped.
    pub fn id_column(&self) -> Option<usize> {
        self.types.iter().position(|t| !t.trim().is_empty())
    }

    /// Whether any type cell names an `enum-` type, repeated or not.
    pub fn has_enum_fields(&self) -> bool {
        self.types.iter().any(|t| {
            t.split_whitespace()
                .any(|word| word.starts_with(ENUM_PREFIX))
        })
    }

    /// Raw type-row text of `column`, trimmed.
    pub fn type_token(&self, column: usize) -> &str {
        self.types.get(column).map(|s| s.trim()).unwrap_or("")
    }

    pub fn descriptor_at(&self, column: usize) -> Result<FieldDescriptor> {
        let token = self.type_token(column);
        let comment = self.comments.get(column).map(String::as_str).unwrap_or("");
        let name_cell = self.names.get(column).map(|s| s.trim()).unwrap_or("");

        if token.is_empty() {
            return Ok(FieldDescriptor {
                column,
                rule: Rule::Skip,
                field_type: FieldType::Blank,
                name: name_cell.to_string(),
                default: None,
                comment: comment.to_string(),
            });
        }

        let tokens: Vec<&str> = token.split_whitespace().collect();
        let (rule, field_type) = match tokens.as_slice() {
            [single] if single.ends_with(REPEAT_MARKER) => {
                (Rule::Repeated, parse_repeat(column, token, single)?)
            }
            [single] => (Rule::Required, parse_value(column, token, single)?),
            ["required", ty] => (Rule::Required, parse_value(column, token, ty)?),
            ["optional", ty] => (Rule::Optional, parse_value(column, token, ty)?),
            [rule @ ("required_struct" | "optional_struct"), count] => {
                let count = parse_count(count).filter(|n| *n > 0).ok_or_else(|| {
                    SheetError::malformed(column, token, "struct element count must be a positive integer")
                })?;
                let type_name = require_identifier(column, name_cell, "struct type name")?;
                let rule = if *rule == "required_struct" {
                    Rule::RequiredStruct
                } else {
                    Rule::OptionalStruct
                };
                let field_name = require_identifier(column, comment.trim(), "struct field name")?;
                return Ok(FieldDescriptor {
                    column,
                    rule,
                    field_type: FieldType::Struct {
                        name: type_name,
                        count,
                    },
                    name: field_name,
                    default: None,
                    comment: String::new(),
                });
            }
            [other, ..] => {
                return Err(SheetError::malformed(
                    column,
                    token,
                    format!("unrecognized rule token `{other}`"),
                ));
            }
            [] => unreachable!("non-blank token has at least one word"),
        };

        let (name, default) = match &field_type {
            FieldType::Repeated(RepeatKind::Bounded(_)) => (String::new(), None),
            _ => split_default(column, name_cell)?,
        };

        Ok(FieldDescriptor {
            column,
            rule,
            field_type,
            name,
            default,
            comment: comment.to_string(),
        })
    }
}

fn parse_value(column: usize, token: &str, ty: &str) -> Result<FieldType> {
    if ty.ends_with(REPEAT_MARKER) {
        return Err(SheetError::malformed(
            column,
            token,
            "repetition markers cannot carry a rule",
        ));
    }
    match ValueType::parse(ty) {
        Some(ValueType::Scalar(kind)) => Ok(FieldType::Scalar(kind)),
        Some(ValueType::Enum(name)) => Ok(FieldType::EnumRef(name)),
        None => Err(SheetError::malformed(
            column,
            token,
            format!("unknown field type `{ty}`"),
        )),
    }
}

fn parse_repeat(column: usize, token: &str, word: &str) -> Result<FieldType> {
    let inner = word.trim_end_matches(REPEAT_MARKER).trim();
    if inner.starts_with(|c: char| c.is_ascii_digit()) {
        return match parse_count(inner) {
            Some(max) if max > 0 => Ok(FieldType::Repeated(RepeatKind::Bounded(max))),
            _ => Err(SheetError::malformed(
                column,
                token,
                "maximum repeat count must be a positive integer",
            )),
        };
    }
    ValueType::parse(inner)
        .map(|vt| FieldType::Repeated(RepeatKind::Inline(vt)))
        .ok_or_else(|| {
            SheetError::malformed(column, token, format!("unknown repeated type `{inner}`"))
        })
}

/// Non-negative integer, tolerating the `3.0` spreadsheets produce.
pub(crate) fn parse_count(text: &str) -> Option<usize> {
    let text = text.trim();
    if let Ok(n) = text.parse::<usize>() {
        return Some(n);
    }
    let f = text.parse::<f64>().ok()?;
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= usize::MAX as f64).then_some(f as usize)
}

fn require_identifier(column: usize, text: &str, what: &str) -> Result<String> {
    if IDENTIFIER.is_match(text) {
        Ok(text.to_string())
    } else if text.is_empty() {
        Err(SheetError::malformed(column, text, format!("missing {what}")))
    } else {
        Err(SheetError::malformed(
            column,
            text,
            format!("{what} is not a valid identifier"),
        ))
    }
}

fn split_default(column: usize, cell: &str) -> Result<(String, Option<String>)> {
    match cell.split_once('=') {
        Some((name, default)) => Ok((
            require_identifier(column, name.trim(), "field name")?,
            Some(default.trim().to_string()),
        )),
        None => Ok((require_identifier(column, cell, "field name")?, None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetproto_workbook::MemoryGrid;

    fn header(rows: Vec<Vec<&str>>) -> SheetHeader {
        SheetHeader::read(&MemoryGrid::from_rows(rows))
    }

    #[test]
    fn bare_type_is_required_scalar() {
        let h = header(vec![vec!["the id"], vec!["int32"], vec!["id"]]);
        let d = h.descriptor_at(0).unwrap();
        assert_eq!(d.rule, Rule::Required);
        assert_eq!(d.field_type, FieldType::Scalar(ScalarKind::Int32));
        assert_eq!(d.name, "id");
        assert_eq!(d.comment, "the id");
        assert_eq!(d.default, None);
    }

    #[test]
    fn explicit_rules_and_enums() {
        let h = header(vec![
            vec!["", ""],
            vec!["optional string", "required enum-Color"],
            vec!["title", "color"],
        ]);
        let title = h.descriptor_at(0).unwrap();
        assert_eq!(title.rule, Rule::Optional);
        assert_eq!(title.field_type, FieldType::Scalar(ScalarKind::String));
        let color = h.descriptor_at(1).unwrap();
        assert_eq!(color.rule, Rule::Required);
        assert_eq!(color.field_type, FieldType::EnumRef("Color".into()));
        assert!(h.has_enum_fields());
    }

    #[test]
    fn repetition_markers() {
        let h = header(vec![
            vec!["", "", ""],
            vec!["3[]", "3.0[]", "string[]"],
            vec!["", "", "tags"],
        ]);
        assert_eq!(
            h.descriptor_at(0).unwrap().field_type,
            FieldType::Repeated(RepeatKind::Bounded(3))
        );
        assert_eq!(
            h.descriptor_at(1).unwrap().field_type,
            FieldType::Repeated(RepeatKind::Bounded(3))
        );
        let inline = h.descriptor_at(2).unwrap();
        assert_eq!(inline.rule, Rule::Repeated);
        assert_eq!(
            inline.field_type,
            FieldType::Repeated(RepeatKind::Inline(ValueType::Scalar(ScalarKind::String)))
        );
        assert_eq!(inline.name, "tags");
    }

    #[test]
    fn struct_header_reads_type_and_field_name() {
        let h = header(vec![vec!["rewards"], vec!["required_struct 2"], vec!["Reward"]]);
        let d = h.descriptor_at(0).unwrap();
        assert_eq!(d.rule, Rule::RequiredStruct);
        assert_eq!(
            d.field_type,
            FieldType::Struct {
                name: "Reward".into(),
                count: 2
            }
        );
        assert_eq!(d.name, "rewards");
    }

    #[test]
    fn default_values_split_from_name() {
        let h = header(vec![vec![""], vec!["int32"], vec!["level = 1"]]);
        let d = h.descriptor_at(0).unwrap();
        assert_eq!(d.name, "level");
        assert_eq!(d.default.as_deref(), Some("1"));
    }

    #[test]
    fn blank_type_cell_is_skip() {
        let h = header(vec![vec!["note"], vec!["  "], vec!["whatever"]]);
        let d = h.descriptor_at(0).unwrap();
        assert_eq!(d.rule, Rule::Skip);
        assert_eq!(d.field_type, FieldType::Blank);
    }

    #[test]
    fn unknown_rule_is_malformed() {
        let h = header(vec![vec![""], vec!["mandatory int32"], vec!["id"]]);
        match h.descriptor_at(0) {
            Err(SheetError::MalformedHeader { column, token, .. }) => {
                assert_eq!(column, "A");
                assert_eq!(token, "mandatory int32");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_and_bad_counts_are_malformed() {
        let h = header(vec![
            vec!["", "", "x", "", ""],
            vec!["int33", "0[]", "required_struct two", "int32", "int32"],
            vec!["a", "", "S", "", "1bad"],
        ]);
        for col in 0..5 {
            assert!(
                matches!(h.descriptor_at(col), Err(SheetError::MalformedHeader { .. })),
                "column {col} should be malformed"
            );
        }
    }

    #[test]
    fn id_column_is_first_typed_column() {
        let h = header(vec![vec!["", "", ""], vec!["", "int32", "string"], vec!["", "id", "n"]]);
        assert_eq!(h.id_column(), Some(1));
        assert!(!h.has_enum_fields());
        assert_eq!(h.column_count(), 3);
        assert_eq!(h.row_count(), 3);
    }

    #[test]
    fn parse_count_accepts_integral_floats() {
        assert_eq!(parse_count("4"), Some(4));
        assert_eq!(parse_count("4.0"), Some(4));
        assert_eq!(parse_count("4.5"), None);
        assert_eq!(parse_count("-1"), None);
        assert_eq!(parse_count("x"), None);
    }
}
