//! Cell text to typed field values.

use crate::enums::EnumTable;
use crate::error::{Result, SheetError};
use crate::header::{ScalarKind, ValueType};
use crate::record::Value;

/// Whether `text` counts as "no value" for a column of `value_type`.
///
/// Strings are blank only when zero-length; every other type ignores
/// surrounding whitespace.
pub fn is_blank(value_type: &ValueType, text: &str) -> bool {
    match value_type {
        ValueType::Scalar(ScalarKind::String) => text.is_empty(),
        _ => text.trim().is_empty(),
    }
}

/// Converts one cell. `Ok(None)` leaves the field unset.
///
/// `cell` is the A1 name used in error messages; `default` replaces a blank
/// cell.
pub fn convert_cell(
    text: &str,
    value_type: &ValueType,
    default: Option<&str>,
    enums: &EnumTable,
    cell: &str,
) -> Result<Option<Value>> {
    let text = match default {
        Some(default) if is_blank(value_type, text) => default,
        _ => text,
    };
    if is_blank(value_type, text) {
        return Ok(None);
    }
    match value_type {
        ValueType::Scalar(kind) => convert_scalar(text, *kind, cell).map(Some),
        ValueType::Enum(name) => Ok(enums.resolve(name, text.trim()).map(Value::Enum)),
    }
}

/// Tokens of an inline repeated cell: split on `;` when present, else `|`.
/// Zero-length tokens are dropped.
pub fn split_inline(text: &str) -> impl Iterator<Item = &str> {
    let delimiter = if text.contains(';') { ';' } else { '|' };
    text.split(delimiter).filter(|token| !token.is_empty())
}

fn convert_scalar(text: &str, kind: ScalarKind, cell: &str) -> Result<Value> {
    let fail = |reason: &str| SheetError::CellConversion {
        cell: cell.to_string(),
        kind: kind.to_string(),
        value: text.to_string(),
        reason: reason.to_string(),
    };
    match kind {
        ScalarKind::String => Ok(Value::String(text.to_string())),
        ScalarKind::Bytes => Ok(Value::Bytes(text.as_bytes().to_vec())),
        ScalarKind::Bool => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(fail("expected true, false, 1 or 0")),
        },
        ScalarKind::Double => text
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| fail("not a number")),
        ScalarKind::Float => text
            .trim()
            .parse::<f32>()
            .map(|v| Value::Float(f64::from(v)))
            .map_err(|_| fail("not a number")),
        ScalarKind::UInt32 | ScalarKind::Fixed32 => {
            let v = parse_unsigned(text).ok_or_else(|| fail("not an unsigned integer"))?;
            u32::try_from(v)
                .map(|v| Value::UInt(u64::from(v)))
                .map_err(|_| fail("out of range for 32 bits"))
        }
        ScalarKind::UInt64 | ScalarKind::Fixed64 => parse_unsigned(text)
            .map(Value::UInt)
            .ok_or_else(|| fail("not an unsigned integer")),
        ScalarKind::Int32 | ScalarKind::SInt32 | ScalarKind::SFixed32 => {
            let v = parse_signed(text).ok_or_else(|| fail("not an integer"))?;
            i32::try_from(v)
                .map(|v| Value::Int(i64::from(v)))
                .map_err(|_| fail("out of range for 32 bits"))
        }
        ScalarKind::Int64 | ScalarKind::SInt64 | ScalarKind::SFixed64 => parse_signed(text)
            .map(Value::Int)
            .ok_or_else(|| fail("not an integer")),
    }
}

/// Integer text, or a float with no fractional part (`3.0`), as spreadsheets
/// often store whole numbers.
fn parse_signed(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(v) = text.parse::<i64>() {
        return Some(v);
    }
    let f = text.parse::<f64>().ok()?;
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range
    (f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64)
        .then_some(f as i64)
}

fn parse_unsigned(text: &str) -> Option<u64> {
    let text = text.trim();
    if let Ok(v) = text.parse::<u64>() {
        return Some(v);
    }
    let f = text.parse::<f64>().ok()?;
    (f.is_finite() && f.fract() == 0.0 && f >= 0.0 && f < u64::MAX as f64).then_some(f as u64)
}
