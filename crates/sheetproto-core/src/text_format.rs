//! Human-readable rendering of records in protobuf text format.

use std::fmt::Write as _;

use crate::binding::{FieldKind, Label, MessageBinding};
use crate::enums::EnumTable;
use crate::error::{Result, SheetError};
use crate::header::ScalarKind;
use crate::record::{FieldValue, Record, Value};
use crate::wire::is_default;

const INDENT: &str = "  ";

/// Renders `record` as text format. Enum values print as member names when
/// `enums` knows them.
pub fn to_text(record: &Record, binding: &MessageBinding, enums: &EnumTable) -> Result<String> {
    let mut out = String::new();
    write_message(&mut out, record, binding, enums, 0)?;
    Ok(out)
}

fn write_message(
    out: &mut String,
    record: &Record,
    binding: &MessageBinding,
    enums: &EnumTable,
    depth: usize,
) -> Result<()> {
    let pad = INDENT.repeat(depth);
    for (number, value) in record.fields() {
        let field = binding
            .field(number)
            .ok_or_else(|| SheetError::BindingMismatch {
                message: binding.name.clone(),
                number,
                name: "<unbound>".to_string(),
            })?;
        if let FieldValue::Single(v) = value {
            if field.label == Label::Implicit && is_default(v) {
                continue;
            }
        }
        for v in value.values() {
            match (v, &field.kind) {
                (Value::Message(inner), FieldKind::Message(nested)) => {
                    let _ = writeln!(out, "{pad}{} {{", field.name);
                    write_message(out, inner, nested, enums, depth + 1)?;
                    let _ = writeln!(out, "{pad}}}");
                }
                (v, kind) => {
                    let _ = writeln!(out, "{pad}{}: {}", field.name, render_value(v, kind, enums));
                }
            }
        }
    }
    Ok(())
}

fn render_value(value: &Value, kind: &FieldKind, enums: &EnumTable) -> String {
    match value {
        Value::Int(v) => v.to_string(),
        Value::UInt(v) => v.to_string(),
        Value::Float(v) => match kind {
            FieldKind::Scalar(ScalarKind::Float) => render_float(f64::from(*v as f32), true),
            _ => render_float(*v, false),
        },
        Value::Bool(v) => v.to_string(),
        Value::String(v) => format!("\"{}\"", escape_str(v)),
        Value::Bytes(v) => format!("\"{}\"", escape_bytes(v)),
        Value::Enum(v) => match kind {
            FieldKind::Enum(name) => enums
                .name_of(name, *v)
                .map(str::to_string)
                .unwrap_or_else(|| v.to_string()),
            _ => v.to_string(),
        },
        Value::Message(_) => "{ }".to_string(),
    }
}

fn render_float(v: f64, single: bool) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else if v == f64::INFINITY {
        "inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-inf".to_string()
    } else if single {
        format!("{:?}", v as f32)
    } else {
        format!("{v:?}")
    }
}

fn escape_str(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\{:03o}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b'"' => out.push_str("\\\""),
            b'\'' => out.push_str("\\'"),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\{b:03o}");
            }
        }
    }
    out
}
