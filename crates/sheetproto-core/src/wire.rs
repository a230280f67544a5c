//! proto3 binary encoding of [`Record`]s against a [`MessageBinding`].
//!
//! Fields are written in ascending number order, repeated numerics packed,
//! and implicit-presence fields holding their default omitted. The decoder
//! accepts packed and unpacked repeated numerics and skips unknown fields.

use crate::binding::{FieldBinding, FieldKind, Label, MessageBinding};
use crate::error::{Result, SheetError};
use crate::header::ScalarKind;
use crate::record::{FieldAccess, FieldValue, Record, Value};

/// Longest varint encoding of a `u64`.
const MAX_VARINT_BYTES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

impl WireType {
    fn from_tag(tag: u64) -> Result<Self> {
        match tag & 0x7 {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::Fixed32),
            other => Err(SheetError::Decode(format!("unsupported wire type {other}"))),
        }
    }

    fn of(kind: &FieldKind) -> Self {
        match kind {
            FieldKind::Enum(_) => WireType::Varint,
            FieldKind::Message(_) => WireType::LengthDelimited,
            FieldKind::Scalar(scalar) => match scalar {
                ScalarKind::Int32
                | ScalarKind::Int64
                | ScalarKind::UInt32
                | ScalarKind::UInt64
                | ScalarKind::SInt32
                | ScalarKind::SInt64
                | ScalarKind::Bool => WireType::Varint,
                ScalarKind::Fixed64 | ScalarKind::SFixed64 | ScalarKind::Double => {
                    WireType::Fixed64
                }
                ScalarKind::Fixed32 | ScalarKind::SFixed32 | ScalarKind::Float => {
                    WireType::Fixed32
                }
                ScalarKind::String | ScalarKind::Bytes => WireType::LengthDelimited,
            },
        }
    }
}

pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Reads a varint at `*pos`, advancing it.
pub fn read_varint(buf: &[u8], pos: &mut usize) -> Result<u64> {
    let mut value = 0u64;
    for i in 0..MAX_VARINT_BYTES {
        let byte = *buf
            .get(*pos)
            .ok_or_else(|| SheetError::Decode("truncated varint".to_string()))?;
        *pos += 1;
        if i == MAX_VARINT_BYTES - 1 && byte > 1 {
            return Err(SheetError::Decode("varint overflows 64 bits".to_string()));
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(SheetError::Decode("varint longer than 10 bytes".to_string()))
}

#[inline]
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

#[inline]
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

fn write_tag(out: &mut Vec<u8>, number: u32, wire: WireType) {
    write_varint(out, (u64::from(number) << 3) | wire as u64);
}

fn write_length_delimited(out: &mut Vec<u8>, payload: &[u8]) {
    write_varint(out, payload.len() as u64);
    out.extend_from_slice(payload);
}

fn mismatch(message: &MessageBinding, field: &FieldBinding, what: &str) -> SheetError {
    SheetError::BindingMismatch {
        message: message.name.clone(),
        number: field.number,
        name: format!("{} ({what})", field.name),
    }
}

/// Whether `value` is the proto3 default for its field, and so is not
/// serialized under implicit presence.
pub(crate) fn is_default(value: &Value) -> bool {
    match value {
        Value::Int(v) => *v == 0,
        Value::UInt(v) => *v == 0,
        // -0.0 is not the default
        Value::Float(v) => v.to_bits() == 0,
        Value::Bool(v) => !*v,
        Value::String(v) => v.is_empty(),
        Value::Bytes(v) => v.is_empty(),
        Value::Enum(v) => *v == 0,
        Value::Message(_) => false,
    }
}

/// Payload of a non-message value, without tag.
fn write_value(
    out: &mut Vec<u8>,
    kind: &FieldKind,
    value: &Value,
    message: &MessageBinding,
    field: &FieldBinding,
) -> Result<()> {
    let bad = || mismatch(message, field, "value does not fit the field type");
    match (kind, value) {
        (FieldKind::Enum(_), Value::Enum(v)) => write_varint(out, i64::from(*v) as u64),
        (FieldKind::Scalar(scalar), _) => match (scalar, value) {
            (ScalarKind::Int32 | ScalarKind::Int64, Value::Int(v)) => write_varint(out, *v as u64),
            (ScalarKind::UInt32 | ScalarKind::UInt64, Value::UInt(v)) => write_varint(out, *v),
            (ScalarKind::SInt32 | ScalarKind::SInt64, Value::Int(v)) => {
                write_varint(out, zigzag_encode(*v))
            }
            (ScalarKind::Bool, Value::Bool(v)) => write_varint(out, u64::from(*v)),
            (ScalarKind::Fixed32, Value::UInt(v)) => {
                let v = u32::try_from(*v).map_err(|_| bad())?;
                out.extend_from_slice(&v.to_le_bytes());
            }
            (ScalarKind::SFixed32, Value::Int(v)) => {
                let v = i32::try_from(*v).map_err(|_| bad())?;
                out.extend_from_slice(&v.to_le_bytes());
            }
            (ScalarKind::Fixed64, Value::UInt(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (ScalarKind::SFixed64, Value::Int(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (ScalarKind::Float, Value::Float(v)) => {
                out.extend_from_slice(&(*v as f32).to_le_bytes())
            }
            (ScalarKind::Double, Value::Float(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (ScalarKind::String, Value::String(v)) => write_length_delimited(out, v.as_bytes()),
            (ScalarKind::Bytes, Value::Bytes(v)) => write_length_delimited(out, v),
            _ => return Err(bad()),
        },
        _ => return Err(bad()),
    }
    Ok(())
}

/// Appends the encoding of `record` to `out`.
pub fn encode_message(record: &Record, binding: &MessageBinding, out: &mut Vec<u8>) -> Result<()> {
    for (number, value) in record.fields() {
        let field = binding.field(number).ok_or_else(|| SheetError::BindingMismatch {
            message: binding.name.clone(),
            number,
            name: "<unbound>".to_string(),
        })?;
        let wire = WireType::of(&field.kind);
        match (value, &field.kind) {
            (FieldValue::Single(Value::Message(inner)), FieldKind::Message(nested)) => {
                let mut payload = Vec::new();
                encode_message(inner, nested, &mut payload)?;
                write_tag(out, number, WireType::LengthDelimited);
                write_length_delimited(out, &payload);
            }
            (FieldValue::List(items), FieldKind::Message(nested)) => {
                for item in items {
                    let inner = item
                        .as_message()
                        .ok_or_else(|| mismatch(binding, field, "expected a message"))?;
                    let mut payload = Vec::new();
                    encode_message(inner, nested, &mut payload)?;
                    write_tag(out, number, WireType::LengthDelimited);
                    write_length_delimited(out, &payload);
                }
            }
            (_, FieldKind::Message(_)) => {
                return Err(mismatch(binding, field, "expected a message"));
            }
            (FieldValue::Single(v), kind) => {
                if field.label == Label::Implicit && is_default(v) {
                    continue;
                }
                write_tag(out, number, wire);
                write_value(out, kind, v, binding, field)?;
            }
            (FieldValue::List(items), kind) => {
                if items.is_empty() {
                    continue;
                }
                if wire == WireType::LengthDelimited {
                    for item in items {
                        write_tag(out, number, wire);
                        write_value(out, kind, item, binding, field)?;
                    }
                } else {
                    let mut packed = Vec::new();
                    for item in items {
                        write_value(&mut packed, kind, item, binding, field)?;
                    }
                    write_tag(out, number, WireType::LengthDelimited);
                    write_length_delimited(out, &packed);
                }
            }
        }
    }
    Ok(())
}

fn take<'a>(buf: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8]> {
    let end = pos
        .checked_add(len)
        .filter(|end| *end <= buf.len())
        .ok_or_else(|| SheetError::Decode(format!("field of {len} bytes runs past the end")))?;
    let slice = &buf[*pos..end];
    *pos = end;
    Ok(slice)
}

fn read_length_delimited<'a>(buf: &'a [u8], pos: &mut usize) -> Result<&'a [u8]> {
    let len = read_varint(buf, pos)?;
    let len = usize::try_from(len)
        .map_err(|_| SheetError::Decode(format!("length {len} does not fit in memory")))?;
    take(buf, pos, len)
}

fn skip_field(buf: &[u8], pos: &mut usize, wire: WireType) -> Result<()> {
    match wire {
        WireType::Varint => read_varint(buf, pos).map(|_| ()),
        WireType::Fixed64 => take(buf, pos, 8).map(|_| ()),
        WireType::Fixed32 => take(buf, pos, 4).map(|_| ()),
        WireType::LengthDelimited => read_length_delimited(buf, pos).map(|_| ()),
    }
}

fn read_value(buf: &[u8], pos: &mut usize, kind: &FieldKind) -> Result<Value> {
    let fixed32 = |buf: &[u8], pos: &mut usize| -> Result<[u8; 4]> {
        let bytes = take(buf, pos, 4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    };
    let fixed64 = |buf: &[u8], pos: &mut usize| -> Result<[u8; 8]> {
        let mut out = [0u8; 8];
        out.copy_from_slice(take(buf, pos, 8)?);
        Ok(out)
    };
    let scalar = match kind {
        FieldKind::Enum(_) => return Ok(Value::Enum(read_varint(buf, pos)? as i64 as i32)),
        FieldKind::Message(_) => {
            return Err(SheetError::Decode("message read as a scalar".to_string()));
        }
        FieldKind::Scalar(scalar) => *scalar,
    };
    Ok(match scalar {
        ScalarKind::Int32 => Value::Int(i64::from(read_varint(buf, pos)? as i32)),
        ScalarKind::Int64 => Value::Int(read_varint(buf, pos)? as i64),
        ScalarKind::UInt32 => Value::UInt(u64::from(read_varint(buf, pos)? as u32)),
        ScalarKind::UInt64 => Value::UInt(read_varint(buf, pos)?),
        ScalarKind::SInt32 => {
            Value::Int(i64::from(zigzag_decode(read_varint(buf, pos)?) as i32))
        }
        ScalarKind::SInt64 => Value::Int(zigzag_decode(read_varint(buf, pos)?)),
        ScalarKind::Bool => Value::Bool(read_varint(buf, pos)? != 0),
        ScalarKind::Fixed32 => Value::UInt(u64::from(u32::from_le_bytes(fixed32(buf, pos)?))),
        ScalarKind::SFixed32 => Value::Int(i64::from(i32::from_le_bytes(fixed32(buf, pos)?))),
        ScalarKind::Float => Value::Float(f64::from(f32::from_le_bytes(fixed32(buf, pos)?))),
        ScalarKind::Fixed64 => Value::UInt(u64::from_le_bytes(fixed64(buf, pos)?)),
        ScalarKind::SFixed64 => Value::Int(i64::from_le_bytes(fixed64(buf, pos)?)),
        ScalarKind::Double => Value::Float(f64::from_le_bytes(fixed64(buf, pos)?)),
        ScalarKind::String => {
            let bytes = read_length_delimited(buf, pos)?;
            let text = std::str::from_utf8(bytes)
                .map_err(|err| SheetError::Decode(format!("string is not UTF-8: {err}")))?;
            Value::String(text.to_string())
        }
        ScalarKind::Bytes => Value::Bytes(read_length_delimited(buf, pos)?.to_vec()),
    })
}

/// Decodes one message. Unknown field numbers are skipped.
pub fn decode_message(buf: &[u8], binding: &MessageBinding) -> Result<Record> {
    let mut record = Record::new();
    let mut pos = 0;
    while pos < buf.len() {
        let tag = read_varint(buf, &mut pos)?;
        let wire = WireType::from_tag(tag)?;
        let number = u32::try_from(tag >> 3)
            .map_err(|_| SheetError::Decode(format!("field number {} too large", tag >> 3)))?;
        let Some(field) = binding.field(number) else {
            skip_field(buf, &mut pos, wire)?;
            continue;
        };
        let expected = WireType::of(&field.kind);

        if let FieldKind::Message(nested) = &field.kind {
            if wire != WireType::LengthDelimited {
                return Err(SheetError::Decode(format!(
                    "field `{}` expects a message, found {wire:?}",
                    field.name
                )));
            }
            let inner = decode_message(read_length_delimited(buf, &mut pos)?, nested)?;
            if field.is_repeated() {
                record.append_repeated(number, Value::Message(inner));
            } else {
                record.set_scalar(number, Value::Message(inner));
            }
            continue;
        }

        let packed = wire == WireType::LengthDelimited && expected != WireType::LengthDelimited;
        if packed {
            if !field.is_repeated() {
                return Err(SheetError::Decode(format!(
                    "packed data for singular field `{}`",
                    field.name
                )));
            }
            let payload = read_length_delimited(buf, &mut pos)?;
            let mut inner = 0;
            while inner < payload.len() {
                let value = read_value(payload, &mut inner, &field.kind)?;
                record.append_repeated(number, value);
            }
            continue;
        }

        if wire != expected {
            return Err(SheetError::Decode(format!(
                "field `{}` expects {expected:?}, found {wire:?}",
                field.name
            )));
        }
        let value = read_value(buf, &mut pos, &field.kind)?;
        if field.is_repeated() {
            record.append_repeated(number, value);
        } else {
            record.set_scalar(number, value);
        }
    }
    Ok(record)
}

impl Record {
    pub fn encode(&self, binding: &MessageBinding) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        encode_message(self, binding, &mut out)?;
        Ok(out)
    }

    pub fn decode(buf: &[u8], binding: &MessageBinding) -> Result<Self> {
        decode_message(buf, binding)
    }
}
