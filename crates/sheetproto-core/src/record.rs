//! Dynamic message instances and the typed accessor the encoder writes
//! through.

use std::collections::BTreeMap;

use crate::binding::MessageBinding;

/// One field value. Floats of kind `float` are stored already rounded to
/// `f32` precision.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    Enum(i32),
    Message(Record),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Enum(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<i32> {
        match self {
            Value::Enum(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Record> {
        match self {
            Value::Message(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Single(Value),
    List(Vec<Value>),
}

impl FieldValue {
    /// Values in order; a singular field yields one.
    pub fn values(&self) -> &[Value] {
        match self {
            FieldValue::Single(v) => std::slice::from_ref(v),
            FieldValue::List(vs) => vs,
        }
    }
}

/// Write access to a message by field number.
///
/// The encoder only ever talks to records through this trait, so it never
/// needs to know field names or the concrete message type.
pub trait FieldAccess: Default {
    /// Sets a singular field, replacing any previous value.
    fn set_scalar(&mut self, number: u32, value: Value);

    /// Appends to a repeated field.
    fn append_repeated(&mut self, number: u32, value: Value);

    /// Appends a fresh instance to a repeated message field.
    fn add_submessage(&mut self, number: u32) -> &mut Self;

    /// Singular message field, created empty if absent.
    fn submessage_mut(&mut self, number: u32) -> &mut Self;

    /// Drops the most recently added instance of a repeated message field.
    fn remove_last_submessage(&mut self, number: u32);

    fn clear_field(&mut self, number: u32);

    /// True when no field has been set.
    fn is_empty(&self) -> bool;
}

/// A message instance keyed by field number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<u32, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, number: u32) -> Option<&FieldValue> {
        self.fields.get(&number)
    }

    /// Singular value of `number`, if set.
    pub fn single(&self, number: u32) -> Option<&Value> {
        match self.fields.get(&number)? {
            FieldValue::Single(v) => Some(v),
            FieldValue::List(_) => None,
        }
    }

    /// Entries of repeated field `number`; empty when unset.
    pub fn list(&self, number: u32) -> &[Value] {
        match self.fields.get(&number) {
            Some(FieldValue::List(vs)) => vs,
            _ => &[],
        }
    }

    /// Fields in ascending field-number order.
    pub fn fields(&self) -> impl Iterator<Item = (u32, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (*n, v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Looks a field up by its name in `binding`.
    pub fn field_named<'a>(&'a self, binding: &MessageBinding, name: &str) -> Option<&'a FieldValue> {
        self.get(binding.field_by_name(name)?.number)
    }

    fn list_mut(&mut self, number: u32) -> &mut Vec<Value> {
        let entry = self
            .fields
            .entry(number)
            .or_insert_with(|| FieldValue::List(Vec::new()));
        if let FieldValue::Single(_) = entry {
            *entry = FieldValue::List(Vec::new());
        }
        match entry {
            FieldValue::List(vs) => vs,
            FieldValue::Single(_) => unreachable!("entry was just made a list"),
        }
    }
}

impl FieldAccess for Record {
    fn set_scalar(&mut self, number: u32, value: Value) {
        self.fields.insert(number, FieldValue::Single(value));
    }

    fn append_repeated(&mut self, number: u32, value: Value) {
        self.list_mut(number).push(value);
    }

    fn add_submessage(&mut self, number: u32) -> &mut Self {
        let list = self.list_mut(number);
        list.push(Value::Message(Record::new()));
        match list.last_mut() {
            Some(Value::Message(record)) => record,
            _ => unreachable!("a message was just pushed"),
        }
    }

    fn submessage_mut(&mut self, number: u32) -> &mut Self {
        let entry = self
            .fields
            .entry(number)
            .or_insert_with(|| FieldValue::Single(Value::Message(Record::new())));
        if !matches!(entry, FieldValue::Single(Value::Message(_))) {
            *entry = FieldValue::Single(Value::Message(Record::new()));
        }
        match entry {
            FieldValue::Single(Value::Message(record)) => record,
            _ => unreachable!("entry was just made a message"),
        }
    }

    fn remove_last_submessage(&mut self, number: u32) {
        let now_empty = match self.fields.get_mut(&number) {
            Some(FieldValue::List(vs)) => {
                vs.pop();
                vs.is_empty()
            }
            _ => false,
        };
        if now_empty {
            self.fields.remove(&number);
        }
    }

    fn clear_field(&mut self, number: u32) {
        self.fields.remove(&number);
    }

    fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_and_singular_access() {
        let mut r = Record::new();
        r.set_scalar(2, Value::Int(7));
        r.append_repeated(1, Value::String("a".into()));
        r.append_repeated(1, Value::String("b".into()));
        assert_eq!(r.single(2), Some(&Value::Int(7)));
        assert_eq!(r.list(1).len(), 2);
        assert!(r.list(3).is_empty());
        let numbers: Vec<u32> = r.fields().map(|(n, _)| n).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn submessages_can_be_discarded() {
        let mut r = Record::new();
        r.add_submessage(4).set_scalar(1, Value::Int(1));
        r.add_submessage(4);
        assert_eq!(r.list(4).len(), 2);
        r.remove_last_submessage(4);
        assert_eq!(r.list(4).len(), 1);
        r.remove_last_submessage(4);
        assert!(r.get(4).is_none());
        assert!(r.is_empty());
    }

    #[test]
    fn singular_submessage_is_reused() {
        let mut r = Record::new();
        r.submessage_mut(3).set_scalar(1, Value::Bool(true));
        r.submessage_mut(3).set_scalar(2, Value::Bool(false));
        let inner = r.single(3).and_then(Value::as_message).unwrap();
        assert_eq!(inner.len(), 2);
        r.clear_field(3);
        assert!(r.is_empty());
    }
}
