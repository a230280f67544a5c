use crate::header::{ScalarKind, ValueType};

/// Name of the single field of the wrapper message.
pub const ARRAY_ITEMS_FIELD: &str = "items";
/// Suffix appended to the record name to form the wrapper message name.
pub const ARRAY_SUFFIX: &str = "_array";

/// Presence rule of a bound field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    /// proto3 implicit presence: default values are not serialized.
    Implicit,
    /// Explicit presence (`optional`).
    Optional,
    Repeated,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Scalar(ScalarKind),
    Enum(String),
    Message(MessageBinding),
}

impl FieldKind {
    pub fn from_value_type(value: &ValueType) -> Self {
        match value {
            ValueType::Scalar(kind) => FieldKind::Scalar(*kind),
            ValueType::Enum(name) => FieldKind::Enum(name.clone()),
        }
    }

    /// Type name as written in schema source.
    pub fn type_name(&self) -> &str {
        match self {
            FieldKind::Scalar(kind) => kind.proto_name(),
            FieldKind::Enum(name) => name,
            FieldKind::Message(message) => &message.name,
        }
    }
}

/// Runtime description of one field of a generated message.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBinding {
    pub number: u32,
    pub name: String,
    pub label: Label,
    pub kind: FieldKind,
}

impl FieldBinding {
    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated
    }

    pub fn message(&self) -> Option<&MessageBinding> {
        match &self.kind {
            FieldKind::Message(message) => Some(message),
            _ => None,
        }
    }
}

/// Runtime description of a generated message, produced by the schema pass
/// and handed to the encoder in place of compiled bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageBinding {
    pub name: String,
    pub fields: Vec<FieldBinding>,
}

impl MessageBinding {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn push(&mut self, field: FieldBinding) {
        self.fields.push(field);
    }

    pub fn field(&self, number: u32) -> Option<&FieldBinding> {
        self.fields.iter().find(|f| f.number == number)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldBinding> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The `<name>_array { repeated <name> items = 1; }` wrapper.
    pub fn array_of(&self) -> MessageBinding {
        MessageBinding {
            name: format!("{}{ARRAY_SUFFIX}", self.name),
            fields: vec![FieldBinding {
                number: 1,
                name: ARRAY_ITEMS_FIELD.to_string(),
                label: Label::Repeated,
                kind: FieldKind::Message(self.clone()),
            }],
        }
    }
}
