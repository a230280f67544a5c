//! Enum lookup table, usually loaded from the shared `enum.proto` source.

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

static LINE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"//[^\n]*").expect("valid regex"));
static BLOCK_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));
static ENUM_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\benum\s+(\w+)\s*\{([^}]*)\}").expect("valid regex"));
static ENUM_MEMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Za-z_]\w*)\s*=\s*(-?(?:0[xX][0-9A-Fa-f]+|\d+))").expect("valid regex")
});

/// `(enum, member) -> number`, members kept in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumTable {
    enums: BTreeMap<String, Vec<(String, i32)>>,
}

impl EnumTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, enum_name: &str, member: &str, value: i32) {
        self.enums
            .entry(enum_name.to_string())
            .or_default()
            .push((member.to_string(), value));
    }

    /// First member of `enum_name` named exactly `member`.
    pub fn resolve(&self, enum_name: &str, member: &str) -> Option<i32> {
        self.enums
            .get(enum_name)?
            .iter()
            .find(|(name, _)| name == member)
            .map(|(_, value)| *value)
    }

    /// First member of `enum_name` carrying `value`.
    pub fn name_of(&self, enum_name: &str, value: i32) -> Option<&str> {
        self.enums
            .get(enum_name)?
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| name.as_str())
    }

    pub fn contains_enum(&self, enum_name: &str) -> bool {
        self.enums.contains_key(enum_name)
    }

    pub fn is_empty(&self) -> bool {
        self.enums.is_empty()
    }

    /// Every `enum Name { ... }` block in a proto source. Enums nested in
    /// messages are registered under their bare name.
    pub fn parse_proto(source: &str) -> Self {
        let source = BLOCK_COMMENT.replace_all(source, " ");
        let source = LINE_COMMENT.replace_all(&source, "");
        let mut table = Self::new();
        for block in ENUM_BLOCK.captures_iter(&source) {
            let enum_name = &block[1];
            table.enums.entry(enum_name.to_string()).or_default();
            for member in ENUM_MEMBER.captures_iter(&block[2]) {
                match parse_number(&member[2]) {
                    Some(value) => table.insert(enum_name, &member[1], value),
                    None => tracing::warn!(
                        enum_name,
                        member = &member[1],
                        value = &member[2],
                        "enum value out of range, ignored"
                    ),
                }
            }
        }
        tracing::debug!(enums = table.enums.len(), "parsed enum definitions");
        table
    }

    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Ok(Self::parse_proto(&source))
    }
}

fn parse_number(text: &str) -> Option<i32> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    i32::try_from(if negative { -magnitude } else { magnitude }).ok()
}
