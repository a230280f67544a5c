//! Column layout: the one place that decides how many columns each header
//! construct consumes.
//!
//! Both the schema pass and the encode pass walk the tree built here, so the
//! two can only disagree about column positions if one of them ignores a
//! node's [`FieldNode::span`].

use crate::cursor::Cursor;
use crate::error::{Result, SheetError};
use crate::header::{FieldDescriptor, FieldType, RepeatKind, Rule, SheetHeader, ValueType};

#[derive(Debug, Clone, PartialEq)]
pub enum FieldNode {
    /// Blank type cell.
    Skip { column: usize },
    /// One value in one column.
    Scalar {
        field: FieldDescriptor,
        value: ValueType,
    },
    /// Delimiter-joined values in one column.
    Inline {
        field: FieldDescriptor,
        element: ValueType,
    },
    /// Count column followed by `max` copies of `element`'s columns.
    Bounded {
        count_column: usize,
        max: usize,
        element: Box<FieldNode>,
    },
    /// Struct header column followed by its members.
    Struct {
        field: FieldDescriptor,
        type_name: String,
        required: bool,
        members: Vec<FieldNode>,
    },
}

impl FieldNode {
    /// Columns consumed by this node, including repeated copies.
    pub fn span(&self) -> usize {
        match self {
            FieldNode::Skip { .. } | FieldNode::Scalar { .. } | FieldNode::Inline { .. } => 1,
            FieldNode::Bounded { max, element, .. } => {
                max.saturating_mul(element.span()).saturating_add(1)
            }
            FieldNode::Struct { members, .. } => members
                .iter()
                .fold(1, |total: usize, member| total.saturating_add(member.span())),
        }
    }

    pub fn column(&self) -> usize {
        match self {
            FieldNode::Skip { column } => *column,
            FieldNode::Bounded { count_column, .. } => *count_column,
            FieldNode::Scalar { field, .. }
            | FieldNode::Inline { field, .. }
            | FieldNode::Struct { field, .. } => field.column,
        }
    }

    /// Whether this node or anything below it is enum-typed.
    pub fn uses_enums(&self) -> bool {
        !self.enum_names().is_empty()
    }

    /// Enum type names referenced by this node and its descendants.
    pub fn enum_names(&self) -> Vec<(usize, String)> {
        let mut out = Vec::new();
        self.collect_enums(&mut out);
        out
    }

    fn collect_enums(&self, out: &mut Vec<(usize, String)>) {
        match self {
            FieldNode::Skip { .. } => {}
            FieldNode::Scalar { field, value } => {
                if let Some(name) = value.enum_name() {
                    out.push((field.column, name.to_string()));
                }
            }
            FieldNode::Inline { field, element } => {
                if let Some(name) = element.enum_name() {
                    out.push((field.column, name.to_string()));
                }
            }
            FieldNode::Bounded { element, .. } => element.collect_enums(out),
            FieldNode::Struct { members, .. } => {
                for member in members {
                    member.collect_enums(out);
                }
            }
        }
    }
}

/// Layout of every column in a sheet, left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    nodes: Vec<FieldNode>,
    column_count: usize,
}

impl ColumnLayout {
    pub fn build(header: &SheetHeader) -> Result<Self> {
        let column_count = header.column_count();
        let mut cursor = Cursor::new();
        let mut nodes = Vec::new();
        while cursor.position() < column_count {
            nodes.push(parse_node(header, &mut cursor)?);
        }
        tracing::debug!(
            columns = column_count,
            fields = nodes.len(),
            "built column layout"
        );
        Ok(Self {
            nodes,
            column_count,
        })
    }

    pub fn nodes(&self) -> &[FieldNode] {
        &self.nodes
    }

    /// Columns a full traversal consumes.
    pub fn column_span(&self) -> usize {
        self.nodes.iter().map(FieldNode::span).sum()
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn uses_enums(&self) -> bool {
        self.nodes.iter().any(FieldNode::uses_enums)
    }

    pub fn enum_names(&self) -> Vec<(usize, String)> {
        self.nodes.iter().flat_map(FieldNode::enum_names).collect()
    }
}

fn parse_node(header: &SheetHeader, cursor: &mut Cursor) -> Result<FieldNode> {
    let column = cursor.position();
    let field = header.descriptor_at(column)?;
    match (&field.rule, &field.field_type) {
        (Rule::Skip, _) | (_, FieldType::Blank) => {
            cursor.advance(1);
            Ok(FieldNode::Skip { column })
        }
        (_, FieldType::Scalar(_) | FieldType::EnumRef(_)) => {
            cursor.advance(1);
            let value = field
                .field_type
                .value_type()
                .expect("scalar and enum columns carry a value type");
            Ok(FieldNode::Scalar { field, value })
        }
        (_, FieldType::Repeated(RepeatKind::Inline(element))) => {
            cursor.advance(1);
            let element = element.clone();
            Ok(FieldNode::Inline { field, element })
        }
        (_, FieldType::Repeated(RepeatKind::Bounded(max))) => {
            let max = *max;
            cursor.advance(1);
            if cursor.position() >= header.column_count() {
                return Err(SheetError::malformed(
                    column,
                    header.type_token(column),
                    "repetition count is not followed by a field",
                ));
            }
            let element = parse_node(header, cursor)?;
            if !matches!(element, FieldNode::Scalar { .. } | FieldNode::Struct { .. }) {
                return Err(SheetError::malformed(
                    element.column(),
                    header.type_token(element.column()),
                    "only scalar and struct fields can follow a repetition count",
                ));
            }
            // the first copy was consumed by parse_node; reserve the rest
            let end = (max - 1)
                .checked_mul(element.span())
                .and_then(|reserved| cursor.position().checked_add(reserved))
                .filter(|end| *end <= header.column_count());
            let Some(end) = end else {
                return Err(SheetError::malformed(
                    column,
                    header.type_token(column),
                    format!(
                        "{max} repeated copies of a {}-column field do not fit in the sheet",
                        element.span()
                    ),
                ));
            };
            cursor.advance(end - cursor.position());
            Ok(FieldNode::Bounded {
                count_column: column,
                max,
                element: Box::new(element),
            })
        }
        (rule, FieldType::Struct { name, count }) => {
            let required = *rule == Rule::RequiredStruct;
            let type_name = name.clone();
            let count = *count;
            cursor.advance(1);
            let remaining = header.column_count().saturating_sub(cursor.position());
            if count > remaining {
                return Err(SheetError::malformed(
                    column,
                    header.type_token(column),
                    format!(
                        "struct `{type_name}` declares {count} members but only {remaining} columns follow"
                    ),
                ));
            }
            let mut members = Vec::with_capacity(count);
            for _ in 0..count {
                if cursor.position() >= header.column_count() {
                    return Err(SheetError::malformed(
                        column,
                        header.type_token(column),
                        format!(
                            "struct `{type_name}` declares {count} members but the sheet ends after {}",
                            members.len()
                        ),
                    ));
                }
                members.push(parse_node(header, cursor)?);
            }
            Ok(FieldNode::Struct {
                field,
                type_name,
                required,
                members,
            })
        }
    }
}
