//! Schema Builder: renders proto3 source for one sheet and the bindings the
//! encoder consumes in place of compiled code.

use std::fmt::Write as _;

use crate::binding::{ARRAY_ITEMS_FIELD, FieldBinding, FieldKind, Label, MessageBinding};
use crate::cursor::{Cursor, FieldIndexStack};
use crate::error::{Pass, Result, SheetError};
use crate::header::{FieldDescriptor, Rule, SheetHeader, ValueType};
use crate::layout::{ColumnLayout, FieldNode};

/// Spaces per nesting level in generated source.
pub const INDENT_WIDTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaOptions {
    pub package: String,
    /// Imported once when any column is enum-typed.
    pub enum_import: String,
    /// File extension of the generated source, without the dot.
    pub extension: String,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            package: "cfg".to_string(),
            enum_import: "enum.proto".to_string(),
            extension: "schema".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchemaOutput {
    /// `<record>.<extension>`
    pub file_name: String,
    pub text: String,
    pub binding: MessageBinding,
    pub uses_enums: bool,
}

/// Builds the schema source and bindings for `record_name` from a sheet
/// header.
pub fn build_schema(
    header: &SheetHeader,
    record_name: &str,
    options: &SchemaOptions,
) -> Result<SchemaOutput> {
    let layout = ColumnLayout::build(header)?;
    let file_name = format!("{record_name}.{}", options.extension);
    let uses_enums = layout.uses_enums();

    let mut writer = SchemaWriter::default();
    writer.line("/**");
    writer.line(&format!("* @file:   {file_name}"));
    writer.line("* @brief:  generated by sheetproto from the workbook sheet, do not edit");
    writer.line("*/");
    writer.blank();
    writer.line("syntax = \"proto3\";");
    writer.line(&format!("package {};", options.package));
    if uses_enums {
        writer.line(&format!("import \"{}\";", options.enum_import));
    }
    writer.blank();

    let mut binding = MessageBinding::new(record_name);
    writer.open_message(record_name);
    let mut cursor = Cursor::new();
    for node in layout.nodes() {
        writer.declare(node, &mut cursor, &mut binding)?;
    }
    writer.close_message();

    if cursor.position() != layout.column_span() {
        return Err(SheetError::ColumnAlignment {
            pass: Pass::Schema,
            expected: layout.column_span(),
            consumed: cursor.position(),
        });
    }

    writer.blank();
    writer.open_message(&format!("{record_name}_array"));
    writer.line(&format!("repeated {record_name} {ARRAY_ITEMS_FIELD} = 1;"));
    writer.close_message();

    tracing::info!(
        record = record_name,
        fields = binding.fields.len(),
        columns = cursor.position(),
        enums = uses_enums,
        "schema built"
    );

    Ok(SchemaOutput {
        file_name,
        text: writer.out,
        binding,
        uses_enums,
    })
}

#[derive(Default)]
struct SchemaWriter {
    out: String,
    indent: usize,
    /// Nesting depth of suppressed (already declared) message blocks.
    muted: usize,
    numbers: FieldIndexStack,
}

impl SchemaWriter {
    fn line(&mut self, text: &str) {
        if self.muted > 0 {
            return;
        }
        let _ = writeln!(self.out, "{:width$}{text}", "", width = self.indent);
    }

    fn blank(&mut self) {
        if self.muted == 0 {
            self.out.push('\n');
        }
    }

    fn open_message(&mut self, name: &str) {
        self.line(&format!("message {name} {{"));
        self.indent += INDENT_WIDTH;
    }

    fn close_message(&mut self) {
        self.indent -= INDENT_WIDTH;
        self.line("}");
    }

    fn comment(&mut self, field: &FieldDescriptor) {
        let mut text = field.comment.trim().to_string();
        if let Some(default) = &field.default {
            if text.is_empty() {
                text = format!("default: {default}");
            } else {
                text = format!("{text} (default: {default})");
            }
        }
        if text.is_empty() {
            return;
        }
        let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
        if lines.len() <= 1 {
            self.line(&format!("/** {text} */"));
            return;
        }
        self.line(&format!("/** {}", lines[0]));
        self.indent += INDENT_WIDTH;
        for rest in &lines[1..] {
            self.line(rest);
        }
        self.indent -= INDENT_WIDTH;
        self.line("*/");
    }

    fn value_field(
        &mut self,
        field: &FieldDescriptor,
        value: &ValueType,
        label: Label,
        binding: &mut MessageBinding,
    ) {
        let number = self.numbers.next_index();
        self.comment(field);
        let prefix = match label {
            Label::Implicit => "",
            Label::Optional => "optional ",
            Label::Repeated => "repeated ",
        };
        self.line(&format!(
            "{prefix}{} {} = {number};",
            value.proto_name(),
            field.name
        ));
        binding.push(FieldBinding {
            number,
            name: field.name.clone(),
            label,
            kind: FieldKind::from_value_type(value),
        });
    }

    fn declare(
        &mut self,
        node: &FieldNode,
        cursor: &mut Cursor,
        binding: &mut MessageBinding,
    ) -> Result<()> {
        match node {
            FieldNode::Skip { .. } => cursor.advance(1),
            FieldNode::Scalar { field, value } => {
                let label = if field.rule == Rule::Optional {
                    Label::Optional
                } else {
                    Label::Implicit
                };
                self.value_field(field, value, label, binding);
                cursor.advance(1);
            }
            FieldNode::Inline { field, element } => {
                self.value_field(field, element, Label::Repeated, binding);
                cursor.advance(1);
            }
            FieldNode::Bounded { max, element, .. } => {
                cursor.advance(1);
                match element.as_ref() {
                    FieldNode::Scalar { field, value } => {
                        self.value_field(field, value, Label::Repeated, binding);
                        cursor.advance(1);
                    }
                    FieldNode::Struct { .. } => {
                        self.structure(element, Label::Repeated, cursor, binding)?;
                    }
                    _ => unreachable!("layout only repeats scalars and structs"),
                }
                cursor.advance((max - 1) * element.span());
            }
            FieldNode::Struct { .. } => self.structure(node, Label::Implicit, cursor, binding)?,
        }
        Ok(())
    }

    fn structure(
        &mut self,
        node: &FieldNode,
        label: Label,
        cursor: &mut Cursor,
        binding: &mut MessageBinding,
    ) -> Result<()> {
        let FieldNode::Struct {
            field,
            type_name,
            members,
            ..
        } = node
        else {
            unreachable!("structure called on a non-struct node")
        };
        let number = self.numbers.next_index();
        let earlier = self.numbers.declared(type_name).cloned();
        let fresh = earlier.is_none();
        if !fresh {
            tracing::debug!(name = %type_name, "message already declared in this scope");
            self.muted += 1;
        }

        self.blank();
        self.open_message(type_name);
        self.numbers.push();
        cursor.advance(1);
        let mut nested = MessageBinding::new(type_name.clone());
        for member in members {
            self.declare(member, cursor, &mut nested)?;
        }
        self.numbers.pop();
        self.close_message();
        self.blank();

        match earlier {
            None => {
                self.numbers.declare(nested.clone());
            }
            Some(earlier) => {
                self.muted -= 1;
                if earlier != nested {
                    return Err(SheetError::malformed(
                        field.column,
                        type_name.as_str(),
                        format!(
                            "message `{type_name}` is already declared in this scope with different fields"
                        ),
                    ));
                }
            }
        }

        let prefix = if label == Label::Repeated { "repeated " } else { "" };
        self.line(&format!("{prefix}{type_name} {} = {number};", field.name));
        binding.push(FieldBinding {
            number,
            name: field.name.clone(),
            label,
            kind: FieldKind::Message(nested),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::ScalarKind;
    use sheetproto_workbook::MemoryGrid;

    fn schema(rows: Vec<Vec<&str>>) -> SchemaOutput {
        let header = SheetHeader::read(&MemoryGrid::from_rows(rows));
        build_schema(&header, "Item", &SchemaOptions::default()).unwrap()
    }

    #[test]
    fn flat_sheet_source() {
        let out = schema(vec![
            vec!["item id", "", "display name", ""],
            vec!["int32", "", "optional string", "string[]"],
            vec!["id", "ignored", "title", "tags"],
        ]);
        let expected = "\
/**
* @file:   Item.schema
* @brief:  generated by sheetproto from the workbook sheet, do not edit
*/

syntax = \"proto3\";
package cfg;

message Item {
   /** item id */
   int32 id = 1;
   /** display name */
   optional string title = 2;
   repeated string tags = 3;
}

message Item_array {
   repeated Item items = 1;
}
";
        assert_eq!(out.text, expected);
        assert_eq!(out.file_name, "Item.schema");
        assert!(!out.uses_enums);
        let numbers: Vec<u32> = out.binding.fields.iter().map(|f| f.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(out.binding.field(2).unwrap().label, Label::Optional);
    }

    #[test]
    fn bounded_struct_numbering_restarts_per_message() {
        // id | 2[] | Reward{kind, label} | reserved x3 | level
        let out = schema(vec![
            vec!["", "", "rewards", "", "", "", "", "", ""],
            vec![
                "int32",
                "2[]",
                "required_struct 2",
                "int32",
                "string",
                "",
                "",
                "",
                "int32",
            ],
            vec!["id", "", "Reward", "kind", "label", "", "", "", "level"],
        ]);
        assert_eq!(
            out.binding.fields.iter().map(|f| f.number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        let rewards = out.binding.field(2).unwrap();
        assert_eq!(rewards.name, "rewards");
        assert!(rewards.is_repeated());
        let nested = rewards.message().unwrap();
        assert_eq!(
            nested.fields.iter().map(|f| f.number).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(out.text.contains(
            "   message Reward {\n      int32 kind = 1;\n      string label = 2;\n   }\n\n   repeated Reward rewards = 2;\n   int32 level = 3;\n"
        ));
    }

    #[test]
    fn sibling_structs_of_same_type_declared_once() {
        let out = schema(vec![
            vec!["", "home", "", "work", ""],
            vec!["int32", "required_struct 1", "string", "optional_struct 1", "string"],
            vec!["id", "Address", "street", "Address", "street"],
        ]);
        assert_eq!(out.text.matches("message Address {").count(), 1);
        assert!(out.text.contains("   Address home = 2;\n"));
        assert!(out.text.contains("   Address work = 3;\n"));
        let work = out.binding.field_by_name("work").unwrap();
        assert_eq!(work.message().unwrap().fields[0].name, "street");
    }

    #[test]
    fn reused_struct_name_with_other_fields_is_malformed() {
        let header = SheetHeader::read(&MemoryGrid::from_rows(vec![
            vec!["", "home", "", "work", ""],
            vec!["int32", "required_struct 1", "string", "optional_struct 1", "int32"],
            vec!["id", "Address", "street", "Address", "zip"],
        ]));
        match build_schema(&header, "Item", &SchemaOptions::default()) {
            Err(SheetError::MalformedHeader { column, token, .. }) => {
                assert_eq!(column, "D");
                assert_eq!(token, "Address");
            }
            other => panic!("unexpected {other:?}"),
        }

        // Same field name, different type.
        let header = SheetHeader::read(&MemoryGrid::from_rows(vec![
            vec!["", "home", "", "work", ""],
            vec!["int32", "required_struct 1", "string", "optional_struct 1", "int32"],
            vec!["id", "Address", "street", "Address", "street"],
        ]));
        assert!(matches!(
            build_schema(&header, "Item", &SchemaOptions::default()),
            Err(SheetError::MalformedHeader { .. })
        ));
    }

    #[test]
    fn enum_import_emitted_once() {
        let out = schema(vec![
            vec!["", "", ""],
            vec!["int32", "enum-Color", "enum-Shape[]"],
            vec!["id", "color", "shapes"],
        ]);
        assert!(out.uses_enums);
        assert_eq!(out.text.matches("import \"enum.proto\";").count(), 1);
        assert!(out.text.contains("   Color color = 2;\n"));
        assert!(out.text.contains("   repeated Shape shapes = 3;\n"));
        assert_eq!(
            out.binding.field(2).unwrap().kind,
            FieldKind::Enum("Color".into())
        );
    }

    #[test]
    fn defaults_and_multiline_comments() {
        let out = schema(vec![
            vec!["", "first line\nsecond line"],
            vec!["int32", "uint32"],
            vec!["id", "level=1"],
        ]);
        assert!(out.text.contains(
            "   /** first line\n      second line (default: 1)\n   */\n   uint32 level = 2;\n"
        ));
        assert_eq!(
            out.binding.field(2).unwrap().kind,
            FieldKind::Scalar(ScalarKind::UInt32)
        );
    }

    #[test]
    fn bad_header_fails() {
        let header = SheetHeader::read(&MemoryGrid::from_rows(vec![
            vec![""],
            vec!["required int99"],
            vec!["id"],
        ]));
        assert!(matches!(
            build_schema(&header, "Item", &SchemaOptions::default()),
            Err(SheetError::MalformedHeader { .. })
        ));
    }
}
