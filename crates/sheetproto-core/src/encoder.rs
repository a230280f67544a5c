//! Record Encoder: walks every data row along the same column layout as the
//! schema pass and fills one record per row.

use sheetproto_workbook::{Grid, cell_name, column_to_letters};

use crate::binding::{FieldBinding, MessageBinding};
use crate::convert::{convert_cell, split_inline};
use crate::cursor::{Cursor, FieldIndexStack};
use crate::enums::EnumTable;
use crate::error::{Pass, Result, SheetError};
use crate::header::{FIRST_DATA_ROW, FieldDescriptor, SheetHeader, ValueType, parse_count};
use crate::layout::{ColumnLayout, FieldNode};
use crate::record::{FieldAccess, Record, Value};
use crate::text_format::to_text;

/// Every kept row of one sheet, encoded.
#[derive(Debug, Clone)]
pub struct EncodedSheet {
    /// Binding of the `<record>_array` wrapper.
    pub binding: MessageBinding,
    pub records: Vec<Record>,
    /// The wrapper message in protobuf binary form.
    pub binary: Vec<u8>,
    /// The wrapper message in text format.
    pub text: String,
    pub rows_skipped: usize,
}

impl EncodedSheet {
    pub fn rows_encoded(&self) -> usize {
        self.records.len()
    }
}

/// Wraps `records` in a `<record>_array` message.
pub fn wrap_records(records: &[Record]) -> Record {
    let mut array = Record::new();
    for record in records {
        array.append_repeated(1, Value::Message(record.clone()));
    }
    array
}

/// Encodes all data rows of `grid` against `binding`, the record message
/// produced by the schema pass over the same header.
pub fn encode_sheet<G: Grid + ?Sized>(
    grid: &G,
    binding: &MessageBinding,
    enums: &EnumTable,
) -> Result<EncodedSheet> {
    let header = SheetHeader::read(grid);
    let layout = ColumnLayout::build(&header)?;

    for (column, name) in layout.enum_names() {
        if !enums.contains_enum(&name) {
            return Err(SheetError::UnknownEnumType {
                column: column_to_letters(column),
                name,
            });
        }
    }

    let mut records = Vec::new();
    let mut rows_skipped = 0;
    if let Some(id_column) = header.id_column() {
        for row in FIRST_DATA_ROW..header.row_count() {
            if grid.is_blank(row, id_column) {
                tracing::warn!(
                    row = row + 1,
                    id_cell = %cell_name(row, id_column),
                    "id cell is blank, row skipped"
                );
                rows_skipped += 1;
                continue;
            }
            records.push(encode_row::<Record, G>(grid, row, &layout, binding, enums)?);
        }
    } else {
        tracing::warn!(record = %binding.name, "sheet has no typed columns, nothing to encode");
    }

    let array_binding = binding.array_of();
    let array = wrap_records(&records);
    let binary = array.encode(&array_binding)?;
    let text = to_text(&array, &array_binding, enums)?;

    tracing::info!(
        record = %binding.name,
        rows = records.len(),
        skipped = rows_skipped,
        bytes = binary.len(),
        "sheet encoded"
    );

    Ok(EncodedSheet {
        binding: array_binding,
        records,
        binary,
        text,
        rows_skipped,
    })
}

/// Encodes one data row into a fresh message of type `M`.
pub fn encode_row<M: FieldAccess, G: Grid + ?Sized>(
    grid: &G,
    row: usize,
    layout: &ColumnLayout,
    binding: &MessageBinding,
    enums: &EnumTable,
) -> Result<M> {
    let mut walker = RowWalker {
        grid,
        row,
        enums,
        cursor: Cursor::new(),
        numbers: FieldIndexStack::new(),
    };
    let mut message = M::default();
    for node in layout.nodes() {
        walker.encode_node(node, &mut message, binding)?;
    }
    if walker.cursor.position() != layout.column_span() {
        return Err(SheetError::ColumnAlignment {
            pass: Pass::Encode,
            expected: layout.column_span(),
            consumed: walker.cursor.position(),
        });
    }
    Ok(message)
}

struct RowWalker<'a, G: ?Sized> {
    grid: &'a G,
    row: usize,
    enums: &'a EnumTable,
    cursor: Cursor,
    numbers: FieldIndexStack,
}

/// The binding for the next field, which must carry the header's name.
fn bound<'b>(binding: &'b MessageBinding, number: u32, name: &str) -> Result<&'b FieldBinding> {
    binding
        .field(number)
        .filter(|field| field.name == name)
        .ok_or_else(|| SheetError::BindingMismatch {
            message: binding.name.clone(),
            number,
            name: name.to_string(),
        })
}

impl<'a, G: Grid + ?Sized> RowWalker<'a, G> {
    fn current_cell(&self) -> (&'a str, String) {
        let col = self.cursor.position();
        (self.grid.cell(self.row, col), cell_name(self.row, col))
    }

    fn read_value(&self, field: &FieldDescriptor, value_type: &ValueType) -> Result<Option<Value>> {
        let (text, cell) = self.current_cell();
        convert_cell(text, value_type, field.default.as_deref(), self.enums, &cell)
    }

    fn encode_node<M: FieldAccess>(
        &mut self,
        node: &FieldNode,
        target: &mut M,
        binding: &MessageBinding,
    ) -> Result<()> {
        match node {
            FieldNode::Skip { .. } => self.cursor.advance(1),
            FieldNode::Scalar { field, value } => {
                let number = self.numbers.next_index();
                bound(binding, number, &field.name)?;
                if let Some(v) = self.read_value(field, value)? {
                    target.set_scalar(number, v);
                }
                self.cursor.advance(1);
            }
            FieldNode::Inline { field, element } => {
                let number = self.numbers.next_index();
                bound(binding, number, &field.name)?;
                let (text, cell) = self.current_cell();
                for token in split_inline(text) {
                    if let Some(v) = convert_cell(token, element, None, self.enums, &cell)? {
                        target.append_repeated(number, v);
                    }
                }
                self.cursor.advance(1);
            }
            FieldNode::Bounded {
                count_column,
                max,
                element,
            } => self.encode_bounded(*count_column, *max, element, target, binding)?,
            FieldNode::Struct {
                field,
                required,
                members,
                ..
            } => {
                let number = self.numbers.next_index();
                let nested = bound(binding, number, &field.name)?
                    .message()
                    .ok_or_else(|| SheetError::BindingMismatch {
                        message: binding.name.clone(),
                        number,
                        name: field.name.clone(),
                    })?;
                let sub = target.submessage_mut(number);
                self.encode_members(members, sub, nested)?;
                if !*required && sub.is_empty() {
                    target.clear_field(number);
                }
            }
        }
        Ok(())
    }

    fn encode_bounded<M: FieldAccess>(
        &mut self,
        count_column: usize,
        max: usize,
        element: &FieldNode,
        target: &mut M,
        binding: &MessageBinding,
    ) -> Result<()> {
        let (text, cell) = self.current_cell();
        let declared = if text.trim().is_empty() {
            0
        } else {
            parse_count(text).ok_or_else(|| SheetError::CellConversion {
                cell: cell.clone(),
                kind: "repeat count".to_string(),
                value: text.to_string(),
                reason: "not a non-negative integer".to_string(),
            })?
        };
        let count = declared.min(max);
        if declared > max {
            tracing::debug!(cell = %cell, declared, max, "repeat count clamped");
        }
        self.cursor.advance(1);

        match element {
            FieldNode::Scalar { field, value } => {
                let number = self.numbers.next_index();
                bound(binding, number, &field.name)?;
                let start = self.cursor.position();
                for i in 0..count {
                    let col = start + i;
                    let cell = cell_name(self.row, col);
                    let text = self.grid.cell(self.row, col);
                    if let Some(v) = convert_cell(text, value, None, self.enums, &cell)? {
                        target.append_repeated(number, v);
                    }
                }
                self.cursor.advance(max);
            }
            FieldNode::Struct {
                field,
                required,
                members,
                ..
            } => {
                let number = self.numbers.next_index();
                let nested = bound(binding, number, &field.name)?
                    .message()
                    .ok_or_else(|| SheetError::BindingMismatch {
                        message: binding.name.clone(),
                        number,
                        name: field.name.clone(),
                    })?;
                if count == 0 && *required {
                    return Err(SheetError::MissingRequiredRepeat {
                        cell: cell_name(self.row, count_column),
                        field: field.name.clone(),
                    });
                }
                // An empty optional repetition still walks one instance so
                // the cursor lands where the schema pass put it.
                let used = count.max(1);
                for _ in 0..used {
                    let sub = target.add_submessage(number);
                    self.encode_members(members, sub, nested)?;
                }
                if count == 0 {
                    target.remove_last_submessage(number);
                }
                self.cursor.advance((max - used) * element.span());
            }
            _ => unreachable!("layout only repeats scalars and structs"),
        }
        Ok(())
    }

    /// Walks a struct header column and its members into `sub`.
    fn encode_members<M: FieldAccess>(
        &mut self,
        members: &[FieldNode],
        sub: &mut M,
        nested: &MessageBinding,
    ) -> Result<()> {
        self.cursor.advance(1);
        self.numbers.push();
        for member in members {
            self.encode_node(member, sub, nested)?;
        }
        self.numbers.pop();
        Ok(())
    }
}
