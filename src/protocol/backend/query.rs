//! Query result backend messages.

use zerocopy::byteorder::big_endian::{I16 as I16BE, I32 as I32BE, U16 as U16BE, U32 as U32BE};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};
use crate::protocol::codec::MessageBuilder;
use crate::protocol::types::{FormatCode, Oid};
use crate::protocol::view::ReadView;

use super::msg_type;

/// Fixed-size tail of a field description (18 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct FieldDescriptionTail {
    /// Table OID (0 if not a table column)
    pub table_oid: U32BE,
    /// Column attribute number (0 if not a table column)
    pub column_id: I16BE,
    /// Data type OID
    pub type_oid: U32BE,
    /// Type size (-1 for variable, -2 for null-terminated)
    pub type_size: I16BE,
    /// Type modifier (type-specific)
    pub type_modifier: I32BE,
    /// Format code (0=text, 1=binary)
    pub format: U16BE,
}

const TAIL_SIZE: usize = size_of::<FieldDescriptionTail>();

impl FieldDescriptionTail {
    /// Describe a computed column of the given type in text format.
    pub fn new(type_oid: Oid, type_size: i16, type_modifier: i32) -> Self {
        Self {
            table_oid: U32BE::new(0),
            column_id: I16BE::new(0),
            type_oid: U32BE::new(type_oid),
            type_size: I16BE::new(type_size),
            type_modifier: I32BE::new(type_modifier),
            format: U16BE::new(FormatCode::Text as u16),
        }
    }

    /// Attach the source table column.
    pub fn with_table(mut self, table_oid: Oid, column_id: i16) -> Self {
        self.table_oid = U32BE::new(table_oid);
        self.column_id = I16BE::new(column_id);
        self
    }

    /// Replace the format code.
    pub fn with_format(mut self, format: FormatCode) -> Self {
        self.format = U16BE::new(format as u16);
        self
    }
}

/// Field description within a RowDescription.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescription<'a> {
    /// Field name
    pub name: &'a str,
    /// Fixed-size metadata
    pub tail: FieldDescriptionTail,
}

impl FieldDescription<'_> {
    /// Table OID (0 if not a table column)
    pub fn table_oid(&self) -> Oid {
        self.tail.table_oid.get()
    }

    /// Column attribute number (0 if not a table column)
    pub fn column_id(&self) -> i16 {
        self.tail.column_id.get()
    }

    /// Data type OID
    pub fn type_oid(&self) -> Oid {
        self.tail.type_oid.get()
    }

    /// Type size (-1 for variable, -2 for null-terminated)
    pub fn type_size(&self) -> i16 {
        self.tail.type_size.get()
    }

    /// Type modifier (type-specific)
    pub fn type_modifier(&self) -> i32 {
        self.tail.type_modifier.get()
    }

    /// Format code, or `None` if the raw value is neither text nor binary.
    pub fn format(&self) -> Option<FormatCode> {
        FormatCode::from_i16(self.tail.format.get() as i16)
    }
}

/// Write a RowDescription message.
pub fn write_row_description(buf: &mut Vec<u8>, fields: &[FieldDescription<'_>]) {
    debug_assert!(fields.len() <= i16::MAX as usize, "too many columns");
    let mut msg = MessageBuilder::new(buf, msg_type::ROW_DESCRIPTION);
    msg.write_i16(fields.len() as i16);
    for field in fields {
        msg.write_cstr(field.name);
        msg.write_bytes(field.tail.as_bytes());
    }
    msg.finish();
}

/// Write a DataRow message. `None` values are sent as SQL NULL.
pub fn write_data_row<'v, I>(buf: &mut Vec<u8>, values: I)
where
    I: ExactSizeIterator<Item = Option<&'v [u8]>>,
{
    debug_assert!(values.len() <= i16::MAX as usize, "too many columns");
    let mut msg = MessageBuilder::new(buf, msg_type::DATA_ROW);
    msg.write_i16(values.len() as i16);
    for value in values {
        msg.write_value(value);
    }
    msg.finish();
}

/// Write a CommandComplete message.
pub fn write_command_complete(buf: &mut Vec<u8>, tag: &str) {
    let mut msg = MessageBuilder::new(buf, msg_type::COMMAND_COMPLETE);
    msg.write_cstr(tag);
    msg.finish();
}

/// Write an EmptyQueryResponse message.
pub fn write_empty_query_response(buf: &mut Vec<u8>) {
    MessageBuilder::new(buf, msg_type::EMPTY_QUERY_RESPONSE).finish();
}

/// RowDescription message - describes the columns in a result set.
#[derive(Debug)]
pub struct RowDescription<'a> {
    fields: Vec<FieldDescription<'a>>,
}

impl<'a> RowDescription<'a> {
    /// Parse a RowDescription message from payload bytes.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let mut view = ReadView::new(payload);
        let num_fields = view.read_i16()?.max(0) as usize;
        let mut fields = Vec::with_capacity(num_fields);

        for _ in 0..num_fields {
            let name = view.read_cstr()?;
            let tail = FieldDescriptionTail::read_from_bytes(view.read_bytes(TAIL_SIZE)?)
                .map_err(|e| Error::Framing(format!("FieldDescription tail: {e:?}")))?;
            fields.push(FieldDescription { name, tail });
        }
        view.finish()?;

        Ok(Self { fields })
    }

    /// Get the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Get field descriptions.
    pub fn fields(&self) -> &[FieldDescription<'a>] {
        &self.fields
    }

    /// Iterate over field descriptions.
    pub fn iter(&self) -> impl Iterator<Item = &FieldDescription<'a>> {
        self.fields.iter()
    }
}

/// DataRow message - contains a single row of data.
#[derive(Debug, Clone, Copy)]
pub struct DataRow<'a> {
    /// Number of columns
    num_columns: u16,
    /// Column data (after the column count)
    columns_data: &'a [u8],
}

impl<'a> DataRow<'a> {
    /// Parse a DataRow message from payload bytes.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let mut view = ReadView::new(payload);
        let num_columns = view.read_i16()? as u16;
        let columns_data = view.read_bytes(view.remaining())?;

        Ok(Self {
            num_columns,
            columns_data,
        })
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.num_columns as usize
    }

    /// Check if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.num_columns == 0
    }

    /// Create an iterator over column values.
    ///
    /// Each item is `Option<&[u8]>` where `None` represents NULL.
    pub fn iter(&self) -> DataRowIter<'a> {
        DataRowIter {
            remaining: self.columns_data,
        }
    }

    /// Get a column value by index.
    ///
    /// Returns `None` if the column is NULL, `Some(bytes)` otherwise.
    pub fn get(&self, index: usize) -> Option<Option<&'a [u8]>> {
        self.iter().nth(index)
    }
}

/// Iterator over column values in a DataRow.
#[derive(Debug, Clone)]
pub struct DataRowIter<'a> {
    remaining: &'a [u8],
}

impl<'a> Iterator for DataRowIter<'a> {
    type Item = Option<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        let len;
        (len, self.remaining) = self.remaining.split_at_checked(4)?;
        let len = i32::from_be_bytes([len[0], len[1], len[2], len[3]]);

        if len == -1 {
            // NULL value
            Some(None)
        } else {
            let value;
            (value, self.remaining) = self.remaining.split_at_checked(len as usize)?;
            Some(Some(value))
        }
    }
}

/// CommandComplete message - indicates successful completion of a command.
#[derive(Debug, Clone, Copy)]
pub struct CommandComplete<'a> {
    /// Command tag (e.g., "SELECT 5", "INSERT 0 1", "UPDATE 10")
    pub tag: &'a str,
}

impl<'a> CommandComplete<'a> {
    /// Parse a CommandComplete message from payload bytes.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let mut view = ReadView::new(payload);
        let tag = view.read_cstr()?;
        view.finish()?;
        Ok(Self { tag })
    }

    /// Parse the number of rows affected from the command tag.
    ///
    /// Returns `Some(count)` for commands like SELECT, INSERT, UPDATE, DELETE.
    /// Returns `None` for other commands or parse failures.
    pub fn rows_affected(&self) -> Option<u64> {
        let parts: Vec<&str> = self.tag.split_whitespace().collect();

        match parts.as_slice() {
            ["SELECT", count] => count.parse().ok(),
            ["INSERT", _oid, count] => count.parse().ok(),
            ["UPDATE", count] => count.parse().ok(),
            ["DELETE", count] => count.parse().ok(),
            ["COPY", count] => count.parse().ok(),
            ["MOVE", count] => count.parse().ok(),
            ["FETCH", count] => count.parse().ok(),
            _ => None,
        }
    }

    /// Get the command name from the tag.
    pub fn command(&self) -> Option<&str> {
        self.tag.split_whitespace().next()
    }
}
