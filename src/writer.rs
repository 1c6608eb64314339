//! Reply encoder bound to the outbound buffer.

use crate::backend::Row;
use crate::error::ErrorFields;
use crate::protocol::backend::{self, FieldDescription};
use crate::protocol::types::{FormatCode, Oid, TransactionStatus};
use crate::statement::ColumnInfo;

/// Append-only encoder for backend messages.
///
/// Commands borrow one for the duration of a single `exec`; the bytes stay in
/// the connection's write buffer until the interpreter marks them for flushing.
pub struct PacketWriter<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> PacketWriter<'a> {
    /// Bind a writer to an outbound buffer.
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        Self { buf }
    }

    /// Number of bytes currently buffered.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_parse_complete(&mut self) {
        backend::write_parse_complete(self.buf);
    }

    pub fn write_bind_complete(&mut self) {
        backend::write_bind_complete(self.buf);
    }

    pub fn write_close_complete(&mut self) {
        backend::write_close_complete(self.buf);
    }

    pub fn write_command_complete(&mut self, tag: &str) {
        backend::write_command_complete(self.buf, tag);
    }

    pub fn write_data_row(&mut self, row: &Row) {
        backend::write_data_row(self.buf, row.iter().map(|value| value.as_deref()));
    }

    /// Write a RowDescription with every column in text format.
    pub fn write_row_description(&mut self, columns: &[ColumnInfo]) {
        let fields: Vec<FieldDescription<'_>> = columns
            .iter()
            .map(|column| column.field(FormatCode::Text))
            .collect();
        backend::write_row_description(self.buf, &fields);
    }

    /// Write a RowDescription from prepared field descriptions.
    pub fn write_fields(&mut self, fields: &[FieldDescription<'_>]) {
        backend::write_row_description(self.buf, fields);
    }

    pub fn write_parameter_description(&mut self, param_types: &[Oid]) {
        backend::write_parameter_description(self.buf, param_types);
    }

    pub fn write_no_data(&mut self) {
        backend::write_no_data(self.buf);
    }

    pub fn write_empty_query_response(&mut self) {
        backend::write_empty_query_response(self.buf);
    }

    pub fn write_portal_suspended(&mut self) {
        backend::write_portal_suspended(self.buf);
    }

    pub fn write_ready_for_query(&mut self, status: TransactionStatus) {
        backend::write_ready_for_query(self.buf, status);
    }

    pub fn write_error_response(&mut self, fields: &ErrorFields) {
        backend::write_error_response(self.buf, fields);
    }

    // === Startup replies ===

    pub fn write_authentication_ok(&mut self) {
        backend::write_authentication_ok(self.buf);
    }

    pub fn write_parameter_status(&mut self, name: &str, value: &str) {
        backend::write_parameter_status(self.buf, name, value);
    }

    pub fn write_backend_key_data(&mut self, pid: u32, secret_key: u32) {
        backend::write_backend_key_data(self.buf, pid, secret_key);
    }

    /// Write a single raw byte (the SSLRequest / GSSENCRequest answer).
    pub fn write_raw_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }
}
