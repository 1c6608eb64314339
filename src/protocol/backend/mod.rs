//! PostgreSQL backend (server → client) messages.
//!
//! The server writes these with the `write_*` functions. The parsers exist so
//! that tests and tools can read back what the server produced.

pub mod error;
pub mod extended;
pub mod query;
pub mod startup;

pub use error::{ErrorResponse, write_error_response};
pub use extended::{
    ParameterDescription, write_bind_complete, write_close_complete, write_no_data,
    write_parameter_description, write_parse_complete, write_portal_suspended,
};
pub use query::{
    CommandComplete, DataRow, FieldDescription, FieldDescriptionTail, RowDescription,
    write_command_complete, write_data_row, write_empty_query_response, write_row_description,
};
pub use startup::{
    BackendKeyData, ParameterStatus, ReadyForQuery, write_authentication_ok,
    write_backend_key_data, write_parameter_status, write_ready_for_query,
};

use crate::error::{Error, Result};

/// Backend message type bytes.
pub mod msg_type {
    /// Authentication message
    pub const AUTHENTICATION: u8 = b'R';
    /// BackendKeyData
    pub const BACKEND_KEY_DATA: u8 = b'K';
    /// ParameterStatus
    pub const PARAMETER_STATUS: u8 = b'S';
    /// ReadyForQuery
    pub const READY_FOR_QUERY: u8 = b'Z';
    /// RowDescription
    pub const ROW_DESCRIPTION: u8 = b'T';
    /// DataRow
    pub const DATA_ROW: u8 = b'D';
    /// CommandComplete
    pub const COMMAND_COMPLETE: u8 = b'C';
    /// EmptyQueryResponse
    pub const EMPTY_QUERY_RESPONSE: u8 = b'I';
    /// ErrorResponse
    pub const ERROR_RESPONSE: u8 = b'E';
    /// ParseComplete
    pub const PARSE_COMPLETE: u8 = b'1';
    /// BindComplete
    pub const BIND_COMPLETE: u8 = b'2';
    /// CloseComplete
    pub const CLOSE_COMPLETE: u8 = b'3';
    /// ParameterDescription
    pub const PARAMETER_DESCRIPTION: u8 = b't';
    /// NoData
    pub const NO_DATA: u8 = b'n';
    /// PortalSuspended
    pub const PORTAL_SUSPENDED: u8 = b's';
}

/// Raw message written by the server.
///
/// This is a thin wrapper around the message type byte and payload.
#[derive(Debug, Clone, Copy)]
pub struct RawMessage<'a> {
    /// Message type byte
    pub type_byte: u8,
    /// Message payload (after length field)
    pub payload: &'a [u8],
}

impl<'a> RawMessage<'a> {
    /// Create a new RawMessage.
    pub fn new(type_byte: u8, payload: &'a [u8]) -> Self {
        Self { type_byte, payload }
    }

    /// Read one message from the front of `buf`.
    ///
    /// Returns the message and the number of bytes it occupies, or `None`
    /// if `buf` does not hold a complete message.
    pub fn read(buf: &'a [u8]) -> Result<Option<(Self, usize)>> {
        if buf.len() < 5 {
            return Ok(None);
        }
        let length = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
        if length < 4 {
            return Err(Error::Framing(format!("invalid message length: {length}")));
        }
        let total = 1 + length;
        if buf.len() < total {
            return Ok(None);
        }
        Ok(Some((Self::new(buf[0], &buf[5..total]), total)))
    }

    /// Split a buffer holding whole messages into individual messages.
    pub fn split_all(mut buf: &'a [u8]) -> Result<Vec<Self>> {
        let mut messages = Vec::new();
        while !buf.is_empty() {
            let Some((msg, used)) = Self::read(buf)? else {
                return Err(Error::Framing(format!(
                    "{} bytes of incomplete message",
                    buf.len()
                )));
            };
            messages.push(msg);
            buf = &buf[used..];
        }
        Ok(messages)
    }

    /// Check if this is an error response.
    pub fn is_error(&self) -> bool {
        self.type_byte == msg_type::ERROR_RESPONSE
    }

    /// Check if this is a ReadyForQuery.
    pub fn is_ready_for_query(&self) -> bool {
        self.type_byte == msg_type::READY_FOR_QUERY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_written_messages() {
        let mut buf = Vec::new();
        write_parse_complete(&mut buf);
        write_command_complete(&mut buf, "SELECT 1");
        write_ready_for_query(&mut buf, crate::TransactionStatus::Idle);

        let messages = RawMessage::split_all(&buf).unwrap();
        let types: Vec<u8> = messages.iter().map(|m| m.type_byte).collect();
        assert_eq!(types, b"1CZ");
        assert!(messages[2].is_ready_for_query());
        assert!(!messages[0].is_error());
    }

    #[test]
    fn split_rejects_truncated_tail() {
        let mut buf = Vec::new();
        write_command_complete(&mut buf, "SELECT 1");
        buf.pop();
        assert!(RawMessage::split_all(&buf).is_err());
    }
}
