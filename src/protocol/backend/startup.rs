//! Startup-phase backend messages.

use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::error::{Error, Result};
use crate::protocol::codec::MessageBuilder;
use crate::protocol::types::{TransactionStatus, U32BE};
use crate::protocol::view::ReadView;

use super::msg_type;

/// AuthenticationOk request code.
pub const AUTH_OK: i32 = 0;

/// Write an AuthenticationOk message.
pub fn write_authentication_ok(buf: &mut Vec<u8>) {
    let mut msg = MessageBuilder::new(buf, msg_type::AUTHENTICATION);
    msg.write_i32(AUTH_OK);
    msg.finish();
}

/// Write a ParameterStatus message.
pub fn write_parameter_status(buf: &mut Vec<u8>, name: &str, value: &str) {
    let mut msg = MessageBuilder::new(buf, msg_type::PARAMETER_STATUS);
    msg.write_cstr(name);
    msg.write_cstr(value);
    msg.finish();
}

/// Write a BackendKeyData message.
pub fn write_backend_key_data(buf: &mut Vec<u8>, pid: u32, secret_key: u32) {
    let mut msg = MessageBuilder::new(buf, msg_type::BACKEND_KEY_DATA);
    msg.write_u32(pid);
    msg.write_u32(secret_key);
    msg.finish();
}

/// Write a ReadyForQuery message.
pub fn write_ready_for_query(buf: &mut Vec<u8>, status: TransactionStatus) {
    let mut msg = MessageBuilder::new(buf, msg_type::READY_FOR_QUERY);
    msg.write_u8(status.as_byte());
    msg.finish();
}

/// BackendKeyData message - contains process ID and secret key for cancellation.
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct BackendKeyData {
    /// Process ID of the backend
    pub pid: U32BE,
    /// Secret key for cancellation
    pub secret_key: U32BE,
}

impl BackendKeyData {
    /// Parse a BackendKeyData message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<&Self> {
        Self::ref_from_bytes(payload).map_err(|e| Error::Framing(format!("BackendKeyData: {e:?}")))
    }

    /// Get the process ID.
    pub fn process_id(&self) -> u32 {
        self.pid.get()
    }

    /// Get the secret key.
    pub fn secret(&self) -> u32 {
        self.secret_key.get()
    }
}

/// ParameterStatus message - server parameter name and value.
#[derive(Debug, Clone)]
pub struct ParameterStatus<'a> {
    /// Parameter name
    pub name: &'a str,
    /// Parameter value
    pub value: &'a str,
}

impl<'a> ParameterStatus<'a> {
    /// Parse a ParameterStatus message from payload bytes.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let mut view = ReadView::new(payload);
        let name = view.read_cstr()?;
        let value = view.read_cstr()?;
        view.finish()?;
        Ok(Self { name, value })
    }
}

/// ReadyForQuery message - indicates server is ready for a new query.
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct ReadyForQuery {
    /// Transaction status byte
    pub status: u8,
}

impl ReadyForQuery {
    /// Parse a ReadyForQuery message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<&Self> {
        Self::ref_from_bytes(payload).map_err(|e| Error::Framing(format!("ReadyForQuery: {e:?}")))
    }

    /// Get the transaction status.
    pub fn transaction_status(&self) -> Option<TransactionStatus> {
        TransactionStatus::from_byte(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::backend::RawMessage;

    #[test]
    fn startup_reply_sequence() {
        let mut buf = Vec::new();
        write_authentication_ok(&mut buf);
        write_parameter_status(&mut buf, "server_version", "16.0");
        write_backend_key_data(&mut buf, 7, 0xdead_beef);
        write_ready_for_query(&mut buf, TransactionStatus::Idle);

        let messages = RawMessage::split_all(&buf).unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].type_byte, b'R');
        assert_eq!(messages[0].payload, &[0, 0, 0, 0]);

        let status = ParameterStatus::parse(messages[1].payload).unwrap();
        assert_eq!(status.name, "server_version");
        assert_eq!(status.value, "16.0");

        let key = BackendKeyData::parse(messages[2].payload).unwrap();
        assert_eq!(key.process_id(), 7);
        assert_eq!(key.secret(), 0xdead_beef);

        let ready = ReadyForQuery::parse(messages[3].payload).unwrap();
        assert_eq!(ready.transaction_status(), Some(TransactionStatus::Idle));
    }
}
