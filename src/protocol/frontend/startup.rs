//! Startup and termination messages.
//!
//! Startup-phase packets carry no type byte: a 4-byte length (which counts
//! itself) is followed directly by a 4-byte request code.

use crate::error::{Error, Result};
use crate::protocol::codec::MessageBuilder;
use crate::protocol::view::ReadView;

/// Protocol version 3.0 (0x00030000)
pub const PROTOCOL_VERSION_3_0: i32 = 196608;

/// Protocol version 3.2 (0x00030002)
pub const PROTOCOL_VERSION_3_2: i32 = 196610;

/// SSL request code
pub const SSL_REQUEST_CODE: i32 = 80877103;

/// GSSAPI encryption request code
pub const GSSENC_REQUEST_CODE: i32 = 80877104;

/// Cancel request code
pub const CANCEL_REQUEST_CODE: i32 = 80877102;

/// Largest startup packet accepted from a client.
pub const MAX_STARTUP_PACKET_LENGTH: usize = 10_000;

/// A decoded startup-phase packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupRequest<'a> {
    /// StartupMessage with its (name, value) parameters
    Startup {
        /// Requested protocol version
        version: i32,
        /// Connection parameters (user, database, application_name, ...)
        params: Vec<(&'a str, &'a str)>,
    },
    /// SSLRequest
    Ssl,
    /// GSSENCRequest
    GssEnc,
    /// CancelRequest for another session
    Cancel {
        /// Backend process ID
        pid: u32,
        /// Cancel secret key
        secret_key: u32,
    },
}

impl<'a> StartupRequest<'a> {
    /// Decode a startup packet payload (length prefix already stripped).
    pub fn decode(payload: &'a [u8]) -> Result<Self> {
        let mut view = ReadView::new(payload);
        let code = view.read_i32()?;
        let request = match code {
            SSL_REQUEST_CODE => StartupRequest::Ssl,
            GSSENC_REQUEST_CODE => StartupRequest::GssEnc,
            CANCEL_REQUEST_CODE => StartupRequest::Cancel {
                pid: view.read_u32()?,
                secret_key: view.read_u32()?,
            },
            version if version >> 16 == 3 => {
                let mut params = Vec::new();
                loop {
                    let name = view.read_cstr()?;
                    if name.is_empty() {
                        break;
                    }
                    let value = view.read_cstr()?;
                    params.push((name, value));
                }
                StartupRequest::Startup { version, params }
            }
            other => {
                return Err(Error::Protocol(format!(
                    "unsupported frontend protocol {}.{}",
                    other >> 16,
                    other & 0xffff
                )));
            }
        };
        view.finish()?;
        Ok(request)
    }

    /// Look up a StartupMessage parameter by name.
    pub fn param(&self, name: &str) -> Option<&'a str> {
        match self {
            StartupRequest::Startup { params, .. } => params
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| *value),
            _ => None,
        }
    }
}

/// Frame one startup packet from the front of `buf`.
///
/// Returns the payload (after the length field) and the total number of
/// bytes consumed, or `None` if more bytes are needed.
pub fn split_startup_frame(buf: &[u8]) -> Result<Option<(&[u8], usize)>> {
    if buf.len() < 4 {
        return Ok(None);
    }
    let length = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if !(8..=MAX_STARTUP_PACKET_LENGTH).contains(&length) {
        return Err(Error::Framing(format!("invalid startup packet length: {length}")));
    }
    if buf.len() < length {
        return Ok(None);
    }
    Ok(Some((&buf[4..length], length)))
}

/// Write an SSLRequest message.
///
/// This is sent before StartupMessage to request TLS encryption.
/// Server responds with single byte: 'S' (accepted) or 'N' (rejected).
pub fn write_ssl_request(buf: &mut Vec<u8>) {
    let mut msg = MessageBuilder::new_startup(buf);
    msg.write_i32(SSL_REQUEST_CODE);
    msg.finish();
}

/// Write a GSSENCRequest message.
///
/// This is sent before StartupMessage to request GSSAPI encryption.
/// Server responds with single byte: 'G' (accepted) or 'N' (rejected).
pub fn write_gssenc_request(buf: &mut Vec<u8>) {
    let mut msg = MessageBuilder::new_startup(buf);
    msg.write_i32(GSSENC_REQUEST_CODE);
    msg.finish();
}

/// Write a StartupMessage.
///
/// Parameters is a list of (name, value) pairs.
/// Required: "user" - database username
/// Optional: "database", "options", "replication", "client_encoding", etc.
pub fn write_startup(buf: &mut Vec<u8>, params: &[(&str, &str)]) {
    write_startup_with_version(buf, PROTOCOL_VERSION_3_0, params);
}

/// Write a StartupMessage with a specific protocol version.
pub fn write_startup_with_version(buf: &mut Vec<u8>, version: i32, params: &[(&str, &str)]) {
    let mut msg = MessageBuilder::new_startup(buf);
    msg.write_i32(version);

    for (name, value) in params {
        msg.write_cstr(name);
        msg.write_cstr(value);
    }

    // Terminator
    msg.write_u8(0);
    msg.finish();
}

/// Write a CancelRequest message.
///
/// This is sent on a NEW connection to cancel a query running on another connection.
/// The server closes the connection immediately with no response.
pub fn write_cancel_request(buf: &mut Vec<u8>, pid: u32, secret_key: u32) {
    let mut msg = MessageBuilder::new_startup(buf);
    msg.write_i32(CANCEL_REQUEST_CODE);
    msg.write_i32(pid as i32);
    msg.write_i32(secret_key as i32);
    msg.finish();
}

/// Write a Terminate message.
///
/// Sent to cleanly close the connection.
pub fn write_terminate(buf: &mut Vec<u8>) {
    let msg = MessageBuilder::new(buf, super::msg_type::TERMINATE);
    msg.finish();
}
