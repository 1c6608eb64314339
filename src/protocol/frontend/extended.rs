//! Extended query protocol messages.

use crate::error::{Error, Result};
use crate::protocol::codec::MessageBuilder;
use crate::protocol::types::{FormatCode, Oid};
use crate::protocol::view::ReadView;

/// Object kind addressed by Describe and Close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Prepared statement ('S')
    Statement,
    /// Portal ('P')
    Portal,
}

impl Target {
    /// Wire byte for this target.
    pub fn as_byte(self) -> u8 {
        match self {
            Target::Statement => b'S',
            Target::Portal => b'P',
        }
    }

    fn decode(view: &mut ReadView<'_>, message: &str) -> Result<Self> {
        match view.read_u8()? {
            b'S' => Ok(Target::Statement),
            b'P' => Ok(Target::Portal),
            other => Err(Error::Protocol(format!(
                "invalid {message} message subtype {other}"
            ))),
        }
    }
}

fn read_count(view: &mut ReadView<'_>, what: &str) -> Result<usize> {
    let count = view.read_i16()?;
    usize::try_from(count)
        .map_err(|_| Error::Protocol(format!("invalid {what} count: {count}")))
}

fn read_format_codes(view: &mut ReadView<'_>) -> Result<Vec<FormatCode>> {
    let count = read_count(view, "format code")?;
    let mut codes = Vec::with_capacity(count);
    for _ in 0..count {
        let raw = view.read_i16()?;
        let code = FormatCode::from_i16(raw)
            .ok_or_else(|| Error::Protocol(format!("unsupported format code: {raw}")))?;
        codes.push(code);
    }
    Ok(codes)
}

/// Parse message - create a prepared statement.
#[derive(Debug, Clone)]
pub struct ParseMessage<'a> {
    /// Statement name (empty for the unnamed statement)
    pub name: &'a str,
    /// Query text with $1, $2, ... placeholders
    pub query: &'a str,
    /// Parameter type hints (0 = let the server infer)
    pub param_types: Vec<Oid>,
}

impl<'a> ParseMessage<'a> {
    /// Decode a Parse message.
    pub fn decode(view: &mut ReadView<'a>) -> Result<Self> {
        let name = view.read_cstr()?;
        let query = view.read_cstr()?;
        let count = read_count(view, "parameter type")?;
        let mut param_types = Vec::with_capacity(count);
        for _ in 0..count {
            param_types.push(view.read_u32()?);
        }
        view.finish()?;
        Ok(Self {
            name,
            query,
            param_types,
        })
    }
}

/// Bind message - bind parameter values to a prepared statement.
#[derive(Debug, Clone)]
pub struct BindMessage<'a> {
    /// Destination portal name (empty for the unnamed portal)
    pub portal: &'a str,
    /// Source statement name
    pub statement: &'a str,
    /// Parameter format codes as sent (0, 1 or one per parameter)
    pub param_formats: Vec<FormatCode>,
    /// Parameter values (`None` is SQL NULL)
    pub params: Vec<Option<&'a [u8]>>,
    /// Result column format codes as sent (0, 1 or one per column)
    pub result_formats: Vec<FormatCode>,
}

impl<'a> BindMessage<'a> {
    /// Decode a Bind message.
    pub fn decode(view: &mut ReadView<'a>) -> Result<Self> {
        let portal = view.read_cstr()?;
        let statement = view.read_cstr()?;
        let param_formats = read_format_codes(view)?;

        let count = read_count(view, "parameter")?;
        let mut params = Vec::with_capacity(count);
        for _ in 0..count {
            let len = view.read_i32()?;
            let value = match len {
                -1 => None,
                n if n < -1 => {
                    return Err(Error::Protocol(format!(
                        "invalid parameter length: {n}"
                    )));
                }
                n => Some(view.read_bytes(n as usize)?),
            };
            params.push(value);
        }

        let result_formats = read_format_codes(view)?;
        view.finish()?;
        Ok(Self {
            portal,
            statement,
            param_formats,
            params,
            result_formats,
        })
    }
}

/// Describe message - request metadata for a statement or portal.
#[derive(Debug, Clone, Copy)]
pub struct DescribeMessage<'a> {
    /// What to describe
    pub target: Target,
    /// Statement or portal name
    pub name: &'a str,
}

impl<'a> DescribeMessage<'a> {
    /// Decode a Describe message.
    pub fn decode(view: &mut ReadView<'a>) -> Result<Self> {
        let target = Target::decode(view, "DESCRIBE")?;
        let name = view.read_cstr()?;
        view.finish()?;
        Ok(Self { target, name })
    }
}

/// Execute message - run a portal.
#[derive(Debug, Clone, Copy)]
pub struct ExecuteMessage<'a> {
    /// Portal name
    pub portal: &'a str,
    /// Maximum number of rows to return (0 or negative = unlimited)
    pub max_rows: i32,
}

impl<'a> ExecuteMessage<'a> {
    /// Decode an Execute message.
    pub fn decode(view: &mut ReadView<'a>) -> Result<Self> {
        let portal = view.read_cstr()?;
        let max_rows = view.read_i32()?;
        view.finish()?;
        Ok(Self { portal, max_rows })
    }

    /// Row limit as an optional count (`None` = unlimited).
    pub fn row_limit(&self) -> Option<usize> {
        match usize::try_from(self.max_rows) {
            Ok(0) | Err(_) => None,
            Ok(n) => Some(n),
        }
    }
}

/// Close message - release a statement or portal.
#[derive(Debug, Clone, Copy)]
pub struct CloseMessage<'a> {
    /// What to close
    pub target: Target,
    /// Statement or portal name
    pub name: &'a str,
}

impl<'a> CloseMessage<'a> {
    /// Decode a Close message.
    pub fn decode(view: &mut ReadView<'a>) -> Result<Self> {
        let target = Target::decode(view, "CLOSE")?;
        let name = view.read_cstr()?;
        view.finish()?;
        Ok(Self { target, name })
    }
}

/// Write a Parse message to create a prepared statement.
///
/// - `name`: Statement name (empty string for unnamed statement)
/// - `query`: SQL query with $1, $2, ... placeholders
/// - `param_oids`: Parameter type OIDs (0 = let server infer)
pub fn write_parse(buf: &mut Vec<u8>, name: &str, query: &str, param_oids: &[Oid]) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::PARSE);
    msg.write_cstr(name);
    msg.write_cstr(query);
    msg.write_i16(param_oids.len() as i16);
    for &oid in param_oids {
        msg.write_u32(oid);
    }
    msg.finish();
}

/// Write a Bind message to create a portal from a prepared statement.
///
/// - `portal`: Portal name (empty string for unnamed portal)
/// - `statement`: Statement name
/// - `param_formats`: Parameter format codes
/// - `params`: Parameter values, `None` for NULL
/// - `result_formats`: Format codes for results
pub fn write_bind(
    buf: &mut Vec<u8>,
    portal: &str,
    statement: &str,
    param_formats: &[FormatCode],
    params: &[Option<&[u8]>],
    result_formats: &[FormatCode],
) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::BIND);

    msg.write_cstr(portal);
    msg.write_cstr(statement);

    msg.write_i16(param_formats.len() as i16);
    for &fmt in param_formats {
        msg.write_i16(fmt as i16);
    }

    // Parameter values (count + length-prefixed data)
    msg.write_i16(params.len() as i16);
    for &param in params {
        msg.write_value(param);
    }

    msg.write_i16(result_formats.len() as i16);
    for &fmt in result_formats {
        msg.write_i16(fmt as i16);
    }

    msg.finish();
}

/// Write an Execute message to run a portal.
///
/// - `portal`: Portal name
/// - `max_rows`: Maximum number of rows to return (0 = unlimited)
pub fn write_execute(buf: &mut Vec<u8>, portal: &str, max_rows: u32) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::EXECUTE);
    msg.write_cstr(portal);
    msg.write_i32(max_rows as i32);
    msg.finish();
}

/// Write a Describe message to get metadata.
pub fn write_describe(buf: &mut Vec<u8>, target: Target, name: &str) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::DESCRIBE);
    msg.write_u8(target.as_byte());
    msg.write_cstr(name);
    msg.finish();
}

/// Write a Describe message for a statement.
pub fn write_describe_statement(buf: &mut Vec<u8>, name: &str) {
    write_describe(buf, Target::Statement, name);
}

/// Write a Describe message for a portal.
pub fn write_describe_portal(buf: &mut Vec<u8>, name: &str) {
    write_describe(buf, Target::Portal, name);
}

/// Write a Close message to release a statement or portal.
pub fn write_close(buf: &mut Vec<u8>, target: Target, name: &str) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::CLOSE);
    msg.write_u8(target.as_byte());
    msg.write_cstr(name);
    msg.finish();
}

/// Write a Close message for a statement.
pub fn write_close_statement(buf: &mut Vec<u8>, name: &str) {
    write_close(buf, Target::Statement, name);
}

/// Write a Close message for a portal.
pub fn write_close_portal(buf: &mut Vec<u8>, name: &str) {
    write_close(buf, Target::Portal, name);
}

/// Write a Sync message.
pub fn write_sync(buf: &mut Vec<u8>) {
    let msg = MessageBuilder::new(buf, super::msg_type::SYNC);
    msg.finish();
}

/// Write a Flush message.
pub fn write_flush(buf: &mut Vec<u8>) {
    let msg = MessageBuilder::new(buf, super::msg_type::FLUSH);
    msg.finish();
}
