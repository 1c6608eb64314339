//! Extended query protocol backend messages.

use crate::error::Result;
use crate::protocol::codec::MessageBuilder;
use crate::protocol::types::Oid;
use crate::protocol::view::ReadView;

use super::msg_type;

/// Write a ParseComplete message.
pub fn write_parse_complete(buf: &mut Vec<u8>) {
    MessageBuilder::new(buf, msg_type::PARSE_COMPLETE).finish();
}

/// Write a BindComplete message.
pub fn write_bind_complete(buf: &mut Vec<u8>) {
    MessageBuilder::new(buf, msg_type::BIND_COMPLETE).finish();
}

/// Write a CloseComplete message.
pub fn write_close_complete(buf: &mut Vec<u8>) {
    MessageBuilder::new(buf, msg_type::CLOSE_COMPLETE).finish();
}

/// Write a NoData message.
pub fn write_no_data(buf: &mut Vec<u8>) {
    MessageBuilder::new(buf, msg_type::NO_DATA).finish();
}

/// Write a PortalSuspended message.
pub fn write_portal_suspended(buf: &mut Vec<u8>) {
    MessageBuilder::new(buf, msg_type::PORTAL_SUSPENDED).finish();
}

/// Write a ParameterDescription message.
pub fn write_parameter_description(buf: &mut Vec<u8>, param_oids: &[Oid]) {
    debug_assert!(param_oids.len() <= i16::MAX as usize, "too many parameters");
    let mut msg = MessageBuilder::new(buf, msg_type::PARAMETER_DESCRIPTION);
    msg.write_i16(param_oids.len() as i16);
    for &oid in param_oids {
        msg.write_u32(oid);
    }
    msg.finish();
}

/// ParameterDescription message - describes parameters for a prepared statement.
#[derive(Debug, Clone)]
pub struct ParameterDescription {
    /// Parameter type OIDs
    param_oids: Vec<Oid>,
}

impl ParameterDescription {
    /// Parse a ParameterDescription message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut view = ReadView::new(payload);
        let num_params = view.read_i16()?.max(0) as usize;
        let mut param_oids = Vec::with_capacity(num_params);
        for _ in 0..num_params {
            param_oids.push(view.read_u32()?);
        }
        view.finish()?;

        Ok(Self { param_oids })
    }

    /// Get the number of parameters.
    pub fn len(&self) -> usize {
        self.param_oids.len()
    }

    /// Check if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.param_oids.is_empty()
    }

    /// Get parameter type OIDs.
    pub fn oids(&self) -> &[Oid] {
        &self.param_oids
    }
}
