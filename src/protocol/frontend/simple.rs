//! Simple query protocol messages.

use crate::error::Result;
use crate::protocol::codec::MessageBuilder;
use crate::protocol::view::ReadView;

/// Query message - one or more SQL statements separated by semicolons.
#[derive(Debug, Clone, Copy)]
pub struct QueryMessage<'a> {
    /// Query text
    pub query: &'a str,
}

impl<'a> QueryMessage<'a> {
    /// Decode a Query message.
    pub fn decode(view: &mut ReadView<'a>) -> Result<Self> {
        let query = view.read_cstr()?;
        view.finish()?;
        Ok(Self { query })
    }
}

/// Write a Query message.
///
/// The query string may contain multiple SQL statements separated by semicolons.
pub fn write_query(buf: &mut Vec<u8>, query: &str) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::QUERY);
    msg.write_cstr(query);
    msg.finish();
}
