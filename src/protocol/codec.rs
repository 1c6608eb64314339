//! Message framing for outgoing packets.
//!
//! Integers are big-endian. Decoding goes through
//! [`ReadView`](super::view::ReadView).

/// Appends one length-prefixed message to a buffer.
///
/// The type byte is not counted in the length; the length counts itself.
/// The length is patched in by [`finish`](Self::finish).
pub struct MessageBuilder<'a> {
    buf: &'a mut Vec<u8>,
    start: usize,
}

impl<'a> MessageBuilder<'a> {
    pub fn new(buf: &'a mut Vec<u8>, type_byte: u8) -> Self {
        buf.push(type_byte);
        Self::new_startup(buf)
    }

    /// Startup-phase packets carry no type byte.
    pub fn new_startup(buf: &'a mut Vec<u8>) -> Self {
        let start = buf.len();
        buf.extend_from_slice(&[0; 4]);
        Self { buf, start }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn write_cstr(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }

    /// Length-prefixed value; NULL is a length of -1 with no bytes.
    pub fn write_value(&mut self, value: Option<&[u8]>) {
        match value {
            Some(bytes) => {
                self.write_i32(bytes.len() as i32);
                self.write_bytes(bytes);
            }
            None => self.write_i32(-1),
        }
    }

    pub fn finish(self) {
        let len = (self.buf.len() - self.start) as i32;
        self.buf[self.start..self.start + 4].copy_from_slice(&len.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_length() {
        let mut buf = Vec::new();
        let mut msg = MessageBuilder::new(&mut buf, b'C');
        msg.write_cstr("SELECT 1");
        msg.finish();

        assert_eq!(buf[0], b'C');
        assert_eq!(&buf[1..5], &13_i32.to_be_bytes());
        assert_eq!(&buf[5..], b"SELECT 1\0");
    }

    #[test]
    fn builder_appends_after_existing_bytes() {
        let mut buf = vec![b'1', 0, 0, 0, 4];
        let msg = MessageBuilder::new(&mut buf, b'2');
        msg.finish();

        assert_eq!(buf, [b'1', 0, 0, 0, 4, b'2', 0, 0, 0, 4]);
    }

    #[test]
    fn null_value_has_no_body() {
        let mut buf = Vec::new();
        let mut msg = MessageBuilder::new(&mut buf, b'D');
        msg.write_value(None);
        msg.write_value(Some(b"ab"));
        msg.finish();

        assert_eq!(&buf[5..9], &(-1_i32).to_be_bytes());
        assert_eq!(&buf[9..], &[0, 0, 0, 2, b'a', b'b']);
    }

    #[test]
    fn startup_builder_counts_length_prefix() {
        let mut buf = Vec::new();
        let mut msg = MessageBuilder::new_startup(&mut buf);
        msg.write_i32(80877103);
        msg.finish();

        assert_eq!(&buf[..4], &8_i32.to_be_bytes());
    }
}
