//! Per-connection I/O buffers.

/// Inbound and outbound buffers of one connection.
#[derive(Debug)]
pub struct BufferSet {
    /// Bytes received from the client that have not been framed yet
    pub read_buffer: Vec<u8>,
    /// Reply bytes waiting to be written to the client
    pub write_buffer: Vec<u8>,
}

impl BufferSet {
    /// Create a new buffer set.
    pub fn new() -> Self {
        Self {
            read_buffer: Vec::with_capacity(8192),
            write_buffer: Vec::with_capacity(8192),
        }
    }
}

impl Default for BufferSet {
    fn default() -> Self {
        Self::new()
    }
}
