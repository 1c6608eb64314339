//! Server options.

use std::sync::Arc;

use url::Url;

use crate::buffer_pool::{BufferPool, GLOBAL_BUFFER_POOL};
use crate::error::Error;

/// When buffered replies are released to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushPolicy {
    /// Flush after every command.
    #[default]
    EveryCommand,
    /// Flush only at Sync, simple queries, Flush, Terminate and fatal errors.
    Batched,
}

/// Options for a server and the connections it accepts.
#[derive(Debug, Clone)]
pub struct Opts {
    /// Address to listen on.
    ///
    /// Default: `"127.0.0.1"`
    pub host: String,

    /// Port to listen on (`0` picks a free port).
    ///
    /// Default: `5432`
    pub port: u16,

    /// Reply flushing policy.
    ///
    /// Default: `FlushPolicy::EveryCommand`
    pub flush_policy: FlushPolicy,

    /// Largest accepted message, counting the length field.
    ///
    /// Default: `1 GiB - 1`
    pub max_message_size: usize,

    /// ParameterStatus values reported after startup.
    ///
    /// Default: `server_version`, `server_encoding`, `client_encoding`,
    /// `DateStyle`, `integer_datetimes`, `standard_conforming_strings`
    pub server_params: Vec<(String, String)>,

    /// Pool the connection buffers are taken from.
    ///
    /// Default: the global pool
    pub buffer_pool: Arc<BufferPool>,
}

/// Default ParameterStatus values.
pub const DEFAULT_SERVER_PARAMS: &[(&str, &str)] = &[
    ("server_version", "16.0"),
    ("server_encoding", "UTF8"),
    ("client_encoding", "UTF8"),
    ("DateStyle", "ISO, MDY"),
    ("integer_datetimes", "on"),
    ("standard_conforming_strings", "on"),
];

impl Default for Opts {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5432,
            flush_policy: FlushPolicy::EveryCommand,
            max_message_size: (1 << 30) - 1,
            server_params: DEFAULT_SERVER_PARAMS
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            buffer_pool: Arc::clone(&GLOBAL_BUFFER_POOL),
        }
    }
}

impl Opts {
    /// Set a ParameterStatus value, replacing an existing one of the same name.
    pub fn set_server_param(&mut self, name: &str, value: &str) {
        match self.server_params.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self
                .server_params
                .push((name.to_string(), value.to_string())),
        }
    }

    /// `host:port` for binding a listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl TryFrom<&Url> for Opts {
    type Error = Error;

    /// Parse a listen URL.
    ///
    /// Format: `postgres://host[:port][?param1=value1&param2=value2&..]`
    ///
    /// Supported query parameters:
    /// - `flush`: every, batched
    /// - `max_message_size`: largest accepted message in bytes (at least 5)
    ///
    /// Any other parameter becomes a ParameterStatus value.
    fn try_from(url: &Url) -> Result<Self, Self::Error> {
        if !["postgres", "pg"].contains(&url.scheme()) {
            return Err(Error::InvalidUsage(format!(
                "Invalid scheme: expected 'postgres://' or 'pg://', got '{}://'",
                url.scheme()
            )));
        }

        let mut opts = Opts {
            host: url.host_str().unwrap_or("127.0.0.1").to_string(),
            port: url.port().unwrap_or(5432),
            ..Opts::default()
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "flush" => {
                    opts.flush_policy = match value.as_ref() {
                        "every" => FlushPolicy::EveryCommand,
                        "batched" => FlushPolicy::Batched,
                        _ => {
                            return Err(Error::InvalidUsage(format!(
                                "Invalid flush: expected one of ['every', 'batched'], got {}",
                                value
                            )));
                        }
                    };
                }
                "max_message_size" => {
                    opts.max_message_size = value
                        .parse()
                        .ok()
                        .filter(|&size: &usize| size >= 5)
                        .ok_or_else(|| {
                            Error::InvalidUsage(format!("Invalid max_message_size: {}", value))
                        })?;
                }
                _ => opts.set_server_param(&key, &value),
            }
        }

        Ok(opts)
    }
}

impl TryFrom<&str> for Opts {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let url = Url::parse(s).map_err(|e| Error::InvalidUsage(format!("Invalid URL: {}", e)))?;
        Self::try_from(&url)
    }
}
