//! Thread-per-connection listener.

use std::net::{SocketAddr, TcpListener};

use crate::backend::Backend;
use crate::error::Result;
use crate::opts::Opts;

use super::conn::Conn;
use super::stream::Stream;

/// Blocking TCP server.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    opts: Opts,
}

impl Server {
    /// Listen on `opts.host:opts.port`.
    pub fn bind<O: TryInto<Opts>>(opts: O) -> Result<Self>
    where
        crate::error::Error: From<O::Error>,
    {
        let opts = opts.try_into()?;
        let listener = TcpListener::bind(opts.bind_addr())?;
        Ok(Self { listener, opts })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait for the next client.
    pub fn accept<B: Backend>(&self, backend: B) -> Result<Conn<B>> {
        let (tcp, addr) = self.listener.accept()?;
        tcp.set_nodelay(true)?;
        tracing::info!("accepted connection from {}", addr);
        Ok(Conn::new(Stream::tcp(tcp), &self.opts, backend))
    }

    /// Accept clients forever, each on its own thread with a backend from
    /// `factory`.
    pub fn serve<F, B>(&self, mut factory: F) -> Result<()>
    where
        F: FnMut() -> B,
        B: Backend + Send + 'static,
    {
        loop {
            let conn = self.accept(factory())?;
            std::thread::spawn(move || {
                if let Err(e) = conn.run() {
                    tracing::warn!("connection failed: {}", e);
                }
            });
        }
    }
}
