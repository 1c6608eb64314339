//! Task-per-connection listener.

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::backend::Backend;
use crate::error::Result;
use crate::opts::Opts;

use super::conn::Conn;
use super::stream::Stream;

/// Async TCP server.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    opts: Opts,
}

impl Server {
    /// Listen on `opts.host:opts.port`.
    pub async fn bind<O: TryInto<Opts>>(opts: O) -> Result<Self>
    where
        crate::error::Error: From<O::Error>,
    {
        let opts = opts.try_into()?;
        let listener = TcpListener::bind(opts.bind_addr()).await?;
        Ok(Self { listener, opts })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait for the next client.
    pub async fn accept<B: Backend>(&self, backend: B) -> Result<Conn<B>> {
        let (tcp, addr) = self.listener.accept().await?;
        tcp.set_nodelay(true)?;
        tracing::info!("accepted connection from {}", addr);
        Ok(Conn::new(Stream::tcp(tcp), &self.opts, backend))
    }

    /// Accept clients forever, spawning a task per connection with a backend
    /// from `factory`.
    pub async fn serve<F, B>(&self, mut factory: F) -> Result<()>
    where
        F: FnMut() -> B,
        B: Backend + Send + 'static,
    {
        loop {
            let conn = self.accept(factory()).await?;
            tokio::spawn(async move {
                if let Err(e) = conn.run().await {
                    tracing::warn!("connection failed: {}", e);
                }
            });
        }
    }
}
