//! Asynchronous server driver using Tokio.

mod conn;
mod server;
mod stream;

pub use conn::Conn;
pub use server::Server;
pub use stream::Stream;
