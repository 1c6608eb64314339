//! Synchronous server driver.

mod conn;
mod server;
mod stream;

pub use conn::Conn;
pub use server::Server;
pub use stream::Stream;
