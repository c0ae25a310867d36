//! Minimal HTTP/1.0 engine
//!
//! One request per connection. A handler receives the parsed request head and
//! an [`HttpConnection`] it (or anything it hands the connection to) writes the
//! response onto, for as long as it likes.

pub mod connection;
pub mod reply;
pub mod request;

pub use connection::{HttpConnection, TryWriteError};
pub use reply::HttpReply;
pub use request::HttpRequest;

use async_trait::async_trait;

use crate::error::Result;

/// Handler invoked once per accepted request on an HTTP worker thread
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Handle `request`. Returning does not end the response: any clone of
    /// `connection` kept alive keeps the connection open.
    async fn handle(&self, request: &HttpRequest, connection: HttpConnection) -> Result<()>;
}
