//! HTTP reply serialization

use bytes::{BufMut, Bytes, BytesMut};
use http::StatusCode;

use super::connection::{HttpConnection, TryWriteError};
use crate::error::{Error, Result};
use crate::server::config::SERVER_NAME;

/// Builder for a response head
#[derive(Debug, Clone)]
pub struct HttpReply {
    status: StatusCode,
    headers: Vec<(String, String)>,
}

impl HttpReply {
    /// Start a reply with the given status
    pub fn builder(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    /// Append a header
    pub fn header(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.headers.push((name.into(), value.to_string()));
        self
    }

    /// Serialize the status line and headers, including the blank line
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(128);
        buf.put_slice(b"HTTP/1.0 ");
        buf.put_slice(self.status.as_str().as_bytes());
        buf.put_u8(b' ');
        buf.put_slice(
            self.status
                .canonical_reason()
                .unwrap_or("Unknown")
                .as_bytes(),
        );
        buf.put_slice(b"\r\n");
        for (name, value) in &self.headers {
            buf.put_slice(name.as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(b"\r\n");
        buf.freeze()
    }

    /// Queue the head on `connection`, waiting for room
    pub async fn write(&self, connection: &HttpConnection) -> Result<()> {
        connection.write(self.to_bytes()).await
    }

    /// Queue the head without waiting
    pub fn try_write(&self, connection: &HttpConnection) -> Result<()> {
        connection
            .try_write(self.to_bytes())
            .map_err(|_: TryWriteError| Error::ConnectionClosed)
    }

    /// Complete canned response (head and small HTML body) for `status`
    pub fn stock_reply(status: StatusCode) -> Bytes {
        let reason = status.canonical_reason().unwrap_or("Unknown");
        let body = format!(
            "<html><head><title>{reason}</title></head><body><h1>{code} {reason}</h1></body></html>",
            code = status.as_u16()
        );

        let head = Self::builder(status)
            .header("Server", SERVER_NAME)
            .header("Connection", "close")
            .header("Content-Type", "text/html")
            .header("Content-Length", body.len())
            .to_bytes();

        let mut buf = BytesMut::with_capacity(head.len() + body.len());
        buf.put_slice(&head);
        buf.put_slice(body.as_bytes());
        buf.freeze()
    }

    /// Write a canned response for `status` onto `connection`
    pub async fn write_stock(status: StatusCode, connection: &HttpConnection) -> Result<()> {
        connection.write(Self::stock_reply(status)).await
    }
}
