//! Error types
//!
//! A single crate-level error enum. Request handlers return [`Result`] and the
//! dispatch boundary logs failures; sessions never surface errors to callers,
//! they go inactive instead.

use std::io;

/// Crate result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the HTTP engine, the bus and the streamers
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket level failure
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed or oversized HTTP request
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// The peer went away or the connection was shut down
    #[error("Connection closed")]
    ConnectionClosed,

    /// A frame arrived in an encoding the streamer cannot deliver
    #[error("Unsupported encoding: expected {expected}, got {actual}")]
    UnsupportedEncoding {
        expected: &'static str,
        actual: String,
    },

    /// Raw frame could not be turned into an image
    #[error("Encode error: {0}")]
    Encode(String),

    /// Image codec failure
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Client fell behind a stream that cannot skip data
    #[error("Stream overrun: client fell behind")]
    StreamOverrun,

    /// Bus failure (subscribe/list on a shut down bus)
    #[error("Bus error: {0}")]
    Bus(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),
}

/// Request parsing failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpError {
    /// Request line missing or not `METHOD URI VERSION`
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),

    /// Header block is larger than the configured limit
    #[error("request header exceeds {0} bytes")]
    HeaderTooLarge(usize),

    /// Peer closed the connection before the header terminator
    #[error("connection closed before request was complete")]
    Incomplete,

    /// Header bytes are not valid UTF-8
    #[error("request is not valid UTF-8")]
    InvalidEncoding,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::UnsupportedEncoding {
            expected: "jpeg",
            actual: "rgb8".into(),
        };
        assert_eq!(
            err.to_string(),
            "Unsupported encoding: expected jpeg, got rgb8"
        );

        let err: Error = HttpError::HeaderTooLarge(8192).into();
        assert_eq!(
            err.to_string(),
            "HTTP error: request header exceeds 8192 bytes"
        );
    }

    #[test]
    fn test_from_io() {
        let err: Error = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(matches!(err, Error::Io(_)));
    }
}
