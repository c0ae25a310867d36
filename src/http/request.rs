//! HTTP request parsing
//!
//! Only the request head is read: method, URI and headers. Bodies are never
//! consumed since every route is a `GET`.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::HttpError;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// A parsed HTTP request head
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    /// Request target as sent, path plus query
    pub uri: String,
    /// Path component of the URI
    pub path: String,
    /// Raw query string without the leading `?`
    pub query: String,
    /// Decoded query parameters in request order
    pub query_params: Vec<(String, String)>,
    pub http_version: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    /// Parse a request head. `data` may include the trailing blank line.
    pub fn parse(data: &[u8]) -> Result<Self, HttpError> {
        let text = std::str::from_utf8(data).map_err(|_| HttpError::InvalidEncoding)?;
        let mut lines = text.split("\r\n");

        let request_line = lines.next().unwrap_or_default();
        let mut fields = request_line.split_ascii_whitespace();
        let (method, uri, http_version) = match (fields.next(), fields.next(), fields.next()) {
            (Some(method), Some(uri), Some(version)) if fields.next().is_none() => {
                (method, uri, version)
            }
            _ => return Err(HttpError::MalformedRequestLine(request_line.to_string())),
        };

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.push((name.trim().to_string(), value.trim().to_string()));
            }
        }

        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, query),
            None => (uri, ""),
        };
        let query_params = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();

        Ok(Self {
            method: method.to_string(),
            uri: uri.to_string(),
            path: path.to_string(),
            query: query.to_string(),
            query_params,
            http_version: http_version.to_string(),
            headers,
        })
    }

    /// First value of a query parameter
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Query parameter value, or `default` when absent
    pub fn query_param_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.query_param(name).unwrap_or(default)
    }

    /// Query parameter parsed into `T`, or `default` when absent or unparsable
    pub fn query_param_parsed<T: std::str::FromStr>(&self, name: &str, default: T) -> T {
        self.query_param(name)
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }

    /// Header value, case-insensitive on the name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Read a request head from `reader`, up to `max_size` bytes.
///
/// Bytes after the blank line are left unread.
pub async fn read_request<R>(reader: &mut R, max_size: usize) -> crate::error::Result<HttpRequest>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(1024);
    let mut scanned: usize = 0;

    loop {
        if buf.len() > max_size {
            return Err(HttpError::HeaderTooLarge(max_size).into());
        }

        let n = reader.read_buf(&mut buf).await?;
        if n == 0 {
            return Err(HttpError::Incomplete.into());
        }

        // Resume the search a few bytes back so a terminator split across reads is found
        let from = scanned.saturating_sub(HEADER_TERMINATOR.len() - 1);
        if let Some(pos) = buf[from..]
            .windows(HEADER_TERMINATOR.len())
            .position(|window| window == HEADER_TERMINATOR)
        {
            let end = from + pos;
            if end > max_size {
                return Err(HttpError::HeaderTooLarge(max_size).into());
            }
            return Ok(HttpRequest::parse(&buf[..end])?);
        }
        scanned = buf.len();
    }
}
