//! Stream types
//!
//! Each supported stream type is a [`StreamerType`]: a pair of factories, one
//! producing a [`StreamingSession`](crate::session::StreamingSession) for a
//! `/stream` request and one producing the HTML fragment a viewer page embeds.
//! The [`CodecRegistry`] maps the `type` query value onto them. It is built once
//! at startup and read without locking afterwards.

pub mod container;
pub mod encoder;
pub mod jpeg;
pub mod mjpeg;
pub mod snapshot;

pub use container::ContainerStreamerType;
pub use encoder::{EncodeOptions, EncoderFactory, FrameEncoder, PassthroughEncoder};
pub use jpeg::JpegFrameEncoder;
pub use mjpeg::MjpegStreamerType;
pub use snapshot::create_snapshot_session;

use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;

use crate::bus::Bus;
use crate::http::{HttpConnection, HttpReply, HttpRequest};
use crate::server::config::SERVER_NAME;
use crate::session::SessionRef;

/// Stream type used when a request has no `type` parameter
pub const DEFAULT_CODEC: &str = "mjpeg";

/// `Cache-Control` value on every streamed or discovery response
pub const NO_CACHE: &str =
    "no-cache, no-store, must-revalidate, pre-check=0, post-check=0, max-age=0";

/// Factory pair for one stream type
pub trait StreamerType: Send + Sync + 'static {
    /// Build an unstarted session streaming the request's topic to `connection`
    fn create_session(
        &self,
        request: &HttpRequest,
        connection: HttpConnection,
        bus: Arc<dyn Bus>,
    ) -> SessionRef;

    /// HTML fragment that plays this stream type for the request's topic
    fn create_viewer(&self, request: &HttpRequest) -> String;
}

/// A registered stream type
#[derive(Clone)]
pub struct CodecDescriptor {
    pub id: String,
    pub strategy: Arc<dyn StreamerType>,
}

impl std::fmt::Debug for CodecDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecDescriptor")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Stream types by identifier. Lookup is exact and case-sensitive.
#[derive(Debug, Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, CodecDescriptor>,
}

impl CodecRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in stream types: `mjpeg`, `vp8` and `h264`
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("mjpeg", MjpegStreamerType::new());
        registry.register("vp8", ContainerStreamerType::vp8());
        registry.register("h264", ContainerStreamerType::h264());
        registry
    }

    /// Register `strategy` under `id`, replacing any previous registration
    pub fn register(&mut self, id: impl Into<String>, strategy: impl StreamerType) {
        let id = id.into();
        let descriptor = CodecDescriptor {
            id: id.clone(),
            strategy: Arc::new(strategy),
        };
        self.codecs.insert(id, descriptor);
    }

    /// Look up a stream type
    pub fn resolve(&self, id: &str) -> Option<&CodecDescriptor> {
        self.codecs.get(id)
    }

    /// Registered identifiers, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

/// `200 OK` head shared by every streamed response
pub(crate) fn stream_reply(content_type: &str) -> HttpReply {
    HttpReply::builder(StatusCode::OK)
        .header("Connection", "close")
        .header("Server", SERVER_NAME)
        .header("Cache-Control", NO_CACHE)
        .header("Pragma", "no-cache")
        .header("Access-Control-Allow-Origin", "*")
        .header("Content-Type", content_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_registered() {
        let registry = CodecRegistry::with_defaults();

        assert_eq!(registry.ids(), vec!["h264", "mjpeg", "vp8"]);
        assert_eq!(registry.resolve(DEFAULT_CODEC).unwrap().id, "mjpeg");
    }

    #[test]
    fn test_resolve_is_exact() {
        let registry = CodecRegistry::with_defaults();

        assert!(registry.resolve("MJPEG").is_none());
        assert!(registry.resolve("mjpeg ").is_none());
        assert!(registry.resolve("bogus").is_none());
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = CodecRegistry::new();
        registry.register("video", ContainerStreamerType::vp8());
        registry.register("video", ContainerStreamerType::h264());

        assert_eq!(registry.ids(), vec!["video"]);
    }
}
