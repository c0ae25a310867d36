//! Frame encoding interface
//!
//! Streamers do not compress images themselves; they hand each frame to a
//! [`FrameEncoder`]. The built-in [`PassthroughEncoder`] forwards frames that
//! already arrive in the target encoding (cameras publishing JPEG, or
//! pre-encoded VP8/H.264 packets) and rejects everything else.

use std::sync::Arc;

use bytes::Bytes;

use crate::bus::ImageFrame;
use crate::error::{Error, Result};
use crate::http::HttpRequest;

/// Encoder tuning taken from the request's query string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Output width; 0 keeps the source width
    pub width: u32,
    /// Output height; 0 keeps the source height
    pub height: u32,
    /// JPEG quality, 1..=100
    pub quality: u8,
    /// Target bitrate in bits/sec (video codecs)
    pub bitrate: u32,
    pub qmin: u32,
    pub qmax: u32,
    /// Keyframe interval in frames (video codecs)
    pub gop: u32,
    /// Rotate the image 180 degrees
    pub invert: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            quality: 95,
            bitrate: 100_000,
            qmin: 10,
            qmax: 42,
            gop: 250,
            invert: false,
        }
    }
}

impl EncodeOptions {
    /// Read options from `request`, falling back to defaults per field
    pub fn from_request(request: &HttpRequest) -> Self {
        let defaults = Self::default();
        Self {
            width: request.query_param_parsed("width", defaults.width),
            height: request.query_param_parsed("height", defaults.height),
            quality: request
                .query_param_parsed("quality", defaults.quality)
                .clamp(1, 100),
            bitrate: request.query_param_parsed("bitrate", defaults.bitrate),
            qmin: request.query_param_parsed("qmin", defaults.qmin),
            qmax: request.query_param_parsed("qmax", defaults.qmax),
            gop: request.query_param_parsed("gop", defaults.gop),
            invert: request.query_param("invert").is_some(),
        }
    }
}

/// Turns images into codec payloads
pub trait FrameEncoder: Send + 'static {
    /// Encode one frame into a payload for the wire
    fn encode(&mut self, frame: &ImageFrame) -> Result<Bytes>;
}

/// Builds an encoder for one session
pub type EncoderFactory = Arc<dyn Fn(&EncodeOptions) -> Box<dyn FrameEncoder> + Send + Sync>;

/// Forwards frames already in `encoding`
#[derive(Debug, Clone)]
pub struct PassthroughEncoder {
    encoding: &'static str,
}

impl PassthroughEncoder {
    pub fn new(encoding: &'static str) -> Self {
        Self { encoding }
    }

    /// Factory producing passthrough encoders for `encoding`
    pub fn factory(encoding: &'static str) -> EncoderFactory {
        Arc::new(move |_options: &EncodeOptions| {
            Box::new(PassthroughEncoder::new(encoding)) as Box<dyn FrameEncoder>
        })
    }
}

impl FrameEncoder for PassthroughEncoder {
    fn encode(&mut self, frame: &ImageFrame) -> Result<Bytes> {
        if frame.encoding.eq_ignore_ascii_case(self.encoding) {
            Ok(frame.data.clone())
        } else {
            Err(Error::UnsupportedEncoding {
                expected: self.encoding,
                actual: frame.encoding.clone(),
            })
        }
    }
}

/// `X-Timestamp` header value: seconds with millisecond precision
pub fn format_timestamp(millis: u64) -> String {
    format!("{}.{:03}", millis / 1000, millis % 1000)
}
