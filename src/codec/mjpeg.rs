//! Motion-JPEG over `multipart/x-mixed-replace`
//!
//! Browsers render this natively in an `<img>` tag: each part replaces the
//! previous image.

use std::sync::Arc;

use bytes::{BufMut, BytesMut};

use super::encoder::{format_timestamp, EncodeOptions, EncoderFactory, FrameEncoder};
use super::jpeg::JpegFrameEncoder;
use super::{stream_reply, StreamerType};
use crate::bus::{Bus, ImageFrame};
use crate::error::Result;
use crate::http::{HttpConnection, HttpRequest};
use crate::router::html::escape;
use crate::session::streamer::queue_chunk;
use crate::session::{Delivery, FrameWriter, ImageStreamer, SessionRef};

/// Multipart boundary between JPEG parts
pub const BOUNDARY: &str = "boundarydonotcross";

/// Frames a JPEG stream as multipart parts
pub struct MjpegWriter {
    encoder: Box<dyn FrameEncoder>,
    head_sent: bool,
}

impl MjpegWriter {
    pub fn new(encoder: Box<dyn FrameEncoder>) -> Self {
        Self {
            encoder,
            head_sent: false,
        }
    }
}

impl FrameWriter for MjpegWriter {
    fn write_frame(&mut self, frame: &ImageFrame, connection: &HttpConnection) -> Result<Delivery> {
        let jpeg = self.encoder.encode(frame)?;

        let part_head = format!(
            "--{BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\nX-Timestamp: {}\r\n\r\n",
            jpeg.len(),
            format_timestamp(frame.timestamp)
        );

        let mut chunk = BytesMut::with_capacity(256 + part_head.len() + jpeg.len() + 2);
        if !self.head_sent {
            let head = stream_reply(&format!("multipart/x-mixed-replace;boundary={BOUNDARY}"));
            chunk.put_slice(&head.to_bytes());
        }
        chunk.put_slice(part_head.as_bytes());
        chunk.put_slice(&jpeg);
        chunk.put_slice(b"\r\n");

        let delivery = queue_chunk(connection, chunk.freeze())?;
        if matches!(delivery, Delivery::Sent(_)) {
            self.head_sent = true;
        }
        Ok(delivery)
    }
}

/// The `mjpeg` stream type
#[derive(Clone)]
pub struct MjpegStreamerType {
    encoder: EncoderFactory,
}

impl MjpegStreamerType {
    /// Stream type compressing raw frames (and forwarding JPEG ones)
    pub fn new() -> Self {
        Self::with_encoder(JpegFrameEncoder::factory())
    }

    /// Stream type using a custom JPEG encoder
    pub fn with_encoder(encoder: EncoderFactory) -> Self {
        Self { encoder }
    }
}

impl Default for MjpegStreamerType {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamerType for MjpegStreamerType {
    fn create_session(
        &self,
        request: &HttpRequest,
        connection: HttpConnection,
        bus: Arc<dyn Bus>,
    ) -> SessionRef {
        let topic = request.query_param_or("topic", "");
        let options = EncodeOptions::from_request(request);
        tracing::debug!(topic = topic, options = ?options, "Creating MJPEG stream");

        let writer = MjpegWriter::new((self.encoder)(&options));
        Arc::new(ImageStreamer::new(topic, connection, bus, writer))
    }

    fn create_viewer(&self, request: &HttpRequest) -> String {
        format!("<img src=\"/stream?{}\"></img>", escape(&request.query))
    }
}
