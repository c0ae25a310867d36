//! Container video streams (VP8/WebM, H.264/MP4)
//!
//! The response head goes out with the first encoded packet; after that the
//! body is the raw container byte stream until the connection closes.
//!
//! Unlike MJPEG parts, container packets cannot be skipped without corrupting
//! the stream. A packet that does not fit the connection queue once the head
//! is out ends the session with [`Error::StreamOverrun`].

use std::sync::Arc;

use bytes::{BufMut, BytesMut};

use super::encoder::{EncodeOptions, EncoderFactory, FrameEncoder, PassthroughEncoder};
use super::{stream_reply, StreamerType};
use crate::bus::{Bus, ImageFrame};
use crate::error::{Error, Result};
use crate::http::{HttpConnection, HttpRequest};
use crate::router::html::escape;
use crate::session::streamer::queue_chunk;
use crate::session::{Delivery, FrameWriter, ImageStreamer, SessionRef};

/// Writes encoder output as a continuous container body
pub struct ContainerWriter {
    content_type: &'static str,
    encoder: Box<dyn FrameEncoder>,
    head_sent: bool,
}

impl ContainerWriter {
    pub fn new(content_type: &'static str, encoder: Box<dyn FrameEncoder>) -> Self {
        Self {
            content_type,
            encoder,
            head_sent: false,
        }
    }
}

impl FrameWriter for ContainerWriter {
    fn write_frame(&mut self, frame: &ImageFrame, connection: &HttpConnection) -> Result<Delivery> {
        let packet = self.encoder.encode(frame)?;
        if packet.is_empty() {
            // Encoder is buffering
            return Ok(Delivery::Sent(0));
        }

        let chunk = if self.head_sent {
            packet
        } else {
            let head = stream_reply(self.content_type)
                .header("Expires", 0)
                .to_bytes();
            let mut buf = BytesMut::with_capacity(head.len() + packet.len());
            buf.put_slice(&head);
            buf.put_slice(&packet);
            buf.freeze()
        };

        match queue_chunk(connection, chunk)? {
            Delivery::Dropped if self.head_sent => Err(Error::StreamOverrun),
            delivery => {
                if matches!(delivery, Delivery::Sent(_)) {
                    self.head_sent = true;
                }
                Ok(delivery)
            }
        }
    }
}

/// A container stream type (`vp8` or `h264`)
#[derive(Clone)]
pub struct ContainerStreamerType {
    content_type: &'static str,
    encoder: EncoderFactory,
}

impl ContainerStreamerType {
    /// Stream type with a custom encoder
    pub fn new(content_type: &'static str, encoder: EncoderFactory) -> Self {
        Self {
            content_type,
            encoder,
        }
    }

    /// VP8 in WebM, forwarding pre-encoded `vp8` frames
    pub fn vp8() -> Self {
        Self::new("video/webm", PassthroughEncoder::factory("vp8"))
    }

    /// H.264 in MP4, forwarding pre-encoded `h264` frames
    pub fn h264() -> Self {
        Self::new("video/mp4", PassthroughEncoder::factory("h264"))
    }

    /// Content type of the streamed body
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }
}

impl StreamerType for ContainerStreamerType {
    fn create_session(
        &self,
        request: &HttpRequest,
        connection: HttpConnection,
        bus: Arc<dyn Bus>,
    ) -> SessionRef {
        let topic = request.query_param_or("topic", "");
        let options = EncodeOptions::from_request(request);
        tracing::debug!(
            topic = topic,
            content_type = self.content_type,
            options = ?options,
            "Creating container stream"
        );

        let writer = ContainerWriter::new(self.content_type, (self.encoder)(&options));
        Arc::new(ImageStreamer::new(topic, connection, bus, writer))
    }

    fn create_viewer(&self, request: &HttpRequest) -> String {
        format!(
            "<video src=\"/stream?{}\" autoplay=\"true\" preload=\"none\"></video>",
            escape(&request.query)
        )
    }
}
