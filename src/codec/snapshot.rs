//! Single-frame JPEG snapshot
//!
//! Not a registered stream type: `/snapshot` always builds this session,
//! whatever `type` says. The session answers with the first frame it can queue
//! and then goes inactive.

use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use http::StatusCode;

use super::encoder::{format_timestamp, EncodeOptions, FrameEncoder};
use super::jpeg::JpegFrameEncoder;
use super::NO_CACHE;
use crate::bus::{Bus, ImageFrame};
use crate::error::Result;
use crate::http::{HttpConnection, HttpReply, HttpRequest};
use crate::server::config::SERVER_NAME;
use crate::session::streamer::queue_chunk;
use crate::session::{Delivery, FrameWriter, ImageStreamer, SessionRef};

/// Answers with one complete `image/jpeg` response
pub struct SnapshotWriter {
    encoder: Box<dyn FrameEncoder>,
}

impl SnapshotWriter {
    pub fn new(encoder: Box<dyn FrameEncoder>) -> Self {
        Self { encoder }
    }
}

impl FrameWriter for SnapshotWriter {
    fn write_frame(&mut self, frame: &ImageFrame, connection: &HttpConnection) -> Result<Delivery> {
        let jpeg = self.encoder.encode(frame)?;

        let head = HttpReply::builder(StatusCode::OK)
            .header("Connection", "close")
            .header("Server", SERVER_NAME)
            .header("Cache-Control", NO_CACHE)
            .header("X-Timestamp", format_timestamp(frame.timestamp))
            .header("Pragma", "no-cache")
            .header("Content-Type", "image/jpeg")
            .header("Content-Length", jpeg.len())
            .to_bytes();

        let mut chunk = BytesMut::with_capacity(head.len() + jpeg.len());
        chunk.put_slice(&head);
        chunk.put_slice(&jpeg);

        // A full queue just means waiting for the next frame
        Ok(match queue_chunk(connection, chunk.freeze())? {
            Delivery::Sent(n) => Delivery::Complete(n),
            other => other,
        })
    }
}

/// Build the one-shot snapshot session for `request`'s topic
pub fn create_snapshot_session(
    request: &HttpRequest,
    connection: HttpConnection,
    bus: Arc<dyn Bus>,
) -> SessionRef {
    let topic = request.query_param_or("topic", "");
    let options = EncodeOptions::from_request(request);
    tracing::debug!(topic = topic, quality = options.quality, "Creating snapshot");

    let writer = SnapshotWriter::new(Box::new(JpegFrameEncoder::new(options)));
    Arc::new(ImageStreamer::new(topic, connection, bus, writer))
}
