//! Subscription-driven streamer
//!
//! [`ImageStreamer`] binds a bus subscription to a connection and hands every
//! frame to a codec-specific [`FrameWriter`]. It runs on bus callback threads.
//!
//! # Backpressure
//!
//! A callback never waits on the client. Each frame is encoded into a single
//! chunk and offered to the connection queue with a non-blocking write; if the
//! queue is full the frame is dropped and counted, so a slow client loses
//! frames instead of stalling the bus. Because a frame is one chunk, a client
//! never receives half a frame.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use super::state::{PhaseCell, SessionPhase};
use super::StreamingSession;
use crate::bus::{Bus, ImageFrame, Subscription};
use crate::error::{Error, Result};
use crate::http::{HttpConnection, TryWriteError};
use crate::stats::{SessionCounters, SessionStats};

/// Outcome of offering one frame to the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued `n` bytes; keep streaming
    Sent(usize),
    /// Queue was full; the frame was discarded
    Dropped,
    /// Queued `n` bytes and the response is complete
    Complete(usize),
}

/// Codec-specific framing of encoded images onto a connection
pub trait FrameWriter: Send + 'static {
    /// Encode `frame` and queue it (plus any response head still owed).
    ///
    /// Must not block. An error ends the session.
    fn write_frame(&mut self, frame: &ImageFrame, connection: &HttpConnection) -> Result<Delivery>;
}

/// Offer one chunk to `connection` without waiting
pub fn queue_chunk(connection: &HttpConnection, chunk: Bytes) -> Result<Delivery> {
    let len = chunk.len();
    match connection.try_write(chunk) {
        Ok(()) => Ok(Delivery::Sent(len)),
        Err(TryWriteError::Full) => Ok(Delivery::Dropped),
        Err(TryWriteError::Closed) => Err(Error::ConnectionClosed),
    }
}

/// State reachable from the bus callback
struct StreamerShared<W> {
    topic: String,
    connection: HttpConnection,
    writer: Mutex<W>,
    phase: PhaseCell,
    counters: SessionCounters,
}

impl<W: FrameWriter> StreamerShared<W> {
    fn on_frame(&self, frame: ImageFrame) {
        if self.phase.is_inactive() {
            return;
        }
        if self.connection.is_closed() {
            self.deactivate("connection closed");
            return;
        }

        let result = self.writer.lock().write_frame(&frame, &self.connection);
        match result {
            Ok(Delivery::Sent(n)) => self.counters.record_sent(n),
            Ok(Delivery::Dropped) => {
                self.counters.record_dropped();
                tracing::debug!(topic = %self.topic, "Connection queue full, frame dropped");
            }
            Ok(Delivery::Complete(n)) => {
                self.counters.record_sent(n);
                self.deactivate("delivery complete");
            }
            Err(e) => {
                tracing::debug!(topic = %self.topic, error = %e, "Stream error");
                self.deactivate("stream error");
            }
        }
    }

    fn deactivate(&self, reason: &'static str) {
        if self.phase.deactivate() {
            tracing::debug!(topic = %self.topic, reason = reason, "Stream inactive");
        }
    }
}

/// Session delivering a topic's frames through a [`FrameWriter`]
pub struct ImageStreamer<W: FrameWriter> {
    shared: Arc<StreamerShared<W>>,
    bus: Arc<dyn Bus>,
    subscription: Mutex<Option<Subscription>>,
}

impl<W: FrameWriter> ImageStreamer<W> {
    /// Create a session for `topic`. Nothing is subscribed until `start`.
    pub fn new(
        topic: impl Into<String>,
        connection: HttpConnection,
        bus: Arc<dyn Bus>,
        writer: W,
    ) -> Self {
        Self {
            shared: Arc::new(StreamerShared {
                topic: topic.into(),
                connection,
                writer: Mutex::new(writer),
                phase: PhaseCell::new(),
                counters: SessionCounters::new(),
            }),
            bus,
            subscription: Mutex::new(None),
        }
    }

    /// Connection the session writes to
    pub fn connection(&self) -> &HttpConnection {
        &self.shared.connection
    }
}

impl<W: FrameWriter> StreamingSession for ImageStreamer<W> {
    fn topic(&self) -> &str {
        &self.shared.topic
    }

    fn start(&self) -> Result<()> {
        if self.subscription.lock().is_some() {
            return Ok(());
        }

        // The callback holds only the shared half, so dropping the streamer
        // drops the subscription, which in turn releases the callback.
        let shared = Arc::clone(&self.shared);
        let subscription = self
            .bus
            .subscribe(&self.shared.topic, Box::new(move |frame| shared.on_frame(frame)))
            .inspect_err(|_| {
                self.shared.deactivate("subscribe failed");
            })?;

        *self.subscription.lock() = Some(subscription);
        self.shared.phase.advance(SessionPhase::Active);
        Ok(())
    }

    fn is_inactive(&self) -> bool {
        if self.shared.phase.is_inactive() {
            return true;
        }

        let subscription_ended = self
            .subscription
            .lock()
            .as_ref()
            .is_some_and(Subscription::is_terminated);

        if subscription_ended {
            self.shared.deactivate("subscription ended");
        } else if self.shared.connection.is_closed() {
            self.shared.deactivate("connection closed");
        }
        self.shared.phase.is_inactive()
    }

    fn phase(&self) -> SessionPhase {
        if self.is_inactive() {
            SessionPhase::Inactive
        } else {
            self.shared.phase.get()
        }
    }

    fn stats(&self) -> SessionStats {
        self.shared.counters.snapshot()
    }
}
