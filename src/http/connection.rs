//! Outgoing side of an accepted HTTP connection
//!
//! An [`HttpConnection`] is a cheap, cloneable handle onto a bounded queue of
//! byte chunks. A writer task drains the queue into the socket, so producers
//! (request handlers, bus callbacks) never touch the socket directly.
//!
//! ```text
//!   handler ──write().await──┐
//!                            ├──► mpsc (bounded) ──► writer task ──► TCP
//!   bus callback ─try_write()┘
//! ```
//!
//! Sessions treat the connection as closed once the peer hangs up, a socket
//! write fails, or the writer finishes. A peer hangup only stops further
//! frames: a client that half-closes after its request still receives what is
//! already queued. When every handle is dropped the writer flushes what is
//! queued and shuts the socket down.

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Why a non-blocking write did not queue its chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryWriteError {
    /// Queue is at capacity; the chunk was not queued
    Full,
    /// Connection is closed
    Closed,
}

/// Handle used to write a response onto a connection
#[derive(Debug, Clone)]
pub struct HttpConnection {
    tx: mpsc::Sender<Bytes>,
    closed: CancellationToken,
    peer_gone: CancellationToken,
    peer: Arc<str>,
}

impl HttpConnection {
    /// Create a connection handle plus the halves its I/O tasks need.
    pub(crate) fn channel(capacity: usize, peer: impl Into<Arc<str>>) -> (Self, ConnectionIo) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let closed = CancellationToken::new();
        let peer_gone = CancellationToken::new();

        let conn = Self {
            tx,
            closed: closed.clone(),
            peer_gone: peer_gone.clone(),
            peer: peer.into(),
        };

        (conn, ConnectionIo { rx, closed, peer_gone })
    }

    /// Queue a chunk, waiting for room in the queue.
    ///
    /// Still accepted after the peer half-closes, so a reply to a request
    /// followed by EOF is delivered.
    pub async fn write(&self, data: impl Into<Bytes>) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(Error::ConnectionClosed);
        }
        self.tx
            .send(data.into())
            .await
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Queue a chunk without waiting. Safe to call from any thread.
    pub fn try_write(&self, data: impl Into<Bytes>) -> std::result::Result<(), TryWriteError> {
        if self.is_closed() {
            return Err(TryWriteError::Closed);
        }
        self.tx.try_send(data.into()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TryWriteError::Full,
            mpsc::error::TrySendError::Closed(_) => TryWriteError::Closed,
        })
    }

    /// Whether streaming to this connection should stop. Once true, stays true.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.peer_gone.is_cancelled() || self.tx.is_closed()
    }

    /// Close the connection, discarding anything still queued.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Remote peer, for logging
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

/// The task-side halves of a connection
pub(crate) struct ConnectionIo {
    rx: mpsc::Receiver<Bytes>,
    closed: CancellationToken,
    peer_gone: CancellationToken,
}

impl ConnectionIo {
    /// Drain queued chunks into `writer` until every handle is dropped, a
    /// write fails, or the connection is closed. A peer hangup does not stop
    /// the drain.
    pub(crate) async fn run_writer<W>(mut self, mut writer: W)
    where
        W: AsyncWrite + Unpin,
    {
        loop {
            tokio::select! {
                _ = self.closed.cancelled() => break,
                chunk = self.rx.recv() => match chunk {
                    Some(chunk) => {
                        if let Err(e) = writer.write_all(&chunk).await {
                            tracing::debug!(error = %e, "Connection write failed");
                            break;
                        }
                    }
                    None => {
                        let _ = writer.flush().await;
                        break;
                    }
                },
            }
        }

        let _ = writer.shutdown().await;
        self.closed.cancel();
    }

    /// Handle for watching the peer side of this connection
    pub(crate) fn peer_watch(&self) -> PeerWatch {
        PeerWatch {
            peer_gone: self.peer_gone.clone(),
            closed: self.closed.clone(),
        }
    }
}

/// Detects the peer hanging up on a connection
pub(crate) struct PeerWatch {
    peer_gone: CancellationToken,
    closed: CancellationToken,
}

impl PeerWatch {
    /// Read `reader` until EOF or the connection closes. Anything the peer
    /// sends after the request head is discarded.
    pub(crate) async fn run<R>(self, mut reader: R)
    where
        R: AsyncRead + Unpin,
    {
        let mut scratch = [0u8; 512];
        loop {
            tokio::select! {
                _ = self.closed.cancelled() => return,
                read = reader.read(&mut scratch) => match read {
                    Ok(0) | Err(_) => break,
                    Ok(_) => continue,
                },
            }
        }
        self.peer_gone.cancel();
    }
}
