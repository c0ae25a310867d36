//! Statistics for streaming sessions

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Snapshot of one session's delivery counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames queued onto the connection
    pub frames_sent: u64,
    /// Bytes queued onto the connection, headers included
    pub bytes_sent: u64,
    /// Frames dropped because the connection queue was full
    pub dropped_frames: u64,
    /// Time since the session was created
    pub duration: Duration,
}

impl SessionStats {
    /// Average output rate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration.as_secs();
        if secs > 0 {
            (self.bytes_sent * 8) / secs
        } else {
            0
        }
    }

    /// Average delivered frames per second
    pub fn framerate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.frames_sent as f64 / secs
        } else {
            0.0
        }
    }
}

/// Live counters updated from bus callback threads
#[derive(Debug)]
pub struct SessionCounters {
    created_at: Instant,
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
    dropped_frames: AtomicU64,
}

impl SessionCounters {
    pub fn new() -> Self {
        Self {
            created_at: Instant::now(),
            frames_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Record a frame of `bytes` queued for the client
    pub fn record_sent(&self, bytes: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record a frame dropped under backpressure
    pub fn record_dropped(&self) {
        self.dropped_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SessionStats {
        SessionStats {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            dropped_frames: self.dropped_frames.load(Ordering::Relaxed),
            duration: self.created_at.elapsed(),
        }
    }
}

impl Default for SessionCounters {
    fn default() -> Self {
        Self::new()
    }
}
