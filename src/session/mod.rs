//! Streaming sessions
//!
//! A session is one delivery of encoded frames from a bus subscription to one
//! HTTP connection. It is created by a codec strategy on the request thread,
//! started there, handed to the [`SessionRegistry`](crate::registry::SessionRegistry)
//! and from then on driven only by bus callbacks until the sweeper drops it.

pub mod state;
pub mod streamer;

pub use state::{PhaseCell, SessionPhase};
pub use streamer::{Delivery, FrameWriter, ImageStreamer};

use std::sync::Arc;

use crate::error::Result;
use crate::stats::SessionStats;

/// One active or one-shot delivery of frames to a single connection
pub trait StreamingSession: Send + Sync + 'static {
    /// Topic the session is bound to
    fn topic(&self) -> &str;

    /// Make the bus subscription live. Called once, before registration.
    fn start(&self) -> Result<()>;

    /// Whether the session can be reclaimed. Monotonic: once true, stays true.
    fn is_inactive(&self) -> bool;

    /// Current lifecycle phase
    fn phase(&self) -> SessionPhase;

    /// Delivery counters so far
    fn stats(&self) -> SessionStats;
}

/// Shared handle stored in the registry
pub type SessionRef = Arc<dyn StreamingSession>;
