//! Registry of active streaming sessions
//!
//! Three kinds of thread touch a session: the HTTP worker that creates and
//! registers it, bus callback threads that feed it frames, and the sweeper
//! that reclaims it. Only registry *membership* is shared and locked; a
//! session's own state is reached through the session alone.
//!
//! ```text
//!    [HTTP worker]                 Arc<SessionRegistry>           [Sweeper, 500ms]
//!    create + start ──insert()──► ┌────────────────────┐ ◄──sweep() (try_lock)
//!         (blocks briefly)        │ Mutex<Vec<Session>>│      drops inactive
//!                                 └────────────────────┘
//!    [bus callback] ──frame──► session ──try_write──► connection queue ──► TCP
//! ```
//!
//! Frame delivery never takes the registry lock.

pub mod store;

pub use store::SessionRegistry;
