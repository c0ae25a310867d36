//! Pub/sub bus interface
//!
//! The server consumes the bus through two calls: topic discovery and
//! per-topic frame subscription. [`LocalBus`] is the in-process implementation.
//!
//! Frame callbacks run on the bus's own worker threads, never on the HTTP
//! workers. A callback must not block; see [`crate::session`] for how streamers
//! hand frames off to their connection.

pub mod frame;
pub mod local;

pub use frame::{ImageFrame, TopicInfo, CAMERA_INFO_DATATYPE, IMAGE_DATATYPE};
pub use local::LocalBus;

use tokio::task::JoinHandle;

use crate::error::Result;

/// Callback invoked for every frame delivered on a subscription
pub type FrameCallback = Box<dyn FnMut(ImageFrame) + Send + 'static>;

/// Source of topic metadata and frames
pub trait Bus: Send + Sync + 'static {
    /// All known topics, in discovery order
    fn list_topics(&self) -> Result<Vec<TopicInfo>>;

    /// Deliver every frame published on `topic` to `on_frame` until the
    /// returned [`Subscription`] is dropped or the topic goes away.
    fn subscribe(&self, topic: &str, on_frame: FrameCallback) -> Result<Subscription>;
}

/// Live subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Wrap the task delivering frames for `topic`
    pub fn new(topic: impl Into<String>, task: JoinHandle<()>) -> Self {
        Self {
            topic: topic.into(),
            task,
        }
    }

    /// Subscribed topic
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Whether delivery ended on its own (topic closed or bus shut down)
    pub fn is_terminated(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
