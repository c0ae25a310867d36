//! In-process bus
//!
//! Topics live in an ordered list so discovery reports them in the order they
//! were created. Each topic fans frames out through a
//! `tokio::sync::broadcast` channel: every subscriber sees the same `Bytes`
//! allocation, and a subscriber that falls behind skips the frames it missed
//! rather than holding up the publisher.
//!
//! Subscription tasks run on the bus's callback runtime, which is separate
//! from whatever runtime serves HTTP.
//!
//! A topic created by subscribing ahead of its publisher lives only as long as
//! it has subscribers: the last receiver to go removes it, unless it was
//! advertised in the meantime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::frame::{ImageFrame, TopicInfo};
use super::{Bus, FrameCallback, Subscription};
use crate::error::{Error, Result};

/// Frames buffered per topic before slow subscribers start skipping
pub const DEFAULT_TOPIC_CAPACITY: usize = 8;

struct TopicEntry {
    name: String,
    /// Declared type; `None` until advertised
    datatype: Option<String>,
    tx: broadcast::Sender<ImageFrame>,
}

/// Bus implementation backed by broadcast channels
pub struct LocalBus {
    topics: Arc<RwLock<Vec<TopicEntry>>>,
    /// Owned callback runtime, if this bus created one
    runtime: Option<Runtime>,
    handle: Handle,
    capacity: usize,
    shut_down: AtomicBool,
}

impl LocalBus {
    /// Create a bus with its own callback runtime of `threads` workers
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(Error::Config("bus needs at least one callback thread".into()));
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(threads)
            .thread_name("bus-callback")
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();

        Ok(Self::build(Some(runtime), handle))
    }

    /// Create a bus delivering callbacks on an existing runtime
    pub fn with_handle(handle: Handle) -> Self {
        Self::build(None, handle)
    }

    fn build(runtime: Option<Runtime>, handle: Handle) -> Self {
        Self {
            topics: Arc::new(RwLock::new(Vec::new())),
            runtime,
            handle,
            capacity: DEFAULT_TOPIC_CAPACITY,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Set the per-topic frame buffer depth for topics created afterwards
    pub fn topic_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Declare `name` with data type `datatype`.
    ///
    /// Re-advertising keeps existing subscribers and the topic's position.
    pub fn advertise(&self, name: &str, datatype: &str) {
        let mut topics = self.topics.write();

        if let Some(entry) = topics.iter_mut().find(|entry| entry.name == name) {
            entry.datatype = Some(datatype.to_string());
        } else {
            let (tx, _) = broadcast::channel(self.capacity);
            topics.push(TopicEntry {
                name: name.to_string(),
                datatype: Some(datatype.to_string()),
                tx,
            });
        }

        tracing::debug!(topic = name, datatype = datatype, "Topic advertised");
    }

    /// Remove a topic. Its subscriptions terminate.
    pub fn unadvertise(&self, name: &str) {
        let mut topics = self.topics.write();
        topics.retain(|entry| entry.name != name);
    }

    /// Publish a frame on `topic`.
    ///
    /// Returns the number of subscribers it was delivered to.
    pub fn publish(&self, topic: &str, frame: ImageFrame) -> usize {
        let topics = self.topics.read();

        match topics.iter().find(|entry| entry.name == topic) {
            // send() fails only when there are no receivers
            Some(entry) => entry.tx.send(frame).unwrap_or(0),
            None => {
                tracing::debug!(topic = topic, "Publish on unknown topic dropped");
                0
            }
        }
    }

    /// Number of live subscribers on `topic`
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let topics = self.topics.read();
        topics
            .iter()
            .find(|entry| entry.name == topic)
            .map_or(0, |entry| entry.tx.receiver_count())
    }

    /// Drop every topic and refuse further calls. All subscriptions terminate.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        self.topics.write().clear();
        tracing::info!("Bus shut down");
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(Error::Bus("bus is shut down".into()));
        }
        Ok(())
    }
}

impl Bus for LocalBus {
    fn list_topics(&self) -> Result<Vec<TopicInfo>> {
        self.ensure_running()?;

        let topics = self.topics.read();
        Ok(topics
            .iter()
            .filter_map(|entry| {
                entry
                    .datatype
                    .as_ref()
                    .map(|datatype| TopicInfo::new(entry.name.clone(), datatype.clone()))
            })
            .collect())
    }

    fn subscribe(&self, topic: &str, mut on_frame: FrameCallback) -> Result<Subscription> {
        self.ensure_running()?;

        // Subscribing ahead of the publisher is allowed; the topic is created
        // without a declared type and stays out of discovery until advertised.
        let rx = {
            let mut topics = self.topics.write();
            match topics.iter().find(|entry| entry.name == topic) {
                Some(entry) => entry.tx.subscribe(),
                None => {
                    let (tx, rx) = broadcast::channel(self.capacity);
                    topics.push(TopicEntry {
                        name: topic.to_string(),
                        datatype: None,
                        tx,
                    });
                    rx
                }
            }
        };

        let mut rx = TopicReceiver {
            rx: Some(rx),
            topics: Arc::downgrade(&self.topics),
            name: topic.to_string(),
        };
        let task = self.handle.spawn(async move {
            while let Some(frame) = rx.recv().await {
                on_frame(frame);
            }
            tracing::debug!(topic = %rx.name, "Subscription ended");
        });

        Ok(Subscription::new(topic, task))
    }
}

/// Receiving end of one subscription. Dropping it removes its topic if the
/// topic was never advertised and nobody else listens.
struct TopicReceiver {
    rx: Option<broadcast::Receiver<ImageFrame>>,
    topics: Weak<RwLock<Vec<TopicEntry>>>,
    name: String,
}

impl TopicReceiver {
    async fn recv(&mut self) -> Option<ImageFrame> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(frame) => return Some(frame),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(topic = %self.name, skipped = skipped, "Subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for TopicReceiver {
    fn drop(&mut self) {
        drop(self.rx.take());

        let Some(topics) = self.topics.upgrade() else {
            return;
        };
        let mut topics = topics.write();
        topics.retain(|entry| {
            entry.name != self.name || entry.datatype.is_some() || entry.tx.receiver_count() > 0
        });
    }
}

impl Drop for LocalBus {
    fn drop(&mut self) {
        // Never block here: the bus may be dropped from inside async code
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
