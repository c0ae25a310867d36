//! Session registry implementation
//!
//! Holds every started session until the sweeper finds it inactive.
//! `insert` always takes the lock: dropping a freshly started session would
//! leak nothing but would cut off its client. `sweep` only ever tries the lock;
//! under contention it does nothing and the next tick retries, so reclamation
//! is best-effort and can be deferred for as long as contention lasts.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;

use crate::server::config::SWEEP_PERIOD;
use crate::session::SessionRef;

/// Registry of active streaming sessions
///
/// Sessions keep insertion order. The lock is only ever held for list
/// manipulation; no I/O happens under it.
pub struct SessionRegistry {
    sessions: Mutex<Vec<SessionRef>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Add a started session. Blocks for the short critical section.
    ///
    /// Returns false, leaving the registry unchanged, if this exact session
    /// object is already registered.
    pub fn insert(&self, session: SessionRef) -> bool {
        let mut sessions = self.sessions.lock();

        if sessions.iter().any(|existing| Arc::ptr_eq(existing, &session)) {
            tracing::warn!(topic = %session.topic(), "Session already registered");
            return false;
        }

        tracing::debug!(
            topic = %session.topic(),
            sessions = sessions.len() + 1,
            "Session registered"
        );
        sessions.push(session);
        true
    }

    /// Remove inactive sessions, keeping the order of the rest.
    ///
    /// Never blocks. Returns `None` when the lock was busy and nothing was
    /// examined, otherwise the number of sessions removed.
    pub fn sweep(&self) -> Option<usize> {
        let removed = {
            let mut sessions = self.sessions.try_lock()?;

            let mut removed = Vec::new();
            let mut kept = Vec::with_capacity(sessions.len());
            for session in sessions.drain(..) {
                if session.is_inactive() {
                    removed.push(session);
                } else {
                    kept.push(session);
                }
            }
            *sessions = kept;
            removed
        };

        for session in &removed {
            tracing::info!(topic = %session.topic(), "Removed stream");
        }

        // Dropping here, outside the lock, releases subscriptions and connections
        Some(removed.len())
    }

    /// Number of registered sessions
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether no session is registered
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Topics of the registered sessions, in insertion order
    pub fn topics(&self) -> Vec<String> {
        self.sessions
            .lock()
            .iter()
            .map(|session| session.topic().to_string())
            .collect()
    }

    /// Spawn the periodic sweeper at the fixed [`SWEEP_PERIOD`]
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.spawn_sweeper_every(SWEEP_PERIOD)
    }

    pub(crate) fn spawn_sweeper_every(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // A late tick runs once against current state; missed ticks are not replayed
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if registry.sweep().is_none() {
                    tracing::trace!("Sweep skipped, registry busy");
                }
            }
        })
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::error::Result;
    use crate::session::{SessionPhase, StreamingSession};
    use crate::stats::SessionStats;

    struct FakeSession {
        topic: String,
        inactive: AtomicBool,
    }

    impl FakeSession {
        fn new(topic: &str) -> Arc<Self> {
            Arc::new(Self {
                topic: topic.to_string(),
                inactive: AtomicBool::new(false),
            })
        }

        fn kill(&self) {
            self.inactive.store(true, Ordering::SeqCst);
        }
    }

    impl StreamingSession for FakeSession {
        fn topic(&self) -> &str {
            &self.topic
        }

        fn start(&self) -> Result<()> {
            Ok(())
        }

        fn is_inactive(&self) -> bool {
            self.inactive.load(Ordering::SeqCst)
        }

        fn phase(&self) -> SessionPhase {
            if self.is_inactive() {
                SessionPhase::Inactive
            } else {
                SessionPhase::Active
            }
        }

        fn stats(&self) -> SessionStats {
            SessionStats::default()
        }
    }

    #[test]
    fn test_insert_and_len() {
        let registry = SessionRegistry::new();
        assert!(registry.is_empty());

        assert!(registry.insert(FakeSession::new("/a")));
        assert!(registry.insert(FakeSession::new("/b")));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.topics(), vec!["/a", "/b"]);
    }

    #[test]
    fn test_duplicate_insert_ignored() {
        let registry = SessionRegistry::new();
        let session = FakeSession::new("/a");

        assert!(registry.insert(session.clone()));
        assert!(!registry.insert(session.clone()));
        assert_eq!(registry.len(), 1);

        // Same topic, different object: both kept
        assert!(registry.insert(FakeSession::new("/a")));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_sweep_removes_inactive_and_keeps_order() {
        let registry = SessionRegistry::new();
        let sessions: Vec<_> = ["/a", "/b", "/c", "/d", "/e"]
            .iter()
            .map(|topic| FakeSession::new(topic))
            .collect();
        for session in &sessions {
            registry.insert(session.clone());
        }

        sessions[1].kill();
        sessions[3].kill();

        assert_eq!(registry.sweep(), Some(2));
        assert_eq!(registry.topics(), vec!["/a", "/c", "/e"]);

        // Every remaining session is active
        assert_eq!(registry.sweep(), Some(0));
    }

    #[test]
    fn test_sweep_releases_removed_sessions() {
        let registry = SessionRegistry::new();
        let session = FakeSession::new("/a");
        registry.insert(session.clone());
        assert_eq!(Arc::strong_count(&session), 2);

        session.kill();
        registry.sweep();

        assert_eq!(Arc::strong_count(&session), 1);
    }

    #[test]
    fn test_sweep_skipped_under_contention() {
        let registry = SessionRegistry::new();
        let session = FakeSession::new("/a");
        registry.insert(session.clone());
        session.kill();

        let guard = registry.sessions.lock();
        assert_eq!(registry.sweep(), None);
        drop(guard);

        // Retried on the next tick against current state
        assert_eq!(registry.sweep(), Some(1));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_parallel_inserts() {
        let registry = Arc::new(SessionRegistry::new());

        let handles: Vec<_> = (0..100)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry.insert(FakeSession::new(&format!("/cam{i}/image_raw")));
                    // Sweeps race the inserts; none may lose an active session
                    registry.sweep();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 100);
        let mut topics = registry.topics();
        topics.sort();
        topics.dedup();
        assert_eq!(topics.len(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_reclaims_within_period() {
        let registry = Arc::new(SessionRegistry::new());
        let session = FakeSession::new("/a");
        registry.insert(session.clone());

        let sweeper = registry.spawn_sweeper();
        session.kill();

        tokio::time::sleep(SWEEP_PERIOD + Duration::from_millis(10)).await;
        assert!(registry.is_empty());

        sweeper.abort();
    }
}
