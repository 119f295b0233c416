//! Concurrent lookup from session id to running session actor.
//!
//! The directory is the only structure shared between request handlers and
//! actors. Registration is idempotent: a second registration for a live id
//! returns the handle already present, so concurrent initial loads (or a
//! stream attach racing the page load) never start two actors.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use crate::actor::SessionHandle;
use crate::session::SessionId;

/// Result of a registration attempt.
#[derive(Debug, Clone)]
pub enum Registration {
    /// The given handle is now registered.
    Registered(SessionHandle),
    /// A live actor was already registered under the id; this is it.
    AlreadyRegistered(SessionHandle),
}

impl Registration {
    /// The handle that is registered after the call.
    pub fn into_handle(self) -> SessionHandle {
        match self {
            Self::Registered(handle) | Self::AlreadyRegistered(handle) => handle,
        }
    }

    /// Whether this call registered a new actor.
    pub const fn is_new(&self) -> bool {
        matches!(self, Self::Registered(_))
    }
}

/// Session id → actor handle.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    sessions: DashMap<SessionId, SessionHandle>,
}

impl SessionDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` under `id` unless a live actor is already there.
    ///
    /// Entries whose actor has terminated are replaced.
    pub fn register(&self, id: SessionId, handle: SessionHandle) -> Registration {
        self.start_or_locate(id, || handle)
    }

    /// Return the live actor for `id`, or register the one built by `start`.
    ///
    /// `start` runs at most once and only when no live actor exists; the
    /// check and the insert happen under the same entry lock.
    pub fn start_or_locate<F>(&self, id: SessionId, start: F) -> Registration
    where
        F: FnOnce() -> SessionHandle,
    {
        match self.sessions.entry(id) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_alive() {
                    Registration::AlreadyRegistered(entry.get().clone())
                } else {
                    debug!(session_id = %entry.key(), "replacing terminated session entry");
                    let handle = start();
                    entry.insert(handle.clone());
                    Registration::Registered(handle)
                }
            }
            Entry::Vacant(entry) => {
                let handle = start();
                entry.insert(handle.clone());
                Registration::Registered(handle)
            }
        }
    }

    /// The live actor registered under `id`.
    pub fn lookup(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .filter(SessionHandle::is_alive)
    }

    /// Remove the entry for `id` if it still belongs to actor `instance`.
    ///
    /// Returns whether an entry was removed.
    pub fn remove(&self, id: &SessionId, instance: u64) -> bool {
        self.sessions
            .remove_if(id, |_, handle| handle.instance() == instance)
            .is_some()
    }

    /// Deliver an external message to every live session.
    ///
    /// Returns the number of sessions the message was queued for.
    pub fn broadcast(&self, message: &Value) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.value().send_info(message.clone()).is_ok())
            .count()
    }

    /// Ask every live session to shut down.
    ///
    /// Teardown runs in each actor and attached streams end. Returns the
    /// number of sessions asked.
    pub fn shutdown_all(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.value().shutdown().is_ok())
            .count()
    }

    /// Number of registered sessions (including ones still shutting down).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::*;
    use crate::actor::{spawn_session, ActorConfig, PumpMessage, SessionSpec};
    use crate::testing::CounterView;
    use crate::view::View;

    fn spec(id: &SessionId, view: &Arc<CounterView>) -> SessionSpec {
        let view: Arc<dyn View> = view.clone();
        SessionSpec::new(id.clone(), view, "/counter")
    }

    #[tokio::test]
    async fn register_twice_returns_original_handle() {
        let directory = Arc::new(SessionDirectory::new());
        let view = Arc::new(CounterView::default());
        let id = SessionId::generate();

        let first = spawn_session(spec(&id, &view), ActorConfig::default(), Arc::clone(&directory));
        let second = spawn_session(spec(&id, &view), ActorConfig::default(), Arc::clone(&directory));
        let first_instance = first.instance();

        let a = directory.register(id.clone(), first);
        let b = directory.register(id.clone(), second.clone());

        assert!(a.is_new());
        assert!(!b.is_new());
        assert_eq!(a.into_handle().instance(), first_instance);
        assert_eq!(b.into_handle().instance(), first_instance);
        assert_eq!(directory.lookup(&id).unwrap().instance(), first_instance);
        assert_eq!(directory.len(), 1);

        // The loser was never registered; stopping it leaves the winner alone.
        second.shutdown().unwrap();
        second.terminated().await;
        assert_eq!(directory.lookup(&id).unwrap().instance(), first_instance);
    }

    #[tokio::test]
    async fn start_or_locate_starts_once() {
        let directory = Arc::new(SessionDirectory::new());
        let view = Arc::new(CounterView::default());
        let id = SessionId::generate();

        let mut starts = 0;
        for _ in 0..3 {
            directory.start_or_locate(id.clone(), || {
                starts += 1;
                spawn_session(spec(&id, &view), ActorConfig::default(), Arc::clone(&directory))
            });
        }
        assert_eq!(starts, 1);

        // Mount runs inside the actor; a snapshot round-trip waits for it.
        directory.lookup(&id).unwrap().snapshot().await.unwrap();
        assert_eq!(view.mounts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn terminated_actor_is_not_found_and_is_replaced() {
        let directory = Arc::new(SessionDirectory::new());
        let view = Arc::new(CounterView::default());
        let id = SessionId::generate();

        let handle = directory
            .start_or_locate(id.clone(), || {
                spawn_session(spec(&id, &view), ActorConfig::default(), Arc::clone(&directory))
            })
            .into_handle();
        handle.shutdown().unwrap();
        handle.terminated().await;

        assert!(directory.lookup(&id).is_none());
        let replacement = directory.start_or_locate(id.clone(), || {
            spawn_session(spec(&id, &view), ActorConfig::default(), Arc::clone(&directory))
        });
        assert!(replacement.is_new());
        assert_ne!(replacement.into_handle().instance(), handle.instance());
    }

    #[tokio::test]
    async fn remove_only_matches_its_own_instance() {
        let directory = Arc::new(SessionDirectory::new());
        let view = Arc::new(CounterView::default());
        let id = SessionId::generate();
        let handle = spawn_session(spec(&id, &view), ActorConfig::default(), Arc::clone(&directory));
        let instance = handle.instance();
        directory.register(id.clone(), handle);

        assert!(!directory.remove(&id, instance.wrapping_add(1_000)));
        assert!(directory.remove(&id, instance));
        assert!(directory.is_empty());
    }

    #[tokio::test]
    async fn broadcast_reaches_every_live_session() {
        let directory = Arc::new(SessionDirectory::new());
        let view = Arc::new(CounterView::default());
        let mut handles = Vec::new();
        for _ in 0..3 {
            let id = SessionId::generate();
            let handle = directory
                .start_or_locate(id.clone(), || {
                    spawn_session(spec(&id, &view), ActorConfig::default(), Arc::clone(&directory))
                })
                .into_handle();
            handles.push(handle);
        }

        assert_eq!(directory.broadcast(&serde_json::json!({"tick": 9})), 3);
        for handle in &handles {
            let snapshot = handle.snapshot().await.unwrap();
            assert_eq!(snapshot.signals.get("tick"), Some(&serde_json::json!(9)));
        }
    }

    #[tokio::test]
    async fn shutdown_all_tears_down_and_ends_streams() {
        let directory = Arc::new(SessionDirectory::new());
        let view = Arc::new(CounterView::default());
        let mut handles = Vec::new();
        for _ in 0..2 {
            let id = SessionId::generate();
            let handle = directory
                .start_or_locate(id.clone(), || {
                    spawn_session(spec(&id, &view), ActorConfig::default(), Arc::clone(&directory))
                })
                .into_handle();
            handles.push(handle);
        }
        let mut attachment = handles[0].attach().await.unwrap();
        // Initial signals for a stream that never saw a snapshot.
        assert!(matches!(attachment.recv().await, Some(PumpMessage::Flush(_))));

        assert_eq!(directory.shutdown_all(), 2);
        assert_eq!(attachment.recv().await, Some(PumpMessage::End));
        for handle in &handles {
            handle.terminated().await;
        }
        assert_eq!(view.teardowns.load(Ordering::SeqCst), 2);
        assert!(directory.is_empty());
    }
}
