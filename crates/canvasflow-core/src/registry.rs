//! Registry of in-flight stream tasks, keyed by session id.
//!
//! The registry gives a concurrently running caller (typically the cancel
//! endpoint) a handle to an active turn. It never cancels anything itself;
//! cancellation goes through the returned task handle.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, Result};

/// Handle to one in-flight chat turn.
#[derive(Debug, Clone)]
pub struct StreamTask {
    cancel: CancellationToken,
    done: Arc<AtomicBool>,
}

impl StreamTask {
    fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            done: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cooperative cancellation of the turn.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token checked by the consumption loop between events.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Mark the turn's unit of work as finished.
    pub fn mark_done(&self) {
        self.done.store(true, Ordering::SeqCst);
    }
}

/// Shared map of active stream tasks.
///
/// Instances are injected wherever turn state is needed so independent
/// registries can coexist (one per test, one per process in production).
#[derive(Debug, Default)]
pub struct StreamTaskRegistry {
    tasks: DashMap<String, StreamTask>,
}

impl StreamTaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new task for the session.
    ///
    /// At most one task per session may be live; a second registration is a
    /// caller error, never a silent overwrite.
    pub fn register(&self, session_id: &str) -> Result<StreamTask> {
        match self.tasks.entry(session_id.to_string()) {
            Entry::Occupied(_) => Err(CoreError::SessionBusy(session_id.to_string())),
            Entry::Vacant(slot) => {
                let task = StreamTask::new();
                slot.insert(task.clone());
                Ok(task)
            }
        }
    }

    /// Look up the task for a session, if one is live.
    pub fn lookup(&self, session_id: &str) -> Option<StreamTask> {
        self.tasks.get(session_id).map(|entry| entry.clone())
    }

    /// Remove the session's task from tracking.
    pub fn unregister(&self, session_id: &str) {
        self.tasks.remove(session_id);
    }

    /// Number of currently registered tasks.
    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_lookup_unregister() {
        let registry = StreamTaskRegistry::new();

        let task = registry.register("session-1").unwrap();
        assert!(!task.is_cancelled());
        assert!(!task.is_done());
        assert!(registry.lookup("session-1").is_some());
        assert_eq!(registry.active_count(), 1);

        registry.unregister("session-1");
        assert!(registry.lookup("session-1").is_none());
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_double_register_is_an_error() {
        let registry = StreamTaskRegistry::new();
        registry.register("session-1").unwrap();

        let result = registry.register("session-1");
        assert!(matches!(result, Err(CoreError::SessionBusy(_))));

        // other sessions are unaffected
        assert!(registry.register("session-2").is_ok());
    }

    #[test]
    fn test_cancel_is_visible_through_lookup() {
        let registry = StreamTaskRegistry::new();
        let task = registry.register("session-1").unwrap();

        registry.lookup("session-1").unwrap().cancel();
        assert!(task.is_cancelled());
        assert!(task.cancel_token().is_cancelled());
    }

    #[test]
    fn test_done_flag_round_trip() {
        let registry = StreamTaskRegistry::new();
        let task = registry.register("session-1").unwrap();

        task.mark_done();
        assert!(registry.lookup("session-1").unwrap().is_done());
    }
}
