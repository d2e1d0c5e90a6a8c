//! One-way readiness gate
//!
//! `NotReady -> Ready`, exactly once. Listeners registered before the
//! transition run once, in registration order, when it happens; listeners
//! registered afterwards run immediately on the caller's thread.

use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::debug;

type Listener = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct GateState {
    ready: bool,
    pending: Vec<Listener>,
}

pub struct ReadinessGate {
    state: Mutex<GateState>,
    signal: watch::Sender<bool>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            state: Mutex::new(GateState::default()),
            signal,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.lock().ready
    }

    /// Run `listener` once the gate opens, or right now if it already has
    pub fn when_ready<F>(&self, listener: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.lock();
        if state.ready {
            drop(state);
            listener();
        } else {
            state.pending.push(Box::new(listener));
        }
    }

    /// Open the gate. Returns whether this call changed the state.
    pub fn mark_as_ready(&self) -> bool {
        let pending = {
            let mut state = self.lock();
            if state.ready {
                return false;
            }
            state.ready = true;
            std::mem::take(&mut state.pending)
        };

        debug!("Readiness gate open, flushing {} listeners", pending.len());
        self.signal.send_replace(true);
        for listener in pending {
            listener();
        }
        true
    }

    /// Wait until the gate opens
    pub async fn ready(&self) {
        let mut signal = self.signal.subscribe();
        // The sender lives as long as `self`, so this only ends once ready
        let _ = signal.wait_for(|ready| *ready).await;
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        // Listeners run outside the lock; a poisoned state is still consistent
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn test_pending_listeners_fire_once_in_order() {
        let gate = ReadinessGate::new();
        let log = recorder();

        for name in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            gate.when_ready(move || log.lock().unwrap().push(name));
        }
        assert!(log.lock().unwrap().is_empty());

        assert!(gate.mark_as_ready());
        assert!(!gate.mark_as_ready());
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_late_listener_runs_immediately() {
        let gate = ReadinessGate::new();
        gate.mark_as_ready();

        let log = recorder();
        let sink = Arc::clone(&log);
        gate.when_ready(move || sink.lock().unwrap().push("late"));
        assert_eq!(*log.lock().unwrap(), vec!["late"]);
    }

    #[test]
    fn test_listener_may_register_another() {
        let gate = Arc::new(ReadinessGate::new());
        let log = recorder();

        let inner_gate = Arc::clone(&gate);
        let inner_log = Arc::clone(&log);
        gate.when_ready(move || {
            inner_log.lock().unwrap().push("outer");
            let nested = Arc::clone(&inner_log);
            inner_gate.when_ready(move || nested.lock().unwrap().push("nested"));
        });

        gate.mark_as_ready();
        assert_eq!(*log.lock().unwrap(), vec!["outer", "nested"]);
    }

    #[tokio::test]
    async fn test_ready_waits_for_mark() {
        let gate = Arc::new(ReadinessGate::new());
        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.ready().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        gate.mark_as_ready();
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert!(gate.is_ready());
    }
}
