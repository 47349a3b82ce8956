// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Listener lists used for slot notifications.
//!
//! Dispatch works on a snapshot of the list, so a listener may register or
//! remove listeners (or mutate the graph) while it is being called. Listeners
//! added during a dispatch are not called by that dispatch.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle returned by every `notify_*` registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Ordered list of callbacks of type `F`.
pub struct Signal<F: ?Sized> {
    listeners: Mutex<Vec<(ListenerId, Arc<F>)>>,
}

impl<F: ?Sized> Default for Signal<F> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }
}

impl<F: ?Sized> Signal<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, listener: Arc<F>) -> ListenerId {
        let id = ListenerId::next();
        self.listeners.lock().push((id, listener));
        id
    }

    /// Returns `true` if the listener was registered here.
    pub fn disconnect(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Listeners in registration order, detached from the list.
    pub fn snapshot(&self) -> Vec<Arc<F>> {
        self.listeners.lock().iter().map(|(_, l)| l.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.listeners.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Callback = dyn Fn(&mut Vec<u32>) + Send + Sync;

    #[test]
    fn dispatch_order_is_registration_order() {
        let signal: Signal<Callback> = Signal::new();
        signal.connect(Arc::new(|v: &mut Vec<u32>| v.push(1)));
        signal.connect(Arc::new(|v: &mut Vec<u32>| v.push(2)));
        signal.connect(Arc::new(|v: &mut Vec<u32>| v.push(3)));

        let mut seen = Vec::new();
        for listener in signal.snapshot() {
            listener(&mut seen);
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn listeners_may_mutate_the_list_during_dispatch() {
        let signal: Arc<Signal<Callback>> = Arc::new(Signal::new());
        let inner = signal.clone();
        let first = signal.connect(Arc::new(move |v: &mut Vec<u32>| {
            v.push(1);
            inner.connect(Arc::new(|v: &mut Vec<u32>| v.push(99)));
        }));
        signal.connect(Arc::new(|v: &mut Vec<u32>| v.push(2)));

        let mut seen = Vec::new();
        for listener in signal.snapshot() {
            listener(&mut seen);
        }
        assert_eq!(seen, vec![1, 2]);
        assert_eq!(signal.len(), 3);

        assert!(signal.disconnect(first));
        assert!(!signal.disconnect(first));
    }
}
