//! Generalized source of user interactions.
//!
//! The audio engine defers start-up until the first pointer or key activation
//! arrives here, and overlays use it for their keyboard shortcuts.

use std::{collections::HashSet, fmt, sync::Arc};

use parking_lot::Mutex;

/// A user activation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Pointer,
    Key(char),
}

/// Returned by listeners to stay subscribed or drop out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listen {
    Keep,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&Interaction) -> Listen + Send>;

/// Clonable fan-out point for [`Interaction`] events.
#[derive(Clone, Default)]
pub struct InteractionHub {
    inner: Arc<Mutex<HubState>>,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
    cancelled: HashSet<SubscriptionId>,
}

impl InteractionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: FnMut(&Interaction) -> Listen + Send + 'static,
    {
        let mut state = self.inner.lock();
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        state.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut state = self.inner.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(existing, _)| *existing != id);
        if state.listeners.len() == before {
            // The listener may be mid-dispatch; drop it once the dispatch ends.
            state.cancelled.insert(id);
        }
    }

    /// Delivers `event` to every listener. Listeners may subscribe or
    /// unsubscribe while being called; new listeners see the next event.
    pub fn emit(&self, event: Interaction) {
        let mut dispatching = std::mem::take(&mut self.inner.lock().listeners);

        dispatching.retain_mut(|(_, listener)| listener(&event) == Listen::Keep);

        let mut state = self.inner.lock();
        let cancelled = std::mem::take(&mut state.cancelled);
        dispatching.retain(|(id, _)| !cancelled.contains(id));
        let added = std::mem::replace(&mut state.listeners, dispatching);
        state.listeners.extend(added);
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

impl fmt::Debug for InteractionHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionHub")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn one_shot_listener_deregisters_itself() {
        let hub = InteractionHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        hub.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Listen::Remove
        });

        hub.emit(Interaction::Pointer);
        hub.emit(Interaction::Key('a'));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn listeners_can_subscribe_during_dispatch() {
        let hub = InteractionHub::new();
        let inner_hits = Arc::new(AtomicUsize::new(0));
        let reentrant = hub.clone();
        let counter = inner_hits.clone();
        hub.subscribe(move |_| {
            let counter = counter.clone();
            reentrant.subscribe(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Listen::Keep
            });
            Listen::Remove
        });

        hub.emit(Interaction::Pointer);
        assert_eq!(inner_hits.load(Ordering::SeqCst), 0);
        assert_eq!(hub.listener_count(), 1);

        hub.emit(Interaction::Pointer);
        assert_eq!(inner_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_removes_listener() {
        let hub = InteractionHub::new();
        let id = hub.subscribe(|_| Listen::Keep);
        hub.subscribe(|_| Listen::Keep);
        hub.unsubscribe(id);
        assert_eq!(hub.listener_count(), 1);
    }
}
