use std::sync::Arc;

use parking_lot::Mutex;

/// Completion signal handed out by [`AudioEngine::release_bus`](crate::AudioEngine::release_bus).
///
/// Resolves once the bus has faded out and been disconnected. Times are
/// reported in audio graph seconds.
#[derive(Debug, Clone)]
pub struct ReleaseSignal {
    inner: Arc<Mutex<ReleaseState>>,
}

#[derive(Debug, Clone, Copy)]
struct ReleaseState {
    requested_at: f64,
    resolved_at: Option<f64>,
}

impl ReleaseSignal {
    pub(crate) fn pending(requested_at: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ReleaseState {
                requested_at,
                resolved_at: None,
            })),
        }
    }

    /// Signal for a release that had nothing to do.
    pub(crate) fn resolved(at: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ReleaseState {
                requested_at: at,
                resolved_at: Some(at),
            })),
        }
    }

    pub(crate) fn resolve(&self, at: f64) {
        let mut state = self.inner.lock();
        if state.resolved_at.is_none() {
            state.resolved_at = Some(at.max(state.requested_at));
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.lock().resolved_at.is_some()
    }

    pub fn requested_at(&self) -> f64 {
        self.inner.lock().requested_at
    }

    pub fn resolved_at(&self) -> Option<f64> {
        self.inner.lock().resolved_at
    }

    /// Time between request and completion, once resolved.
    pub fn elapsed(&self) -> Option<f64> {
        let state = *self.inner.lock();
        state.resolved_at.map(|at| at - state.requested_at)
    }
}
