use std::{fmt::Display, sync::Arc};

use parking_lot::Mutex;

use crate::interaction::{InteractionHub, Listen};

pub const DEFAULT_CATEGORY: &str = "Default";

/// Per-frame debug text, grouped by category.
///
/// Entries are only collected while the overlay is visible; every
/// [`render`](Self::render) hands back the formatted block and starts the
/// next frame empty.
#[derive(Debug, Clone, Default)]
pub struct DebugOverlay {
    inner: Arc<Mutex<DebugState>>,
}

#[derive(Debug, Default)]
struct DebugState {
    visible: bool,
    categories: Vec<(String, Vec<String>)>,
}

impl DebugOverlay {
    pub fn new(visible: bool) -> Self {
        let overlay = Self::default();
        overlay.set_visible(visible);
        overlay
    }

    pub fn is_visible(&self) -> bool {
        self.inner.lock().visible
    }

    pub fn set_visible(&self, visible: bool) {
        self.inner.lock().visible = visible;
    }

    pub fn toggle(&self) -> bool {
        let mut state = self.inner.lock();
        state.visible = !state.visible;
        state.visible
    }

    /// Toggles visibility whenever `key` is pressed on `hub`.
    pub fn bind_toggle_key(&self, hub: &InteractionHub, key: char) {
        let weak = Arc::downgrade(&self.inner);
        hub.subscribe(move |event| {
            let Some(inner) = weak.upgrade() else {
                return Listen::Remove;
            };
            if *event == crate::Interaction::Key(key) {
                let visible = DebugOverlay { inner }.toggle();
                tracing::debug!(visible, "debug overlay toggled");
            }
            Listen::Keep
        });
    }

    pub fn add_text(&self, label: &str, value: impl Display) {
        self.add_text_category(DEFAULT_CATEGORY, label, value);
    }

    pub fn add_text_category(&self, category: &str, label: &str, value: impl Display) {
        let mut state = self.inner.lock();
        if !state.visible {
            return;
        }
        let line = format!("{label}: {value}");
        match state.categories.iter_mut().find(|(name, _)| name == category) {
            Some((_, entries)) => entries.push(line),
            None => state.categories.push((category.to_string(), vec![line])),
        }
    }

    pub fn entry_count(&self) -> usize {
        let state = self.inner.lock();
        state.categories.iter().map(|(_, entries)| entries.len()).sum()
    }

    /// Formats the collected entries and clears them for the next frame.
    pub fn render(&self) -> String {
        let mut state = self.inner.lock();
        let mut text = String::from("Debug Info\n");
        if state.visible {
            for (category, entries) in state.categories.drain(..) {
                text.push('\n');
                text.push_str(&category);
                text.push('\n');
                for entry in entries {
                    text.push_str(&entry);
                    text.push('\n');
                }
            }
        }
        text
    }

    pub fn clear(&self) {
        self.inner.lock().categories.clear();
    }
}
