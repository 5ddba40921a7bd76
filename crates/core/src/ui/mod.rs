//! Overlay collaborators: control buttons, debug text, status messages and
//! parameter panels.

use std::sync::Arc;

use parking_lot::Mutex;

pub mod buttons;
pub mod debug;
pub mod message;
pub mod params;

pub use buttons::{Button, ButtonsOverlay, Confirm, ControlAction, ControlSurface};
pub use debug::DebugOverlay;
pub use message::MessageOverlay;
pub use params::{ParamChange, ParamPanel, ParamReceiver, ParamSpec};

/// Root the overlays of the active simulation hang off.
#[derive(Debug, Clone, Default)]
pub struct Container {
    debug: DebugOverlay,
    panels: Arc<Mutex<PanelRack>>,
}

#[derive(Debug, Default)]
struct PanelRack {
    panels: Vec<ParamPanel>,
    /// Set by the controls toggle; panels created later start hidden too.
    hidden: bool,
}

impl Container {
    pub fn new(debug: DebugOverlay) -> Self {
        Self {
            debug,
            panels: Arc::default(),
        }
    }

    pub fn debug(&self) -> &DebugOverlay {
        &self.debug
    }

    /// Creates a parameter panel attached to this container.
    pub fn param_panel(&self, title: impl Into<String>) -> (ParamPanel, ParamReceiver) {
        let (panel, receiver) = ParamPanel::new(title);
        let mut rack = self.panels.lock();
        panel.show(!rack.hidden);
        rack.panels.push(panel.clone());
        (panel, receiver)
    }

    pub fn panel(&self, title: &str) -> Option<ParamPanel> {
        self.panels
            .lock()
            .panels
            .iter()
            .find(|panel| panel.title() == title)
            .cloned()
    }

    pub fn panels(&self) -> Vec<ParamPanel> {
        self.panels.lock().panels.clone()
    }

    /// Shows or hides every parameter panel at once. Returns whether the
    /// panels are visible afterwards.
    pub fn toggle_panels(&self) -> bool {
        let mut rack = self.panels.lock();
        rack.hidden = !rack.hidden;
        let visible = !rack.hidden;
        for panel in &rack.panels {
            panel.show(visible);
        }
        visible
    }

    pub fn panels_visible(&self) -> bool {
        !self.panels.lock().hidden
    }

    /// Detaches every panel and drops pending debug entries.
    pub fn clear(&self) -> usize {
        self.debug.clear();
        let mut rack = self.panels.lock();
        let count = rack.panels.len();
        rack.panels.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panels_are_found_by_title_and_cleared() {
        let container = Container::new(DebugOverlay::new(true));
        let (panel, _rx) = container.param_panel("Drone");
        panel.add_param("pitch", ParamSpec::new(1.0, 0.0, 2.0));

        let found = container.panel("Drone").unwrap();
        assert_eq!(found.keys(), vec!["pitch".to_string()]);
        assert!(container.panel("Other").is_none());

        container.debug().add_text("x", 1);
        assert_eq!(container.clear(), 1);
        assert!(container.panels().is_empty());
        assert_eq!(container.debug().entry_count(), 0);
    }

    #[test]
    fn controls_toggle_covers_current_and_later_panels() {
        let container = Container::default();
        let (drone, _drone_rx) = container.param_panel("Drone");
        assert!(drone.is_visible());

        assert!(!container.toggle_panels());
        assert!(!drone.is_visible());
        let (late, _late_rx) = container.param_panel("Late");
        assert!(!late.is_visible());

        assert!(container.toggle_panels());
        assert!(container.panels().iter().all(ParamPanel::is_visible));
        assert!(container.panels_visible());
    }
}
