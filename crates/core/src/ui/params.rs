//! Parameter panel with proxy ownership.
//!
//! The panel never writes simulation state. Each control edits its own proxy
//! value and publishes a [`ParamChange`]; the simulation drains the changes
//! and applies them to its canonical state.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub value: f32,
    pub min: f32,
    pub max: f32,
    #[serde(default)]
    pub step: Option<f32>,
    #[serde(default)]
    pub label: Option<String>,
}

impl ParamSpec {
    pub fn new(value: f32, min: f32, max: f32) -> Self {
        Self {
            value,
            min,
            max,
            step: None,
            label: None,
        }
    }

    pub fn step(mut self, step: f32) -> Self {
        self.step = Some(step);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn constrain(&self, value: f32) -> f32 {
        let snapped = match self.step {
            Some(step) if step > 0.0 => self.min + ((value - self.min) / step).round() * step,
            _ => value,
        };
        snapped.clamp(self.min.min(self.max), self.max.max(self.min))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamChange {
    pub key: String,
    pub value: f32,
}

#[derive(Debug)]
struct Control {
    key: String,
    spec: ParamSpec,
    proxy: f32,
}

#[derive(Debug)]
struct PanelState {
    title: String,
    visible: bool,
    controls: Vec<Control>,
}

/// Control-surface side of the panel.
#[derive(Debug, Clone)]
pub struct ParamPanel {
    inner: Arc<Mutex<PanelState>>,
    changes: Sender<ParamChange>,
}

/// Simulation side of the panel.
#[derive(Debug)]
pub struct ParamReceiver {
    changes: Receiver<ParamChange>,
}

impl ParamPanel {
    pub fn new(title: impl Into<String>) -> (Self, ParamReceiver) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let panel = Self {
            inner: Arc::new(Mutex::new(PanelState {
                title: title.into(),
                visible: true,
                controls: Vec::new(),
            })),
            changes: tx,
        };
        (panel, ParamReceiver { changes: rx })
    }

    pub fn title(&self) -> String {
        self.inner.lock().title.clone()
    }

    /// Registers a control whose proxy starts at `spec.value`. Re-adding a key
    /// replaces the previous control.
    pub fn add_param(&self, key: impl Into<String>, spec: ParamSpec) {
        let key = key.into();
        let mut state = self.inner.lock();
        let proxy = spec.constrain(spec.value);
        state.controls.retain(|control| control.key != key);
        state.controls.push(Control { key, spec, proxy });
    }

    /// Writes a user edit to the proxy and publishes it. Returns the value
    /// actually stored after clamping and snapping.
    pub fn set(&self, key: &str, value: f32) -> Option<f32> {
        let applied = {
            let mut state = self.inner.lock();
            let control = state.controls.iter_mut().find(|control| control.key == key)?;
            control.proxy = control.spec.constrain(value);
            control.proxy
        };
        self.publish(key, applied);
        Some(applied)
    }

    pub fn value(&self, key: &str) -> Option<f32> {
        let state = self.inner.lock();
        state
            .controls
            .iter()
            .find(|control| control.key == key)
            .map(|control| control.proxy)
    }

    pub fn label(&self, key: &str) -> Option<String> {
        let state = self.inner.lock();
        state
            .controls
            .iter()
            .find(|control| control.key == key)
            .map(|control| control.spec.label.clone().unwrap_or_else(|| control.key.clone()))
    }

    pub fn keys(&self) -> Vec<String> {
        let state = self.inner.lock();
        state.controls.iter().map(|control| control.key.clone()).collect()
    }

    /// Restores every proxy to its registered value and republishes it.
    pub fn reset(&self) {
        let restored: Vec<(String, f32)> = {
            let mut state = self.inner.lock();
            state
                .controls
                .iter_mut()
                .map(|control| {
                    control.proxy = control.spec.constrain(control.spec.value);
                    (control.key.clone(), control.proxy)
                })
                .collect()
        };
        for (key, value) in restored {
            self.publish(&key, value);
        }
    }

    pub fn show(&self, visible: bool) {
        self.inner.lock().visible = visible;
    }

    pub fn is_visible(&self) -> bool {
        self.inner.lock().visible
    }

    fn publish(&self, key: &str, value: f32) {
        let change = ParamChange {
            key: key.to_string(),
            value,
        };
        if self.changes.send(change).is_err() {
            tracing::debug!(key, "parameter change dropped, simulation is gone");
        }
    }
}

impl ParamReceiver {
    /// Takes every change published since the last drain, oldest first.
    pub fn drain(&self) -> Vec<ParamChange> {
        self.changes.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edits_reach_the_owner_only_through_changes() {
        let (panel, changes) = ParamPanel::new("Drone");
        panel.add_param("pitch", ParamSpec::new(220.0, 50.0, 880.0).label("Pitch"));

        assert_eq!(panel.set("pitch", 440.0), Some(440.0));
        assert_eq!(panel.set("missing", 1.0), None);
        assert_eq!(
            changes.drain(),
            vec![ParamChange {
                key: "pitch".into(),
                value: 440.0
            }]
        );
        assert!(changes.drain().is_empty());
        assert_eq!(panel.label("pitch").as_deref(), Some("Pitch"));
    }

    #[test]
    fn clamps_and_snaps_proxy_values() {
        let (panel, _changes) = ParamPanel::new("Grid");
        panel.add_param("count", ParamSpec::new(4.0, 1.0, 10.0).step(1.0));

        assert_eq!(panel.set("count", 3.4), Some(3.0));
        assert_eq!(panel.set("count", 42.0), Some(10.0));
        assert_eq!(panel.value("count"), Some(10.0));
    }

    #[test]
    fn reset_restores_and_republishes() {
        let (panel, changes) = ParamPanel::new("Drone");
        panel.add_param("level", ParamSpec::new(0.5, 0.0, 1.0));
        panel.add_param("pitch", ParamSpec::new(220.0, 50.0, 880.0));
        panel.set("level", 0.9);
        changes.drain();

        panel.reset();
        assert_eq!(panel.value("level"), Some(0.5));
        let keys: Vec<String> = changes.drain().into_iter().map(|c| c.key).collect();
        assert_eq!(keys, vec!["level".to_string(), "pitch".to_string()]);
    }

    #[test]
    fn panel_survives_a_dropped_receiver() {
        let (panel, changes) = ParamPanel::new("Orphan");
        panel.add_param("x", ParamSpec::new(0.0, -1.0, 1.0));
        drop(changes);
        assert_eq!(panel.set("x", 0.5), Some(0.5));
    }
}
