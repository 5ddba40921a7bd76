//! Contract between the host and pluggable simulations.
//!
//! Simulation authors implement [`Simulation`], which only carries the hooks
//! they are allowed to customise. Audio engine start-up and shutdown are
//! driven by [`SimulationHost`], which wraps every simulation and cannot be
//! extended, so a simulation can neither skip nor replace bus acquisition and
//! the fade-then-disconnect release.
//!
//! ```compile_fail
//! use simstage_core::Simulation;
//!
//! struct Rogue;
//!
//! impl Simulation for Rogue {
//!     fn on_audio_engine_init(&mut self) {}
//! }
//! ```

use std::{fmt, sync::Arc};

use crate::{
    audio::release::ReleaseSignal, render::RendererHandle, scene::Camera, ui::Container,
    AudioEngine, ModuleBus, Result, Scene, SimStageError,
};

/// Hooks a simulation may override. Every hook defaults to doing nothing.
pub trait Simulation {
    /// Called once when the simulation becomes active.
    fn on_enter(&mut self) {}

    /// Called once when the simulation is replaced or the host shuts down.
    fn on_exit(&mut self) {}

    fn on_pause(&mut self) {}

    fn on_resume(&mut self) {}

    /// Called once the simulation owns its bus, either right after entering
    /// or later when the audio engine finishes starting.
    fn on_audio_start(&mut self, _bus: ModuleBus) {}

    /// Called after the bus has faded out and been disconnected.
    fn on_audio_stop(&mut self) {}

    /// Called every unpaused frame.
    fn update(&mut self, _delta: f32) {}

    fn dispose(&mut self) {}
}

/// Handles given to a simulation when it is built.
#[derive(Debug, Clone)]
pub struct SimulationContext {
    pub scene: Scene,
    pub camera: Camera,
    pub renderer: RendererHandle,
    pub container: Container,
    pub audio: AudioEngine,
}

type BuildFn = dyn Fn(SimulationContext) -> Result<Box<dyn Simulation>>;

/// Named constructor for a simulation, retained by the host for restarts.
#[derive(Clone)]
pub struct SimulationFactory {
    name: Arc<str>,
    build: Arc<BuildFn>,
}

impl SimulationFactory {
    pub fn new<S, F>(name: &str, build: F) -> Self
    where
        S: Simulation + 'static,
        F: Fn(SimulationContext) -> Result<S> + 'static,
    {
        Self {
            name: Arc::from(name),
            build: Arc::new(move |context| {
                build(context).map(|simulation| Box::new(simulation) as Box<dyn Simulation>)
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds a fresh instance; any failure is reported as a construction error.
    pub fn build(&self, context: SimulationContext) -> Result<Box<dyn Simulation>> {
        (self.build)(context).map_err(|err| match err {
            err @ SimStageError::Construction { .. } => err,
            other => SimStageError::construction(self.name(), other.to_string()),
        })
    }
}

impl fmt::Debug for SimulationFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationFactory")
            .field("name", &self.name)
            .finish()
    }
}

/// Engine-driven wrapper around an active simulation.
pub struct SimulationHost {
    name: String,
    simulation: Box<dyn Simulation>,
    audio: AudioEngine,
    bus: Option<ModuleBus>,
    pending_stop: Option<ReleaseSignal>,
    disposed: bool,
}

impl SimulationHost {
    pub(crate) fn new(name: &str, simulation: Box<dyn Simulation>, audio: AudioEngine) -> Self {
        Self {
            name: name.to_string(),
            simulation,
            audio,
            bus: None,
            pending_stop: None,
            disposed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bus(&self) -> Option<ModuleBus> {
        self.bus
    }

    /// True while a released bus is still fading out.
    pub fn is_stopping(&self) -> bool {
        self.pending_stop.is_some()
    }

    /// Acquires the simulation's bus and starts its audio. A simulation holds
    /// at most one bus, so this does nothing when one is already owned or the
    /// engine cannot hand one out yet.
    pub(crate) fn on_audio_engine_init(&mut self) -> bool {
        if self.bus.is_some() {
            return false;
        }
        let Some(bus) = self.audio.create_bus() else {
            return false;
        };
        self.bus = Some(bus);
        tracing::debug!(simulation = %self.name, ?bus, "simulation audio started");
        self.simulation.on_audio_start(bus);
        true
    }

    /// Starts the bus release. `on_audio_stop` is delivered once the fade has
    /// completed, immediately if there was nothing to fade.
    pub(crate) fn on_audio_engine_shutdown(&mut self) -> ReleaseSignal {
        let signal = self.audio.release_bus(self.bus.take());
        if signal.is_resolved() {
            self.simulation.on_audio_stop();
        } else {
            self.pending_stop = Some(signal.clone());
        }
        signal
    }

    /// Delivers a pending `on_audio_stop`. Returns true once nothing is left
    /// to wait for.
    pub(crate) fn poll_audio_stop(&mut self) -> bool {
        let resolved = self
            .pending_stop
            .as_ref()
            .map(ReleaseSignal::is_resolved)
            .unwrap_or(true);
        if resolved && self.pending_stop.take().is_some() {
            tracing::debug!(simulation = %self.name, "simulation audio stopped");
            self.simulation.on_audio_stop();
        }
        resolved
    }

    pub(crate) fn on_enter(&mut self) {
        self.simulation.on_enter();
    }

    pub(crate) fn on_exit(&mut self) {
        self.simulation.on_exit();
    }

    pub(crate) fn on_pause(&mut self) {
        self.simulation.on_pause();
    }

    pub(crate) fn on_resume(&mut self) {
        self.simulation.on_resume();
    }

    pub(crate) fn update(&mut self, delta: f32) {
        self.simulation.update(delta);
    }

    pub(crate) fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.simulation.dispose();
        }
    }
}

impl fmt::Debug for SimulationHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationHost")
            .field("name", &self.name)
            .field("bus", &self.bus)
            .field("stopping", &self.pending_stop.is_some())
            .field("disposed", &self.disposed)
            .finish()
    }
}
