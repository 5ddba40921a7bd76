//! Ownership of the active simulation and its audio.
//!
//! The manager is the only writer of the active bus gain outside the engine:
//! pausing fades the bus to silence and resuming fades it back, without ever
//! creating or releasing it. Audio readiness may arrive at any point (before
//! a simulation exists, after it was paused) and is bridged through
//! [`LifecycleManager::on_audio_engine_init_ready`].

use crossbeam_channel::Receiver;

use crate::{
    interaction::{Interaction, InteractionHub},
    render::FrameRenderer,
    scene::{Camera, Scene},
    simulation::{SimulationContext, SimulationFactory, SimulationHost},
    timeline::DeltaSource,
    ui::{Button, Container, ControlAction, ControlSurface, DebugOverlay, MessageOverlay},
    AudioEngine, DebugConfig, ModuleBus, Result,
};

pub const AUDIO_HINT: &str = "Audio will start automatically after a click or key press.";
pub const PAUSED_MESSAGE: &str = "Simulation paused.";

const LIFECYCLE_CATEGORY: &str = "Lifecycle";

pub struct LifecycleManager {
    audio: AudioEngine,
    hub: InteractionHub,
    scene: Scene,
    camera: Camera,
    container: Container,
    renderer: Box<dyn FrameRenderer>,
    clock: Box<dyn DeltaSource>,
    controls: Box<dyn ControlSurface>,
    messages: MessageOverlay,
    current: Option<SimulationHost>,
    current_factory: Option<SimulationFactory>,
    retiring: Vec<SimulationHost>,
    paused: bool,
    audio_enabled: bool,
    engine_ready: Receiver<()>,
    frames: u64,
    debug_text: String,
}

impl LifecycleManager {
    pub fn new(
        audio: AudioEngine,
        renderer: impl FrameRenderer + 'static,
        clock: impl DeltaSource + 'static,
        controls: impl ControlSurface + 'static,
    ) -> Self {
        let hub = InteractionHub::new();
        let (ready_tx, engine_ready) = crossbeam_channel::unbounded();
        audio.on_initialized(move |_| {
            let _ = ready_tx.send(());
        });
        audio.initialize_on_first_interaction(&hub);

        let audio_enabled = audio.is_enabled();
        let mut controls: Box<dyn ControlSurface> = Box::new(controls);
        controls.set_audio_enabled_label(audio_enabled);
        controls.set_running_label(true);

        let mut messages = MessageOverlay::new();
        if !audio.is_initialized() {
            messages.show(AUDIO_HINT, 3.0);
        }

        Self {
            audio,
            hub,
            scene: Scene::new(),
            camera: Camera::default(),
            container: Container::new(DebugOverlay::new(false)),
            renderer: Box::new(renderer),
            clock: Box::new(clock),
            controls,
            messages,
            current: None,
            current_factory: None,
            retiring: Vec::new(),
            paused: false,
            audio_enabled,
            engine_ready,
            frames: 0,
            debug_text: String::new(),
        }
    }

    /// Applies the debug settings and binds the overlay's toggle key.
    pub fn with_debug_config(self, config: &DebugConfig) -> Self {
        let debug = self.container.debug();
        debug.set_visible(config.visible);
        debug.bind_toggle_key(&self.hub, config.toggle_key);
        self
    }

    /// Replaces the active simulation with a fresh one built by `factory`.
    ///
    /// The previous simulation exits, starts its bus fade-out and is disposed
    /// before the new one is built. The new bus is created right away when
    /// the engine is running; it does not wait for the old fade to finish.
    pub fn set_simulation(&mut self, factory: SimulationFactory) -> Result<()> {
        self.retire_current();
        self.current_factory = Some(factory.clone());

        let simulation = factory.build(self.context())?;
        let mut host = SimulationHost::new(factory.name(), simulation, self.audio.clone());
        host.on_enter();
        if self.audio.is_initialized() {
            host.on_audio_engine_init();
        }
        if self.paused {
            set_bus_muted(&self.audio, &host, true);
        }

        tracing::info!(simulation = factory.name(), paused = self.paused, "simulation entered");
        self.current = Some(host);
        Ok(())
    }

    /// Rebuilds the active simulation from its factory. Does nothing when no
    /// simulation is active.
    pub fn restart_simulation(&mut self) -> Result<()> {
        if self.current.is_none() {
            return Ok(());
        }
        match self.current_factory.clone() {
            Some(factory) => self.set_simulation(factory),
            None => Ok(()),
        }
    }

    pub fn pause(&mut self) {
        if self.paused {
            return;
        }
        let Some(host) = self.current.as_mut() else {
            return;
        };
        self.paused = true;
        set_bus_muted(&self.audio, host, true);
        host.on_pause();

        self.messages.show(PAUSED_MESSAGE, -1.0);
        self.controls.set_running_label(false);
        tracing::info!(simulation = host.name(), "simulation paused");
    }

    pub fn resume(&mut self) {
        if !self.paused {
            return;
        }
        let Some(host) = self.current.as_mut() else {
            return;
        };
        self.paused = false;
        self.clock.reset();
        set_bus_muted(&self.audio, host, false);
        host.on_resume();

        self.messages.hide();
        self.controls.set_running_label(true);
        tracing::info!(simulation = host.name(), "simulation resumed");
    }

    pub fn toggle_pause(&mut self) {
        if self.paused {
            self.resume();
        } else {
            self.pause();
        }
    }

    /// Flips the global audio flag. Independent of pausing.
    pub fn toggle_audio(&mut self) {
        self.audio_enabled = !self.audio_enabled;
        self.audio.set_enabled(self.audio_enabled);
        self.controls.set_audio_enabled_label(self.audio_enabled);
        tracing::info!(enabled = self.audio_enabled, "audio toggled");
    }

    /// Shows or hides the parameter panels. Returns whether they are visible.
    pub fn toggle_controls(&mut self) -> bool {
        let visible = self.container.toggle_panels();
        tracing::debug!(visible, "parameter panels toggled");
        visible
    }

    /// Bridges the engine's one-shot readiness signal to the active
    /// simulation. A simulation paused before audio was available gets its
    /// fresh bus muted straight away.
    pub fn on_audio_engine_init_ready(&mut self) {
        let Some(host) = self.current.as_mut() else {
            return;
        };
        host.on_audio_engine_init();
        if self.paused {
            set_bus_muted(&self.audio, host, true);
        }
    }

    /// Routes a control-surface press. Restart presses go through the
    /// surface's confirmation step; a declined restart returns `None`.
    pub fn press(&mut self, button: Button) -> Result<Option<ControlAction>> {
        let Some(action) = self.controls.press(button) else {
            tracing::debug!(?button, "control press cancelled");
            return Ok(None);
        };
        match action {
            ControlAction::ToggleAudio => self.toggle_audio(),
            ControlAction::TogglePlay => self.toggle_pause(),
            ControlAction::Restart => self.restart_simulation()?,
            ControlAction::ToggleControls => {
                self.toggle_controls();
            }
        }
        Ok(Some(action))
    }

    /// Feeds a user interaction to every listener (audio start gate, overlay
    /// shortcuts) and picks up any engine readiness it caused.
    pub fn dispatch_interaction(&mut self, interaction: Interaction) {
        self.hub.emit(interaction);
        self.process_engine_events();
    }

    /// Tracks the engine state and drains its readiness signal.
    pub fn process_engine_events(&mut self) {
        self.audio.poll();
        while self.engine_ready.try_recv().is_ok() {
            self.on_audio_engine_init_ready();
        }
    }

    /// One frame: engine bookkeeping, simulation update (skipped while
    /// paused), retired simulations and rendering.
    pub fn tick(&mut self) -> Result<()> {
        self.process_engine_events();
        self.poll_retiring();

        let delta = self.clock.next_delta_time();
        self.messages.advance(delta);
        let Some(host) = self.current.as_mut() else {
            return Ok(());
        };

        if !self.paused {
            host.update(delta);
        }
        self.frames += 1;

        let debug = self.container.debug();
        debug.add_text_category(LIFECYCLE_CATEGORY, "simulation", host.name());
        debug.add_text_category(LIFECYCLE_CATEGORY, "paused", self.paused);
        debug.add_text_category(LIFECYCLE_CATEGORY, "audio", self.audio_enabled);
        debug.add_text_category(LIFECYCLE_CATEGORY, "engine", self.audio.state());
        debug.add_text_category(LIFECYCLE_CATEGORY, "dt", format!("{delta:.4}"));

        self.renderer.render_frame(&self.scene, &self.camera)?;
        self.debug_text = self.container.debug().render();
        Ok(())
    }

    /// Process teardown: retires the active simulation, disposes the engine
    /// and flushes every pending audio stop.
    pub fn shutdown(&mut self) {
        self.retire_current();
        self.current_factory = None;
        self.audio.dispose();
        self.poll_retiring();
        tracing::info!("lifecycle manager shut down");
    }

    pub fn audio(&self) -> &AudioEngine {
        &self.audio
    }

    pub fn hub(&self) -> &InteractionHub {
        &self.hub
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    pub fn has_simulation(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current.as_ref().map(SimulationHost::name)
    }

    pub fn current_bus(&self) -> Option<ModuleBus> {
        self.current.as_ref().and_then(SimulationHost::bus)
    }

    /// Replaced simulations still waiting for their bus fade to finish.
    pub fn retiring_count(&self) -> usize {
        self.retiring.len()
    }

    pub fn message(&self) -> Option<&str> {
        self.messages.text()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Debug block rendered on the last frame.
    pub fn debug_text(&self) -> &str {
        &self.debug_text
    }

    fn context(&self) -> SimulationContext {
        SimulationContext {
            scene: self.scene.clone(),
            camera: self.camera.clone(),
            renderer: self.renderer.handle(),
            container: self.container.clone(),
            audio: self.audio.clone(),
        }
    }

    fn retire_current(&mut self) {
        let Some(mut host) = self.current.take() else {
            return;
        };
        host.on_exit();
        host.on_audio_engine_shutdown();
        host.dispose();
        let objects = self.scene.clear();
        self.container.clear();
        tracing::info!(simulation = host.name(), objects, "simulation exited");

        self.retiring.push(host);
        self.poll_retiring();
    }

    fn poll_retiring(&mut self) {
        self.retiring.retain_mut(|host| !host.poll_audio_stop());
    }
}

fn set_bus_muted(audio: &AudioEngine, host: &SimulationHost, muted: bool) {
    if let Some(bus) = host.bus() {
        let target = if muted { 0.0 } else { 1.0 };
        audio.ramp_bus(bus, target);
    }
}
