use std::{
    fmt,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    interaction::{InteractionHub, Listen, SubscriptionId},
    AudioConfig,
};

pub mod device;
pub mod graph;
pub mod param;
pub mod release;

use device::{AudioDevice, HeadlessDevice};
use graph::{AudioGraph, NodeId, Output, Waveform};
use release::ReleaseSignal;

/// Lifecycle of the platform output context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioContextState {
    Uninitialized,
    Initializing,
    Running,
    Suspended,
}

impl fmt::Display for AudioContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Suspended => "suspended",
        };
        f.write_str(label)
    }
}

/// Per-module gain stage feeding the master stage.
///
/// The handle is opaque: its gain is only ever written by the engine's
/// creation/release ramps and by the lifecycle manager's pause muting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleBus(NodeId);

/// Generator plus its gain stage, created by [`AudioEngine::create_sound_node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundNode {
    oscillator: NodeId,
    gain: NodeId,
}

type InitCallback = Box<dyn FnOnce(&AudioEngine) + Send>;

/// Owner of the audio output graph.
///
/// Cheap to clone; every clone drives the same graph. All operations are safe
/// while the engine is uninitialized and degrade to `None` or no-ops, which is
/// also where the engine stays for good if the device cannot be opened.
#[derive(Clone)]
pub struct AudioEngine {
    inner: Arc<Mutex<EngineInner>>,
}

struct EngineInner {
    config: AudioConfig,
    state: AudioContextState,
    enabled: bool,
    unavailable: bool,
    device: Box<dyn AudioDevice>,
    graph: Option<AudioGraph>,
    master: Option<NodeId>,
    releases: Vec<PendingRelease>,
    init_callbacks: Vec<InitCallback>,
    hub: Option<InteractionHub>,
    gate: Option<SubscriptionId>,
    resume_listener: Option<SubscriptionId>,
}

struct PendingRelease {
    bus: NodeId,
    requested_at: f64,
    window: f64,
    signal: ReleaseSignal,
}

impl AudioEngine {
    pub fn new(config: AudioConfig, device: impl AudioDevice + 'static) -> Self {
        let enabled = config.start_enabled;
        Self {
            inner: Arc::new(Mutex::new(EngineInner {
                config,
                state: AudioContextState::Uninitialized,
                enabled,
                unavailable: false,
                device: Box::new(device),
                graph: None,
                master: None,
                releases: Vec::new(),
                init_callbacks: Vec::new(),
                hub: None,
                gate: None,
                resume_listener: None,
            })),
        }
    }

    /// Engine backed by a [`HeadlessDevice`] that starts as soon as it is opened.
    pub fn headless(config: AudioConfig) -> Self {
        Self::new(config, HeadlessDevice::new())
    }

    pub fn state(&self) -> AudioContextState {
        self.inner.lock().state
    }

    /// True once the output context has been running, including while it is
    /// suspended by the platform.
    pub fn is_initialized(&self) -> bool {
        matches!(
            self.state(),
            AudioContextState::Running | AudioContextState::Suspended
        )
    }

    /// True when the device refused to open; the engine will not retry.
    pub fn is_unavailable(&self) -> bool {
        self.inner.lock().unavailable
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().enabled
    }

    pub fn config(&self) -> AudioConfig {
        self.inner.lock().config.clone()
    }

    /// Queues a one-shot callback for the moment the context first reaches
    /// [`AudioContextState::Running`]. Runs immediately if it already has.
    pub fn on_initialized<F>(&self, callback: F)
    where
        F: FnOnce(&AudioEngine) + Send + 'static,
    {
        {
            let mut inner = self.inner.lock();
            if !inner.is_initialized() {
                inner.init_callbacks.push(Box::new(callback));
                return;
            }
        }
        callback(self);
    }

    /// Defers start-up to the first interaction seen on `hub`. The gate
    /// listener removes itself after that event. Calling this again, or after
    /// the engine has started, does nothing.
    pub fn initialize_on_first_interaction(&self, hub: &InteractionHub) {
        let mut inner = self.inner.lock();
        if inner.state != AudioContextState::Uninitialized
            || inner.unavailable
            || inner.gate.is_some()
        {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let id = hub.subscribe(move |_| {
            if let Some(engine) = upgrade(&weak) {
                engine.inner.lock().gate = None;
                engine.handle_interaction();
            }
            Listen::Remove
        });
        inner.hub = Some(hub.clone());
        inner.gate = Some(id);
        tracing::debug!("audio start deferred until first interaction");
    }

    /// Starts the output context right away.
    pub fn initialize(&self) {
        let callbacks = {
            let mut inner = self.inner.lock();
            if inner.state != AudioContextState::Uninitialized {
                return;
            }
            inner.start_context()
        };
        self.fire(callbacks);
    }

    /// Reaction to a qualifying user interaction: starts the context on the
    /// first one and re-attempts a resume while the output is not running.
    /// If the device still is not running afterwards, the next interaction
    /// retries.
    pub fn handle_interaction(&self) {
        let callbacks = {
            let mut inner = self.inner.lock();
            let callbacks = match inner.state {
                AudioContextState::Uninitialized => inner.start_context(),
                AudioContextState::Initializing | AudioContextState::Suspended => {
                    inner.device.request_resume();
                    inner.sync_device_state()
                }
                AudioContextState::Running => Vec::new(),
            };
            inner.sync_resume_listener(Arc::downgrade(&self.inner));
            callbacks
        };
        self.fire(callbacks);
    }

    /// Per-tick driver step that tracks the device: finishes initialization
    /// once the output reports running and follows platform suspensions.
    /// While the output is down, a resume listener stays armed on the hub.
    pub fn poll(&self) {
        let callbacks = {
            let mut inner = self.inner.lock();
            let callbacks = inner.sync_device_state();
            inner.sync_resume_listener(Arc::downgrade(&self.inner));
            callbacks
        };
        self.fire(callbacks);
    }

    /// Records the enabled flag and fades the master stage toward it.
    pub fn set_enabled(&self, enabled: bool) {
        let mut inner = self.inner.lock();
        inner.enabled = enabled;
        let tau = inner.config.fade_time_constant;
        let target = if enabled { 1.0 } else { 0.0 };
        if let (Some(master), Some(graph)) = (inner.master, inner.graph.as_mut()) {
            let now = graph.current_time();
            if let Some(gain) = graph.gain_mut(master) {
                gain.set_target(target, now, tau);
                tracing::debug!(enabled, at = now, "master stage ramping");
            }
        }
    }

    /// Creates a bus connected to the master stage, fading in from silence.
    pub fn create_bus(&self) -> Option<ModuleBus> {
        let mut inner = self.inner.lock();
        if !inner.is_initialized() {
            return None;
        }
        let tau = inner.config.fade_time_constant;
        let master = inner.master?;
        let graph = inner.graph.as_mut()?;

        let bus = graph.create_gain(0.0);
        graph.connect(bus, Output::Node(master));
        let now = graph.current_time();
        graph.gain_mut(bus)?.set_target(1.0, now, tau);
        tracing::debug!(?bus, at = now, "module bus created");
        Some(ModuleBus(bus))
    }

    /// Fades `bus` out and disconnects it once `release_fade + release_guard`
    /// seconds of audio have elapsed. Releasing nothing, an already released
    /// bus or anything on an uninitialized engine resolves immediately.
    pub fn release_bus(&self, bus: Option<ModuleBus>) -> ReleaseSignal {
        let mut inner = self.inner.lock();
        let now = inner.current_time();
        let Some(ModuleBus(id)) = bus else {
            return ReleaseSignal::resolved(now);
        };
        if !inner.is_initialized() {
            return ReleaseSignal::resolved(now);
        }
        if let Some(pending) = inner.releases.iter().find(|pending| pending.bus == id) {
            return pending.signal.clone();
        }

        let tau = inner.config.fade_time_constant;
        let window = inner.config.release_window();
        let Some(gain) = inner.graph.as_mut().and_then(|graph| graph.gain_mut(id)) else {
            return ReleaseSignal::resolved(now);
        };
        gain.set_target(0.0, now, tau);

        let signal = ReleaseSignal::pending(now);
        inner.releases.push(PendingRelease {
            bus: id,
            requested_at: now,
            window,
            signal: signal.clone(),
        });
        tracing::debug!(bus = ?id, at = now, window, "module bus releasing");
        signal
    }

    /// Retargets a live bus. Buses that are already releasing are left alone.
    pub(crate) fn ramp_bus(&self, bus: ModuleBus, target: f32) -> bool {
        let mut inner = self.inner.lock();
        if !inner.is_initialized() || inner.releases.iter().any(|pending| pending.bus == bus.0) {
            return false;
        }
        let tau = inner.config.fade_time_constant;
        let Some(graph) = inner.graph.as_mut() else {
            return false;
        };
        let now = graph.current_time();
        match graph.gain_mut(bus.0) {
            Some(gain) => {
                gain.set_target(target, now, tau);
                true
            }
            None => false,
        }
    }

    /// Starts a generator routed through its own gain stage into `target`, or
    /// into the master stage when no bus is given.
    pub fn create_sound_node(
        &self,
        waveform: Waveform,
        frequency: f32,
        target: Option<ModuleBus>,
    ) -> Option<SoundNode> {
        let mut inner = self.inner.lock();
        if !inner.is_initialized() {
            return None;
        }
        let level = inner.config.sound_level;
        let destination = match target {
            Some(ModuleBus(bus)) => bus,
            None => inner.master?,
        };
        let graph = inner.graph.as_mut()?;
        if graph.gain(destination).is_none() {
            return None;
        }

        let gain = graph.create_gain(level);
        let oscillator = graph.create_oscillator(waveform, frequency);
        graph.connect(gain, Output::Node(destination));
        graph.connect(oscillator, Output::Node(gain));
        Some(SoundNode { oscillator, gain })
    }

    pub fn set_sound_frequency(&self, sound: SoundNode, frequency: f32) -> bool {
        let mut inner = self.inner.lock();
        inner
            .graph
            .as_mut()
            .map(|graph| graph.set_frequency(sound.oscillator, frequency))
            .unwrap_or(false)
    }

    /// Current oscillator frequency, `None` once the sound is gone.
    pub fn sound_frequency(&self, sound: SoundNode) -> Option<f32> {
        let inner = self.inner.lock();
        inner.graph.as_ref()?.frequency(sound.oscillator)
    }

    /// Fades the sound's gain stage toward `level`.
    pub fn set_sound_level(&self, sound: SoundNode, level: f32) -> bool {
        let mut inner = self.inner.lock();
        let tau = inner.config.fade_time_constant;
        let Some(graph) = inner.graph.as_mut() else {
            return false;
        };
        let now = graph.current_time();
        match graph.gain_mut(sound.gain) {
            Some(gain) => {
                gain.set_target(level.max(0.0), now, tau);
                true
            }
            None => false,
        }
    }

    pub fn stop_sound(&self, sound: SoundNode) {
        let mut inner = self.inner.lock();
        if let Some(graph) = inner.graph.as_mut() {
            graph.remove(sound.gain);
        }
    }

    /// Pulls the next block of mono output. Returns the number of frames
    /// produced; while the context is not running the block is silent and
    /// the graph clock does not move.
    pub fn render(&self, out: &mut [f32]) -> usize {
        let mut inner = self.inner.lock();
        if inner.state != AudioContextState::Running {
            out.fill(0.0);
            return 0;
        }
        let Some(graph) = inner.graph.as_mut() else {
            out.fill(0.0);
            return 0;
        };
        graph.render(out);
        inner.complete_due_releases();
        out.len()
    }

    /// Renders and discards `seconds` of output.
    pub fn advance(&self, seconds: f64) {
        let Some(rate) = self.sample_rate() else {
            return;
        };
        let mut remaining = (seconds * rate as f64).round() as usize;
        let mut block = [0.0f32; 256];
        while remaining > 0 {
            let len = remaining.min(block.len());
            if self.render(&mut block[..len]) == 0 {
                return;
            }
            remaining -= len;
        }
    }

    /// Tears the graph down and returns to [`AudioContextState::Uninitialized`].
    /// Pending releases resolve immediately.
    pub fn dispose(&self) {
        let mut inner = self.inner.lock();
        if let Some(hub) = inner.hub.take() {
            if let Some(id) = inner.gate.take() {
                hub.unsubscribe(id);
            }
            if let Some(id) = inner.resume_listener.take() {
                hub.unsubscribe(id);
            }
        }
        let now = inner.current_time();
        for pending in inner.releases.drain(..) {
            pending.signal.resolve(now);
        }
        if inner.graph.take().is_some() {
            inner.device.close();
            tracing::info!("audio engine disposed");
        }
        inner.master = None;
        inner.state = AudioContextState::Uninitialized;
    }

    /// Graph time in seconds; zero when there is no graph.
    pub fn current_time(&self) -> f64 {
        self.inner.lock().current_time()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.inner.lock().graph.as_ref().map(AudioGraph::sample_rate)
    }

    pub fn master_gain(&self) -> Option<f32> {
        let inner = self.inner.lock();
        inner.param_value(inner.master?)
    }

    pub fn master_target(&self) -> Option<f32> {
        let inner = self.inner.lock();
        let master = inner.master?;
        inner.graph.as_ref()?.gain(master).map(|gain| gain.target())
    }

    pub fn bus_gain(&self, bus: ModuleBus) -> Option<f32> {
        self.inner.lock().param_value(bus.0)
    }

    pub fn bus_target(&self, bus: ModuleBus) -> Option<f32> {
        let inner = self.inner.lock();
        inner.graph.as_ref()?.gain(bus.0).map(|gain| gain.target())
    }

    /// Whether the bus is still part of the graph and routed to the output.
    pub fn is_bus_connected(&self, bus: ModuleBus) -> bool {
        let inner = self.inner.lock();
        inner
            .graph
            .as_ref()
            .map(|graph| graph.is_audible_path(bus.0))
            .unwrap_or(false)
    }

    pub fn is_sound_connected(&self, sound: SoundNode) -> bool {
        let inner = self.inner.lock();
        inner
            .graph
            .as_ref()
            .map(|graph| graph.is_audible_path(sound.oscillator))
            .unwrap_or(false)
    }

    pub fn pending_releases(&self) -> usize {
        self.inner.lock().releases.len()
    }

    pub fn node_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.graph.as_ref().map(AudioGraph::node_count).unwrap_or(0)
    }

    fn fire(&self, callbacks: Vec<InitCallback>) {
        for callback in callbacks {
            callback(self);
        }
    }
}

impl fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("AudioEngine")
            .field("state", &inner.state)
            .field("enabled", &inner.enabled)
            .field("unavailable", &inner.unavailable)
            .field("pending_releases", &inner.releases.len())
            .finish()
    }
}

fn upgrade(weak: &Weak<Mutex<EngineInner>>) -> Option<AudioEngine> {
    weak.upgrade().map(|inner| AudioEngine { inner })
}

impl EngineInner {
    fn is_initialized(&self) -> bool {
        matches!(
            self.state,
            AudioContextState::Running | AudioContextState::Suspended
        )
    }

    fn current_time(&self) -> f64 {
        self.graph
            .as_ref()
            .map(AudioGraph::current_time)
            .unwrap_or(0.0)
    }

    fn param_value(&self, id: NodeId) -> Option<f32> {
        let graph = self.graph.as_ref()?;
        graph.gain(id).map(|gain| gain.value_at(graph.current_time()))
    }

    /// Uninitialized -> Initializing, and on to Running if the device is
    /// already live. Returns the callbacks to run once the lock is released.
    fn start_context(&mut self) -> Vec<InitCallback> {
        if self.unavailable {
            return Vec::new();
        }

        let sample_rate = match self.device.open(self.config.sample_rate) {
            Ok(rate) => rate,
            Err(err) => {
                tracing::warn!(%err, "audio output unavailable, continuing without sound");
                self.unavailable = true;
                return Vec::new();
            }
        };

        let mut graph = AudioGraph::new(sample_rate);
        let master = graph.create_gain(0.0);
        graph.connect(master, Output::Destination);
        let target = if self.enabled { 1.0 } else { 0.0 };
        let now = graph.current_time();
        if let Some(gain) = graph.gain_mut(master) {
            gain.set_target(target, now, self.config.fade_time_constant);
        }

        self.graph = Some(graph);
        self.master = Some(master);
        self.state = AudioContextState::Initializing;
        tracing::info!(sample_rate, "audio context initializing");

        if !self.device.is_running() {
            self.device.request_resume();
        }
        self.sync_device_state()
    }

    fn sync_device_state(&mut self) -> Vec<InitCallback> {
        let running = self.device.is_running();
        match (self.state, running) {
            (AudioContextState::Initializing, true) => {
                self.state = AudioContextState::Running;
                tracing::info!("audio context running");
                std::mem::take(&mut self.init_callbacks)
            }
            (AudioContextState::Running, false) => {
                self.state = AudioContextState::Suspended;
                tracing::info!("audio context suspended by platform");
                Vec::new()
            }
            (AudioContextState::Suspended, true) => {
                self.state = AudioContextState::Running;
                tracing::info!("audio context resumed");
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Initializing or Suspended with the device down: the next interaction
    /// on the hub asks the device to resume again. Once the output runs, a
    /// leftover listener is dropped.
    fn sync_resume_listener(&mut self, weak: Weak<Mutex<EngineInner>>) {
        let waiting = matches!(
            self.state,
            AudioContextState::Initializing | AudioContextState::Suspended
        ) && !self.device.is_running();
        let Some(hub) = self.hub.as_ref() else {
            return;
        };
        if !waiting {
            if let Some(id) = self.resume_listener.take() {
                hub.unsubscribe(id);
            }
            return;
        }
        if self.resume_listener.is_some() {
            return;
        }
        let id = hub.subscribe(move |_| {
            if let Some(engine) = upgrade(&weak) {
                engine.inner.lock().resume_listener = None;
                engine.handle_interaction();
            }
            Listen::Remove
        });
        self.resume_listener = Some(id);
    }

    fn complete_due_releases(&mut self) {
        let now = self.current_time();
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.releases)
            .into_iter()
            .partition(|pending| now - pending.requested_at >= pending.window);
        self.releases = waiting;

        for pending in due {
            if let Some(graph) = self.graph.as_mut() {
                graph.remove(pending.bus);
            }
            pending.signal.resolve(now);
            tracing::debug!(bus = ?pending.bus, at = now, "module bus disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::device::UnavailableDevice;
    use super::*;
    use crate::interaction::Interaction;

    fn config() -> AudioConfig {
        AudioConfig {
            sample_rate: 8_000,
            ..AudioConfig::default()
        }
    }

    fn running_engine() -> AudioEngine {
        let engine = AudioEngine::headless(config());
        engine.initialize();
        engine
    }

    #[test]
    fn starts_on_first_interaction_and_fires_callback_once() {
        let engine = AudioEngine::headless(config());
        let hub = InteractionHub::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        engine.on_initialized(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        engine.initialize_on_first_interaction(&hub);
        assert_eq!(engine.state(), AudioContextState::Uninitialized);
        assert!(engine.create_bus().is_none());

        hub.emit(Interaction::Pointer);
        hub.emit(Interaction::Key('x'));

        assert_eq!(engine.state(), AudioContextState::Running);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn initialization_request_is_idempotent() {
        let engine = AudioEngine::headless(config());
        let hub = InteractionHub::new();
        engine.initialize_on_first_interaction(&hub);
        engine.initialize_on_first_interaction(&hub);
        assert_eq!(hub.listener_count(), 1);

        hub.emit(Interaction::Pointer);
        engine.initialize_on_first_interaction(&hub);
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn master_fades_in_from_silence() {
        let engine = running_engine();
        assert_eq!(engine.master_gain(), Some(0.0));
        assert_eq!(engine.master_target(), Some(1.0));

        engine.advance(0.01);
        let partial = engine.master_gain().unwrap();
        assert!(partial > 0.0 && partial < 1.0);

        engine.advance(0.3);
        assert!(engine.master_gain().unwrap() > 0.999);
    }

    #[test]
    fn disabled_before_start_keeps_master_silent() {
        let engine = AudioEngine::headless(config());
        engine.set_enabled(false);
        engine.initialize();
        engine.advance(0.2);
        assert_eq!(engine.master_target(), Some(0.0));
        assert_eq!(engine.master_gain(), Some(0.0));
    }

    #[test]
    fn toggling_settles_monotonically_on_the_flag() {
        let engine = running_engine();
        engine.advance(0.3);

        for enabled in [false, true, false, false, true] {
            engine.set_enabled(enabled);
            let target = if enabled { 1.0 } else { 0.0 };
            let mut previous = engine.master_gain().unwrap();
            for _ in 0..40 {
                engine.advance(0.005);
                let value = engine.master_gain().unwrap();
                let towards = (target - value).abs() <= (target - previous).abs() + 1e-6;
                assert!(towards, "gain moved away from {target}");
                previous = value;
            }
            assert!((engine.master_gain().unwrap() - target).abs() < 1e-3);
        }
    }

    #[test]
    fn bus_fades_in_and_release_resolves_after_window() {
        let engine = running_engine();
        let bus = engine.create_bus().unwrap();
        assert_eq!(engine.bus_gain(bus), Some(0.0));
        assert_eq!(engine.bus_target(bus), Some(1.0));
        engine.advance(0.2);
        assert!(engine.bus_gain(bus).unwrap() > 0.99);

        let window = engine.config().release_window();
        let signal = engine.release_bus(Some(bus));
        engine.advance(window * 0.9);
        assert!(!signal.is_resolved());
        assert!(engine.is_bus_connected(bus));

        engine.advance(window);
        assert!(signal.is_resolved());
        assert!(signal.elapsed().unwrap() >= window);
        assert!(!engine.is_bus_connected(bus));
        assert_eq!(engine.bus_gain(bus), None);
    }

    #[test]
    fn release_never_resolves_early_across_block_sizes() {
        let engine = running_engine();
        let window = engine.config().release_window();
        let mut block = vec![0.0; 1];
        for size in [1, 7, 64, 333, 1024, 4096] {
            block.resize(size, 0.0);
            let bus = engine.create_bus().unwrap();
            let signal = engine.release_bus(Some(bus));
            while !signal.is_resolved() {
                engine.render(&mut block);
            }
            assert!(signal.elapsed().unwrap() >= window, "block size {size}");
        }
    }

    #[test]
    fn redundant_release_is_safe() {
        let engine = running_engine();
        let bus = engine.create_bus().unwrap();
        let first = engine.release_bus(Some(bus));
        let second = engine.release_bus(Some(bus));
        assert_eq!(engine.pending_releases(), 1);

        engine.advance(1.0);
        assert!(first.is_resolved() && second.is_resolved());
        assert!(engine.release_bus(Some(bus)).is_resolved());
        assert!(engine.release_bus(None).is_resolved());
    }

    #[test]
    fn uninitialized_engine_degrades_to_no_ops() {
        let engine = AudioEngine::headless(config());
        assert!(engine.create_bus().is_none());
        assert!(engine
            .create_sound_node(Waveform::Sine, 440.0, None)
            .is_none());
        assert!(engine.release_bus(None).is_resolved());
        engine.set_enabled(false);
        assert!(!engine.is_enabled());
        assert_eq!(engine.master_gain(), None);

        let mut block = [1.0; 16];
        assert_eq!(engine.render(&mut block), 0);
        assert!(block.iter().all(|s| *s == 0.0));
        engine.dispose();
    }

    #[test]
    fn unavailable_device_leaves_engine_uninitialized_for_good() {
        let engine = AudioEngine::new(config(), UnavailableDevice::new("blocked"));
        let hub = InteractionHub::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        engine.on_initialized(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        engine.initialize_on_first_interaction(&hub);

        hub.emit(Interaction::Pointer);
        engine.handle_interaction();
        engine.poll();

        assert!(engine.is_unavailable());
        assert_eq!(engine.state(), AudioContextState::Uninitialized);
        assert!(engine.create_bus().is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn deferred_activation_goes_through_initializing() {
        let device = HeadlessDevice::held();
        let control = device.control();
        let engine = AudioEngine::new(config(), device);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        engine.on_initialized(move |engine| {
            assert!(engine.is_initialized());
            counter.fetch_add(1, Ordering::SeqCst);
        });

        engine.handle_interaction();
        assert_eq!(engine.state(), AudioContextState::Initializing);
        assert!(!engine.is_initialized());
        assert!(engine.create_bus().is_none());

        control.activate();
        engine.poll();
        assert_eq!(engine.state(), AudioContextState::Running);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn suspension_recovers_on_next_interaction() {
        let device = HeadlessDevice::new();
        let control = device.control();
        let engine = AudioEngine::new(config(), device);
        let hub = InteractionHub::new();
        engine.initialize_on_first_interaction(&hub);
        hub.emit(Interaction::Pointer);
        let bus = engine.create_bus().unwrap();

        control.suspend();
        engine.poll();
        assert_eq!(engine.state(), AudioContextState::Suspended);
        assert!(engine.is_initialized());
        let frozen = engine.current_time();
        engine.advance(0.5);
        assert_eq!(engine.current_time(), frozen);
        assert_eq!(hub.listener_count(), 1);

        hub.emit(Interaction::Key(' '));
        assert_eq!(engine.state(), AudioContextState::Running);
        assert!(engine.is_bus_connected(bus));
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn second_interaction_finishes_a_stalled_start() {
        let device = HeadlessDevice::held();
        let control = device.control();
        let engine = AudioEngine::new(config(), device);
        let hub = InteractionHub::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        engine.on_initialized(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        engine.initialize_on_first_interaction(&hub);

        hub.emit(Interaction::Pointer);
        assert_eq!(engine.state(), AudioContextState::Initializing);
        assert_eq!(hub.listener_count(), 1);

        // Activation lands while the platform has already parked the output.
        control.activate();
        control.suspend();
        engine.poll();
        assert_eq!(engine.state(), AudioContextState::Initializing);
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        hub.emit(Interaction::Pointer);
        engine.poll();
        assert_eq!(engine.state(), AudioContextState::Running);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn held_suspension_waits_for_activation() {
        let device = HeadlessDevice::new();
        let control = device.control();
        let engine = AudioEngine::new(config(), device);
        let hub = InteractionHub::new();
        engine.initialize_on_first_interaction(&hub);
        hub.emit(Interaction::Pointer);
        assert_eq!(engine.state(), AudioContextState::Running);

        control.hold();
        engine.poll();
        assert_eq!(engine.state(), AudioContextState::Suspended);

        let requests = control.resume_requests();
        hub.emit(Interaction::Pointer);
        hub.emit(Interaction::Key('k'));
        assert_eq!(engine.state(), AudioContextState::Suspended);
        assert_eq!(control.resume_requests(), requests + 2);
        assert_eq!(hub.listener_count(), 1);

        control.activate();
        hub.emit(Interaction::Pointer);
        assert_eq!(engine.state(), AudioContextState::Running);
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn running_again_drops_the_resume_listener() {
        let device = HeadlessDevice::held();
        let control = device.control();
        let engine = AudioEngine::new(config(), device);
        let hub = InteractionHub::new();
        engine.initialize_on_first_interaction(&hub);
        hub.emit(Interaction::Pointer);
        assert_eq!(hub.listener_count(), 1);

        control.activate();
        engine.poll();
        assert_eq!(engine.state(), AudioContextState::Running);
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn blocked_device_never_starts() {
        let engine = AudioEngine::new(config(), UnavailableDevice::blocked("autoplay"));
        let hub = InteractionHub::new();
        engine.initialize_on_first_interaction(&hub);
        hub.emit(Interaction::Pointer);

        assert!(engine.is_unavailable());
        assert_eq!(engine.state(), AudioContextState::Uninitialized);
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn callback_registered_after_start_runs_immediately() {
        let engine = running_engine();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        engine.on_initialized(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sound_nodes_follow_their_bus() {
        let engine = running_engine();
        let bus = engine.create_bus().unwrap();
        let sound = engine
            .create_sound_node(Waveform::Sine, 220.0, Some(bus))
            .unwrap();
        assert!(engine.is_sound_connected(sound));
        assert!(engine.set_sound_frequency(sound, 330.0));
        assert_eq!(engine.sound_frequency(sound), Some(330.0));
        assert!(engine.set_sound_level(sound, 0.25));

        let signal = engine.release_bus(Some(bus));
        engine.advance(1.0);
        assert!(signal.is_resolved());
        assert!(!engine.is_sound_connected(sound));
        assert!(!engine.set_sound_level(sound, 0.5));
        assert_eq!(engine.sound_frequency(sound), None);
        assert!(engine
            .create_sound_node(Waveform::Sine, 220.0, Some(bus))
            .is_none());
    }

    #[test]
    fn renders_audible_output_through_bus() {
        let engine = running_engine();
        let bus = engine.create_bus().unwrap();
        engine.create_sound_node(Waveform::Square, 100.0, Some(bus));
        engine.advance(0.3);

        let mut block = vec![0.0; 800];
        assert_eq!(engine.render(&mut block), 800);
        let peak = block.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!((peak - 0.5).abs() < 0.01);
    }

    #[test]
    fn dispose_resolves_pending_releases_and_resets_state() {
        let device = HeadlessDevice::new();
        let control = device.control();
        let engine = AudioEngine::new(config(), device);
        engine.initialize();
        let bus = engine.create_bus().unwrap();
        let signal = engine.release_bus(Some(bus));
        engine.dispose();

        assert!(signal.is_resolved());
        assert!(engine.release_bus(Some(bus)).is_resolved());
        assert_eq!(engine.pending_releases(), 0);
        assert!(!control.is_open());
        assert_eq!(engine.state(), AudioContextState::Uninitialized);
        assert!(engine.create_bus().is_none());
        assert_eq!(engine.node_count(), 0);
    }

    #[test]
    fn disposed_engine_waits_for_a_new_start_request() {
        let engine = AudioEngine::headless(config());
        let hub = InteractionHub::new();
        engine.initialize_on_first_interaction(&hub);
        engine.dispose();
        assert_eq!(hub.listener_count(), 0);

        hub.emit(Interaction::Pointer);
        assert_eq!(engine.state(), AudioContextState::Uninitialized);

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        engine.on_initialized(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        engine.initialize_on_first_interaction(&hub);
        hub.emit(Interaction::Pointer);
        assert_eq!(engine.state(), AudioContextState::Running);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(engine.create_bus().is_some());
    }
}
