//! Core library for the SimStage simulation host.
//!
//! A single [`LifecycleManager`] owns the active simulation and drives it
//! through enter, pause, resume and exit. Every simulation receives its own
//! gain bus from the shared [`AudioEngine`], which only starts after the first
//! user interaction and fades buses out before disconnecting them. Rendering,
//! timing and the overlay widgets sit behind small traits so the whole host
//! runs headless in tests and in the command line driver.

pub mod audio;
pub mod config;
pub mod error;
pub mod interaction;
pub mod lifecycle;
pub mod meter;
pub mod render;
pub mod scene;
pub mod simulation;
pub mod timeline;
pub mod ui;

pub use audio::{
    device::{AudioDevice, DeviceControl, HeadlessDevice, UnavailableDevice},
    graph::Waveform,
    release::ReleaseSignal,
    AudioContextState, AudioEngine, ModuleBus, SoundNode,
};
pub use config::{AppConfig, AudioConfig, DebugConfig, FrameConfig};
pub use error::{AudioError, Result, SimStageError};
pub use interaction::{Interaction, InteractionHub, Listen, SubscriptionId};
pub use lifecycle::LifecycleManager;
pub use meter::{MeterReading, MeterSummary, OutputMeter};
pub use render::{FrameRenderer, HeadlessRenderer, RenderSettings, RendererHandle};
pub use scene::{Camera, CameraPose, ObjectId, ObjectKind, Scene, SceneObject};
pub use simulation::{Simulation, SimulationContext, SimulationFactory, SimulationHost};
pub use timeline::{DeltaSource, FixedStepClock, ManualClock, SystemClock};
pub use ui::{
    Button, ButtonsOverlay, Confirm, ControlAction, ControlSurface, DebugOverlay, MessageOverlay,
    ParamChange, ParamPanel, ParamReceiver, ParamSpec,
};
