use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    scene::{Camera, Scene},
    Result,
};

/// Output surface settings simulations are allowed to adjust.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub clear_color: [f32; 3],
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            clear_color: [0.0; 3],
        }
    }
}

/// Shared handle over the renderer's settings, given to every simulation.
#[derive(Debug, Clone, Default)]
pub struct RendererHandle {
    settings: Arc<Mutex<RenderSettings>>,
}

impl RendererHandle {
    pub fn settings(&self) -> RenderSettings {
        *self.settings.lock()
    }

    pub fn set_clear_color(&self, color: [f32; 3]) {
        self.settings.lock().clear_color = color;
    }

    pub fn resize(&self, width: u32, height: u32) {
        let mut settings = self.settings.lock();
        settings.width = width;
        settings.height = height;
    }

    pub fn aspect(&self) -> f32 {
        let settings = self.settings.lock();
        settings.width as f32 / settings.height.max(1) as f32
    }
}

/// Rendering backend driven once per frame by the lifecycle manager.
pub trait FrameRenderer {
    fn handle(&self) -> RendererHandle;

    fn render_frame(&mut self, scene: &Scene, camera: &Camera) -> Result<()>;
}

/// Renderer without a GPU surface. It keeps track of what it was asked to
/// draw so drivers and tests can observe the frame loop.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    handle: RendererHandle,
    frames: u64,
    last_object_count: usize,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_object_count(&self) -> usize {
        self.last_object_count
    }
}

impl FrameRenderer for HeadlessRenderer {
    fn handle(&self) -> RendererHandle {
        self.handle.clone()
    }

    fn render_frame(&mut self, scene: &Scene, _camera: &Camera) -> Result<()> {
        self.frames += 1;
        self.last_object_count = scene.len();
        Ok(())
    }
}
