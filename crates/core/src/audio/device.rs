use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Arc,
};

use crate::AudioError;

/// Platform seam for the audio output context.
///
/// Opening may fail (no backend, blocked by policy); a successfully opened
/// device may still report that it is not running yet and only start once
/// a resume request is honoured.
pub trait AudioDevice: Send {
    /// Opens the output and returns the sample rate it will run at.
    fn open(&mut self, requested_rate: u32) -> Result<u32, AudioError>;

    fn is_running(&self) -> bool;

    /// Asks the platform to (re)start a suspended output.
    fn request_resume(&mut self);

    fn close(&mut self);
}

/// Device without a physical backend. Output is pulled by whoever drives
/// [`AudioEngine::render`](crate::AudioEngine::render).
///
/// A [`DeviceControl`] obtained from [`HeadlessDevice::control`] can hold the
/// device suspended and release it later, mimicking a platform that activates
/// asynchronously or suspends the output while backgrounded.
#[derive(Debug, Clone, Default)]
pub struct HeadlessDevice {
    state: Arc<DeviceState>,
}

#[derive(Debug, Default)]
struct DeviceState {
    open: AtomicBool,
    running: AtomicBool,
    /// When set, resume requests are ignored until released.
    held: AtomicBool,
    resume_requests: AtomicU32,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Device that stays suspended after opening until
    /// [`DeviceControl::activate`] is called.
    pub fn held() -> Self {
        let device = Self::default();
        device.state.held.store(true, Ordering::SeqCst);
        device
    }

    pub fn control(&self) -> DeviceControl {
        DeviceControl {
            state: self.state.clone(),
        }
    }
}

impl AudioDevice for HeadlessDevice {
    fn open(&mut self, requested_rate: u32) -> Result<u32, AudioError> {
        self.state.open.store(true, Ordering::SeqCst);
        let held = self.state.held.load(Ordering::SeqCst);
        self.state.running.store(!held, Ordering::SeqCst);
        Ok(requested_rate)
    }

    fn is_running(&self) -> bool {
        self.state.open.load(Ordering::SeqCst) && self.state.running.load(Ordering::SeqCst)
    }

    fn request_resume(&mut self) {
        self.state.resume_requests.fetch_add(1, Ordering::SeqCst);
        if self.state.open.load(Ordering::SeqCst) && !self.state.held.load(Ordering::SeqCst) {
            self.state.running.store(true, Ordering::SeqCst);
        }
    }

    fn close(&mut self) {
        self.state.open.store(false, Ordering::SeqCst);
        self.state.running.store(false, Ordering::SeqCst);
    }
}

/// Test and driver handle over a [`HeadlessDevice`].
#[derive(Debug, Clone)]
pub struct DeviceControl {
    state: Arc<DeviceState>,
}

impl DeviceControl {
    /// Lets the platform finish starting the output.
    pub fn activate(&self) {
        self.state.held.store(false, Ordering::SeqCst);
        if self.state.open.load(Ordering::SeqCst) {
            self.state.running.store(true, Ordering::SeqCst);
        }
    }

    /// Simulates a platform-imposed suspension. The output stays down until a
    /// resume request arrives.
    pub fn suspend(&self) {
        self.state.running.store(false, Ordering::SeqCst);
    }

    /// Like [`suspend`](Self::suspend) but also ignores resume requests until
    /// [`activate`](Self::activate).
    pub fn hold(&self) {
        self.state.held.store(true, Ordering::SeqCst);
        self.suspend();
    }

    pub fn is_open(&self) -> bool {
        self.state.open.load(Ordering::SeqCst)
    }

    pub fn resume_requests(&self) -> u32 {
        self.state.resume_requests.load(Ordering::SeqCst)
    }
}

/// Device for platforms where audio output cannot be created at all, or
/// where the platform refuses to start it.
#[derive(Debug, Clone)]
pub struct UnavailableDevice {
    error: AudioError,
}

impl UnavailableDevice {
    /// No output backend exists.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            error: AudioError::Unavailable(reason.into()),
        }
    }

    /// A backend exists but policy or permissions keep it from starting.
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            error: AudioError::Blocked(reason.into()),
        }
    }
}

impl AudioDevice for UnavailableDevice {
    fn open(&mut self, _requested_rate: u32) -> Result<u32, AudioError> {
        Err(self.error.clone())
    }

    fn is_running(&self) -> bool {
        false
    }

    fn request_resume(&mut self) {}

    fn close(&mut self) {}
}
