/// Result alias that carries the custom [`SimStageError`] type.
pub type Result<T> = std::result::Result<T, SimStageError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum SimStageError {
    /// Free-form failure surfaced to the application layer.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// The spectrum meter failed to run its transform.
    #[error("fft failed: {0}")]
    Fft(#[from] realfft::FftError),
    /// A simulation factory refused to build its module.
    #[error("failed to construct simulation `{simulation}`: {reason}")]
    Construction { simulation: String, reason: String },
    /// Caller handed in data the operation cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

impl SimStageError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Construction failure for the named simulation.
    pub fn construction(simulation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Construction {
            simulation: simulation.into(),
            reason: reason.into(),
        }
    }
}

impl From<&str> for SimStageError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for SimStageError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

/// Failures reported by an audio output device.
///
/// These never escape the [`AudioEngine`](crate::AudioEngine): a device that
/// cannot be opened leaves the engine uninitialized for good.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioError {
    /// No output backend exists on this platform.
    #[error("audio output unavailable: {0}")]
    Unavailable(String),
    /// The platform refused to start audio (autoplay policy, permissions).
    #[error("audio output blocked: {0}")]
    Blocked(String),
}
