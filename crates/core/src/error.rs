use crate::voice::Orientation;

/// Result alias that carries the custom [`FreqGridError`] type.
pub type Result<T> = std::result::Result<T, FreqGridError>;

/// Common error type for the core crate.
///
/// Only conditions the engine genuinely has to report are represented here.
/// Out-of-range configuration (line counts, transpose, unknown registry keys)
/// is clamped or ignored at the boundary and never turns into an error.
#[derive(Debug, thiserror::Error)]
pub enum FreqGridError {
    /// Free-form message, mostly used by audio backend implementations that
    /// have no richer failure description to offer.
    #[error("{0}")]
    Message(String),
    /// A voice operation was rejected inside an audio backend.
    #[error("audio backend `{backend}` rejected {operation}")]
    Backend {
        backend: &'static str,
        operation: &'static str,
    },
    /// A command addressed a voice slot that does not exist.
    #[error("no {orientation} voice at index {index}")]
    InvalidSlot {
        orientation: Orientation,
        index: usize,
    },
    /// The gesture recorder rejected a state transition.
    #[error("recorder: {0}")]
    Recorder(&'static str),
}

impl FreqGridError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<String> for FreqGridError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
