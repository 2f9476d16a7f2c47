//! Core library for the Freq Grid instrument.
//!
//! Pointer position on a 2D canvas is continuously mapped to musical
//! frequencies across a pool of independent voices, each bound to a moving
//! grid line. The crate owns the whole engine — scale mapping, line
//! spacing, voice management, rhythmic treatments and gesture automation —
//! while synthesis, rendering and input dispatch stay behind the interfaces
//! in [`backend`] and [`engine`]. Everything runs on the caller's thread and
//! takes time as an explicit parameter, so hosts drive it from a render
//! loop and tests drive it from plain functions.

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod gesture;
pub mod scale;
pub mod spacing;
pub mod treatment;
pub mod voice;

pub use backend::{AudioBackend, BackendStack, NullBackend, VoiceHandle};
pub use config::{AxisConfig, EngineConfig};
pub use engine::{Command, Instrument, Snapshot, VoiceView};
pub use error::{FreqGridError, Result};
pub use gesture::{GestureEvent, GestureRecorder, PointerState, RecorderMode};
pub use scale::{Axis, Scale};
pub use spacing::{RandomSpacingTable, SpacingMode};
pub use treatment::Treatment;
pub use voice::{Orientation, Selection, Voice, VoicePool, Waveform};
