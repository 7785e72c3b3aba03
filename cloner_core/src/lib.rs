//! Core of the alphabet voice-cloning service: the inference-engine seam,
//! the fixed phrase table, the batch synthesis driver, and clip/archive
//! persistence. The HTTP surface lives in the `server` crate.

pub mod alphabet;
pub mod archive;
pub mod batch;
mod engine;
mod wav;

pub use engine::{CloningEngine, EngineConfig, F5Engine, ReferenceVoice, VocoderKind};
pub use wav::write_wav;
