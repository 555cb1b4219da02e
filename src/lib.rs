pub mod config;
pub mod dsp; // Realtime-safe DSP primitives
pub mod error;
pub mod graph; // Node traits shared by voices and buses
pub mod io; // Note names, MIDI bytes, unit conversions
pub mod patch; // Serializable instrument state
pub mod synth; // Voices, modulation, buses and the engine facade
pub mod voices; // Drum hit voices for the rhythm bus

pub use config::EngineConfig;
pub use error::SynthError;
pub use patch::Patch;
pub use synth::engine::Synth;

pub const MAX_BLOCK_SIZE: usize = 2048;
pub const MAX_VOICES: usize = 16;

/// Default glide for control-rate parameter writes, in seconds.
pub const CONTROL_SMOOTH: f64 = 0.04;
