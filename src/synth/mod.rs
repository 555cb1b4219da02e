// Purpose: Voices, modulation, buses and the engine facade
// This layer sits above the DSP primitives and owns all realtime state

pub mod control;
pub mod drums;
pub mod engine;
pub mod fx;
pub mod master;
pub mod message;
pub mod modulation;
pub mod pool;
pub mod sidechain;
pub mod voice;

pub use engine::Synth;
pub use message::{Lane, MessageReceiver, SynthMessage};
