#[cfg(feature = "rtrb")]
use rtrb::Consumer;

use crate::{dsp::reverb::ConvolutionReverb, patch::Patch};

/// Where a note came from. Only the bass lane takes part in legato reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lane {
    #[default]
    Manual,
    Bass,
    Performance,
}

/// Control messages queued from other threads into the engine.
///
/// A patch that changes `fx.reverb.size` rebuilds the reverb on the thread
/// that handles it. Send `SetReverb` with a reverb of the new size first
/// (see `fx::build_reverb`) to keep that work off the audio thread.
#[derive(Debug)]
pub enum SynthMessage {
    NoteOn { note: u8, velocity: f32, lane: Lane },
    NoteOff { note: u8 },
    Aftertouch { value: f32 },
    AllNotesOff,
    Start,
    Stop,
    StartPerformance,
    StopPerformance,
    SetRhythm(bool),
    SetKey(String),
    LoadPreset(String),
    ApplyPatch(Box<Patch>),
    Randomize { seed: u32 },
    SetReverb(Box<ConvolutionReverb>),
}

pub trait MessageReceiver {
    fn pop(&mut self) -> Option<SynthMessage>;
}

#[cfg(feature = "rtrb")]
impl MessageReceiver for Consumer<SynthMessage> {
    fn pop(&mut self) -> Option<SynthMessage> {
        Consumer::pop(self).ok()
    }
}
