// Purpose - external interfaces, format conversions

pub mod converter;
pub mod midi;

pub use converter::{db_to_gain, midi_to_freq, IntoNote};
pub use midi::MidiEvent;
