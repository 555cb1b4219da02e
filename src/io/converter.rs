use crate::{
    error::SynthError,
    io::midi::MidiEvent,
    synth::message::{Lane, SynthMessage},
};

/// Canonical key names, index = semitone offset from C.
pub const KEY_ROOTS: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const KEY_ALIASES: [(&str, &str); 5] = [
    ("Db", "C#"),
    ("Eb", "D#"),
    ("Gb", "F#"),
    ("Ab", "G#"),
    ("Bb", "A#"),
];

/// Translate a decoded MIDI event into an engine message.
///
/// `channel_filter` of `None` listens on every channel. Note-on with
/// velocity 0 is a note-off.
pub fn midi_to_synth(midi: MidiEvent, channel_filter: Option<u8>) -> Option<SynthMessage> {
    let accepts = |channel: u8| channel_filter.map_or(true, |c| c == channel);
    match midi {
        MidiEvent::NoteOn {
            channel,
            key,
            velocity,
        } if accepts(channel) => {
            if velocity > 0 {
                Some(SynthMessage::NoteOn {
                    note: key,
                    velocity: velocity as f32 / 127.0,
                    lane: Lane::Manual,
                })
            } else {
                Some(SynthMessage::NoteOff { note: key })
            }
        }
        MidiEvent::NoteOff { channel, key, .. } if accepts(channel) => {
            Some(SynthMessage::NoteOff { note: key })
        }
        MidiEvent::ChannelPressure { channel, value } if accepts(channel) => {
            Some(SynthMessage::Aftertouch {
                value: value as f32 / 127.0,
            })
        }
        _ => None,
    }
}

/// A4 = 440 Hz = MIDI note 69. Fractional notes are allowed (tune offsets).
#[inline]
pub fn midi_to_freq(note: f32) -> f32 {
    440.0 * 2.0_f32.powf((note - 69.0) / 12.0)
}

#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

#[inline]
pub fn gain_to_db(gain: f32) -> f32 {
    20.0 * gain.max(1e-9).log10()
}

/// Parse names like `C4`, `f#2`, `Bb-1`. MIDI = 12·(octave + 1) + semitone,
/// clamped to 0..=127.
pub fn note_name_to_midi(name: &str) -> Result<u8, SynthError> {
    let invalid = || SynthError::InvalidNote(name.to_string());
    let trimmed = name.trim();
    let mut chars = trimmed.chars();

    let letter = chars.next().ok_or_else(invalid)?;
    let mut semitone: i32 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(invalid()),
    };

    let rest = chars.as_str();
    let octave_str = if let Some(r) = rest.strip_prefix('#') {
        semitone += 1;
        r
    } else if let Some(r) = rest.strip_prefix('b') {
        semitone -= 1;
        r
    } else {
        rest
    };

    // exactly one digit, optionally negative
    let digits = octave_str.strip_prefix('-').unwrap_or(octave_str);
    if digits.len() != 1 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let octave: i32 = octave_str.parse().map_err(|_| invalid())?;

    Ok((12 * (octave + 1) + semitone).clamp(0, 127) as u8)
}

/// Sharp-spelled name for a MIDI note, e.g. 61 → `C#4`.
pub fn midi_to_note_name(midi: u8) -> String {
    let midi = midi.min(127);
    let octave = (midi / 12) as i32 - 1;
    format!("{}{}", KEY_ROOTS[(midi % 12) as usize], octave)
}

/// Normalize a key name to one of the 12 canonical roots; anything
/// unrecognized becomes `C`.
pub fn normalize_key(key: &str) -> &'static str {
    let trimmed = key.trim();
    if let Some(root) = KEY_ROOTS.iter().find(|r| **r == trimmed) {
        return *root;
    }
    if let Some((_, root)) = KEY_ALIASES.iter().find(|(alias, _)| *alias == trimmed) {
        return *root;
    }
    let upper = trimmed.to_uppercase();
    KEY_ROOTS
        .iter()
        .find(|r| **r == upper)
        .copied()
        .unwrap_or(KEY_ROOTS[0])
}

/// Semitone offset of a key from C.
pub fn key_offset(key: &str) -> u8 {
    let root = normalize_key(key);
    KEY_ROOTS.iter().position(|r| *r == root).unwrap_or(0) as u8
}

/// Transpose a note by the key's offset, clamped to the MIDI range.
pub fn transpose(note: u8, key: &str) -> u8 {
    (note as u16 + key_offset(key) as u16).min(127) as u8
}

/// Anything that names a note: MIDI numbers or pitch names.
pub trait IntoNote {
    fn into_note(self) -> Result<u8, SynthError>;
}

impl IntoNote for u8 {
    fn into_note(self) -> Result<u8, SynthError> {
        (self as i32).into_note()
    }
}

impl IntoNote for i32 {
    fn into_note(self) -> Result<u8, SynthError> {
        u8::try_from(self)
            .ok()
            .filter(|note| *note <= 127)
            .ok_or_else(|| SynthError::InvalidNote(self.to_string()))
    }
}

impl IntoNote for &str {
    fn into_note(self) -> Result<u8, SynthError> {
        note_name_to_midi(self)
    }
}

impl IntoNote for &String {
    fn into_note(self) -> Result<u8, SynthError> {
        note_name_to_midi(self)
    }
}

impl IntoNote for String {
    fn into_note(self) -> Result<u8, SynthError> {
        note_name_to_midi(&self)
    }
}
