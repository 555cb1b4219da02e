use thiserror::Error;

/// Errors surfaced by the synth engine.
///
/// Degraded-but-continuing conditions (unknown wavetable ids, unknown
/// modulation destinations, voice stealing) are not errors; they are logged.
#[derive(Debug, Error)]
pub enum SynthError {
    #[error("invalid note: {0:?}")]
    InvalidNote(String),

    #[error("patch is not valid JSON: {0}")]
    PatchParse(#[from] serde_json::Error),

    #[error("patch rejected: {0}")]
    PatchValidation(String),

    #[error("no preset named {0:?}")]
    UnknownPreset(String),

    #[error("audio output unavailable: {0}")]
    AudioUnavailable(String),
}
