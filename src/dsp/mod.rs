//! Low-level DSP primitives used by the voices and buses.
//!
//! These components allocate only at construction (or on an explicit rebuild
//! such as a new reverb impulse), so they are safe to embed directly inside
//! voice structs. They stay focused on the signal-processing math; the
//! scheduling of their parameters lives in `ramp`.

/// Time-domain delay line with fractional reads.
pub mod delay;
/// Limiter and transient shaper.
pub mod dynamics;
/// Soft clipping and table-based waveshaping.
pub mod distortion;
/// ADSR shapes written onto automation lanes.
pub mod envelope;
/// State-variable filter implementation with multiple responses.
pub mod filter;
/// LFO shapes and sample-hold state.
pub mod lfo;
/// Panning laws.
pub mod mix;
/// Phase-accumulating oscillators (wavetable, sine, square).
pub mod oscillator;
/// Seeded pseudo-random generator.
pub mod random;
/// Ramp scheduler for continuous parameters.
pub mod ramp;
/// Partitioned FFT convolution reverb.
pub mod reverb;
/// Precomputed harmonic wavetables.
pub mod wavetable;

pub use envelope::EnvelopeGenerator;
pub use ramp::{Automation, Ramp, RampCurve};
pub use random::DeterministicRandom;
pub use wavetable::{TableHandle, WavetableManager};
