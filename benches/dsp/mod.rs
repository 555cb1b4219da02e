//! Benchmarks for low-level DSP primitives.

mod filter;
mod limiter;
mod reverb;
mod wavetable;

pub use filter::bench_filter;
pub use limiter::bench_limiter;
pub use reverb::bench_reverb;
pub use wavetable::bench_wavetable;
