//! Real-world scenario benchmarks.
//!
//! A saturated voice pool and the full engine render path.

mod engine;
mod voices;

pub use engine::bench_engine;
pub use voices::bench_voices;
