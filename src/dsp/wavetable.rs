use std::f32::consts::{FRAC_PI_2, FRAC_PI_3, FRAC_PI_4, TAU};

/*
Harmonic Wavetables
===================

A wavetable is one cycle of a waveform stored as samples. The oscillator
walks through it at the note's frequency; changing the table changes the
timbre without changing the pitch.

Building a Table from Partials
------------------------------

Each waveform is defined by its harmonic spectrum: for partial n (1-based)
a cosine weight real[n] and a sine weight imag[n]. One cycle is

    x(φ) = Σ  real[n]·cos(2πnφ) + imag[n]·sin(2πnφ)      φ ∈ [0, 1)
           n

The sum is not normalized, so tables keep the loudness their spectrum
implies (a saw is louder than a triangle).


The Morph Axis
--------------

Every catalogued waveform gets N = 32 tables. Table i blends the waveform's
own partials toward a fixed secondary set (the gritty saw) by

    blend(i) = i / (N - 1) · 0.35

so morph 0 is the pure waveform and morph 1 is 35% of the way to gritty:

    morph    0.0 ──────────────────────────── 1.0
    table    [0] [1] [2]  ...            [30] [31]
    blend    0.0                              0.35

A morph value selects table round(clamp(morph, 0, 1) · 31). Morphing at
control rate is therefore a table swap, never a resynthesis.
*/

/// Samples per single-cycle table.
pub const TABLE_SIZE: usize = 2048;
/// Tables per waveform along the morph axis.
pub const TABLES_PER_WAVEFORM: usize = 32;
/// Partials synthesized for every catalogued table.
pub const PARTIALS: usize = 24;
/// How far the last table leans toward the secondary set.
const MORPH_SPAN: f32 = 0.35;

/// Partial weights indexed by harmonic number (index 0 is DC and unused).
#[derive(Debug, Clone, PartialEq)]
pub struct Harmonics {
    pub real: Vec<f32>,
    pub imag: Vec<f32>,
}

impl Harmonics {
    fn build(partials: usize, f: impl Fn(usize) -> (f32, f32)) -> Self {
        let mut real = vec![0.0; partials + 1];
        let mut imag = vec![0.0; partials + 1];
        for n in 1..=partials {
            let (r, i) = f(n);
            real[n] = r;
            imag[n] = i;
        }
        Self { real, imag }
    }

    /// Per-partial linear blend toward `other` by `t`.
    pub fn mix(&self, other: &Harmonics, t: f32) -> Harmonics {
        let lerp = |a: &[f32], b: &[f32]| -> Vec<f32> {
            a.iter()
                .enumerate()
                .map(|(n, &x)| x + (b.get(n).copied().unwrap_or(0.0) - x) * t)
                .collect()
        };
        Harmonics {
            real: lerp(&self.real, &other.real),
            imag: lerp(&self.imag, &other.imag),
        }
    }

    /// Render one cycle of `TABLE_SIZE` samples.
    pub fn synthesize(&self) -> Box<[f32]> {
        // sin/cos of 2π·k/N for every k; partial n at sample j reads index n·j mod N
        let sines: Vec<f32> = (0..TABLE_SIZE)
            .map(|k| (TAU * k as f32 / TABLE_SIZE as f32).sin())
            .collect();
        let quarter = TABLE_SIZE / 4;

        let mut table = vec![0.0f32; TABLE_SIZE];
        for (j, sample) in table.iter_mut().enumerate() {
            let mut acc = 0.0;
            for n in 1..self.real.len() {
                let k = (n * j) % TABLE_SIZE;
                let sin = sines[k];
                let cos = sines[(k + quarter) % TABLE_SIZE];
                acc += self.real[n] * cos + self.imag[n] * sin;
            }
            *sample = acc;
        }
        table.into_boxed_slice()
    }
}

/// The harmonic library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Waveform {
    MellowTriangle,
    SmoothSaw,
    GrittySaw,
    ReeseBlend,
    HollowPulse,
    AiryBlend,
    MetallicFm,
}

impl Waveform {
    pub const ALL: [Waveform; 7] = [
        Waveform::MellowTriangle,
        Waveform::SmoothSaw,
        Waveform::GrittySaw,
        Waveform::ReeseBlend,
        Waveform::HollowPulse,
        Waveform::AiryBlend,
        Waveform::MetallicFm,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Waveform::MellowTriangle => "mellowTriangle",
            Waveform::SmoothSaw => "smoothSaw",
            Waveform::GrittySaw => "grittySaw",
            Waveform::ReeseBlend => "reeseBlend",
            Waveform::HollowPulse => "hollowPulse",
            Waveform::AiryBlend => "airyBlend",
            Waveform::MetallicFm => "metallicFm",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|w| w.id() == id)
    }

    fn slot(self) -> usize {
        self as usize
    }

    pub fn harmonics(self, partials: usize) -> Harmonics {
        match self {
            Waveform::MellowTriangle => Harmonics::build(partials, |n| {
                if n % 2 == 0 {
                    return (0.0, 0.0);
                }
                let amp = 1.0 / (n * n) as f32;
                let sign = if n % 4 == 1 { 1.0 } else { -1.0 };
                (sign * amp, 0.0)
            }),
            Waveform::SmoothSaw => Harmonics::build(partials, |n| (0.0, 1.0 / n as f32)),
            Waveform::GrittySaw => Harmonics::build(partials, |n| {
                let amp = (1.0 / n as f32) * (1.0 + (1.0 + n as f32).log2());
                let phase = if n % 2 == 0 { FRAC_PI_4 } else { FRAC_PI_2 };
                (phase.cos() * amp * 0.6, phase.sin() * amp)
            }),
            Waveform::ReeseBlend => Harmonics::build(partials, |n| {
                let detune_a = (n as f32 * 0.15).sin() * 0.3;
                let detune_b = (n as f32 * 0.12).cos() * 0.3;
                let amp = 1.0 / n as f32;
                (amp * detune_a, amp * (1.0 + detune_b))
            }),
            Waveform::HollowPulse => Harmonics::build(partials, |n| {
                if n % 2 == 0 {
                    return (0.0, 0.0);
                }
                let amp = 1.0 / n as f32;
                (amp * 0.5, amp * 0.8)
            }),
            Waveform::AiryBlend => Harmonics::build(partials, |n| {
                let amp = (1.0 / n as f32) * (-0.05 * n as f32).exp();
                (amp * 0.3, amp)
            }),
            Waveform::MetallicFm => Harmonics::build(partials, |n| {
                let amp = (1.0 / n as f32) * if n % 2 == 0 { 0.8 } else { 1.2 };
                let phase = (n % 3) as f32 * FRAC_PI_3;
                (phase.cos() * amp, phase.sin() * amp)
            }),
        }
    }
}

/// Which oscillator a catalog entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OscSlot {
    A,
    B,
}

/// Tables offered to each oscillator.
pub fn catalog(slot: OscSlot) -> &'static [Waveform] {
    match slot {
        OscSlot::A => &[
            Waveform::MellowTriangle,
            Waveform::SmoothSaw,
            Waveform::ReeseBlend,
            Waveform::GrittySaw,
        ],
        OscSlot::B => &[
            Waveform::SmoothSaw,
            Waveform::AiryBlend,
            Waveform::HollowPulse,
            Waveform::MetallicFm,
        ],
    }
}

/// Table index for a morph position.
#[inline]
pub fn table_index(morph: f32) -> usize {
    let morph = if morph.is_finite() { morph.clamp(0.0, 1.0) } else { 0.0 };
    (morph * (TABLES_PER_WAVEFORM - 1) as f32).round() as usize
}

/// Resolved reference to one precomputed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHandle {
    pub waveform: Waveform,
    pub index: usize,
}

/// Precomputed bank of every catalogued waveform along the morph axis.
///
/// Built once per engine and shared read-only between voices.
pub struct WavetableManager {
    banks: Vec<Option<Vec<Box<[f32]>>>>,
}

impl WavetableManager {
    pub fn new() -> Self {
        let secondary = Waveform::GrittySaw.harmonics(PARTIALS);
        let mut banks: Vec<Option<Vec<Box<[f32]>>>> = vec![None; Waveform::ALL.len()];

        for &waveform in catalog(OscSlot::A).iter().chain(catalog(OscSlot::B)) {
            if banks[waveform.slot()].is_some() {
                continue;
            }
            let base = waveform.harmonics(PARTIALS);
            let tables = (0..TABLES_PER_WAVEFORM)
                .map(|i| {
                    let t = i as f32 / (TABLES_PER_WAVEFORM - 1) as f32;
                    base.mix(&secondary, t * MORPH_SPAN).synthesize()
                })
                .collect();
            banks[waveform.slot()] = Some(tables);
        }

        Self { banks }
    }

    /// Resolve a table id and morph position. `None` for unknown ids.
    pub fn lookup(&self, id: &str, morph: f32) -> Option<TableHandle> {
        let waveform = Waveform::from_id(id)?;
        self.banks[waveform.slot()].as_ref()?;
        Some(TableHandle {
            waveform,
            index: table_index(morph),
        })
    }

    /// Samples of a resolved table.
    pub fn table(&self, handle: TableHandle) -> &[f32] {
        self.banks[handle.waveform.slot()]
            .as_ref()
            .and_then(|tables| tables.get(handle.index))
            .map(|t| &t[..])
            .unwrap_or(&[])
    }

    pub fn contains(&self, id: &str) -> bool {
        Waveform::from_id(id).is_some_and(|w| self.banks[w.slot()].is_some())
    }
}

impl Default for WavetableManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_morph_endpoints_select_first_and_last() {
        let wt = WavetableManager::new();
        let first = wt.lookup("smoothSaw", 0.0).unwrap();
        let last = wt.lookup("smoothSaw", 1.0).unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(last.index, TABLES_PER_WAVEFORM - 1);
    }

    #[test]
    fn test_morph_maps_monotonically() {
        let mut previous = 0;
        for step in 0..=1000 {
            let index = table_index(step as f32 / 1000.0);
            assert!(index >= previous);
            previous = index;
        }
        assert_eq!(table_index(-3.0), 0);
        assert_eq!(table_index(7.0), TABLES_PER_WAVEFORM - 1);
    }

    #[test]
    fn test_unknown_id_is_none() {
        let wt = WavetableManager::new();
        assert!(wt.lookup("squareWobble", 0.5).is_none());
        assert!(!wt.contains("squareWobble"));
        assert!(wt.contains("metallicFm"));
    }

    #[test]
    fn test_saw_table_matches_partial_sum() {
        let table = Waveform::SmoothSaw.harmonics(PARTIALS).synthesize();
        assert_eq!(table.len(), TABLE_SIZE);
        // Quarter cycle: Σ sin(nπ/2)/n over odd n alternates 1, -1/3, 1/5 ...
        let expected: f32 = (1..=PARTIALS)
            .map(|n| (n as f32 * FRAC_PI_2).sin() / n as f32)
            .sum();
        assert!((table[TABLE_SIZE / 4] - expected).abs() < 1e-3);
        assert!(table[0].abs() < 1e-4);
    }

    #[test]
    fn test_morph_changes_timbre() {
        let wt = WavetableManager::new();
        let a = wt.table(wt.lookup("mellowTriangle", 0.0).unwrap());
        let b = wt.table(wt.lookup("mellowTriangle", 1.0).unwrap());
        let diff: f32 = a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum();
        assert!(diff > 1.0);
    }
}
