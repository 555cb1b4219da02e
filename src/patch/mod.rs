//! Serializable instrument state.
//!
//! A [`Patch`] is the whole instrument as plain data. It is built from a
//! factory preset, the randomizer or JSON, and pushed into the engine in one
//! `apply_state` call. Every section carries `#[serde(default)]`, so partial
//! documents (older presets, hand-written JSON) fill the gaps from
//! [`Patch::default`].

mod presets;
mod randomize;

pub use presets::PresetLibrary;
pub use randomize::randomize;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dsp::filter::FilterType;
use crate::dsp::lfo::LfoShape;
use crate::error::SynthError;
use crate::io::converter::{normalize_key, IntoNote};

/// Most routings the modulation matrix evaluates.
pub const MAX_MOD_SLOTS: usize = 8;
/// LFOs addressable as LFO1..LFO3.
pub const MAX_LFOS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Patch {
    pub meta: Meta,
    pub global: GlobalSettings,
    pub oscillators: Oscillators,
    pub sub: SubSettings,
    pub fm: FmSettings,
    pub filters: Filters,
    pub envelopes: Envelopes,
    pub lfo: Vec<LfoSettings>,
    pub fx: FxSettings,
    pub sidechain: SidechainSettings,
    pub rhythm: RhythmSettings,
    pub transient: TransientSettings,
    pub mod_matrix: Vec<ModSlot>,
    pub performance: PerformanceSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Meta {
    pub name: String,
    pub author: String,
    /// Free-form tags (genre, vibe, ...) carried through untouched.
    #[serde(flatten)]
    pub tags: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalSettings {
    pub bpm: f32,
    pub swing: f32,
    pub key: String,
    pub master_volume: f32,
    /// Limiter threshold in dB.
    pub limiter_ceiling: f32,
    pub quality: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Oscillators {
    #[serde(rename = "oscA")]
    pub osc_a: OscillatorSettings,
    #[serde(rename = "oscB")]
    pub osc_b: OscillatorSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscillatorSettings {
    /// Wavetable id (see `dsp::wavetable::Waveform`).
    pub table: String,
    pub morph: f32,
    /// Semitones.
    pub tune: f32,
    /// Fraction of a semitone, applied as `fine * 100` cents.
    pub fine: f32,
    pub level: f32,
    pub pan: f32,
    pub phase: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubSettings {
    pub level: f32,
    pub square_blend: f32,
    pub saturation: f32,
    pub legato: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FmSettings {
    pub ratio: f32,
    pub index: f32,
    pub attack: f32,
    pub decay: f32,
    pub velocity_to_index: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filters {
    pub filter1: FilterSettings,
    pub filter2: FilterSettings,
    pub routing: RoutingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSettings {
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    pub cutoff: f32,
    pub resonance: f32,
    pub env_amount: f32,
    pub drive: f32,
    pub keytrack: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingSettings {
    pub serial: bool,
    pub mix: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Envelopes {
    pub amp: EnvelopeSettings,
    pub filter: EnvelopeSettings,
    #[serde(rename = "mod")]
    pub modulation: EnvelopeSettings,
}

/// ADSR times in seconds, sustain as a level, curve as the sustain exponent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeSettings {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
    pub curve: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LfoSettings {
    pub shape: LfoShape,
    pub rate: f32,
    /// Read `rate` as cycles per beat.
    pub sync: bool,
    pub amount: f32,
    pub destination: String,
    pub phase: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FxSettings {
    pub chorus: ChorusSettings,
    pub delay: DelaySettings,
    pub reverb: ReverbSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChorusSettings {
    pub depth: f32,
    pub rate: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DelaySettings {
    pub time: f32,
    pub feedback: f32,
    pub mix: f32,
    /// Stored for round-trips; the delay is not cross-fed.
    pub ping_pong: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbSettings {
    pub size: f32,
    pub mix: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SidechainSource {
    #[default]
    Internal,
    External,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidechainSettings {
    pub source: SidechainSource,
    pub amount: f32,
    pub attack: f32,
    pub release: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RhythmSettings {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransientSettings {
    pub attack: f32,
    pub sustain: f32,
}

/// One routing of the modulation matrix.
///
/// Names are kept as written; unknown sources or destinations are ignored
/// when the matrix is evaluated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModSlot {
    pub source: String,
    pub destination: String,
    pub amount: f32,
}

/// A note given either as a MIDI number or a name like `C2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoteValue {
    Midi(i32),
    Name(String),
}

impl NoteValue {
    pub fn to_midi(&self) -> Result<u8, SynthError> {
        match self {
            NoteValue::Midi(n) => (*n).into_note(),
            NoteValue::Name(name) => name.into_note(),
        }
    }
}

/// Drone state; `playing` never survives a save/load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceSettings {
    pub playing: bool,
    pub drone_note: NoteValue,
    pub drone_velocity: f32,
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            name: "Init".to_string(),
            author: "You".to_string(),
            tags: BTreeMap::new(),
        }
    }
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            bpm: 140.0,
            swing: 0.0,
            key: "C".to_string(),
            master_volume: 0.8,
            limiter_ceiling: -0.5,
            quality: 1.0,
        }
    }
}

impl Default for Oscillators {
    fn default() -> Self {
        Self {
            osc_a: OscillatorSettings::default(),
            osc_b: OscillatorSettings {
                table: "airyBlend".to_string(),
                morph: 0.2,
                level: 0.5,
                pan: 0.05,
                ..OscillatorSettings::default()
            },
        }
    }
}

impl Default for OscillatorSettings {
    fn default() -> Self {
        Self {
            table: "smoothSaw".to_string(),
            morph: 0.3,
            tune: 0.0,
            fine: 0.0,
            level: 0.7,
            pan: -0.05,
            phase: 0.0,
        }
    }
}

impl Default for SubSettings {
    fn default() -> Self {
        Self {
            level: 0.8,
            square_blend: 0.1,
            saturation: 0.25,
            legato: true,
        }
    }
}

impl Default for FmSettings {
    fn default() -> Self {
        Self {
            ratio: 2.0,
            index: 0.2,
            attack: 0.01,
            decay: 0.18,
            velocity_to_index: 0.1,
        }
    }
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            filter1: FilterSettings::default(),
            filter2: FilterSettings {
                filter_type: FilterType::BandPass,
                cutoff: 520.0,
                resonance: 0.6,
                env_amount: 70.0,
                drive: 1.05,
                keytrack: 0.25,
            },
            routing: RoutingSettings::default(),
        }
    }
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            filter_type: FilterType::LowPass,
            cutoff: 220.0,
            resonance: 0.7,
            env_amount: 180.0,
            drive: 1.08,
            keytrack: 0.4,
        }
    }
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            serial: true,
            mix: 0.7,
        }
    }
}

impl Default for Envelopes {
    fn default() -> Self {
        Self {
            amp: EnvelopeSettings::default(),
            filter: EnvelopeSettings {
                attack: 0.02,
                decay: 0.3,
                sustain: 0.4,
                release: 0.4,
                curve: 1.3,
            },
            modulation: EnvelopeSettings {
                attack: 0.01,
                decay: 0.22,
                sustain: 0.1,
                release: 0.3,
                curve: 1.1,
            },
        }
    }
}

impl Default for EnvelopeSettings {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.2,
            sustain: 0.7,
            release: 0.4,
            curve: 1.1,
        }
    }
}

impl Default for LfoSettings {
    fn default() -> Self {
        Self {
            shape: LfoShape::Sine,
            rate: 0.3,
            sync: true,
            amount: 0.2,
            destination: "filter1.cutoff".to_string(),
            phase: 0.0,
        }
    }
}

impl Default for ChorusSettings {
    fn default() -> Self {
        Self {
            depth: 0.2,
            rate: 0.6,
        }
    }
}

impl Default for DelaySettings {
    fn default() -> Self {
        Self {
            time: 0.32,
            feedback: 0.24,
            mix: 0.2,
            ping_pong: false,
        }
    }
}

impl Default for ReverbSettings {
    fn default() -> Self {
        Self {
            size: 1.0,
            mix: 0.25,
        }
    }
}

impl Default for SidechainSettings {
    fn default() -> Self {
        Self {
            source: SidechainSource::Internal,
            amount: 0.25,
            attack: 0.04,
            release: 0.24,
        }
    }
}

impl Default for TransientSettings {
    fn default() -> Self {
        Self {
            attack: 1.1,
            sustain: 0.85,
        }
    }
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            playing: false,
            drone_note: NoteValue::Name("C2".to_string()),
            drone_velocity: 0.65,
        }
    }
}

impl Default for Patch {
    fn default() -> Self {
        Self {
            meta: Meta::default(),
            global: GlobalSettings::default(),
            oscillators: Oscillators::default(),
            sub: SubSettings::default(),
            fm: FmSettings::default(),
            filters: Filters::default(),
            envelopes: Envelopes::default(),
            lfo: vec![
                LfoSettings::default(),
                LfoSettings {
                    shape: LfoShape::Triangle,
                    rate: 0.5,
                    amount: 0.15,
                    destination: "oscA.morph".to_string(),
                    phase: 0.5,
                    ..LfoSettings::default()
                },
                LfoSettings {
                    shape: LfoShape::Sawtooth,
                    rate: 0.75,
                    amount: 0.12,
                    destination: "delay.mix".to_string(),
                    ..LfoSettings::default()
                },
            ],
            fx: FxSettings::default(),
            sidechain: SidechainSettings::default(),
            rhythm: RhythmSettings::default(),
            transient: TransientSettings::default(),
            mod_matrix: Vec::new(),
            performance: PerformanceSettings::default(),
        }
    }
}

/// Clamps numbers into range and remembers the first non-finite one.
struct Clamp {
    non_finite: Option<&'static str>,
}

impl Clamp {
    fn field(&mut self, name: &'static str, value: &mut f32, min: f32, max: f32) {
        if !value.is_finite() {
            self.non_finite.get_or_insert(name);
            *value = min;
            return;
        }
        *value = value.clamp(min, max);
    }

    fn envelope(&mut self, name: &'static str, env: &mut EnvelopeSettings) {
        self.field(name, &mut env.attack, 0.0, 4.0);
        self.field(name, &mut env.decay, 0.0, 4.0);
        self.field(name, &mut env.sustain, 0.0, 1.0);
        self.field(name, &mut env.release, 0.0, 4.0);
        self.field(name, &mut env.curve, 0.5, 3.0);
    }

    fn oscillator(&mut self, name: &'static str, osc: &mut OscillatorSettings) {
        self.field(name, &mut osc.morph, 0.0, 1.0);
        self.field(name, &mut osc.tune, -24.0, 24.0);
        self.field(name, &mut osc.fine, -1.0, 1.0);
        self.field(name, &mut osc.level, 0.0, 1.0);
        self.field(name, &mut osc.pan, -1.0, 1.0);
        self.field(name, &mut osc.phase, 0.0, 1.0);
    }

    fn filter(&mut self, name: &'static str, filter: &mut FilterSettings) {
        self.field(name, &mut filter.cutoff, 20.0, 20_000.0);
        self.field(name, &mut filter.resonance, 0.1, 2.5);
        self.field(name, &mut filter.drive, 1.0, 2.5);
        self.field(name, &mut filter.env_amount, 0.0, 2000.0);
        self.field(name, &mut filter.keytrack, 0.0, 1.0);
    }
}

impl Patch {
    /// Parse, validate and normalize a JSON document.
    ///
    /// Nothing outside the returned value is touched, so a failed import
    /// leaves the caller's current patch in place.
    pub fn from_json(text: &str) -> Result<Patch, SynthError> {
        let mut patch: Patch = serde_json::from_str(text)?;
        patch.validate()?;
        patch.sanitize()?;
        patch.performance.playing = false;
        Ok(patch)
    }

    pub fn to_json(&self) -> Result<String, SynthError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Structural checks that clamping cannot repair.
    pub fn validate(&self) -> Result<(), SynthError> {
        if self.mod_matrix.len() > MAX_MOD_SLOTS {
            return Err(SynthError::PatchValidation(format!(
                "modMatrix has {} slots (max {MAX_MOD_SLOTS})",
                self.mod_matrix.len()
            )));
        }
        if self.lfo.len() > MAX_LFOS {
            return Err(SynthError::PatchValidation(format!(
                "lfo has {} entries (max {MAX_LFOS})",
                self.lfo.len()
            )));
        }
        self.performance.drone_note.to_midi().map_err(|err| {
            SynthError::PatchValidation(format!("performance.droneNote: {err}"))
        })?;
        Ok(())
    }

    /// Clamp every numeric control into its range and normalize the key.
    ///
    /// Fails on the first non-finite number (the patch is still left
    /// clamped, with such values replaced by their minimum).
    pub fn sanitize(&mut self) -> Result<(), SynthError> {
        let mut c = Clamp { non_finite: None };

        let g = &mut self.global;
        c.field("global.bpm", &mut g.bpm, 40.0, 240.0);
        c.field("global.swing", &mut g.swing, 0.0, 75.0);
        c.field("global.masterVolume", &mut g.master_volume, 0.0, 1.0);
        c.field("global.limiterCeiling", &mut g.limiter_ceiling, -24.0, 0.0);
        c.field("global.quality", &mut g.quality, 1.0, 4.0);
        g.key = normalize_key(&g.key).to_string();

        c.oscillator("oscillators.oscA", &mut self.oscillators.osc_a);
        c.oscillator("oscillators.oscB", &mut self.oscillators.osc_b);

        let sub = &mut self.sub;
        c.field("sub.level", &mut sub.level, 0.0, 1.0);
        c.field("sub.squareBlend", &mut sub.square_blend, 0.0, 1.0);
        c.field("sub.saturation", &mut sub.saturation, 0.0, 1.0);

        let fm = &mut self.fm;
        c.field("fm.ratio", &mut fm.ratio, 0.25, 8.0);
        c.field("fm.index", &mut fm.index, 0.0, 2.0);
        c.field("fm.attack", &mut fm.attack, 0.0, 1.0);
        c.field("fm.decay", &mut fm.decay, 0.0, 1.5);
        c.field("fm.velocityToIndex", &mut fm.velocity_to_index, 0.0, 1.0);

        c.filter("filters.filter1", &mut self.filters.filter1);
        c.filter("filters.filter2", &mut self.filters.filter2);
        c.field("filters.routing.mix", &mut self.filters.routing.mix, 0.0, 1.0);

        c.envelope("envelopes.amp", &mut self.envelopes.amp);
        c.envelope("envelopes.filter", &mut self.envelopes.filter);
        c.envelope("envelopes.mod", &mut self.envelopes.modulation);

        for lfo in &mut self.lfo {
            c.field("lfo.rate", &mut lfo.rate, 0.01, 20.0);
            c.field("lfo.amount", &mut lfo.amount, -1.0, 1.0);
            c.field("lfo.phase", &mut lfo.phase, 0.0, 1.0);
        }

        let fx = &mut self.fx;
        c.field("fx.chorus.depth", &mut fx.chorus.depth, 0.0, 1.0);
        c.field("fx.chorus.rate", &mut fx.chorus.rate, 0.05, 5.0);
        c.field("fx.delay.time", &mut fx.delay.time, 0.05, 1.5);
        c.field("fx.delay.feedback", &mut fx.delay.feedback, 0.0, 0.95);
        c.field("fx.delay.mix", &mut fx.delay.mix, 0.0, 1.0);
        c.field("fx.reverb.size", &mut fx.reverb.size, 0.25, 5.0);
        c.field("fx.reverb.mix", &mut fx.reverb.mix, 0.0, 1.0);

        let sc = &mut self.sidechain;
        c.field("sidechain.amount", &mut sc.amount, 0.0, 1.0);
        c.field("sidechain.attack", &mut sc.attack, 0.005, 0.2);
        c.field("sidechain.release", &mut sc.release, 0.05, 1.2);

        c.field("transient.attack", &mut self.transient.attack, 0.0, 2.0);
        c.field("transient.sustain", &mut self.transient.sustain, 0.0, 2.0);

        for slot in &mut self.mod_matrix {
            c.field("modMatrix.amount", &mut slot.amount, -1.0, 1.0);
        }

        c.field(
            "performance.droneVelocity",
            &mut self.performance.drone_velocity,
            0.0,
            1.0,
        );

        match c.non_finite {
            Some(field) => Err(SynthError::PatchValidation(format!(
                "{field} is not a finite number"
            ))),
            None => Ok(()),
        }
    }

    /// Drone note as MIDI; falls back to C2 on a name that does not parse.
    pub fn drone_note(&self) -> u8 {
        self.performance.drone_note.to_midi().unwrap_or(36)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_init_patch() {
        let patch = Patch::default();
        assert_eq!(patch.meta.name, "Init");
        assert_eq!(patch.global.bpm, 140.0);
        assert_eq!(patch.oscillators.osc_b.table, "airyBlend");
        assert_eq!(patch.filters.filter2.filter_type, FilterType::BandPass);
        assert_eq!(patch.lfo.len(), 3);
        assert_eq!(patch.lfo[2].shape, LfoShape::Sawtooth);
        assert!(patch.mod_matrix.is_empty());
        assert_eq!(patch.drone_note(), 36);
    }

    #[test]
    fn test_round_trip_resets_playing() {
        let mut patch = Patch::default();
        patch.performance.playing = true;
        patch.mod_matrix.push(ModSlot {
            source: "LFO1".into(),
            destination: "filter1.cutoff".into(),
            amount: 0.5,
        });
        patch.meta.tags.insert("genre".into(), "Roller".into());

        let json = patch.to_json().unwrap();
        assert!(json.contains("\"masterVolume\""));
        assert!(json.contains("\"oscA\""));
        assert!(json.contains("\"mod\""));

        let back = Patch::from_json(&json).unwrap();
        assert!(!back.performance.playing);
        patch.performance.playing = false;
        assert_eq!(back, patch);
    }

    #[test]
    fn test_missing_sections_take_defaults() {
        let patch = Patch::from_json(r#"{"global": {"bpm": 170, "key": " Eb "}}"#).unwrap();
        assert_eq!(patch.global.bpm, 170.0);
        assert_eq!(patch.global.key, "D#");
        assert_eq!(patch.global.master_volume, 0.8);
        assert_eq!(patch.sub, SubSettings::default());
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let patch = Patch::from_json(
            r#"{"filters": {"filter1": {"cutoff": 90000, "resonance": 0}},
                "modMatrix": [{"source": "LFO1", "destination": "drive", "amount": 4}]}"#,
        )
        .unwrap();
        assert_eq!(patch.filters.filter1.cutoff, 20_000.0);
        assert_eq!(patch.filters.filter1.resonance, 0.1);
        assert_eq!(patch.mod_matrix[0].amount, 1.0);
    }

    #[test]
    fn test_rejects_bad_documents() {
        assert!(matches!(
            Patch::from_json("{not json"),
            Err(SynthError::PatchParse(_))
        ));
        assert!(matches!(
            Patch::from_json(r#"{"filters": {"filter1": {"type": "comb"}}}"#),
            Err(SynthError::PatchParse(_))
        ));
        assert!(matches!(
            Patch::from_json(r#"{"sidechain": {"source": "aux"}}"#),
            Err(SynthError::PatchParse(_))
        ));

        let slots = vec![r#"{"source":"LFO1","destination":"drive","amount":0.1}"#; 9].join(",");
        assert!(matches!(
            Patch::from_json(&format!(r#"{{"modMatrix": [{slots}]}}"#)),
            Err(SynthError::PatchValidation(_))
        ));
        assert!(matches!(
            Patch::from_json(r#"{"performance": {"droneNote": "Z9"}}"#),
            Err(SynthError::PatchValidation(_))
        ));
        assert!(matches!(
            Patch::from_json(r#"{"fm": {"ratio": 1e300}}"#),
            Err(SynthError::PatchValidation(_))
        ));
    }

    #[test]
    fn test_drone_note_accepts_numbers_and_names() {
        let patch = Patch::from_json(r#"{"performance": {"droneNote": 40}}"#).unwrap();
        assert_eq!(patch.drone_note(), 40);
        let patch = Patch::from_json(r#"{"performance": {"droneNote": "A1"}}"#).unwrap();
        assert_eq!(patch.drone_note(), 33);
    }
}
