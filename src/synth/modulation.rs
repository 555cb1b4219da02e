use crate::{
    dsp::{
        lfo::{effective_rate, lfo_phase, unipolar_to_bipolar, LfoState},
        random::DeterministicRandom,
    },
    patch::{EnvelopeSettings, Patch, MAX_LFOS, MAX_MOD_SLOTS},
};

/*
Modulation Matrix
=================

Once per control tick every matrix slot is evaluated:

    contribution = source_value · amount          source_value in [-1, 1]

Contributions are summed per destination, then each touched destination is
rebuilt from the patch value it modulates around:

    value = clamp(base + Σ contributions · scale, min, max)

and written only when it moved more than 1e-3 since the last write. The
destination table is fixed:

    destination       scale   range          base
    oscA.morph        0.5     0 .. 1         oscA.morph
    oscB.morph        0.5     0 .. 1         oscB.morph
    filter1.cutoff    2000    40 .. 14000    filter1.cutoff
    filter2.cutoff    1500    40 .. 14000    filter2.cutoff
    sub.level         0.4     0 .. 1         sub.level
    drive             0.4     0.5 .. 2.5     filter1.drive
    delay.mix         0.5     0 .. 1         fx.delay.mix
    reverb.mix        0.5     0 .. 1         fx.reverb.mix
    master.volume     0.8     0 .. 1         global.masterVolume
    chorus.depth      0.3     0 .. 1         fx.chorus.depth
    panner            1       -1 .. 1        0

Sources, all bipolar:

    LFO1..3            shape at (time · rate + phase) mod 1
    MODENV             analytic envelope · 2 - 1
    Keytrack           (last note - 60) / 24
    Velocity           last velocity · 2 - 1
    Aftertouch         channel pressure · 2 - 1
    EnvelopeFollower   sidechain follower · 2 - 1
    Random             one draw per slot, kept until the matrix is rebuilt
*/

/// Smallest change worth writing to a destination.
const APPLY_EPSILON: f32 = 1e-3;
const DESTINATIONS: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModSource {
    Lfo(usize),
    ModEnv,
    Keytrack,
    Velocity,
    Aftertouch,
    EnvelopeFollower,
    Random,
}

impl ModSource {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "LFO1" => Some(ModSource::Lfo(0)),
            "LFO2" => Some(ModSource::Lfo(1)),
            "LFO3" => Some(ModSource::Lfo(2)),
            "MODENV" => Some(ModSource::ModEnv),
            "Keytrack" => Some(ModSource::Keytrack),
            "Velocity" => Some(ModSource::Velocity),
            "Aftertouch" => Some(ModSource::Aftertouch),
            "EnvelopeFollower" => Some(ModSource::EnvelopeFollower),
            "Random" => Some(ModSource::Random),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    OscAMorph,
    OscBMorph,
    Filter1Cutoff,
    Filter2Cutoff,
    SubLevel,
    Drive,
    DelayMix,
    ReverbMix,
    MasterVolume,
    ChorusDepth,
    Panner,
}

impl Destination {
    pub const ALL: [Destination; DESTINATIONS] = [
        Destination::OscAMorph,
        Destination::OscBMorph,
        Destination::Filter1Cutoff,
        Destination::Filter2Cutoff,
        Destination::SubLevel,
        Destination::Drive,
        Destination::DelayMix,
        Destination::ReverbMix,
        Destination::MasterVolume,
        Destination::ChorusDepth,
        Destination::Panner,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Destination::OscAMorph => "oscA.morph",
            Destination::OscBMorph => "oscB.morph",
            Destination::Filter1Cutoff => "filter1.cutoff",
            Destination::Filter2Cutoff => "filter2.cutoff",
            Destination::SubLevel => "sub.level",
            Destination::Drive => "drive",
            Destination::DelayMix => "delay.mix",
            Destination::ReverbMix => "reverb.mix",
            Destination::MasterVolume => "master.volume",
            Destination::ChorusDepth => "chorus.depth",
            Destination::Panner => "panner",
        }
    }

    pub fn scale(self) -> f32 {
        match self {
            Destination::OscAMorph | Destination::OscBMorph => 0.5,
            Destination::Filter1Cutoff => 2000.0,
            Destination::Filter2Cutoff => 1500.0,
            Destination::SubLevel | Destination::Drive => 0.4,
            Destination::DelayMix | Destination::ReverbMix => 0.5,
            Destination::MasterVolume => 0.8,
            Destination::ChorusDepth => 0.3,
            Destination::Panner => 1.0,
        }
    }

    pub fn range(self) -> (f32, f32) {
        match self {
            Destination::Filter1Cutoff | Destination::Filter2Cutoff => (40.0, 14_000.0),
            Destination::Drive => (0.5, 2.5),
            Destination::Panner => (-1.0, 1.0),
            _ => (0.0, 1.0),
        }
    }

    /// Patch value the destination is modulated around.
    pub fn base(self, patch: &Patch) -> f32 {
        match self {
            Destination::OscAMorph => patch.oscillators.osc_a.morph,
            Destination::OscBMorph => patch.oscillators.osc_b.morph,
            Destination::Filter1Cutoff => patch.filters.filter1.cutoff,
            Destination::Filter2Cutoff => patch.filters.filter2.cutoff,
            Destination::SubLevel => patch.sub.level,
            Destination::Drive => patch.filters.filter1.drive,
            Destination::DelayMix => patch.fx.delay.mix,
            Destination::ReverbMix => patch.fx.reverb.mix,
            Destination::MasterVolume => patch.global.master_volume,
            Destination::ChorusDepth => patch.fx.chorus.depth,
            Destination::Panner => 0.0,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Receiver of matrix output; the engine routes each destination to the
/// voices, the FX section or the master bus.
pub trait ModulationSink {
    fn apply(&mut self, destination: Destination, value: f32, now: f64);
}

/// Per-tick engine readings the sources are built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModInputs {
    pub last_note: u8,
    pub last_velocity: f32,
    pub aftertouch: f32,
    pub follower: f32,
}

impl Default for ModInputs {
    fn default() -> Self {
        Self {
            last_note: 60,
            last_velocity: 0.8,
            aftertouch: 0.0,
            follower: 0.0,
        }
    }
}

/// Global MOD envelope, evaluated from note times rather than rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct ModEnvelope {
    settings: EnvelopeSettings,
    start: f64,
    velocity: f32,
    release_time: Option<f64>,
    release_level: f32,
}

impl ModEnvelope {
    pub fn new(settings: EnvelopeSettings) -> Self {
        Self {
            settings,
            start: 0.0,
            velocity: 0.0,
            release_time: None,
            release_level: 0.0,
        }
    }

    pub fn set(&mut self, settings: EnvelopeSettings) {
        self.settings = settings;
    }

    pub fn note_on(&mut self, velocity: f32, now: f64) {
        self.start = now;
        self.velocity = velocity;
        self.release_time = None;
    }

    /// Release from wherever the envelope is at `now`.
    pub fn note_off(&mut self, now: f64) {
        self.release_level = self.value_at(now);
        self.release_time = Some(now);
    }

    /// Release starting from silence (stop-all).
    pub fn silence(&mut self, now: f64) {
        self.release_level = 0.0;
        self.release_time = Some(now);
    }

    pub fn value_at(&self, time: f64) -> f32 {
        let env = &self.settings;
        if let Some(release_time) = self.release_time {
            if time >= release_time {
                let elapsed = (time - release_time) as f32;
                let release = env.release.max(0.01);
                if elapsed >= release {
                    return 0.0;
                }
                return (self.release_level * (1.0 - elapsed / release)).max(0.0);
            }
        }
        if time < self.start {
            return 0.0;
        }
        let t = (time - self.start) as f32;
        let attack = env.attack.max(0.001);
        let decay = env.decay.max(0.001);
        let sustain = env.sustain * self.velocity;
        if t < attack {
            (t / attack) * self.velocity
        } else if t < attack + decay {
            self.velocity + (sustain - self.velocity) * ((t - attack) / decay)
        } else {
            sustain
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Slot {
    source: Option<ModSource>,
    destination: Destination,
    amount: f32,
    random: Option<f32>,
}

/// Control-rate evaluator of the modulation matrix.
pub struct ModulationEngine {
    slots: Vec<Slot>,
    lfos: Vec<LfoState>,
    last_values: [Option<f32>; DESTINATIONS],
    rng: DeterministicRandom,
}

impl ModulationEngine {
    pub fn new(seed: u32) -> Self {
        Self {
            slots: Vec::with_capacity(MAX_MOD_SLOTS),
            lfos: Vec::with_capacity(MAX_LFOS),
            last_values: [None; DESTINATIONS],
            rng: DeterministicRandom::new(seed),
        }
    }

    /// Rebuild slots and LFO memory from `patch`.
    ///
    /// Sample-hold values and per-slot random values are drawn fresh, and the
    /// write filter forgets what it last sent.
    pub fn refresh(&mut self, patch: &Patch) {
        self.lfos.clear();
        for _ in patch.lfo.iter().take(MAX_LFOS) {
            self.lfos.push(LfoState::new(&mut self.rng));
        }

        self.slots.clear();
        for slot in patch.mod_matrix.iter().take(MAX_MOD_SLOTS) {
            if slot.amount == 0.0 || slot.source.is_empty() {
                continue;
            }
            let Some(destination) = Destination::parse(&slot.destination) else {
                continue;
            };
            self.slots.push(Slot {
                source: ModSource::parse(&slot.source),
                destination,
                amount: slot.amount,
                random: None,
            });
        }

        self.last_values = [None; DESTINATIONS];
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Value last written to `destination` since the last refresh.
    pub fn applied(&self, destination: Destination) -> Option<f32> {
        self.last_values[destination.index()]
    }

    /// Bipolar value of LFO `index` at `now`; 0 for missing LFOs.
    pub fn lfo_value(&mut self, patch: &Patch, index: usize, now: f64) -> f32 {
        let (Some(settings), Some(state)) = (patch.lfo.get(index), self.lfos.get_mut(index))
        else {
            return 0.0;
        };
        let rate = effective_rate(settings.rate, settings.sync, patch.global.bpm);
        let phase = lfo_phase(now, rate, settings.phase);
        state.value(settings.shape, phase, &mut self.rng)
    }

    /// Evaluate the matrix and push changed destinations into `sink`.
    pub fn tick<S: ModulationSink>(
        &mut self,
        patch: &Patch,
        inputs: &ModInputs,
        mod_env: &ModEnvelope,
        sink: &mut S,
        now: f64,
    ) {
        let mut sums = [0.0f32; DESTINATIONS];
        let mut touched = [false; DESTINATIONS];

        for i in 0..self.slots.len() {
            let slot = self.slots[i];
            let value = match slot.source {
                Some(ModSource::Lfo(index)) => self.lfo_value(patch, index, now),
                Some(ModSource::ModEnv) => unipolar_to_bipolar(mod_env.value_at(now)),
                Some(ModSource::Keytrack) => {
                    ((inputs.last_note as f32 - 60.0) / 24.0).clamp(-1.0, 1.0)
                }
                Some(ModSource::Velocity) => unipolar_to_bipolar(inputs.last_velocity),
                Some(ModSource::Aftertouch) => unipolar_to_bipolar(inputs.aftertouch),
                Some(ModSource::EnvelopeFollower) => unipolar_to_bipolar(inputs.follower),
                Some(ModSource::Random) => match slot.random {
                    Some(value) => value,
                    None => {
                        let value = self.rng.next_bipolar();
                        self.slots[i].random = Some(value);
                        value
                    }
                },
                None => 0.0,
            };
            if !value.is_finite() {
                continue;
            }
            let d = slot.destination.index();
            sums[d] += value * slot.amount;
            touched[d] = true;
        }

        for destination in Destination::ALL {
            let d = destination.index();
            if !touched[d] {
                continue;
            }
            let base = destination.base(patch);
            let (min, max) = destination.range();
            let value = (base + sums[d] * destination.scale()).clamp(min, max);
            if !value.is_finite() {
                continue;
            }
            let last = self.last_values[d].unwrap_or(base);
            if (last - value).abs() < APPLY_EPSILON {
                continue;
            }
            sink.apply(destination, value, now);
            self.last_values[d] = Some(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::ModSlot;
    use float_cmp::approx_eq;

    #[derive(Default)]
    struct Recorder {
        writes: Vec<(Destination, f32)>,
    }

    impl ModulationSink for Recorder {
        fn apply(&mut self, destination: Destination, value: f32, _now: f64) {
            self.writes.push((destination, value));
        }
    }

    fn slot(source: &str, destination: &str, amount: f32) -> ModSlot {
        ModSlot {
            source: source.to_string(),
            destination: destination.to_string(),
            amount,
        }
    }

    fn run(patch: &Patch, inputs: ModInputs, now: f64) -> Vec<(Destination, f32)> {
        let mut engine = ModulationEngine::new(1);
        engine.refresh(patch);
        let mut sink = Recorder::default();
        let env = ModEnvelope::new(patch.envelopes.modulation);
        engine.tick(patch, &inputs, &env, &mut sink, now);
        sink.writes
    }

    #[test]
    fn test_destination_names_round_trip() {
        for destination in Destination::ALL {
            assert_eq!(Destination::parse(destination.name()), Some(destination));
        }
        assert_eq!(Destination::parse("fm.index"), None);
    }

    #[test]
    fn test_empty_matrix_writes_nothing() {
        let mut patch = Patch::default();
        patch.mod_matrix.clear();
        assert!(run(&patch, ModInputs::default(), 1.0).is_empty());
    }

    #[test]
    fn test_zero_amount_and_unknown_destination_are_skipped() {
        let mut patch = Patch::default();
        patch.mod_matrix = vec![
            slot("Velocity", "filter1.cutoff", 0.0),
            slot("Velocity", "fm.index", 1.0),
            slot("", "sub.level", 1.0),
        ];
        let mut engine = ModulationEngine::new(1);
        engine.refresh(&patch);
        assert_eq!(engine.slot_count(), 0);
    }

    #[test]
    fn test_contributions_sum_then_clamp() {
        let mut patch = Patch::default();
        patch.mod_matrix = vec![
            slot("Velocity", "filter1.cutoff", 1.0),
            slot("Aftertouch", "filter1.cutoff", 1.0),
        ];
        let inputs = ModInputs {
            last_velocity: 1.0,
            aftertouch: 1.0,
            ..ModInputs::default()
        };
        // 220 + 2 * 2000 = 4220
        let writes = run(&patch, inputs, 0.0);
        assert_eq!(writes.len(), 1);
        assert!(approx_eq!(f32, writes[0].1, 4220.0, epsilon = 1e-2));

        patch.mod_matrix = (0..8)
            .map(|_| slot("Velocity", "filter1.cutoff", 1.0))
            .collect();
        let writes = run(&patch, inputs, 0.0);
        assert_eq!(writes, vec![(Destination::Filter1Cutoff, 14_000.0)]);
    }

    #[test]
    fn test_unchanged_value_is_not_rewritten() {
        let mut patch = Patch::default();
        patch.mod_matrix = vec![slot("Keytrack", "sub.level", 0.5)];
        // note 60 gives keytrack 0, so the value equals the base
        assert!(run(&patch, ModInputs::default(), 0.0).is_empty());

        let mut engine = ModulationEngine::new(1);
        engine.refresh(&patch);
        let env = ModEnvelope::new(patch.envelopes.modulation);
        let mut sink = Recorder::default();
        let inputs = ModInputs {
            last_note: 84,
            ..ModInputs::default()
        };
        engine.tick(&patch, &inputs, &env, &mut sink, 0.0);
        engine.tick(&patch, &inputs, &env, &mut sink, 0.1);
        assert_eq!(sink.writes, vec![(Destination::SubLevel, 1.0)]);
    }

    #[test]
    fn test_random_source_is_stable_per_slot_and_seeded() {
        let mut patch = Patch::default();
        patch.lfo.clear();
        patch.mod_matrix = vec![slot("Random", "panner", 1.0)];

        let mut engine = ModulationEngine::new(42);
        engine.refresh(&patch);
        let env = ModEnvelope::new(patch.envelopes.modulation);
        let mut sink = Recorder::default();
        engine.tick(&patch, &ModInputs::default(), &env, &mut sink, 0.0);
        engine.tick(&patch, &ModInputs::default(), &env, &mut sink, 1.0);
        assert_eq!(sink.writes.len(), 1);

        let expected = DeterministicRandom::new(42).next_bipolar();
        assert!(approx_eq!(f32, sink.writes[0].1, expected));
    }

    #[test]
    fn test_missing_lfo_reads_zero() {
        let mut patch = Patch::default();
        patch.lfo.truncate(1);
        let mut engine = ModulationEngine::new(1);
        engine.refresh(&patch);
        assert_eq!(engine.lfo_value(&patch, 2, 0.3), 0.0);
    }

    #[test]
    fn test_sample_hold_redraws_once_per_cycle() {
        let mut patch = Patch::default();
        patch.lfo.truncate(1);
        patch.lfo[0].shape = crate::dsp::lfo::LfoShape::SampleHold;
        patch.lfo[0].sync = false;
        patch.lfo[0].rate = 1.0;
        patch.lfo[0].phase = 0.0;

        let mut engine = ModulationEngine::new(9);
        engine.refresh(&patch);
        let first = engine.lfo_value(&patch, 0, 0.1);
        assert_eq!(engine.lfo_value(&patch, 0, 0.5), first);
        assert_eq!(engine.lfo_value(&patch, 0, 0.9), first);
        let second = engine.lfo_value(&patch, 0, 1.1);
        assert_ne!(second, first);
        assert_eq!(engine.lfo_value(&patch, 0, 1.6), second);
    }

    #[test]
    fn test_mod_envelope_segments() {
        let settings = EnvelopeSettings {
            attack: 0.1,
            decay: 0.2,
            sustain: 0.5,
            release: 0.4,
            curve: 1.0,
        };
        let mut env = ModEnvelope::new(settings);
        env.note_on(1.0, 1.0);
        assert_eq!(env.value_at(0.5), 0.0);
        assert!(approx_eq!(f32, env.value_at(1.05), 0.5, epsilon = 1e-4));
        assert!(approx_eq!(f32, env.value_at(1.2), 0.75, epsilon = 1e-4));
        assert!(approx_eq!(f32, env.value_at(2.0), 0.5, epsilon = 1e-4));

        env.note_off(2.0);
        assert!(approx_eq!(f32, env.value_at(2.2), 0.25, epsilon = 1e-4));
        assert_eq!(env.value_at(2.5), 0.0);

        env.note_on(0.8, 3.0);
        env.silence(3.05);
        assert_eq!(env.value_at(3.1), 0.0);
    }
}
