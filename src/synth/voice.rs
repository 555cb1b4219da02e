use std::sync::Arc;

use crate::{
    dsp::{
        distortion::SoftClipper,
        dynamics::TransientShaper,
        envelope::EnvelopeGenerator,
        filter::SVFilter,
        mix::equal_power,
        oscillator::{OscillatorBlock, TableOscillator},
        ramp::Automation,
        wavetable::{TableHandle, Waveform, WavetableManager},
    },
    graph::node::{Modulatable, RenderCtx, StereoNode},
    io::converter::midi_to_freq,
    patch::{FmSettings, Patch},
    synth::message::Lane,
    CONTROL_SMOOTH,
};

/*
Voice Signal Path
=================

    oscA ─·levelA─┐
    oscB ─·levelB─┼─ drive ─┬─ filter1 ──┬──·f1Out──────────────┐
    sub ──────────┘         │            └──·serialIn─┐         │
                            └──────────────·parallelIn┴ filter2 ┴·f2Out ─┐
                                                                         │
       ┌─────────────────────────────────────────────────────────────────┘
       └─ amp env ─ soft clip ─ transient shaper ─ pan ─► L/R

    fm (sine at fA · ratio) · depth ──► added to oscA frequency, in Hz
    sub = sine + square · blend · 0.2, scaled by level, through tanh(1 + 2·sat)

Routing gains:

    mode       serialIn   parallelIn     f1Out     f2Out
    serial     1          0              0         1
    parallel   mix        1 - mix·0.5    1 - mix   mix

Pitch, filter coefficients and pan are refreshed every CONTROL_BLOCK samples;
gains (levels, FM depth, drive, amp) are read per sample from their ramps.

States
------

    Idle ──trigger──► Triggered ──(decay done)──► Active
      ▲                   │                          │
      │                release                    release
      │                   ▼                          ▼
      └──(release done)── Released ◄─────────────────┘

    any ──force_stop──► ForceStopped (allocatable like Idle)
*/

/// Samples between coefficient refreshes.
const CONTROL_BLOCK: usize = 32;
/// Glide for values written by the modulation matrix.
const MOD_GLIDE: f64 = 0.05;
/// Pitch glide when a legato note takes over a sounding voice.
const LEGATO_GLIDE: f64 = 0.04;
/// Morph moves smaller than this keep the current table.
const MORPH_EPSILON: f32 = 0.01;
/// Saturation moves smaller than this keep the current sub curve.
const SATURATION_EPSILON: f32 = 0.01;
/// Gain a voice is parked at.
const SILENT: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Idle,
    Triggered,
    Active,
    Released,
    ForceStopped,
}

/// Voice parameters the modulation matrix can move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceParam {
    OscAMorph,
    OscBMorph,
    Filter1Cutoff,
    Filter2Cutoff,
    SubLevel,
    Drive,
    Pan,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RoutingGains {
    serial_in: f32,
    parallel_in: f32,
    f1_out: f32,
    f2_out: f32,
}

impl RoutingGains {
    fn new(serial: bool, mix: f32) -> Self {
        if serial {
            Self {
                serial_in: 1.0,
                parallel_in: 0.0,
                f1_out: 0.0,
                f2_out: 1.0,
            }
        } else {
            Self {
                serial_in: mix,
                parallel_in: 1.0 - mix * 0.5,
                f1_out: 1.0 - mix,
                f2_out: mix,
            }
        }
    }
}

/// Per-filter settings captured at `update_from_state`.
#[derive(Debug, Clone, Copy)]
struct FilterShape {
    cutoff: f32,
    env_amount: f32,
    keytrack: f32,
}

/// Morphing table oscillator with its current table.
struct MorphOsc {
    osc: TableOscillator,
    waveform: Option<Waveform>,
    table: Option<TableHandle>,
    morph: f32,
    tune: f32,
    detune: f32,
    phase: f32,
    level: Automation,
}

impl MorphOsc {
    fn new() -> Self {
        Self {
            osc: TableOscillator::new(),
            waveform: None,
            table: None,
            morph: 0.0,
            tune: 0.0,
            detune: 1.0,
            phase: 0.0,
            level: Automation::new(0.0),
        }
    }

    /// Select a table; unknown ids keep the previous one.
    fn set_table(&mut self, tables: &WavetableManager, id: &str, morph: f32) {
        if let Some(handle) = tables.lookup(id, morph) {
            self.waveform = Some(handle.waveform);
            self.table = Some(handle);
            self.morph = morph;
        }
    }

    fn set_morph(&mut self, tables: &WavetableManager, morph: f32) -> bool {
        if (morph - self.morph).abs() <= MORPH_EPSILON {
            return false;
        }
        let Some(waveform) = self.waveform else {
            return false;
        };
        if let Some(handle) = tables.lookup(waveform.id(), morph) {
            self.table = Some(handle);
            self.morph = morph;
        }
        true
    }
}

/// One polyphonic synthesis unit.
pub struct Voice {
    sample_rate: f32,
    tables: Arc<WavetableManager>,

    state: VoiceState,
    note: Option<u8>,
    lane: Lane,
    velocity: f32,
    age: u64,
    decay_end: f64,
    release_end: f64,

    pitch: Automation,
    osc_a: MorphOsc,
    osc_b: MorphOsc,

    fm_osc: OscillatorBlock,
    fm: FmSettings,
    fm_depth: Automation,

    sub_sine: OscillatorBlock,
    sub_square: OscillatorBlock,
    sub_level: Automation,
    square_blend: f32,
    sub_saturation: f32,
    sub_clipper: SoftClipper,

    drive: Automation,
    filter1: SVFilter,
    filter2: SVFilter,
    shape1: FilterShape,
    shape2: FilterShape,
    cutoff1: Automation,
    cutoff2: Automation,
    routing: RoutingGains,

    amp_env: EnvelopeGenerator,
    filter_env: EnvelopeGenerator,
    amp: Automation,

    pre_sat: SoftClipper,
    transient: TransientShaper,
    pan: Automation,
}

impl Voice {
    pub fn new(sample_rate: f32, tables: Arc<WavetableManager>) -> Self {
        let mut filter1 = SVFilter::lowpass(220.0);
        filter1.set_resonance(0.7);
        let mut filter2 = SVFilter::bandpass(520.0);
        filter2.set_resonance(0.6);

        let mut voice = Self {
            sample_rate,
            tables,
            state: VoiceState::Idle,
            note: None,
            lane: Lane::Manual,
            velocity: 0.0,
            age: 0,
            decay_end: 0.0,
            release_end: 0.0,
            pitch: Automation::new(60.0),
            osc_a: MorphOsc::new(),
            osc_b: MorphOsc::new(),
            fm_osc: OscillatorBlock::sine(),
            fm: FmSettings::default(),
            fm_depth: Automation::new(0.0),
            sub_sine: OscillatorBlock::sine(),
            sub_square: OscillatorBlock::square(),
            sub_level: Automation::new(0.0),
            square_blend: 0.0,
            sub_saturation: 0.25,
            sub_clipper: SoftClipper::new(1.5),
            drive: Automation::new(1.0),
            filter1,
            filter2,
            shape1: FilterShape {
                cutoff: 220.0,
                env_amount: 0.0,
                keytrack: 0.0,
            },
            shape2: FilterShape {
                cutoff: 520.0,
                env_amount: 0.0,
                keytrack: 0.0,
            },
            cutoff1: Automation::new(220.0),
            cutoff2: Automation::new(520.0),
            routing: RoutingGains::new(true, 0.7),
            amp_env: EnvelopeGenerator::default(),
            filter_env: EnvelopeGenerator::default(),
            amp: Automation::new(SILENT),
            pre_sat: SoftClipper::new(1.05),
            transient: TransientShaper::new(sample_rate),
            pan: Automation::new(0.0),
        };
        voice.update_from_state(&Patch::default(), 0.0);
        voice
    }

    /// Push every patch field this voice uses into its nodes.
    ///
    /// Unknown wavetable ids leave the oscillator's current table in place.
    pub fn update_from_state(&mut self, patch: &Patch, now: f64) {
        let oscs = &patch.oscillators;
        for (osc, settings) in [(&mut self.osc_a, &oscs.osc_a), (&mut self.osc_b, &oscs.osc_b)] {
            osc.set_table(&self.tables, &settings.table, settings.morph);
            osc.tune = settings.tune;
            osc.detune = 2.0_f32.powf(settings.fine * 100.0 / 1200.0);
            osc.phase = settings.phase;
            osc.level.glide(settings.level, now, CONTROL_SMOOTH);
        }

        let pan = (oscs.osc_a.pan + oscs.osc_b.pan * 0.5).clamp(-1.0, 1.0);
        self.pan.glide(pan, now, CONTROL_SMOOTH);

        let sub = &patch.sub;
        self.square_blend = sub.square_blend;
        self.sub_level.glide(sub.level, now, CONTROL_SMOOTH);
        if (sub.saturation - self.sub_saturation).abs() > SATURATION_EPSILON {
            self.sub_saturation = sub.saturation;
            self.sub_clipper.rebuild(1.0 + sub.saturation * 2.0);
        }

        self.fm = patch.fm.clone();

        let filters = &patch.filters;
        self.filter1.set_type(filters.filter1.filter_type);
        self.filter1.set_resonance(filters.filter1.resonance);
        self.filter2.set_type(filters.filter2.filter_type);
        self.filter2.set_resonance(filters.filter2.resonance);
        self.shape1 = FilterShape {
            cutoff: filters.filter1.cutoff,
            env_amount: filters.filter1.env_amount,
            keytrack: filters.filter1.keytrack,
        };
        self.shape2 = FilterShape {
            cutoff: filters.filter2.cutoff,
            env_amount: filters.filter2.env_amount,
            keytrack: filters.filter2.keytrack,
        };
        if !self.is_sounding() {
            self.cutoff1.set_immediate(filters.filter1.cutoff, now);
            self.cutoff2.set_immediate(filters.filter2.cutoff, now);
        }
        self.drive.glide(filters.filter1.drive, now, CONTROL_SMOOTH);
        self.routing = RoutingGains::new(filters.routing.serial, filters.routing.mix);

        self.amp_env.set(&patch.envelopes.amp);
        self.filter_env.set(&patch.envelopes.filter);
        self.transient.set(patch.transient.attack, patch.transient.sustain);
    }

    /// Start a note: pitch, FM burst, amp envelope and both filter sweeps.
    pub fn trigger(&mut self, note: u8, velocity: f32, lane: Lane, age: u64, t: f64) {
        let velocity = velocity.clamp(0.0, 1.0);
        if !self.is_sounding() {
            self.osc_a.osc.reset(self.osc_a.phase);
            self.osc_b.osc.reset(self.osc_b.phase);
            self.filter1.reset();
            self.filter2.reset();
            self.transient.reset();
        }

        self.note = Some(note);
        self.lane = lane;
        self.velocity = velocity;
        self.age = age;
        self.pitch.set_immediate(note as f32, t);

        let carrier = midi_to_freq(note as f32 + self.osc_a.tune);
        let fm = &self.fm;
        let peak = (carrier * fm.index + carrier * fm.velocity_to_index * velocity).max(1e-4);
        let fm_attack = t + fm.attack.max(0.001) as f64;
        let fm_decay = fm_attack + fm.decay.max(0.01) as f64;
        self.fm_depth.set_immediate(0.0, t);
        self.fm_depth.linear_ramp_to(peak, fm_attack);
        self.fm_depth.exponential_ramp_to((peak * 0.01).max(1e-4), fm_decay);

        self.decay_end = self.amp_env.trigger(&mut self.amp, velocity, t);

        let octaves = (note as f32 - 60.0) / 12.0;
        let env = self.filter_env;
        let attack_end = t + env.attack;
        let decay_end = attack_end + env.decay;

        let base1 = self.shape1.cutoff * 2.0_f32.powf(self.shape1.keytrack * octaves);
        let amount1 = self.shape1.env_amount;
        self.cutoff1.set_immediate((base1 * 0.5).max(20.0), t);
        self.cutoff1
            .linear_ramp_to((base1 + amount1 * velocity).max(60.0), attack_end);
        self.cutoff1
            .linear_ramp_to((base1 + amount1 * env.sustain).max(40.0), decay_end);

        let base2 = self.shape2.cutoff * 2.0_f32.powf(self.shape2.keytrack * octaves);
        self.cutoff2.set_immediate((base2 * 0.6).max(30.0), t);
        self.cutoff2
            .linear_ramp_to((base2 + self.shape2.env_amount * velocity).max(80.0), attack_end);

        self.state = VoiceState::Triggered;
    }

    /// Take over a sounding voice without a new attack; pitch glides.
    pub fn legato(&mut self, note: u8, velocity: f32, age: u64, t: f64) {
        self.note = Some(note);
        self.velocity = velocity.clamp(0.0, 1.0);
        self.age = age;
        self.pitch.glide(note as f32, t, LEGATO_GLIDE);
    }

    pub fn release(&mut self, t: f64) {
        if !self.is_active() {
            return;
        }
        self.release_end = self.amp_env.release(&mut self.amp, t);
        let release_end = t + self.filter_env.release;
        for (cutoff, floor) in [(&mut self.cutoff1, 40.0), (&mut self.cutoff2, 60.0)] {
            let current = cutoff.value_at(t);
            cutoff.cancel_and_hold(t);
            cutoff.linear_ramp_to((current * 0.5).max(floor), release_end);
        }
        self.state = VoiceState::Released;
    }

    /// Silence immediately and drop everything scheduled.
    pub fn force_stop(&mut self, t: f64) {
        self.amp.set_immediate(SILENT, t);
        self.fm_depth.set_immediate(0.0, t);
        self.cutoff1.cancel_and_hold(t);
        self.cutoff2.cancel_and_hold(t);
        self.pitch.cancel_and_hold(t);
        self.note = None;
        self.state = VoiceState::ForceStopped;
    }

    /// Collapse finished ramps and settle the state machine.
    pub fn advance(&mut self, t: f64) {
        for lane in [
            &mut self.pitch,
            &mut self.osc_a.level,
            &mut self.osc_b.level,
            &mut self.fm_depth,
            &mut self.sub_level,
            &mut self.drive,
            &mut self.cutoff1,
            &mut self.cutoff2,
            &mut self.amp,
            &mut self.pan,
        ] {
            lane.advance(t);
        }
        match self.state {
            VoiceState::Triggered if t >= self.decay_end => self.state = VoiceState::Active,
            VoiceState::Released if t >= self.release_end => {
                self.state = VoiceState::Idle;
                self.note = None;
            }
            _ => {}
        }
    }

    /// Holding a note (not released).
    pub fn is_active(&self) -> bool {
        matches!(self.state, VoiceState::Triggered | VoiceState::Active)
    }

    /// Producing sound, including the release tail.
    pub fn is_sounding(&self) -> bool {
        matches!(
            self.state,
            VoiceState::Triggered | VoiceState::Active | VoiceState::Released
        )
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn note(&self) -> Option<u8> {
        self.note
    }

    pub fn lane(&self) -> Lane {
        self.lane
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn amp_at(&self, t: f64) -> f32 {
        self.amp.value_at(t)
    }

    pub fn cutoff_at(&self, t: f64) -> (f32, f32) {
        (self.cutoff1.value_at(t), self.cutoff2.value_at(t))
    }

    pub fn fm_depth_at(&self, t: f64) -> f32 {
        self.fm_depth.value_at(t)
    }

    pub fn pitch_at(&self, t: f64) -> f32 {
        self.pitch.value_at(t)
    }

    pub fn table(&self, param: VoiceParam) -> Option<TableHandle> {
        match param {
            VoiceParam::OscAMorph => self.osc_a.table,
            VoiceParam::OscBMorph => self.osc_b.table,
            _ => None,
        }
    }

    fn render_block(&mut self, left: &mut [f32], right: &mut [f32], t0: f64) {
        let sr = self.sample_rate;
        let dt = 1.0 / sr as f64;

        let pitch = self.pitch.value_at(t0);
        let carrier = midi_to_freq(pitch + self.osc_a.tune);
        let modulator_hz = carrier * self.fm.ratio;
        let freq_b = midi_to_freq(pitch + self.osc_b.tune) * self.osc_b.detune;
        let sub_hz = midi_to_freq(pitch);
        let detune_a = self.osc_a.detune;

        self.filter1.set_cutoff(self.cutoff1.value_at(t0));
        self.filter1.update(sr);
        self.filter2.set_cutoff(self.cutoff2.value_at(t0));
        self.filter2.update(sr);
        let (gain_l, gain_r) = equal_power(self.pan.value_at(t0));

        let tables = Arc::clone(&self.tables);
        let table_a = self.osc_a.table.map_or(&[][..], |h| tables.table(h));
        let table_b = self.osc_b.table.map_or(&[][..], |h| tables.table(h));
        let blend = self.square_blend * 0.2;
        let routing = self.routing;

        for (i, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
            let t = t0 + i as f64 * dt;

            let fm = self.fm_osc.next_sample(modulator_hz, sr) * self.fm_depth.value_at(t);
            let a = self.osc_a.osc.next_sample(table_a, (carrier + fm) * detune_a, sr)
                * self.osc_a.level.value_at(t);
            let b = self.osc_b.osc.next_sample(table_b, freq_b, sr) * self.osc_b.level.value_at(t);
            let sub = (self.sub_sine.next_sample(sub_hz, sr)
                + self.sub_square.next_sample(sub_hz, sr) * blend)
                * self.sub_level.value_at(t);
            let sub = self.sub_clipper.process(sub);

            let pre = (a + b + sub) * self.drive.value_at(t);
            let y1 = self.filter1.process(pre);
            let y2 = self
                .filter2
                .process(y1 * routing.serial_in + pre * routing.parallel_in);
            let mixed = y1 * routing.f1_out + y2 * routing.f2_out;

            let shaped = self.pre_sat.process(mixed * self.amp.value_at(t));
            let out = self.transient.process(shaped);
            *l += out * gain_l;
            *r += out * gain_r;
        }
    }
}

impl StereoNode for Voice {
    /// Add this voice into `left`/`right`; silent voices cost nothing.
    fn render_stereo(&mut self, left: &mut [f32], right: &mut [f32], ctx: &RenderCtx) {
        if !self.is_sounding() {
            return;
        }
        let dt = ctx.dt();
        let len = left.len().min(right.len());
        let mut offset = 0;
        while offset < len {
            let end = (offset + CONTROL_BLOCK).min(len);
            let t = ctx.time + offset as f64 * dt;
            self.render_block(&mut left[offset..end], &mut right[offset..end], t);
            offset = end;
        }
        let t_end = ctx.time + len as f64 * dt;
        if self.state == VoiceState::Released && t_end >= self.release_end {
            self.state = VoiceState::Idle;
            self.note = None;
        }
    }
}

impl Modulatable for Voice {
    type Param = VoiceParam;

    fn get_param(&self, param: VoiceParam) -> f32 {
        match param {
            VoiceParam::OscAMorph => self.osc_a.morph,
            VoiceParam::OscBMorph => self.osc_b.morph,
            VoiceParam::Filter1Cutoff => self.cutoff1.last_event().1,
            VoiceParam::Filter2Cutoff => self.cutoff2.last_event().1,
            VoiceParam::SubLevel => self.sub_level.last_event().1,
            VoiceParam::Drive => self.drive.last_event().1,
            VoiceParam::Pan => self.pan.last_event().1,
        }
    }

    fn apply_modulation(&mut self, param: VoiceParam, value: f32, now: f64) {
        match param {
            VoiceParam::OscAMorph => {
                self.osc_a.set_morph(&self.tables, value.clamp(0.0, 1.0));
            }
            VoiceParam::OscBMorph => {
                self.osc_b.set_morph(&self.tables, value.clamp(0.0, 1.0));
            }
            VoiceParam::Filter1Cutoff => {
                self.cutoff1
                    .glide(value.clamp(20.0, 18_000.0), now, MOD_GLIDE);
            }
            VoiceParam::Filter2Cutoff => {
                self.cutoff2
                    .glide(value.clamp(20.0, 18_000.0), now, MOD_GLIDE);
            }
            VoiceParam::SubLevel => self.sub_level.glide(value.clamp(0.0, 1.0), now, MOD_GLIDE),
            VoiceParam::Drive => self.drive.glide(value.clamp(0.5, 3.0), now, MOD_GLIDE),
            VoiceParam::Pan => self.pan.glide(value.clamp(-1.0, 1.0), now, MOD_GLIDE),
        }
    }
}
