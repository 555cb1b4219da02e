use std::sync::Arc;

use crate::{
    config::EngineConfig,
    dsp::{ramp::Automation, wavetable::WavetableManager},
    error::SynthError,
    graph::node::{Modulatable, RenderCtx, StereoNode},
    io::{
        converter::{midi_to_synth, normalize_key, transpose, IntoNote},
        midi::MidiEvent,
    },
    patch::{self, Patch, PresetLibrary, SidechainSource},
    synth::{
        control::ControlTimer,
        drums::DrumBus,
        fx::{FxParam, FxSection},
        master::{MasterBus, MasterParam},
        message::{Lane, MessageReceiver, SynthMessage},
        modulation::{Destination, ModEnvelope, ModInputs, ModulationEngine, ModulationSink},
        pool::{Allocation, VoicePool},
        sidechain::SidechainFollower,
        voice::VoiceParam,
    },
    MAX_BLOCK_SIZE,
};

/*
Engine
======

    voices ── duck (1 - follower) ──┐
                                    ├── master ── fx ──► out
    drums ──────────────────────────┘
      │                              │
      └── internal ──► sidechain ◄── external

Two clocks run off the same frame counter. Audio renders in spans of at
most MAX_BLOCK_SIZE frames, and every span ends on a control tick
boundary, so the control work below happens on exact frames:

    drums.schedule → sidechain.tick → duck glide → modulation.tick → advance

Everything outside `render` (note and patch calls) writes ramps that start
at the current frame time.
*/

/// Every distinct MIDI note.
const NOTE_COUNT: usize = 128;

/// Which node a modulation destination lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Voice(VoiceParam),
    Fx(FxParam),
    Master(MasterParam),
}

fn route(destination: Destination) -> Route {
    match destination {
        Destination::OscAMorph => Route::Voice(VoiceParam::OscAMorph),
        Destination::OscBMorph => Route::Voice(VoiceParam::OscBMorph),
        Destination::Filter1Cutoff => Route::Voice(VoiceParam::Filter1Cutoff),
        Destination::Filter2Cutoff => Route::Voice(VoiceParam::Filter2Cutoff),
        Destination::SubLevel => Route::Voice(VoiceParam::SubLevel),
        Destination::Drive => Route::Voice(VoiceParam::Drive),
        Destination::Panner => Route::Voice(VoiceParam::Pan),
        Destination::DelayMix => Route::Fx(FxParam::DelayMix),
        Destination::ReverbMix => Route::Fx(FxParam::ReverbMix),
        Destination::ChorusDepth => Route::Fx(FxParam::ChorusDepth),
        Destination::MasterVolume => Route::Master(MasterParam::Volume),
    }
}

/// The nodes one control tick may write.
struct Targets<'a> {
    voices: &'a mut VoicePool,
    fx: &'a mut FxSection,
    master: &'a mut MasterBus,
}

impl ModulationSink for Targets<'_> {
    fn apply(&mut self, destination: Destination, value: f32, now: f64) {
        match route(destination) {
            Route::Voice(param) => {
                for voice in self.voices.iter_mut() {
                    voice.apply_modulation(param, value, now);
                }
            }
            Route::Fx(param) => self.fx.apply_modulation(param, value, now),
            Route::Master(param) => self.master.apply_modulation(param, value, now),
        }
    }
}

/// The whole instrument: voices, modulation, buses and the current patch.
pub struct Synth {
    config: EngineConfig,
    patch: Patch,
    presets: PresetLibrary,
    tables: Arc<WavetableManager>,

    voices: VoicePool,
    /// Voice index per untransposed note.
    active_notes: [Option<usize>; NOTE_COUNT],

    modulation: ModulationEngine,
    mod_env: ModEnvelope,
    sidechain: SidechainFollower,
    duck: Automation,

    master: MasterBus,
    fx: FxSection,
    drums: DrumBus,

    timer: ControlTimer,
    clock: u64,
    running: bool,

    last_note: u8,
    last_velocity: f32,
    aftertouch: f32,
    performance_note: Option<u8>,

    detector: Vec<f32>,
}

impl Synth {
    /// Build the engine with the factory bank and the Init patch applied.
    pub fn new(config: EngineConfig) -> Result<Self, SynthError> {
        let sample_rate = config.sample_rate;
        let tables = Arc::new(WavetableManager::new());
        let patch = Patch::default();

        let mut synth = Self {
            voices: VoicePool::new(config.voice_count(), sample_rate, Arc::clone(&tables)),
            active_notes: [None; NOTE_COUNT],
            modulation: ModulationEngine::new(config.seed),
            mod_env: ModEnvelope::new(patch.envelopes.modulation),
            sidechain: SidechainFollower::new(config.control_period_secs()),
            duck: Automation::new(1.0),
            master: MasterBus::new(sample_rate),
            fx: FxSection::new(sample_rate, config.seed.wrapping_add(1)),
            drums: DrumBus::new(sample_rate, config.seed.wrapping_add(2)),
            timer: ControlTimer::new(config.control_period_frames()),
            clock: 0,
            running: true,
            last_note: 60,
            last_velocity: 0.8,
            aftertouch: 0.0,
            performance_note: None,
            detector: vec![0.0; MAX_BLOCK_SIZE],
            presets: PresetLibrary::factory()?,
            tables,
            patch,
            config,
        };
        synth.timer.resume(0);
        synth.apply_state();
        Ok(synth)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    pub fn presets(&self) -> &PresetLibrary {
        &self.presets
    }

    pub fn presets_mut(&mut self) -> &mut PresetLibrary {
        &mut self.presets
    }

    /// Engine time in seconds (frames rendered / sample rate).
    pub fn now(&self) -> f64 {
        self.clock as f64 / self.config.sample_rate as f64
    }

    pub fn frames_rendered(&self) -> u64 {
        self.clock
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Voices holding a note.
    pub fn active_voice_count(&self) -> usize {
        self.voices.active_count()
    }

    pub fn voices(&self) -> &VoicePool {
        &self.voices
    }

    pub fn sidechain_value(&self) -> f32 {
        self.sidechain.value()
    }

    pub fn drums(&self) -> &DrumBus {
        &self.drums
    }

    pub fn is_performing(&self) -> bool {
        self.performance_note.is_some()
    }

    // -- notes ---------------------------------------------------------

    pub fn note_on<N: IntoNote>(
        &mut self,
        note: N,
        velocity: f32,
        lane: Lane,
    ) -> Result<(), SynthError> {
        let note = note.into_note()?;
        self.play(note, velocity, lane);
        Ok(())
    }

    pub fn note_off<N: IntoNote>(&mut self, note: N) -> Result<(), SynthError> {
        let note = note.into_note()?;
        self.release(note);
        Ok(())
    }

    fn play(&mut self, note: u8, velocity: f32, lane: Lane) {
        let now = self.now();
        let velocity = if velocity.is_finite() {
            velocity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let played = transpose(note, &self.patch.global.key);

        let legato = lane == Lane::Bass && self.patch.sub.legato;
        let allocation = self.voices.allocate(lane, legato);
        if !matches!(allocation, Allocation::Legato(_)) {
            if let Some(previous) = self.active_notes[note as usize].take() {
                if let Some(voice) = self.voices.get_mut(previous) {
                    voice.release(now);
                }
            }
        }

        let index = allocation.index();
        for slot in self.active_notes.iter_mut() {
            if *slot == Some(index) {
                *slot = None;
            }
        }

        let age = self.voices.next_age();
        let Some(voice) = self.voices.get_mut(index) else {
            return;
        };
        voice.update_from_state(&self.patch, now);
        match allocation {
            Allocation::Legato(_) => voice.legato(played, velocity, age, now),
            Allocation::Fresh(_) | Allocation::Stolen(_) => {
                voice.trigger(played, velocity, lane, age, now)
            }
        }
        // the matrix only writes on change, so a fresh voice picks up the
        // values already sent to the others
        for destination in Destination::ALL {
            if let (Route::Voice(param), Some(value)) =
                (route(destination), self.modulation.applied(destination))
            {
                voice.apply_modulation(param, value, now);
            }
        }

        self.active_notes[note as usize] = Some(index);
        self.last_note = played;
        self.last_velocity = velocity;
        self.mod_env.note_on(velocity, now);
    }

    fn release(&mut self, note: u8) {
        let now = self.now();
        let Some(index) = self.active_notes[note as usize].take() else {
            return;
        };
        self.mod_env.note_off(now);
        if let Some(voice) = self.voices.get_mut(index) {
            voice.release(now);
        }
    }

    /// Release every held note (normal release tails).
    pub fn all_notes_off(&mut self) {
        let now = self.now();
        self.voices.release_all(now);
        self.active_notes = [None; NOTE_COUNT];
        self.mod_env.note_off(now);
        self.performance_note = None;
        self.patch.performance.playing = false;
    }

    pub fn set_aftertouch(&mut self, value: f32) {
        self.aftertouch = value.clamp(0.0, 1.0);
    }

    // -- patch ---------------------------------------------------------

    /// Push the current patch into every node.
    pub fn apply_state(&mut self) {
        let now = self.now();
        let oscillators = &self.patch.oscillators;
        for id in [&oscillators.osc_a.table, &oscillators.osc_b.table] {
            if !self.tables.contains(id) {
                log::warn!("unknown wavetable {id:?}, keeping the previous table");
            }
        }

        self.master.set_volume(self.patch.global.master_volume, now);
        self.master.set_ceiling(self.patch.global.limiter_ceiling);
        self.voices.update_from_state(&self.patch, now);
        self.fx.set_state(&self.patch.fx, now);
        self.mod_env.set(self.patch.envelopes.modulation);
        self.modulation.refresh(&self.patch);
        self.sidechain.set(&self.patch.sidechain);
        self.drums
            .set_tempo(self.patch.global.bpm, self.patch.global.swing);
        self.update_rhythm_state();
        log::debug!("applied patch {:?}", self.patch.meta.name);
    }

    /// Validate, swap in and apply `patch`. On error nothing changes.
    pub fn set_patch(&mut self, mut patch: Patch) -> Result<(), SynthError> {
        patch.validate()?;
        patch.sanitize()?;
        patch.performance.playing = false;
        self.stop_performance();
        self.patch = patch;
        self.apply_state();
        Ok(())
    }

    pub fn load_preset(&mut self, name: &str) -> Result<(), SynthError> {
        let patch = self.presets.get(name)?;
        self.set_patch(patch)?;
        log::debug!("loaded preset {name:?}");
        Ok(())
    }

    /// Replace the patch from JSON; a rejected document leaves the current
    /// patch untouched.
    pub fn import_json(&mut self, text: &str) -> Result<(), SynthError> {
        match Patch::from_json(text) {
            Ok(patch) => self.set_patch(patch),
            Err(err) => {
                log::warn!("patch import rejected: {err}");
                Err(err)
            }
        }
    }

    pub fn export_json(&self) -> Result<String, SynthError> {
        self.patch.to_json()
    }

    pub fn randomize(&mut self, seed: u32) {
        patch::randomize(&mut self.patch, seed);
        if let Err(err) = self.patch.sanitize() {
            log::warn!("randomized patch needed repair: {err}");
        }
        self.apply_state();
    }

    /// Change key. Held notes are cut; rhythm and a playing drone resume.
    pub fn set_key(&mut self, key: &str) {
        let was_playing = self.patch.performance.playing;
        self.stop_all();
        self.patch.global.key = normalize_key(key).to_string();
        self.apply_state();
        if was_playing {
            self.start_performance();
        }
    }

    // -- transport -----------------------------------------------------

    pub fn start_performance(&mut self) {
        if let Some(note) = self.performance_note.take() {
            self.release(note);
        }
        let note = self.patch.drone_note();
        let velocity = self.patch.performance.drone_velocity.clamp(0.0, 1.0);
        self.play(note, velocity, Lane::Performance);
        self.performance_note = Some(note);
        self.patch.performance.playing = true;
    }

    pub fn stop_performance(&mut self) {
        if let Some(note) = self.performance_note.take() {
            self.release(note);
        }
        self.patch.performance.playing = false;
    }

    /// Silence everything now: voices, MOD envelope and the drum bus.
    pub fn stop_all(&mut self) {
        let now = self.now();
        self.stop_performance();
        self.voices.force_stop_all(now);
        self.active_notes = [None; NOTE_COUNT];
        self.mod_env.silence(now);
        self.drums.stop();
        self.drums.set_muted(true, now);
    }

    /// Resume the control clock and the drum bus.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.timer.resume(self.clock);
        self.update_rhythm_state();
    }

    /// Stop everything and pause the control clock.
    pub fn stop(&mut self) {
        self.stop_all();
        self.running = false;
        self.timer.pause();
    }

    pub fn set_rhythm(&mut self, enabled: bool) {
        self.patch.rhythm.enabled = enabled;
        self.update_rhythm_state();
    }

    /// The drum bus runs while rhythm is on and the engine runs; it is
    /// heard only with the internal sidechain source.
    fn update_rhythm_state(&mut self) {
        let now = self.now();
        let enabled = self.patch.rhythm.enabled;
        if enabled && self.running {
            self.drums.start(now);
        } else {
            self.drums.stop();
        }
        let audible = enabled && self.patch.sidechain.source == SidechainSource::Internal;
        self.drums.set_muted(!audible, now);
    }

    // -- control -------------------------------------------------------

    pub fn handle_message(&mut self, message: SynthMessage) -> Result<(), SynthError> {
        match message {
            SynthMessage::NoteOn {
                note,
                velocity,
                lane,
            } => self.note_on(note, velocity, lane)?,
            SynthMessage::NoteOff { note } => self.note_off(note)?,
            SynthMessage::Aftertouch { value } => self.set_aftertouch(value),
            SynthMessage::AllNotesOff => self.all_notes_off(),
            SynthMessage::Start => self.start(),
            SynthMessage::Stop => self.stop(),
            SynthMessage::StartPerformance => self.start_performance(),
            SynthMessage::StopPerformance => self.stop_performance(),
            SynthMessage::SetRhythm(enabled) => self.set_rhythm(enabled),
            SynthMessage::SetKey(key) => self.set_key(&key),
            SynthMessage::LoadPreset(name) => self.load_preset(&name)?,
            SynthMessage::ApplyPatch(patch) => self.set_patch(*patch)?,
            SynthMessage::Randomize { seed } => self.randomize(seed),
            SynthMessage::SetReverb(reverb) => {
                self.fx.replace_reverb(reverb);
            }
        }
        Ok(())
    }

    /// Decode and handle one raw MIDI message; unknown messages are ignored.
    pub fn handle_midi(&mut self, bytes: &[u8]) -> Result<(), SynthError> {
        match MidiEvent::parse(bytes).and_then(|event| midi_to_synth(event, None)) {
            Some(message) => self.handle_message(message),
            None => Ok(()),
        }
    }

    /// Drain a message queue; failures are logged and skipped.
    pub fn process_messages<R: MessageReceiver>(&mut self, rx: &mut R) {
        while let Some(message) = rx.pop() {
            if let Err(err) = self.handle_message(message) {
                log::warn!("control message failed: {err}");
            }
        }
    }

    // -- audio ---------------------------------------------------------

    /// Render stereo audio. The clock advances by exactly the frames
    /// rendered.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        let mut offset = 0;
        while offset < frames {
            if self.timer.poll(self.clock) {
                self.control_tick();
            }
            let mut len = (frames - offset).min(MAX_BLOCK_SIZE);
            if let Some(until) = self.timer.frames_until_tick(self.clock) {
                len = len.min(until.max(1) as usize);
            }
            let end = offset + len;
            self.render_span(&mut left[offset..end], &mut right[offset..end]);
            self.clock += len as u64;
            offset = end;
        }
    }

    fn render_span(&mut self, left: &mut [f32], right: &mut [f32]) {
        let ctx = RenderCtx::new(self.config.sample_rate).at(self.now());
        let dt = ctx.dt();
        left.fill(0.0);
        right.fill(0.0);

        self.voices.render_stereo(left, right, &ctx);
        for (i, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
            let gain = self.duck.value_at(ctx.time + i as f64 * dt);
            *l *= gain;
            *r *= gain;
        }

        self.drums.render_stereo(left, right, &ctx);
        self.master.render_stereo(left, right, &ctx);

        match self.patch.sidechain.source {
            SidechainSource::Internal => self.sidechain.push(self.drums.output(left.len())),
            SidechainSource::External => {
                let detector = &mut self.detector[..left.len()];
                for ((d, l), r) in detector.iter_mut().zip(left.iter()).zip(right.iter()) {
                    *d = (l + r) * 0.5;
                }
                self.sidechain.push(detector);
            }
        }

        self.fx.render_stereo(left, right, &ctx);
    }

    fn control_tick(&mut self) {
        let now = self.now();
        self.drums.schedule(now);

        let follower = self.sidechain.tick();
        self.duck
            .glide(1.0 - follower, now, self.config.control_period_secs());

        let inputs = ModInputs {
            last_note: self.last_note,
            last_velocity: self.last_velocity,
            aftertouch: self.aftertouch,
            follower,
        };
        let mut targets = Targets {
            voices: &mut self.voices,
            fx: &mut self.fx,
            master: &mut self.master,
        };
        self.modulation
            .tick(&self.patch, &inputs, &self.mod_env, &mut targets, now);

        self.voices.advance(now);
        self.fx.advance(now);
        self.master.advance(now);
        self.duck.advance(now);
    }
}
