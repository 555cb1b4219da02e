use std::sync::Arc;

use crate::{
    dsp::wavetable::WavetableManager,
    graph::node::{RenderCtx, StereoNode},
    patch::Patch,
    synth::{
        message::Lane,
        voice::{Voice, VoiceState},
    },
};

/// Outcome of asking the pool for a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    /// An idle, force-stopped or releasing voice.
    Fresh(usize),
    /// A sounding bass voice to glide instead of retriggering.
    Legato(usize),
    /// A held voice taken from another note.
    Stolen(usize),
}

impl Allocation {
    pub fn index(self) -> usize {
        match self {
            Allocation::Fresh(i) | Allocation::Legato(i) | Allocation::Stolen(i) => i,
        }
    }
}

/// Fixed set of voices built once at startup.
pub struct VoicePool {
    voices: Vec<Voice>,
    triggers: u64,
}

impl VoicePool {
    pub fn new(count: usize, sample_rate: f32, tables: Arc<WavetableManager>) -> Self {
        let voices = (0..count.max(1))
            .map(|_| Voice::new(sample_rate, Arc::clone(&tables)))
            .collect();
        Self {
            voices,
            triggers: 0,
        }
    }

    /// Monotonic trigger counter; larger is newer.
    pub fn next_age(&mut self) -> u64 {
        self.triggers += 1;
        self.triggers
    }

    /// Pick a voice for a new note.
    ///
    /// Order: legato reuse on the bass lane, then the first idle or
    /// force-stopped voice, then the oldest releasing voice, then the
    /// least recently triggered held voice.
    pub fn allocate(&mut self, lane: Lane, legato: bool) -> Allocation {
        if lane == Lane::Bass && legato {
            if let Some(i) = self
                .voices
                .iter()
                .position(|v| v.is_active() && v.lane() == Lane::Bass)
            {
                return Allocation::Legato(i);
            }
        }

        if let Some(i) = self
            .voices
            .iter()
            .position(|v| matches!(v.state(), VoiceState::Idle | VoiceState::ForceStopped))
        {
            return Allocation::Fresh(i);
        }

        let oldest = |state: fn(&Voice) -> bool| {
            self.voices
                .iter()
                .enumerate()
                .filter(|(_, v)| state(v))
                .min_by_key(|(_, v)| v.age())
                .map(|(i, _)| i)
        };

        if let Some(i) = oldest(|v| v.state() == VoiceState::Released) {
            return Allocation::Fresh(i);
        }

        let i = oldest(Voice::is_active).unwrap_or(0);
        log::warn!(
            "voice pool exhausted, stealing voice {} (note {:?})",
            i,
            self.voices[i].note()
        );
        Allocation::Stolen(i)
    }

    pub fn get(&self, index: usize) -> Option<&Voice> {
        self.voices.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Voice> {
        self.voices.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Voice> {
        self.voices.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Voices holding a note (released tails excluded).
    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    pub fn update_from_state(&mut self, patch: &Patch, now: f64) {
        for voice in &mut self.voices {
            voice.update_from_state(patch, now);
        }
    }

    pub fn release_all(&mut self, now: f64) {
        for voice in &mut self.voices {
            voice.release(now);
        }
    }

    pub fn force_stop_all(&mut self, now: f64) {
        for voice in &mut self.voices {
            if voice.state() != VoiceState::Idle {
                voice.force_stop(now);
            }
        }
    }

    pub fn advance(&mut self, now: f64) {
        for voice in &mut self.voices {
            voice.advance(now);
        }
    }
}

impl StereoNode for VoicePool {
    fn render_stereo(&mut self, left: &mut [f32], right: &mut [f32], ctx: &RenderCtx) {
        for voice in &mut self.voices {
            voice.render_stereo(left, right, ctx);
        }
    }
}
