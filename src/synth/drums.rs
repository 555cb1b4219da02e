use std::sync::Arc;

use crate::{
    dsp::{ramp::Automation, random::DeterministicRandom},
    graph::node::{GraphNode, RenderCtx, StereoNode},
    voices::{self, DrumHit},
    MAX_BLOCK_SIZE,
};

/*
Drum Bus
========

A lookahead step sequencer. Each control tick queues every hit whose time
falls before now + 0.2 s; the hits then start on their exact sample, so the
groove does not jitter with the control rate.

Eight eighth-note steps per bar:

    step     0   1   2   3   4   5   6   7
    kick     x               x
    snare            x               x
    hat      x   x   x   x   x   x   x   x

Swing pushes the odd steps late by swing/100 of a step.

The bus output is also the internal sidechain source, so the bus keeps a
mono copy of its last block.
*/

/// Bus gain while audible.
pub const GAIN: f32 = 0.08;
/// Bus gain while muted.
const MUTED_GAIN: f32 = 1e-4;
const MUTE_GLIDE: f64 = 0.05;
/// How far ahead of the clock hits are queued, in seconds.
pub const SCHEDULE_AHEAD: f64 = 0.2;
const STEPS: u64 = 8;
/// Most hits held at once; later ones are dropped.
const MAX_HITS: usize = 32;

pub struct DrumBus {
    sample_rate: f32,
    noise: Arc<[f32]>,
    hits: Vec<DrumHit>,
    mono: Vec<f32>,
    scratch: Vec<f32>,
    gain: Automation,
    running: bool,
    muted: bool,
    next_time: f64,
    step: u64,
    bpm: f32,
    swing: f32,
}

impl DrumBus {
    pub fn new(sample_rate: f32, seed: u32) -> Self {
        let mut rng = DeterministicRandom::new(seed);
        Self {
            sample_rate,
            noise: voices::noise_table(sample_rate, &mut rng),
            hits: Vec::with_capacity(MAX_HITS),
            mono: vec![0.0; MAX_BLOCK_SIZE],
            scratch: vec![0.0; MAX_BLOCK_SIZE],
            gain: Automation::new(GAIN),
            running: false,
            muted: false,
            next_time: 0.0,
            step: 0,
            bpm: 140.0,
            swing: 0.0,
        }
    }

    pub fn set_tempo(&mut self, bpm: f32, swing: f32) {
        self.bpm = if bpm > 0.0 { bpm } else { 120.0 };
        self.swing = swing.clamp(0.0, 100.0);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn start(&mut self, now: f64) {
        if self.running {
            return;
        }
        self.running = true;
        self.next_time = now;
        log::debug!("drum bus started at {:.3}s", now);
    }

    /// Stop queuing new hits; queued hits play out.
    pub fn stop(&mut self) {
        if self.running {
            log::debug!("drum bus stopped");
        }
        self.running = false;
    }

    pub fn set_muted(&mut self, muted: bool, now: f64) {
        self.muted = muted;
        let target = if muted { MUTED_GAIN } else { GAIN };
        self.gain.glide(target, now, MUTE_GLIDE);
    }

    /// Seconds per step (half a beat).
    pub fn step_length(&self) -> f64 {
        60.0 / self.bpm as f64 / 2.0
    }

    pub fn queued(&self) -> usize {
        self.hits.len()
    }

    /// Queue every hit due before `now + SCHEDULE_AHEAD`.
    pub fn schedule(&mut self, now: f64) {
        self.hits.retain(|hit| hit.is_active());
        self.gain.advance(now);
        if !self.running {
            return;
        }

        let step_length = self.step_length();
        while self.next_time < now + SCHEDULE_AHEAD {
            let step = self.step % STEPS;
            let time = if step % 2 == 1 {
                self.next_time + step_length * (self.swing / 100.0) as f64
            } else {
                self.next_time
            };

            if step % 4 == 0 {
                self.push(voices::kick(time));
            }
            if step % 4 == 2 {
                self.push(voices::snare(time, &self.noise, self.sample_rate));
            }
            self.push(voices::hihat(time, &self.noise, self.sample_rate));

            self.next_time += step_length;
            self.step += 1;
        }
    }

    /// Mono output of the last rendered block.
    pub fn output(&self, len: usize) -> &[f32] {
        &self.mono[..len.min(self.mono.len())]
    }

    fn push(&mut self, hit: DrumHit) {
        if self.hits.len() < MAX_HITS {
            self.hits.push(hit);
        }
    }
}

impl StereoNode for DrumBus {
    /// Add the bus into `left`/`right` and keep a mono copy for the sidechain.
    fn render_stereo(&mut self, left: &mut [f32], right: &mut [f32], ctx: &RenderCtx) {
        let len = left.len().min(right.len()).min(MAX_BLOCK_SIZE);
        let mono = &mut self.mono[..len];
        mono.fill(0.0);

        for hit in &mut self.hits {
            let scratch = &mut self.scratch[..len];
            hit.render_block(scratch, ctx);
            for (m, s) in mono.iter_mut().zip(scratch.iter()) {
                *m += s;
            }
        }

        let dt = ctx.dt();
        for (i, m) in mono.iter_mut().enumerate() {
            *m *= self.gain.value_at(ctx.time + i as f64 * dt);
            left[i] += *m;
            right[i] += *m;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use more_asserts::assert_gt;

    const SR: f32 = 48_000.0;

    #[test]
    fn test_schedules_only_within_lookahead() {
        let mut bus = DrumBus::new(SR, 1);
        bus.set_tempo(120.0, 0.0);
        bus.schedule(0.0);
        assert_eq!(bus.queued(), 0);

        bus.start(0.0);
        bus.schedule(0.0);
        // steps at 0.0 (kick + hat) only: the next step is 0.25 s out
        assert_eq!(bus.queued(), 2);
        bus.schedule(0.1);
        assert_eq!(bus.queued(), 3);
    }

    #[test]
    fn test_pattern_over_one_bar() {
        let mut bus = DrumBus::new(SR, 1);
        bus.set_tempo(120.0, 0.0);
        bus.start(0.0);
        // 8 hats, 2 kicks, 2 snares; nothing has finished yet when queued
        // in one pass
        bus.schedule(1.75);
        assert_eq!(bus.queued(), 12);
        assert_eq!(bus.hits.iter().filter(|h| matches!(h, DrumHit::Kick(_))).count(), 2);
    }

    #[test]
    fn test_swing_delays_odd_steps() {
        let mut bus = DrumBus::new(SR, 1);
        bus.set_tempo(120.0, 50.0);
        bus.start(0.0);
        bus.schedule(0.1);
        let starts: Vec<f64> = bus.hits.iter().map(|h| h.start()).collect();
        assert!(starts.contains(&0.375));
    }

    #[test]
    fn test_output_and_mute() {
        let mut bus = DrumBus::new(SR, 1);
        bus.start(0.0);
        bus.schedule(0.0);

        let mut left = vec![0.0; 1024];
        let mut right = vec![0.0; 1024];
        bus.render_stereo(&mut left, &mut right, &RenderCtx::new(SR));
        assert_eq!(left, right);
        assert_eq!(bus.output(1024), &left[..]);
        let loud: f32 = left.iter().map(|x| x.abs()).sum();
        assert_gt!(loud, 0.0);

        bus.set_muted(true, 0.0);
        bus.schedule(1.0);
        assert!(bus.is_muted());
        let mut left = vec![0.0; 1024];
        let mut right = vec![0.0; 1024];
        bus.render_stereo(&mut left, &mut right, &RenderCtx::new(SR).at(1.0));
        assert!(left.iter().all(|x| x.abs() < 1e-3));
    }
}
