/*
Parameter Automation
====================

Every continuously-changing engine parameter (gains, cutoffs, FM depth,
oscillator frequencies, pan) is an `Automation`: a held value plus a short,
time-ordered list of `Ramp`s scheduled against the engine clock.

Vocabulary
----------

  ramp        A segment {start, duration, from, to, curve}. Before `start`
              it has no effect; after `start + duration` it reports `to`.

  held value  The value the parameter sits at when no ramp covers the
              requested time.

  event       The end point of the last scheduled ramp (or the held value
              when nothing is scheduled). New ramps begin at the last event,
              so consecutive ramps are contiguous.


The Cancel-Then-Ramp Idiom
--------------------------

Re-triggering a parameter must cancel whatever is in flight first:

    value
      │     old ramp (cancelled here)
      │    ╱┆
      │   ╱ ┆╲  new ramp starts from the value the old one had reached
      │  ╱  ┆ ╲
      └─────┴───────→ time
           t0

`cancel_and_hold(t0)` evaluates the parameter at t0, drops every ramp and
holds that value; the next `linear_ramp_to` then starts exactly there. Two
writers can never race because there is only ever one ramp list.


Curves
------

  Linear       from + (to - from) * p
  Exponential  from * (to / from)^p     (endpoints floored at 1e-4)

where p = (t - start) / duration, clamped to [0, 1].
*/

/// Smallest endpoint allowed for exponential segments.
pub const MIN_EXP_VALUE: f32 = 1e-4;

/// Upper bound on queued ramps per parameter.
const MAX_RAMPS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampCurve {
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ramp {
    pub start: f64,
    pub duration: f64,
    pub from: f32,
    pub to: f32,
    pub curve: RampCurve,
}

impl Ramp {
    pub fn linear(start: f64, duration: f64, from: f32, to: f32) -> Self {
        Self {
            start,
            duration: duration.max(0.0),
            from,
            to,
            curve: RampCurve::Linear,
        }
    }

    pub fn exponential(start: f64, duration: f64, from: f32, to: f32) -> Self {
        Self {
            start,
            duration: duration.max(0.0),
            from: from.max(MIN_EXP_VALUE),
            to: to.max(MIN_EXP_VALUE),
            curve: RampCurve::Exponential,
        }
    }

    #[inline]
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    #[inline]
    pub fn value_at(&self, t: f64) -> f32 {
        if self.duration <= 0.0 {
            return if t >= self.start { self.to } else { self.from };
        }
        let p = ((t - self.start) / self.duration).clamp(0.0, 1.0) as f32;
        match self.curve {
            RampCurve::Linear => self.from + (self.to - self.from) * p,
            RampCurve::Exponential => self.from * (self.to / self.from).powf(p),
        }
    }
}

/// A scheduled parameter.
#[derive(Debug, Clone)]
pub struct Automation {
    held: f32,
    held_at: f64,
    ramps: Vec<Ramp>,
}

impl Automation {
    pub fn new(value: f32) -> Self {
        Self {
            held: value,
            held_at: 0.0,
            ramps: Vec::with_capacity(MAX_RAMPS),
        }
    }

    /// Parameter value at time `t`.
    pub fn value_at(&self, t: f64) -> f32 {
        for ramp in self.ramps.iter().rev() {
            if t >= ramp.start {
                return ramp.value_at(t);
            }
        }
        self.held
    }

    /// Time and value of the last scheduled event.
    pub fn last_event(&self) -> (f64, f32) {
        match self.ramps.last() {
            Some(ramp) => (ramp.end(), ramp.to),
            None => (self.held_at, self.held),
        }
    }

    /// Drop every scheduled ramp and hold the value reached at `t`.
    pub fn cancel_and_hold(&mut self, t: f64) {
        let value = self.value_at(t);
        self.ramps.clear();
        self.held = value;
        self.held_at = t;
    }

    /// Cancel everything and jump to `value` at `t`.
    pub fn set_immediate(&mut self, value: f32, t: f64) {
        self.ramps.clear();
        self.held = value;
        self.held_at = t;
    }

    /// Step to `value` at `t` (never earlier than the last event).
    pub fn set_value_at(&mut self, value: f32, t: f64) {
        let (last, _) = self.last_event();
        self.push(Ramp::linear(t.max(last), 0.0, value, value));
    }

    /// Linear segment from the last event to `value` at `end`.
    pub fn linear_ramp_to(&mut self, value: f32, end: f64) {
        let (start, from) = self.last_event();
        self.push(Ramp::linear(start, end - start, from, value));
    }

    /// Exponential segment from the last event to `value` at `end`.
    pub fn exponential_ramp_to(&mut self, value: f32, end: f64) {
        let (start, from) = self.last_event();
        self.push(Ramp::exponential(start, end - start, from, value));
    }

    /// Cancel, hold, then ramp linearly to `value` over `duration`.
    pub fn glide(&mut self, value: f32, t: f64, duration: f64) {
        self.cancel_and_hold(t);
        self.linear_ramp_to(value, t + duration);
    }

    /// Forget ramps that finished at or before `t`, keeping their end value.
    pub fn advance(&mut self, t: f64) {
        let finished = self.ramps.iter().take_while(|r| r.end() <= t).count();
        if finished > 0 {
            let last = self.ramps[finished - 1];
            self.held = last.to;
            self.held_at = last.end();
            self.ramps.drain(..finished);
        }
    }

    /// True when nothing is scheduled past `t`.
    pub fn is_settled(&self, t: f64) -> bool {
        self.ramps.iter().all(|r| r.end() <= t)
    }

    pub fn pending(&self) -> usize {
        self.ramps.len()
    }

    /// Fill `out` with per-sample values starting at `t0`, `dt` apart.
    pub fn render(&self, out: &mut [f32], t0: f64, dt: f64) {
        if self.ramps.is_empty() {
            out.fill(self.held);
            return;
        }
        for (i, sample) in out.iter_mut().enumerate() {
            *sample = self.value_at(t0 + i as f64 * dt);
        }
    }

    fn push(&mut self, ramp: Ramp) {
        if self.ramps.len() == MAX_RAMPS {
            let oldest = self.ramps.remove(0);
            self.held = oldest.to;
            self.held_at = oldest.end();
        }
        self.ramps.push(ramp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_ramp_midpoint() {
        let mut p = Automation::new(0.0);
        p.linear_ramp_to(1.0, 1.0);
        assert!((p.value_at(0.5) - 0.5).abs() < 1e-6);
        assert!((p.value_at(2.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_ramps_are_contiguous() {
        let mut p = Automation::new(0.0);
        p.cancel_and_hold(1.0);
        p.linear_ramp_to(1.0, 1.1);
        p.linear_ramp_to(0.5, 1.3);
        assert!((p.value_at(1.0) - 0.0).abs() < 1e-6);
        assert!((p.value_at(1.1) - 1.0).abs() < 1e-5);
        assert!((p.value_at(1.2) - 0.75).abs() < 1e-5);
        assert!((p.value_at(1.3) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_cancel_and_hold_freezes_mid_ramp() {
        let mut p = Automation::new(0.0);
        p.linear_ramp_to(1.0, 1.0);
        p.cancel_and_hold(0.25);
        assert_eq!(p.pending(), 0);
        assert!((p.value_at(0.9) - 0.25).abs() < 1e-6);

        p.linear_ramp_to(0.0, 0.5);
        assert!((p.value_at(0.375) - 0.125).abs() < 1e-6);
    }

    #[test]
    fn test_exponential_ramp_is_geometric() {
        let mut p = Automation::new(1.0);
        p.exponential_ramp_to(0.01, 1.0);
        assert!((p.value_at(0.5) - 0.1).abs() < 1e-4);
        assert!((p.value_at(1.0) - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_exponential_floors_zero_endpoints() {
        let ramp = Ramp::exponential(0.0, 1.0, 0.0, 0.0);
        assert_eq!(ramp.from, MIN_EXP_VALUE);
        assert!(ramp.value_at(0.5).is_finite());
    }

    #[test]
    fn test_advance_keeps_value() {
        let mut p = Automation::new(0.0);
        p.linear_ramp_to(1.0, 0.1);
        p.linear_ramp_to(0.5, 0.2);
        p.advance(0.15);
        assert_eq!(p.pending(), 1);
        assert!((p.value_at(0.15) - 0.75).abs() < 1e-5);
        p.advance(1.0);
        assert_eq!(p.pending(), 0);
        assert!((p.value_at(5.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_set_value_never_schedules_backwards() {
        let mut p = Automation::new(0.0);
        p.linear_ramp_to(1.0, 1.0);
        p.set_value_at(0.2, 0.5);
        assert!((p.value_at(0.5) - 0.5).abs() < 1e-6);
        assert!((p.value_at(1.0) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_queue_is_bounded() {
        let mut p = Automation::new(0.0);
        for i in 0..20 {
            p.linear_ramp_to(i as f32, (i + 1) as f64);
        }
        assert_eq!(p.pending(), MAX_RAMPS);
        assert!((p.value_at(20.0) - 19.0).abs() < 1e-6);
    }

    #[test]
    fn test_render_matches_value_at() {
        let mut p = Automation::new(0.0);
        p.linear_ramp_to(1.0, 0.004);
        let mut out = [0.0f32; 4];
        p.render(&mut out, 0.0, 0.001);
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[2] - 0.5).abs() < 1e-6);
    }
}
