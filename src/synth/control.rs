/// Fixed-rate control clock counted in audio frames.
///
/// The render loop asks how many frames remain until the next tick, renders
/// up to it, then fires the tick. Pausing drops nothing but the schedule;
/// resuming restarts it from the current frame.
#[derive(Debug, Clone)]
pub struct ControlTimer {
    period: u64,
    next_tick: u64,
    running: bool,
}

impl ControlTimer {
    pub fn new(period: u64) -> Self {
        Self {
            period: period.max(1),
            next_tick: 0,
            running: false,
        }
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Restart ticking at `now` (the first tick fires immediately).
    pub fn resume(&mut self, now: u64) {
        self.running = true;
        self.next_tick = now;
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    /// Frames that can be rendered from `now` before a tick is due.
    pub fn frames_until_tick(&self, now: u64) -> Option<u64> {
        self.running.then(|| self.next_tick.saturating_sub(now))
    }

    /// Returns true (and schedules the next tick) when a tick is due at `now`.
    pub fn poll(&mut self, now: u64) -> bool {
        if !self.running || now < self.next_tick {
            return false;
        }
        self.next_tick = now + self.period;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_every_period() {
        let mut timer = ControlTimer::new(800);
        assert!(!timer.poll(0));

        timer.resume(0);
        assert!(timer.poll(0));
        assert!(!timer.poll(0));
        assert_eq!(timer.frames_until_tick(100), Some(700));
        assert!(!timer.poll(799));
        assert!(timer.poll(800));
    }

    #[test]
    fn test_pause_and_resume() {
        let mut timer = ControlTimer::new(10);
        timer.resume(0);
        timer.poll(0);
        timer.pause();
        assert_eq!(timer.frames_until_tick(5), None);
        assert!(!timer.poll(50));

        timer.resume(1000);
        assert_eq!(timer.frames_until_tick(1000), Some(0));
        assert!(timer.poll(1000));
    }
}
