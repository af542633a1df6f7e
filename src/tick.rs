//! Tick pacing.
//!
//! The host runs at the display's frame rate; the simulation runs at its own
//! 1–60/s rate through a time accumulator. The accumulator never releases
//! more than [`MAX_TICKS_PER_FRAME`] ticks in one frame and resets outright
//! when further behind than that, so a long stall produces a bounded burst
//! instead of a spiral of catch-up ticks.

/// Hard cap on simulation ticks issued per rendered frame.
pub const MAX_TICKS_PER_FRAME: u32 = 3;

#[derive(Debug)]
pub struct TickTimer {
    accumulator: f32,
    tick_rate: f32,
    paused: bool,
    single_step: bool,
}

impl TickTimer {
    pub fn new(tick_rate: f32) -> Self {
        Self {
            accumulator: 0.0,
            tick_rate: tick_rate.clamp(1.0, 60.0),
            paused: false,
            single_step: false,
        }
    }

    /// Advance by a frame's wall-clock delta and return how many simulation
    /// ticks are due.
    pub fn ticks_due(&mut self, dt: f32) -> u32 {
        if self.single_step {
            self.single_step = false;
            return 1;
        }
        if self.paused {
            return 0;
        }

        let interval = 1.0 / self.tick_rate;
        self.accumulator += dt;

        if self.accumulator > interval * MAX_TICKS_PER_FRAME as f32 {
            self.accumulator = 0.0;
            return MAX_TICKS_PER_FRAME;
        }

        let mut ticks = 0;
        while self.accumulator >= interval && ticks < MAX_TICKS_PER_FRAME {
            self.accumulator -= interval;
            ticks += 1;
        }
        ticks
    }

    pub fn set_tick_rate(&mut self, rate: f32) {
        self.tick_rate = rate.clamp(1.0, 60.0);
    }

    pub fn tick_rate(&self) -> f32 {
        self.tick_rate
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Queue exactly one tick, honored even while paused.
    pub fn request_single_step(&mut self) {
        self.single_step = true;
    }
}

impl Default for TickTimer {
    fn default() -> Self {
        Self::new(10.0)
    }
}
