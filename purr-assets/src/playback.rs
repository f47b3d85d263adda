//! Wall-clock playback cursor

use std::time::{Duration, Instant};

/// Current frame of a looping animation
///
/// Time left over after an advance carries into the next one, so frames
/// keep their declared cadence regardless of how often the renderer polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Playback {
    index: usize,
    last_advance: Instant,
}

impl Playback {
    /// Starts on the first frame at `now`
    pub fn new(now: Instant) -> Self {
        Self {
            index: 0,
            last_advance: now,
        }
    }

    /// Index of the frame to display
    pub fn index(&self) -> usize {
        self.index
    }

    /// Time spent on the current frame as of `now`
    pub fn carry(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_advance)
    }

    /// Moves past every frame whose delay has fully elapsed by `now`.
    ///
    /// Returns true when the index changed.
    pub fn advance(&mut self, delays: &[Duration], now: Instant) -> bool {
        if delays.len() < 2 {
            return false;
        }
        let cycle: Duration = delays.iter().sum();
        if cycle.is_zero() {
            return false;
        }

        let mut elapsed = self.carry(now);

        // Whole loops land back on the same frame
        if elapsed >= cycle {
            let remainder = Duration::from_nanos((elapsed.as_nanos() % cycle.as_nanos()) as u64);
            self.last_advance += elapsed - remainder;
            elapsed = remainder;
        }

        let start = self.index;
        while elapsed >= delays[self.index] {
            let delay = delays[self.index];
            elapsed -= delay;
            self.last_advance += delay;
            self.index = (self.index + 1) % delays.len();
        }

        self.index != start
    }
}
