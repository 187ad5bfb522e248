//! # Tick Clock
//!
//! A deterministic stand-in for an audio engine's transport: it runs at a
//! fixed tick rate but only ever reports whole ticks, so the positions it
//! reports frame by frame carry the same coarse-resolution jitter a real
//! engine's do. The CLI drives two of these at slightly different tempos.
//!
//! Musical time is measured in whole notes; tempo is quarter-note BPM.

use crate::transport::TickPosition;

/// Default clock resolution: ticks per whole note.
pub const DEFAULT_TICKS_PER_WHOLE: u64 = 1920;

#[derive(Debug, Clone, PartialEq)]
pub struct TickClock {
    ticks_per_loop: u64,
    ticks_per_second: f64,
    elapsed: f64,
}

impl TickClock {
    pub fn new(ticks_per_loop: u64, ticks_per_second: f64) -> Self {
        Self {
            ticks_per_loop: ticks_per_loop.max(1),
            ticks_per_second,
            elapsed: 0.0,
        }
    }

    /// Clock for a loop of `loop_duration` whole notes at quarter-note `bpm`.
    ///
    /// # Example
    /// ```
    /// use phasing::TickClock;
    ///
    /// // One bar of 4/4 at 120 BPM lasts two seconds
    /// let mut clock = TickClock::for_tempo(120.0, 1.0, 1920);
    /// clock.advance(1.0);
    /// assert_eq!(clock.position().elapsed, 960);
    /// assert_eq!(clock.position().total, 1920);
    /// ```
    pub fn for_tempo(bpm: f64, loop_duration: f64, ticks_per_whole: u64) -> Self {
        let ticks_per_loop = (loop_duration * ticks_per_whole as f64).round() as u64;
        let whole_notes_per_second = bpm / 240.0;
        Self::new(ticks_per_loop, whole_notes_per_second * ticks_per_whole as f64)
    }

    /// Let `seconds` of wall-clock time pass.
    pub fn advance(&mut self, seconds: f64) {
        self.elapsed += seconds * self.ticks_per_second;
    }

    /// Current position, in whole ticks, wrapped to the loop.
    pub fn position(&self) -> TickPosition {
        let whole_ticks = self.elapsed.floor().max(0.0) as u64;
        TickPosition::new(whole_ticks % self.ticks_per_loop, self.ticks_per_loop)
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
    }

    pub fn ticks_per_second(&self) -> f64 {
        self.ticks_per_second
    }

    /// Change speed without moving the current position.
    pub fn set_ticks_per_second(&mut self, ticks_per_second: f64) {
        self.ticks_per_second = ticks_per_second;
    }

    pub fn ticks_per_loop(&self) -> u64 {
        self.ticks_per_loop
    }
}
