//! # Transport Smoother
//!
//! Turns a noisy stream of reported transport positions into a clean,
//! low-drift musical-time delta per frame.
//!
//! ## Purpose
//! Each player's clock reports an absolute position once per frame (ticks
//! elapsed out of ticks per loop, mapped into musical time). Frame-to-frame
//! differences of that report are jittery: platform scheduling wobbles and the
//! clock only moves in whole ticks. At the loop point the position wraps back
//! towards zero, which would look like a large negative step.
//!
//! ## Algorithm (once per frame per clock)
//! 1. `raw = current - previous`; if `raw < 0`, add the total duration (loop wrap)
//! 2. `samples += 1; sum += raw; average = sum / samples`
//! 3. `corrected = average + gain * accumulated_error`
//! 4. `accumulated_error += raw - corrected`
//! 5. emit `corrected`
//!
//! The running average converges to the true tempo; the proportional feedback
//! keeps the corrected cumulative position from drifting away from the raw one.
//! The emitted value must be used both for advancing the phrase reader and for
//! rendering, so audio triggers and animation agree frame by frame.
//!
//! A non-finite report is dropped: `update` returns 0 and keeps its history.
//!
//! ## Example
//! ```rust
//! use phasing::TransportSmoother;
//!
//! let mut smoother = TransportSmoother::new(4.0);
//! smoother.reset(0.0);
//! assert_eq!(smoother.update(0.1), 0.1);
//! assert_eq!(smoother.update(0.2), 0.1);
//! ```

/// Proportional gain applied to the accumulated error.
pub const DEFAULT_DAMPING_GAIN: f64 = 0.05;

/// A transport position as an audio engine reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickPosition {
    pub elapsed: u64,
    pub total: u64,
}

impl TickPosition {
    pub fn new(elapsed: u64, total: u64) -> Self {
        Self { elapsed, total }
    }

    /// Map into musical time for a loop of `total_duration`.
    ///
    /// A zero tick total maps to position 0.
    pub fn to_musical_time(self, total_duration: f64) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.elapsed % self.total) as f64 / self.total as f64 * total_duration
    }
}

/// Damped delta estimator for one independently clocked player.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportSmoother {
    accumulated_error: f64,
    running_delta_sum: f64,
    sample_count: u64,
    previous_position: f64,
    total_duration: f64,
    gain: f64,
}

impl TransportSmoother {
    pub fn new(total_duration: f64) -> Self {
        Self::with_gain(total_duration, DEFAULT_DAMPING_GAIN)
    }

    pub fn with_gain(total_duration: f64, gain: f64) -> Self {
        Self {
            accumulated_error: 0.0,
            running_delta_sum: 0.0,
            sample_count: 0,
            previous_position: 0.0,
            total_duration,
            gain,
        }
    }

    /// Forget all history. Called whenever playback restarts.
    ///
    /// A non-finite start is taken as 0.
    pub fn reset(&mut self, start_position: f64) {
        self.accumulated_error = 0.0;
        self.running_delta_sum = 0.0;
        self.sample_count = 0;
        self.previous_position = if start_position.is_finite() {
            start_position
        } else {
            0.0
        };
    }

    /// Retarget to a new loop length (after a structural edit) and reset.
    pub fn set_total_duration(&mut self, total_duration: f64, start_position: f64) {
        self.total_duration = total_duration;
        self.reset(start_position);
    }

    /// Feed this frame's reported position and get the delta to apply.
    pub fn update(&mut self, current_position: f64) -> f64 {
        if !current_position.is_finite() {
            return 0.0;
        }
        let mut raw_delta = current_position - self.previous_position;
        if raw_delta < 0.0 {
            raw_delta += self.total_duration;
        }
        self.previous_position = current_position;

        self.sample_count += 1;
        self.running_delta_sum += raw_delta;
        let average_delta = self.running_delta_sum / self.sample_count as f64;

        let corrected_delta = average_delta + self.gain * self.accumulated_error;
        self.accumulated_error += raw_delta - corrected_delta;
        corrected_delta
    }

    /// Like [`update`](Self::update), for a tick report.
    pub fn update_ticks(&mut self, position: TickPosition) -> f64 {
        self.update(position.to_musical_time(self.total_duration))
    }

    pub fn accumulated_error(&self) -> f64 {
        self.accumulated_error
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn average_delta(&self) -> Option<f64> {
        (self.sample_count > 0).then(|| self.running_delta_sum / self.sample_count as f64)
    }

    pub fn previous_position(&self) -> f64 {
        self.previous_position
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }
}
