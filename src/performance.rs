//! # Performance Compiler
//!
//! Derives the compacted performance sequence from a grid of columns.
//!
//! ## Purpose
//! The grid is convenient for editing (one cell per fixed time step) but
//! wasteful for playback: a note held for eight columns is one sound, not
//! eight. The compiler merges each note with its sustains and each run of
//! rests into a single [`PerformanceEntry`].
//!
//! ## Construction Rule
//! - `NoteStart` opens a new entry with the column's pitch, dynamic, articulation and pan
//! - `NoteSustain` adds one unit duration to the open entry
//! - `Rest` opens a rest entry (`dynamic = 0`), or extends it if the previous column was a rest
//!
//! The sum of entry durations always equals `columns × unit_duration`.
//!
//! ## Example
//! ```rust
//! use phasing::{compile, GridCell};
//!
//! let cells = [
//!     GridCell::note(60.0, 0.8, 0.8, 0.0),
//!     GridCell::sustain(60.0, 0.8, 0.8, 0.0),
//!     GridCell::note(64.0, 0.8, 0.8, 0.0),
//!     GridCell::rest(0.8, 0.0),
//! ];
//! let performance = compile(0.25, cells);
//!
//! assert_eq!(performance.len(), 3);
//! assert_eq!(performance.durations(), vec![0.5, 0.25, 0.25]);
//! assert_eq!(performance.total_duration(), 1.0);
//! ```
//!
//! ## Related Modules
//! - `phrase` - Owns the grid and caches the compiled [`Performance`]
//! - `reader` - Walks a [`Performance`] entry by entry

use crate::cell::{CellType, GridCell};

/// One musically distinct event: a note or a merged rest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceEntry {
    pub pitch: f32,
    /// 0 for rests.
    pub dynamic: f32,
    /// Musical time.
    pub duration: f64,
    pub articulation: f32,
    pub pan: f32,
}

impl PerformanceEntry {
    pub fn is_rest(&self) -> bool {
        self.dynamic == 0.0
    }
}

/// The tuple handed to an audio engine for one entry.
///
/// `dynamic == 0` means "do not sound".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteTrigger {
    pub pitch: f32,
    pub dynamic: f32,
    pub duration: f64,
    pub articulation: f32,
    pub pan: f32,
}

impl NoteTrigger {
    pub fn is_audible(&self) -> bool {
        self.dynamic > 0.0
    }
}

impl From<&PerformanceEntry> for NoteTrigger {
    fn from(entry: &PerformanceEntry) -> Self {
        Self {
            pitch: entry.pitch,
            dynamic: entry.dynamic,
            duration: entry.duration,
            articulation: entry.articulation,
            pan: entry.pan,
        }
    }
}

/// The compiled performance sequence of a phrase.
///
/// # Fields
/// - `entries`: notes and merged rests in playing order
/// - `start_fractions`: normalized cumulative start of each entry (`start / total`),
///   used for time-warped layouts such as a rotational view
/// - `total_duration`: `columns × unit_duration`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Performance {
    entries: Vec<PerformanceEntry>,
    start_fractions: Vec<f64>,
    total_duration: f64,
}

impl Performance {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PerformanceEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&PerformanceEntry> {
        self.entries.get(index)
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn start_fractions(&self) -> &[f64] {
        &self.start_fractions
    }

    pub fn start_fraction(&self, index: usize) -> Option<f64> {
        self.start_fractions.get(index).copied()
    }

    /// Start of an entry in musical time.
    pub fn start_time(&self, index: usize) -> Option<f64> {
        self.start_fraction(index).map(|f| f * self.total_duration)
    }

    pub fn pitches(&self) -> Vec<f32> {
        self.entries.iter().map(|e| e.pitch).collect()
    }

    pub fn durations(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.duration).collect()
    }

    /// Audio tuple for an entry.
    pub fn trigger(&self, index: usize) -> Option<NoteTrigger> {
        self.entries.get(index).map(NoteTrigger::from)
    }

    /// Lowest sounding pitch, `None` when the phrase has no sounding entry.
    pub fn min_pitch(&self) -> Option<f32> {
        let min = self
            .sounding()
            .fold(f32::INFINITY, |acc, e| acc.min(e.pitch));
        (min != f32::INFINITY).then_some(min)
    }

    /// Highest sounding pitch, `None` when the phrase has no sounding entry.
    pub fn max_pitch(&self) -> Option<f32> {
        let max = self
            .sounding()
            .fold(f32::NEG_INFINITY, |acc, e| acc.max(e.pitch));
        (max != f32::NEG_INFINITY).then_some(max)
    }

    /// `(min, max)` over sounding entries.
    pub fn pitch_range(&self) -> Option<(f32, f32)> {
        Some((self.min_pitch()?, self.max_pitch()?))
    }

    /// Index of the entry sounding at `position`, taken modulo the total duration.
    pub fn entry_at(&self, position: f64) -> Option<usize> {
        if self.is_empty() || self.total_duration <= 0.0 {
            return None;
        }
        let fraction = position.rem_euclid(self.total_duration) / self.total_duration;
        // Last entry whose start is at or before the position
        let index = self
            .start_fractions
            .partition_point(|&start| start <= fraction)
            .saturating_sub(1);
        Some(index)
    }

    fn sounding(&self) -> impl Iterator<Item = &PerformanceEntry> {
        self.entries.iter().filter(|e| e.dynamic > 0.0)
    }
}

/// Compile grid columns into a performance sequence in a single linear pass.
///
/// A zero-length grid compiles to an empty sequence with `total_duration = 0`.
/// A sustain with no open entry (which a validated grid never contains) opens
/// a note of its own, so the duration sum is preserved for any input.
pub fn compile(unit_duration: f64, cells: impl IntoIterator<Item = GridCell>) -> Performance {
    // (entry, start column, column span)
    let mut open: Vec<(PerformanceEntry, usize, usize)> = Vec::new();
    let mut previous: Option<CellType> = None;
    let mut columns = 0usize;

    for cell in cells {
        let column = columns;
        columns += 1;

        match (cell.cell_type, previous) {
            (CellType::NoteSustain, Some(_)) | (CellType::Rest, Some(CellType::Rest)) => {
                if let Some((_, _, span)) = open.last_mut() {
                    *span += 1;
                }
            }
            (CellType::Rest, _) => open.push((
                PerformanceEntry {
                    pitch: cell.pitch,
                    dynamic: 0.0,
                    duration: 0.0,
                    articulation: cell.articulation,
                    pan: cell.pan,
                },
                column,
                1,
            )),
            (CellType::NoteStart, _) | (CellType::NoteSustain, None) => open.push((
                PerformanceEntry {
                    pitch: cell.pitch,
                    dynamic: cell.dynamic,
                    duration: 0.0,
                    articulation: cell.articulation,
                    pan: cell.pan,
                },
                column,
                1,
            )),
        }
        previous = Some(cell.cell_type);
    }

    let total_duration = columns as f64 * unit_duration;
    let mut entries = Vec::with_capacity(open.len());
    let mut start_fractions = Vec::with_capacity(open.len());
    for (mut entry, start, span) in open {
        // Durations from column counts so they sum to the total without drift
        entry.duration = span as f64 * unit_duration;
        entries.push(entry);
        start_fractions.push(if columns == 0 {
            0.0
        } else {
            start as f64 / columns as f64
        });
    }

    Performance {
        entries,
        start_fractions,
        total_duration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(pitch: f32) -> GridCell {
        GridCell::note(pitch, 0.8, 0.8, 0.0)
    }

    fn hold(pitch: f32) -> GridCell {
        GridCell::sustain(pitch, 0.8, 0.8, 0.0)
    }

    fn rest() -> GridCell {
        GridCell::rest(0.8, 0.0)
    }

    #[test]
    fn test_compile_basic_phrase() {
        let performance = compile(0.25, [note(60.0), hold(60.0), note(64.0), rest()]);

        assert_eq!(performance.len(), 3);
        assert_eq!(performance.entries()[0].pitch, 60.0);
        assert_eq!(performance.entries()[0].duration, 0.5);
        assert_eq!(performance.entries()[1].pitch, 64.0);
        assert_eq!(performance.entries()[1].duration, 0.25);
        assert!(performance.entries()[2].is_rest());
        assert_eq!(performance.entries()[2].duration, 0.25);
        assert_eq!(performance.total_duration(), 1.0);
    }

    #[test]
    fn test_compile_empty_grid() {
        let performance = compile(0.25, []);
        assert!(performance.is_empty());
        assert_eq!(performance.total_duration(), 0.0);
        assert_eq!(performance.min_pitch(), None);
        assert_eq!(performance.max_pitch(), None);
        assert_eq!(performance.entry_at(0.3), None);
    }

    #[test]
    fn test_consecutive_rests_merge() {
        let performance = compile(0.125, [rest(), rest(), rest(), note(62.0), rest(), rest()]);

        assert_eq!(performance.len(), 3);
        assert_eq!(performance.durations(), vec![0.375, 0.125, 0.25]);
        assert!(performance.entries()[0].is_rest());
        assert!(performance.entries()[2].is_rest());
    }

    #[test]
    fn test_repeated_pitch_without_sustain_stays_separate() {
        let performance = compile(0.25, [note(60.0), note(60.0), note(60.0)]);
        assert_eq!(performance.len(), 3);
    }

    #[test]
    fn test_duration_sum_matches_total() {
        let cells = [
            note(60.0), hold(60.0), hold(60.0), rest(), note(67.0), note(65.0), hold(65.0), rest(), rest(),
        ];
        let performance = compile(0.1, cells);
        let sum: f64 = performance.durations().iter().sum();
        assert!((sum - performance.total_duration()).abs() < 1e-9);
        assert!((performance.total_duration() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_start_fractions() {
        let performance = compile(0.25, [note(60.0), hold(60.0), note(64.0), rest()]);
        assert_eq!(performance.start_fractions(), &[0.0, 0.5, 0.75]);
        assert_eq!(performance.start_time(2), Some(0.75));
    }

    #[test]
    fn test_pitch_range_ignores_rests() {
        let mut cells = vec![note(64.0), rest(), note(55.0), note(72.0)];
        cells[1].pitch = 10.0;
        let performance = compile(0.25, cells);
        assert_eq!(performance.min_pitch(), Some(55.0));
        assert_eq!(performance.max_pitch(), Some(72.0));
        assert_eq!(performance.pitch_range(), Some((55.0, 72.0)));
    }

    #[test]
    fn test_pitch_range_negative_pitches() {
        // A max accumulator seeded with the smallest positive float would miss these
        let performance = compile(0.25, [note(-12.0), note(-3.0)]);
        assert_eq!(performance.max_pitch(), Some(-3.0));
        assert_eq!(performance.min_pitch(), Some(-12.0));
    }

    #[test]
    fn test_all_rest_phrase_has_no_pitch_range() {
        let performance = compile(0.25, [rest(), rest()]);
        assert_eq!(performance.len(), 1);
        assert_eq!(performance.pitch_range(), None);
    }

    #[test]
    fn test_entry_at_wraps() {
        let performance = compile(0.25, [note(60.0), hold(60.0), note(64.0), rest()]);
        assert_eq!(performance.entry_at(0.0), Some(0));
        assert_eq!(performance.entry_at(0.49), Some(0));
        assert_eq!(performance.entry_at(0.5), Some(1));
        assert_eq!(performance.entry_at(0.9), Some(2));
        assert_eq!(performance.entry_at(1.6), Some(1));
        assert_eq!(performance.entry_at(-0.1), Some(2));
    }

    #[test]
    fn test_trigger_tuple() {
        let performance = compile(0.25, [note(60.0), rest()]);
        let trigger = performance.trigger(0).unwrap();
        assert_eq!(trigger.pitch, 60.0);
        assert_eq!(trigger.duration, 0.25);
        assert!(trigger.is_audible());
        assert!(!performance.trigger(1).unwrap().is_audible());
        assert_eq!(performance.trigger(2), None);
    }
}
