//! # Grid Phrase
//!
//! The editable representation of a phrase: one column per fixed time step,
//! stored as five parallel arrays, plus a lazily compiled performance sequence.
//!
//! ## Purpose
//! Editors work column by column (`set_cell`, `append_cell`, `remove_last_cell`,
//! `set_columns`). Playback and layout work on the compacted [`Performance`].
//! Every mutation drops the compiled sequence; the next read of derived data
//! compiles it again, exactly once.
//!
//! ## Invariants
//! - All five column arrays share one length (the row size)
//! - `NoteSustain` never occurs at column 0 nor directly after a `Rest`
//! - `unit_duration` is positive and finite
//! - Total duration = row size × `unit_duration`
//!
//! ## Example
//! ```rust
//! use phasing::{CellType, GridPhrase};
//!
//! let mut phrase = GridPhrase::new(0.25)?;
//! for _ in 0..4 {
//!     phrase.append_cell();
//! }
//! phrase.set_cell(0, 60.0, 0.8, CellType::NoteStart, None, None)?;
//! phrase.set_cell(1, 60.0, 0.8, CellType::NoteSustain, None, None)?;
//! phrase.set_cell(2, 64.0, 0.8, CellType::NoteStart, None, None)?;
//!
//! assert_eq!(phrase.entry_count(), 3);
//! assert_eq!(phrase.total_duration(), 1.0);
//! assert_eq!(phrase.min_pitch(), Some(60.0));
//! # Ok::<(), phasing::PhasingError>(())
//! ```
//!
//! ## Related Modules
//! - `performance` - The compiler behind the cache
//! - `reversal` - Builds the backward-playing twin of a phrase
//! - `document` - Persisted form of the column arrays

use std::cell::{Cell, OnceCell};

use tracing::{debug, warn};

use crate::cell::{check_cell_types, check_placement, CellType, GridCell};
use crate::error::PhasingError;
use crate::performance::{compile, Performance, PerformanceEntry};

pub const DEFAULT_ARTICULATION: f32 = 0.8;
pub const DEFAULT_PAN: f32 = 0.0;

/// Scale metadata carried for persistence only.
///
/// The core never interprets these strings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScaleInfo {
    pub root: String,
    pub name: String,
}

/// An editable note/rest grid with a cached performance sequence.
#[derive(Debug, Clone)]
pub struct GridPhrase {
    pitches: Vec<f32>,
    dynamics: Vec<f32>,
    articulations: Vec<f32>,
    pans: Vec<f32>,
    cell_types: Vec<CellType>,
    unit_duration: f64,
    default_articulation: f32,
    default_pan: f32,
    scale: ScaleInfo,
    compiled: OnceCell<Performance>,
    compile_count: Cell<usize>,
}

impl PartialEq for GridPhrase {
    /// Phrases are equal when their grids and metadata are; cache state is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.pitches == other.pitches
            && self.dynamics == other.dynamics
            && self.articulations == other.articulations
            && self.pans == other.pans
            && self.cell_types == other.cell_types
            && self.unit_duration == other.unit_duration
            && self.default_articulation == other.default_articulation
            && self.default_pan == other.default_pan
            && self.scale == other.scale
    }
}

fn check_unit_duration(unit_duration: f64) -> Result<(), PhasingError> {
    if unit_duration.is_finite() && unit_duration > 0.0 {
        Ok(())
    } else {
        Err(PhasingError::InvalidUnitDuration(unit_duration))
    }
}

fn check_length(column: &'static str, expected: usize, actual: usize) -> Result<(), PhasingError> {
    if expected == actual {
        Ok(())
    } else {
        Err(PhasingError::ColumnLengthMismatch {
            column,
            expected,
            actual,
        })
    }
}

impl GridPhrase {
    /// Create an empty phrase.
    pub fn new(unit_duration: f64) -> Result<Self, PhasingError> {
        check_unit_duration(unit_duration)?;
        Ok(Self {
            pitches: Vec::new(),
            dynamics: Vec::new(),
            articulations: Vec::new(),
            pans: Vec::new(),
            cell_types: Vec::new(),
            unit_duration,
            default_articulation: DEFAULT_ARTICULATION,
            default_pan: DEFAULT_PAN,
            scale: ScaleInfo::default(),
            compiled: OnceCell::new(),
            compile_count: Cell::new(0),
        })
    }

    /// Create a phrase from explicit column arrays.
    ///
    /// # Errors
    /// - `InvalidUnitDuration` for a non-positive unit
    /// - `ColumnLengthMismatch` when the arrays disagree in length
    /// - `SustainAtStart` / `SustainAfterRest` when the cell types break the grid invariants
    pub fn with_columns(
        unit_duration: f64,
        pitches: Vec<f32>,
        dynamics: Vec<f32>,
        articulations: Vec<f32>,
        pans: Vec<f32>,
        cell_types: Vec<CellType>,
    ) -> Result<Self, PhasingError> {
        let mut phrase = Self::new(unit_duration)?;
        phrase.set_columns(pitches, dynamics, articulations, pans, cell_types)?;
        Ok(phrase)
    }

    /// Create a phrase from a list of cells.
    pub fn from_cells(
        unit_duration: f64,
        cells: impl IntoIterator<Item = GridCell>,
    ) -> Result<Self, PhasingError> {
        let (mut pitches, mut dynamics, mut articulations, mut pans, mut cell_types) =
            (Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new());
        for cell in cells {
            pitches.push(cell.pitch);
            dynamics.push(cell.dynamic);
            articulations.push(cell.articulation);
            pans.push(cell.pan);
            cell_types.push(cell.cell_type);
        }
        Self::with_columns(unit_duration, pitches, dynamics, articulations, pans, cell_types)
    }

    pub fn with_defaults(mut self, articulation: f32, pan: f32) -> Self {
        self.default_articulation = articulation;
        self.default_pan = pan;
        self
    }

    pub fn with_scale(mut self, scale: ScaleInfo) -> Self {
        self.scale = scale;
        self
    }

    // ---- Grid access ----

    /// Number of columns (the row size).
    pub fn len(&self) -> usize {
        self.cell_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_types.is_empty()
    }

    pub fn unit_duration(&self) -> f64 {
        self.unit_duration
    }

    pub fn default_articulation(&self) -> f32 {
        self.default_articulation
    }

    pub fn default_pan(&self) -> f32 {
        self.default_pan
    }

    pub fn scale(&self) -> &ScaleInfo {
        &self.scale
    }

    pub fn set_scale(&mut self, scale: ScaleInfo) {
        self.scale = scale;
    }

    pub fn cell(&self, index: usize) -> Option<GridCell> {
        Some(GridCell {
            pitch: *self.pitches.get(index)?,
            dynamic: self.dynamics[index],
            articulation: self.articulations[index],
            pan: self.pans[index],
            cell_type: self.cell_types[index],
        })
    }

    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        (0..self.len()).filter_map(move |i| self.cell(i))
    }

    pub fn column_pitches(&self) -> &[f32] {
        &self.pitches
    }

    pub fn column_dynamics(&self) -> &[f32] {
        &self.dynamics
    }

    pub fn column_articulations(&self) -> &[f32] {
        &self.articulations
    }

    pub fn column_pans(&self) -> &[f32] {
        &self.pans
    }

    pub fn cell_types(&self) -> &[CellType] {
        &self.cell_types
    }

    // ---- Editing ----

    /// Write one column.
    ///
    /// `articulation` and `pan` fall back to the phrase defaults when omitted.
    /// On failure nothing is mutated and a diagnostic is logged.
    ///
    /// # Errors
    /// - `IndexOutOfRange` when `index >= len()`
    /// - `SustainAtStart` for a sustain at column 0
    /// - `SustainAfterRest` for a sustain whose left neighbour is a rest
    /// - `OrphanedSustain` for a rest whose right neighbour is a sustain
    pub fn set_cell(
        &mut self,
        index: usize,
        pitch: f32,
        dynamic: f32,
        cell_type: CellType,
        articulation: Option<f32>,
        pan: Option<f32>,
    ) -> Result<(), PhasingError> {
        if let Err(e) = self.check_edit(index, cell_type) {
            warn!(index, ?cell_type, "rejected cell edit: {}", e);
            return Err(e);
        }

        self.pitches[index] = pitch;
        self.dynamics[index] = dynamic;
        self.articulations[index] = articulation.unwrap_or(self.default_articulation);
        self.pans[index] = pan.unwrap_or(self.default_pan);
        self.cell_types[index] = cell_type;
        self.invalidate();
        Ok(())
    }

    /// Write one column using a raw numeric cell tag (see [`CellType::from_tag`]).
    pub fn set_cell_tagged(
        &mut self,
        index: usize,
        pitch: f32,
        dynamic: f32,
        tag: u8,
        articulation: Option<f32>,
        pan: Option<f32>,
    ) -> Result<(), PhasingError> {
        let cell_type = CellType::from_tag(tag).map_err(|e| {
            warn!(index, tag, "rejected cell edit: {}", e);
            e
        })?;
        self.set_cell(index, pitch, dynamic, cell_type, articulation, pan)
    }

    fn check_edit(&self, index: usize, cell_type: CellType) -> Result<(), PhasingError> {
        if index >= self.len() {
            return Err(PhasingError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        let previous = index.checked_sub(1).map(|i| self.cell_types[i]);
        check_placement(index, cell_type, previous)?;
        if cell_type == CellType::Rest
            && self.cell_types.get(index + 1) == Some(&CellType::NoteSustain)
        {
            return Err(PhasingError::OrphanedSustain { index });
        }
        Ok(())
    }

    /// Grow the grid by one rest column.
    pub fn append_cell(&mut self) {
        let cell = GridCell::rest(self.default_articulation, self.default_pan);
        self.pitches.push(cell.pitch);
        self.dynamics.push(cell.dynamic);
        self.articulations.push(cell.articulation);
        self.pans.push(cell.pan);
        self.cell_types.push(cell.cell_type);
        self.invalidate();
    }

    /// Shrink the grid by one column. No-op on an empty grid.
    pub fn remove_last_cell(&mut self) {
        if self.is_empty() {
            return;
        }
        self.pitches.pop();
        self.dynamics.pop();
        self.articulations.pop();
        self.pans.pop();
        self.cell_types.pop();
        self.invalidate();
    }

    /// Replace every column at once. All or nothing.
    pub fn set_columns(
        &mut self,
        pitches: Vec<f32>,
        dynamics: Vec<f32>,
        articulations: Vec<f32>,
        pans: Vec<f32>,
        cell_types: Vec<CellType>,
    ) -> Result<(), PhasingError> {
        let len = cell_types.len();
        check_length("pitch", len, pitches.len())?;
        check_length("dynamic", len, dynamics.len())?;
        check_length("articulation", len, articulations.len())?;
        check_length("pan", len, pans.len())?;
        check_cell_types(&cell_types)?;

        self.replace_columns(pitches, dynamics, articulations, pans, cell_types);
        Ok(())
    }

    /// Swap in columns already known to satisfy the grid invariants.
    pub(crate) fn replace_columns(
        &mut self,
        pitches: Vec<f32>,
        dynamics: Vec<f32>,
        articulations: Vec<f32>,
        pans: Vec<f32>,
        cell_types: Vec<CellType>,
    ) {
        debug_assert!(check_cell_types(&cell_types).is_ok());
        debug_assert!([pitches.len(), dynamics.len(), articulations.len(), pans.len()]
            .iter()
            .all(|&len| len == cell_types.len()));
        self.pitches = pitches;
        self.dynamics = dynamics;
        self.articulations = articulations;
        self.pans = pans;
        self.cell_types = cell_types;
        self.invalidate();
    }

    pub fn set_unit_duration(&mut self, unit_duration: f64) -> Result<(), PhasingError> {
        check_unit_duration(unit_duration)?;
        self.unit_duration = unit_duration;
        self.invalidate();
        Ok(())
    }

    /// Copy of this phrase with every pitch shifted by `semitones`.
    pub fn transposed(&self, semitones: f32) -> Self {
        let mut phrase = self.clone();
        for (pitch, cell_type) in phrase.pitches.iter_mut().zip(&phrase.cell_types) {
            if cell_type.is_note() {
                *pitch += semitones;
            }
        }
        phrase.invalidate();
        phrase
    }

    fn invalidate(&mut self) {
        self.compiled.take();
    }

    // ---- Derived data (compiled lazily) ----

    /// The compiled performance sequence, compiling it if the grid changed.
    pub fn performance(&self) -> &Performance {
        self.compiled.get_or_init(|| {
            self.compile_count.set(self.compile_count.get() + 1);
            let performance = compile(self.unit_duration, self.cells());
            debug!(
                columns = self.len(),
                entries = performance.len(),
                total = performance.total_duration(),
                "compiled phrase"
            );
            performance
        })
    }

    /// True when the cached sequence matches the grid.
    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    /// How many times the grid has been compiled.
    pub fn compile_count(&self) -> usize {
        self.compile_count.get()
    }

    pub fn total_duration(&self) -> f64 {
        self.performance().total_duration()
    }

    pub fn entry_count(&self) -> usize {
        self.performance().len()
    }

    pub fn entry(&self, index: usize) -> Option<&PerformanceEntry> {
        self.performance().entry(index)
    }

    pub fn pitches(&self) -> Vec<f32> {
        self.performance().pitches()
    }

    pub fn durations(&self) -> Vec<f64> {
        self.performance().durations()
    }

    pub fn start_fractions(&self) -> &[f64] {
        self.performance().start_fractions()
    }

    pub fn min_pitch(&self) -> Option<f32> {
        self.performance().min_pitch()
    }

    pub fn max_pitch(&self) -> Option<f32> {
        self.performance().max_pitch()
    }

    pub fn pitch_range(&self) -> Option<(f32, f32)> {
        self.performance().pitch_range()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_phrase() -> GridPhrase {
        GridPhrase::from_cells(
            0.25,
            [
                GridCell::note(60.0, 0.8, 0.8, 0.0),
                GridCell::sustain(60.0, 0.8, 0.8, 0.0),
                GridCell::note(64.0, 0.8, 0.8, 0.0),
                GridCell::rest(0.8, 0.0),
            ],
        )
        .unwrap()
    }

    fn empty_grid(columns: usize) -> GridPhrase {
        let mut phrase = GridPhrase::new(0.25).unwrap();
        for _ in 0..columns {
            phrase.append_cell();
        }
        phrase
    }

    #[test]
    fn test_scenario_compiles() {
        let phrase = scenario_phrase();
        assert_eq!(phrase.entry_count(), 3);
        assert_eq!(phrase.pitches()[..2], [60.0, 64.0]);
        assert_eq!(phrase.durations(), vec![0.5, 0.25, 0.25]);
        assert_eq!(phrase.total_duration(), 1.0);
    }

    #[test]
    fn test_invalid_unit_duration() {
        assert_eq!(GridPhrase::new(0.0).unwrap_err(), PhasingError::InvalidUnitDuration(0.0));
        assert!(GridPhrase::new(-1.0).is_err());
        assert!(GridPhrase::new(f64::NAN).is_err());
    }

    #[test]
    fn test_set_cell_out_of_range() {
        let mut phrase = empty_grid(2);
        let result = phrase.set_cell(2, 60.0, 0.8, CellType::NoteStart, None, None);
        assert_eq!(result, Err(PhasingError::IndexOutOfRange { index: 2, len: 2 }));
    }

    #[test]
    fn test_set_cell_sustain_at_start() {
        let mut phrase = empty_grid(2);
        let result = phrase.set_cell(0, 60.0, 0.8, CellType::NoteSustain, None, None);
        assert_eq!(result, Err(PhasingError::SustainAtStart));
        assert_eq!(phrase.cell_types()[0], CellType::Rest);
    }

    #[test]
    fn test_set_cell_sustain_after_rest() {
        let mut phrase = empty_grid(3);
        let result = phrase.set_cell(1, 60.0, 0.8, CellType::NoteSustain, None, None);
        assert_eq!(result, Err(PhasingError::SustainAfterRest { index: 1 }));
        assert!(result.unwrap_err().is_invalid_edit());
    }

    #[test]
    fn test_set_cell_orphaned_sustain() {
        let mut phrase = scenario_phrase();
        let result = phrase.set_cell(0, 0.0, 0.0, CellType::Rest, None, None);
        assert_eq!(result, Err(PhasingError::OrphanedSustain { index: 0 }));
        assert_eq!(phrase.cell_types()[0], CellType::NoteStart);
    }

    #[test]
    fn test_set_cell_unknown_tag() {
        let mut phrase = empty_grid(2);
        let result = phrase.set_cell_tagged(0, 60.0, 0.8, 9, None, None);
        assert_eq!(result, Err(PhasingError::UnknownCellType(9)));
        assert!(phrase.set_cell_tagged(0, 60.0, 0.8, CellType::NOTE_START_TAG, None, None).is_ok());
        assert_eq!(phrase.cell_types()[0], CellType::NoteStart);
    }

    #[test]
    fn test_set_cell_uses_defaults() {
        let mut phrase = empty_grid(1).with_defaults(0.5, -0.25);
        phrase.set_cell(0, 60.0, 0.8, CellType::NoteStart, None, None).unwrap();
        assert_eq!(phrase.column_articulations()[0], 0.5);
        assert_eq!(phrase.column_pans()[0], -0.25);

        phrase.set_cell(0, 60.0, 0.8, CellType::NoteStart, Some(1.0), Some(0.5)).unwrap();
        assert_eq!(phrase.column_articulations()[0], 1.0);
        assert_eq!(phrase.column_pans()[0], 0.5);
    }

    #[test]
    fn test_failed_edit_keeps_cache() {
        let mut phrase = scenario_phrase();
        phrase.min_pitch();
        assert!(phrase.is_compiled());
        assert!(phrase.set_cell(9, 60.0, 0.8, CellType::NoteStart, None, None).is_err());
        assert!(phrase.is_compiled());
        assert_eq!(phrase.compile_count(), 1);
    }

    #[test]
    fn test_mutations_invalidate_cache() {
        let mut phrase = scenario_phrase();
        assert_eq!(phrase.entry_count(), 3);
        assert_eq!(phrase.compile_count(), 1);

        phrase.append_cell();
        assert!(!phrase.is_compiled());
        assert_eq!(phrase.entry_count(), 3); // trailing rest merges
        assert_eq!(phrase.total_duration(), 1.25);
        assert_eq!(phrase.compile_count(), 2);

        phrase.remove_last_cell();
        phrase.remove_last_cell();
        assert_eq!(phrase.entry_count(), 2);
        assert_eq!(phrase.compile_count(), 3);

        phrase.set_unit_duration(0.5).unwrap();
        assert_eq!(phrase.total_duration(), 1.5);
        assert_eq!(phrase.compile_count(), 4);
    }

    #[test]
    fn test_reads_are_idempotent() {
        let phrase = scenario_phrase();
        let first = phrase.min_pitch();
        let second = phrase.min_pitch();
        assert_eq!(first, second);
        assert_eq!(phrase.max_pitch(), Some(64.0));
        assert_eq!(phrase.compile_count(), 1);
    }

    #[test]
    fn test_remove_from_empty_is_noop() {
        let mut phrase = GridPhrase::new(0.25).unwrap();
        phrase.remove_last_cell();
        assert!(phrase.is_empty());
        assert_eq!(phrase.entry_count(), 0);
        assert_eq!(phrase.total_duration(), 0.0);
        assert_eq!(phrase.min_pitch(), None);
    }

    #[test]
    fn test_set_columns_rejects_mismatch() {
        let mut phrase = scenario_phrase();
        let result = phrase.set_columns(
            vec![60.0],
            vec![0.8, 0.8],
            vec![0.8, 0.8],
            vec![0.0, 0.0],
            vec![CellType::NoteStart, CellType::NoteSustain],
        );
        assert!(matches!(result, Err(PhasingError::ColumnLengthMismatch { column: "pitch", .. })));
        assert_eq!(phrase.len(), 4);
    }

    #[test]
    fn test_set_columns_rejects_invalid_cells() {
        let mut phrase = scenario_phrase();
        let result = phrase.set_columns(
            vec![60.0, 60.0],
            vec![0.0, 0.8],
            vec![0.8, 0.8],
            vec![0.0, 0.0],
            vec![CellType::Rest, CellType::NoteSustain],
        );
        assert_eq!(result, Err(PhasingError::SustainAfterRest { index: 1 }));
    }

    #[test]
    fn test_transposed_leaves_rests() {
        let phrase = scenario_phrase().transposed(12.0);
        assert_eq!(phrase.column_pitches(), &[72.0, 72.0, 76.0, 0.0]);
        assert_eq!(phrase.pitch_range(), Some((72.0, 76.0)));
    }

    #[test]
    fn test_equality_ignores_cache() {
        let a = scenario_phrase();
        let b = scenario_phrase();
        a.performance();
        assert_eq!(a, b);
    }
}
