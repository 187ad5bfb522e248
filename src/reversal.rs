//! # Reversal Transducer
//!
//! Builds the grid that plays a phrase backward.
//!
//! ## Purpose
//! Pitch, dynamic, articulation and pan reverse by plain index inversion. Cell
//! types cannot: `NoteStart` and `NoteSustain` describe a note from its left
//! edge, so when a held note is read right to left its *last* column becomes
//! the column that starts it, and every earlier column of the run becomes a
//! sustain.
//!
//! ## State Machine
//! The walk runs from the tail of the grid to its head. The state describes
//! the column just processed (the right-hand neighbour of the current one):
//!
//! | Column        | State before            | Emits         | State after             |
//! |---------------|-------------------------|---------------|-------------------------|
//! | `Rest`        | any                     | `Rest`        | `ReadingRest`           |
//! | `NoteSustain` | inside a sustain run    | `NoteSustain` | `ContinuingSustainRun`  |
//! | `NoteSustain` | outside a sustain run   | `NoteStart`   | `StartingSustainRun`    |
//! | `NoteStart`   | inside a sustain run    | `NoteSustain` | `ReadingStandaloneNote` |
//! | `NoteStart`   | outside a sustain run   | `NoteStart`   | `ReadingStandaloneNote` |
//!
//! The walk starts in `ReadingRest`, as if silence followed the last column.
//!
//! ## Example
//! ```rust
//! use phasing::{reverse_cell_types, CellType::*};
//!
//! let forward = [NoteStart, NoteSustain, NoteSustain, Rest, NoteStart];
//! let backward = reverse_cell_types(&forward);
//! assert_eq!(backward, vec![NoteStart, Rest, NoteStart, NoteSustain, NoteSustain]);
//! ```

use serde::{Deserialize, Serialize};

use crate::cell::CellType;
use crate::phrase::GridPhrase;

/// Playing direction of a phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    ReadingRest,
    ReadingStandaloneNote,
    StartingSustainRun,
    ContinuingSustainRun,
}

impl ReadState {
    fn in_sustain_run(self) -> bool {
        matches!(
            self,
            ReadState::StartingSustainRun | ReadState::ContinuingSustainRun
        )
    }

    /// One transition: what the column emits and where the walk goes next.
    fn step(self, column: CellType) -> (CellType, ReadState) {
        match (column, self.in_sustain_run()) {
            (CellType::Rest, _) => (CellType::Rest, ReadState::ReadingRest),
            (CellType::NoteSustain, true) => {
                (CellType::NoteSustain, ReadState::ContinuingSustainRun)
            }
            (CellType::NoteSustain, false) => (CellType::NoteStart, ReadState::StartingSustainRun),
            (CellType::NoteStart, true) => (CellType::NoteSustain, ReadState::ReadingStandaloneNote),
            (CellType::NoteStart, false) => (CellType::NoteStart, ReadState::ReadingStandaloneNote),
        }
    }
}

/// Re-derive cell types for backward playback.
///
/// The output has the same length as the input and is in backward playing
/// order (output column 0 corresponds to the last input column).
pub fn reverse_cell_types(cell_types: &[CellType]) -> Vec<CellType> {
    let mut reversed = Vec::with_capacity(cell_types.len());
    let mut state = ReadState::ReadingRest;
    for &column in cell_types.iter().rev() {
        let (emitted, next) = state.step(column);
        reversed.push(emitted);
        state = next;
    }
    reversed
}

fn reversed_column<T: Copy>(column: &[T]) -> Vec<T> {
    column.iter().rev().copied().collect()
}

impl GridPhrase {
    /// The phrase as it sounds played backward.
    ///
    /// Same length, unit duration, total duration and metadata; applying it
    /// twice restores the original cell types.
    pub fn reversed(&self) -> GridPhrase {
        let mut phrase = self.clone();
        phrase.replace_columns(
            reversed_column(self.column_pitches()),
            reversed_column(self.column_dynamics()),
            reversed_column(self.column_articulations()),
            reversed_column(self.column_pans()),
            reverse_cell_types(self.cell_types()),
        );
        phrase
    }

    /// The grid to play in `direction`.
    pub fn oriented(&self, direction: Direction) -> GridPhrase {
        match direction {
            Direction::Forward => self.clone(),
            Direction::Backward => self.reversed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{check_cell_types, GridCell};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use CellType::*;

    #[test]
    fn test_lone_notes_and_rests() {
        assert_eq!(reverse_cell_types(&[NoteStart, Rest, NoteStart]), vec![NoteStart, Rest, NoteStart]);
        assert_eq!(reverse_cell_types(&[Rest, Rest]), vec![Rest, Rest]);
        assert_eq!(reverse_cell_types(&[]), Vec::<CellType>::new());
    }

    #[test]
    fn test_sustain_run_flips() {
        assert_eq!(
            reverse_cell_types(&[NoteStart, NoteSustain, NoteSustain]),
            vec![NoteStart, NoteSustain, NoteSustain]
        );
        assert_eq!(
            reverse_cell_types(&[NoteStart, NoteSustain, NoteStart]),
            vec![NoteStart, NoteStart, NoteSustain]
        );
    }

    #[test]
    fn test_adjacent_runs_stay_separate() {
        assert_eq!(
            reverse_cell_types(&[NoteStart, NoteSustain, NoteStart, NoteSustain, NoteSustain]),
            vec![NoteStart, NoteSustain, NoteSustain, NoteStart, NoteSustain]
        );
    }

    fn random_cell_types(rng: &mut StdRng, len: usize) -> Vec<CellType> {
        let mut cells: Vec<CellType> = Vec::with_capacity(len);
        for i in 0..len {
            let candidate = match rng.gen_range(0..3) {
                0 => Rest,
                1 => NoteStart,
                _ => NoteSustain,
            };
            let allowed = candidate != NoteSustain || (i > 0 && cells[i - 1] != Rest);
            cells.push(if allowed { candidate } else { NoteStart });
        }
        cells
    }

    #[test]
    fn test_random_grids_round_trip() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..500 {
            let len = rng.gen_range(0..24);
            let forward = random_cell_types(&mut rng, len);
            let backward = reverse_cell_types(&forward);

            assert_eq!(backward.len(), forward.len());
            assert!(check_cell_types(&backward).is_ok(), "invalid reversal of {:?}", forward);
            assert_eq!(reverse_cell_types(&backward), forward);
        }
    }

    #[test]
    fn test_reversed_phrase_keeps_duration_and_notes() {
        let phrase = GridPhrase::from_cells(
            0.25,
            [
                GridCell::note(60.0, 0.8, 0.8, 0.0),
                GridCell::sustain(60.0, 0.8, 0.8, 0.0),
                GridCell::note(64.0, 0.5, 0.8, 0.0),
                GridCell::rest(0.8, 0.0),
            ],
        )
        .unwrap();
        let backward = phrase.reversed();

        assert_eq!(backward.len(), 4);
        assert_eq!(backward.total_duration(), phrase.total_duration());
        assert_eq!(backward.column_pitches(), &[0.0, 64.0, 60.0, 60.0]);
        assert_eq!(backward.durations(), vec![0.25, 0.25, 0.5]);
        assert!(backward.entry(0).unwrap().is_rest());
        assert_eq!(backward.entry(1).unwrap().dynamic, 0.5);

        let restored = backward.reversed();
        assert_eq!(restored.cell_types(), phrase.cell_types());
        assert_eq!(restored.total_duration(), phrase.total_duration());
        assert_eq!(restored, phrase);
    }

    #[test]
    fn test_oriented() {
        let phrase = GridPhrase::from_cells(0.5, [GridCell::note(60.0, 0.8, 0.8, 0.0), GridCell::rest(0.8, 0.0)]).unwrap();
        assert_eq!(phrase.oriented(Direction::Forward), phrase);
        assert_eq!(phrase.oriented(Direction::Backward).cell_types(), &[Rest, NoteStart]);
        assert_eq!(Direction::Forward.flipped(), Direction::Backward);
    }
}
