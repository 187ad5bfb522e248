//! # Grid Cell Types
//!
//! One grid column is one [`GridCell`]: a pitch, a dynamic, an articulation, a
//! pan position and a [`CellType`] saying how the column relates to its
//! neighbours.
//!
//! ## Cell Types
//! - `NoteStart` - opens a new note
//! - `NoteSustain` - extends the note opened to its left by one column
//! - `Rest` - silence
//!
//! ## Invariants
//! - `NoteSustain` never occurs at column 0
//! - `NoteSustain` never immediately follows a `Rest`
//!
//! [`check_cell_types`] verifies both for a whole column of cell types.

use serde::{Deserialize, Serialize};

use crate::error::PhasingError;

/// Role of a grid column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    #[serde(rename = "start")]
    NoteStart,
    #[serde(rename = "sustain")]
    NoteSustain,
    Rest,
}

impl CellType {
    /// Raw tag used by editors that pass cell types as numbers.
    pub const REST_TAG: u8 = 0;
    pub const NOTE_START_TAG: u8 = 1;
    pub const NOTE_SUSTAIN_TAG: u8 = 2;

    /// Decode a raw editor tag.
    ///
    /// # Example
    /// ```
    /// use phasing::{CellType, PhasingError};
    ///
    /// assert_eq!(CellType::from_tag(1), Ok(CellType::NoteStart));
    /// assert_eq!(CellType::from_tag(7), Err(PhasingError::UnknownCellType(7)));
    /// ```
    pub fn from_tag(tag: u8) -> Result<Self, PhasingError> {
        match tag {
            Self::REST_TAG => Ok(CellType::Rest),
            Self::NOTE_START_TAG => Ok(CellType::NoteStart),
            Self::NOTE_SUSTAIN_TAG => Ok(CellType::NoteSustain),
            other => Err(PhasingError::UnknownCellType(other)),
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            CellType::Rest => Self::REST_TAG,
            CellType::NoteStart => Self::NOTE_START_TAG,
            CellType::NoteSustain => Self::NOTE_SUSTAIN_TAG,
        }
    }

    /// True for columns that sound (start or sustain).
    pub fn is_note(self) -> bool {
        !matches!(self, CellType::Rest)
    }
}

/// A single grid column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    pub pitch: f32,
    pub dynamic: f32,
    pub articulation: f32,
    pub pan: f32,
    pub cell_type: CellType,
}

impl GridCell {
    /// A silent column with the given articulation and pan.
    pub fn rest(articulation: f32, pan: f32) -> Self {
        Self {
            pitch: 0.0,
            dynamic: 0.0,
            articulation,
            pan,
            cell_type: CellType::Rest,
        }
    }

    pub fn note(pitch: f32, dynamic: f32, articulation: f32, pan: f32) -> Self {
        Self {
            pitch,
            dynamic,
            articulation,
            pan,
            cell_type: CellType::NoteStart,
        }
    }

    pub fn sustain(pitch: f32, dynamic: f32, articulation: f32, pan: f32) -> Self {
        Self {
            cell_type: CellType::NoteSustain,
            ..Self::note(pitch, dynamic, articulation, pan)
        }
    }
}

/// Check whether `cell_type` may be placed at `index`, given the cell type
/// currently to its left.
pub(crate) fn check_placement(
    index: usize,
    cell_type: CellType,
    previous: Option<CellType>,
) -> Result<(), PhasingError> {
    if cell_type != CellType::NoteSustain {
        return Ok(());
    }
    match previous {
        None => Err(PhasingError::SustainAtStart),
        Some(CellType::Rest) => Err(PhasingError::SustainAfterRest { index }),
        Some(_) => Ok(()),
    }
}

/// Validate a whole column of cell types against the grid invariants.
pub fn check_cell_types(cell_types: &[CellType]) -> Result<(), PhasingError> {
    let mut previous = None;
    for (index, &cell_type) in cell_types.iter().enumerate() {
        check_placement(index, cell_type, previous)?;
        previous = Some(cell_type);
    }
    Ok(())
}
