//! # Error Types
//!
//! This module defines all error types for the phasing core.
//!
//! Nothing in this crate panics across a component boundary: invalid edits and
//! malformed phrase files come back as a [`PhasingError`] value, and the caller
//! decides whether to retry, report or ignore them.
//!
//! ## Error Types
//! - Edit errors (`IndexOutOfRange`, `SustainAtStart`, `SustainAfterRest`,
//!   `OrphanedSustain`, `UnknownCellType`) - rejected grid edits, no mutation performed
//! - Construction errors (`ColumnLengthMismatch`, `InvalidUnitDuration`) - bad bulk input
//! - `ParseError` - phrase text errors with line and column information
//! - `MetadataError` - invalid YAML frontmatter or persisted document
//!
//! ## Usage
//! ```rust
//! use phasing::{CellType, GridPhrase, PhasingError};
//!
//! let mut phrase = GridPhrase::new(0.25).unwrap();
//! phrase.append_cell();
//!
//! match phrase.set_cell(0, 60.0, 0.8, CellType::NoteSustain, None, None) {
//!     Ok(()) => println!("Edited"),
//!     Err(PhasingError::SustainAtStart) => println!("A phrase cannot open with a sustain"),
//!     Err(e) => println!("Rejected: {}", e),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhasingError {
    /// Column index outside the grid.
    ///
    /// # Example
    /// ```
    /// # use phasing::PhasingError;
    /// let err = PhasingError::IndexOutOfRange { index: 8, len: 4 };
    /// assert_eq!(err.to_string(), "Column 8 is out of range for a grid of 4 columns");
    /// ```
    #[error("Column {index} is out of range for a grid of {len} columns")]
    IndexOutOfRange { index: usize, len: usize },

    /// A sustain was written into column 0, where there is no note to extend.
    #[error("Column 0 cannot be a sustain: there is no note before it to extend")]
    SustainAtStart,

    /// A sustain was written directly after a rest.
    ///
    /// # Example
    /// ```
    /// # use phasing::PhasingError;
    /// let err = PhasingError::SustainAfterRest { index: 3 };
    /// assert_eq!(err.to_string(), "Column 3 cannot be a sustain: column 2 is a rest");
    /// ```
    #[error("Column {index} cannot be a sustain: column {} is a rest", .index - 1)]
    SustainAfterRest { index: usize },

    /// A rest was written in front of an existing sustain.
    #[error("Column {index} cannot become a rest: column {} sustains it", .index + 1)]
    OrphanedSustain { index: usize },

    /// A raw cell tag that is none of rest (0), note start (1) or sustain (2).
    #[error("Unknown cell type tag: {0}")]
    UnknownCellType(u8),

    /// Bulk column input whose arrays disagree in length.
    #[error("Column arrays must share one length: {column} has {actual} entries, expected {expected}")]
    ColumnLengthMismatch {
        column: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Unit duration that is zero, negative or not finite.
    #[error("Unit duration must be a positive, finite musical time (got {0})")]
    InvalidUnitDuration(f64),

    /// Phrase text error with location information.
    ///
    /// # Example
    /// ```
    /// # use phasing::PhasingError;
    /// let err = PhasingError::ParseError {
    ///     line: 5,
    ///     column: 10,
    ///     message: "Unexpected token 'X'".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Parse error at line 5, column 10: Unexpected token 'X'");
    /// ```
    #[error("Parse error at line {line}, column {column}: {message}")]
    ParseError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Invalid frontmatter or persisted document.
    #[error("Invalid metadata: {0}")]
    MetadataError(String),
}

impl PhasingError {
    /// True for errors produced by a rejected grid edit.
    ///
    /// Edit errors leave the grid untouched, so the caller may simply retry
    /// with different input.
    pub fn is_invalid_edit(&self) -> bool {
        matches!(
            self,
            PhasingError::IndexOutOfRange { .. }
                | PhasingError::SustainAtStart
                | PhasingError::SustainAfterRest { .. }
                | PhasingError::OrphanedSustain { .. }
                | PhasingError::UnknownCellType(_)
        )
    }
}
