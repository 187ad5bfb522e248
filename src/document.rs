//! # Persisted Phrase Document
//!
//! The lossless, serializable form of a [`GridPhrase`]: the five column
//! arrays, the unit duration, the default articulation and pan, and the scale
//! metadata. The compiled performance sequence is derived data and never
//! stored.
//!
//! ## Example
//! ```rust
//! use phasing::{GridCell, GridPhrase};
//!
//! let phrase = GridPhrase::from_cells(0.25, [
//!     GridCell::note(60.0, 0.8, 0.8, 0.0),
//!     GridCell::sustain(60.0, 0.8, 0.8, 0.0),
//! ])?;
//!
//! let yaml = phrase.to_yaml()?;
//! let restored = GridPhrase::from_yaml(&yaml)?;
//! assert_eq!(restored, phrase);
//! # Ok::<(), phasing::PhasingError>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::cell::CellType;
use crate::error::PhasingError;
use crate::phrase::{GridPhrase, ScaleInfo, DEFAULT_ARTICULATION, DEFAULT_PAN};

/// Serializable snapshot of a grid phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PhraseDocument {
    pub unit_duration: f64,
    #[serde(default = "default_articulation")]
    pub default_articulation: f32,
    #[serde(default)]
    pub default_pan: f32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scale_root: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scale_name: String,
    pub pitches: Vec<f32>,
    pub dynamics: Vec<f32>,
    pub articulations: Vec<f32>,
    pub pans: Vec<f32>,
    pub cell_types: Vec<CellType>,
}

fn default_articulation() -> f32 {
    DEFAULT_ARTICULATION
}

impl PhraseDocument {
    pub fn to_yaml(&self) -> Result<String, PhasingError> {
        serde_yaml::to_string(self).map_err(|e| PhasingError::MetadataError(e.to_string()))
    }

    pub fn from_yaml(source: &str) -> Result<Self, PhasingError> {
        serde_yaml::from_str(source).map_err(|e| PhasingError::MetadataError(e.to_string()))
    }
}

impl GridPhrase {
    pub fn to_document(&self) -> PhraseDocument {
        PhraseDocument {
            unit_duration: self.unit_duration(),
            default_articulation: self.default_articulation(),
            default_pan: self.default_pan(),
            scale_root: self.scale().root.clone(),
            scale_name: self.scale().name.clone(),
            pitches: self.column_pitches().to_vec(),
            dynamics: self.column_dynamics().to_vec(),
            articulations: self.column_articulations().to_vec(),
            pans: self.column_pans().to_vec(),
            cell_types: self.cell_types().to_vec(),
        }
    }

    /// Rebuild a phrase, validating the grid invariants.
    pub fn from_document(document: PhraseDocument) -> Result<Self, PhasingError> {
        let phrase = GridPhrase::with_columns(
            document.unit_duration,
            document.pitches,
            document.dynamics,
            document.articulations,
            document.pans,
            document.cell_types,
        )?;
        Ok(phrase
            .with_defaults(document.default_articulation, document.default_pan)
            .with_scale(ScaleInfo {
                root: document.scale_root,
                name: document.scale_name,
            }))
    }

    pub fn to_yaml(&self) -> Result<String, PhasingError> {
        self.to_document().to_yaml()
    }

    pub fn from_yaml(source: &str) -> Result<Self, PhasingError> {
        Self::from_document(PhraseDocument::from_yaml(source)?)
    }
}

impl Default for PhraseDocument {
    fn default() -> Self {
        Self {
            unit_duration: 0.0625,
            default_articulation: DEFAULT_ARTICULATION,
            default_pan: DEFAULT_PAN,
            scale_root: String::new(),
            scale_name: String::new(),
            pitches: Vec::new(),
            dynamics: Vec::new(),
            articulations: Vec::new(),
            pans: Vec::new(),
            cell_types: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::GridCell;

    fn sample_phrase() -> GridPhrase {
        GridPhrase::from_cells(
            0.125,
            [
                GridCell::note(64.0, 0.9, 0.7, -0.5),
                GridCell::sustain(64.0, 0.9, 0.7, -0.5),
                GridCell::rest(0.8, 0.0),
                GridCell::note(66.5, 0.4, 1.0, 0.25),
            ],
        )
        .unwrap()
        .with_defaults(0.6, 0.1)
        .with_scale(ScaleInfo {
            root: "E".to_string(),
            name: "dorian".to_string(),
        })
    }

    #[test]
    fn test_yaml_round_trip() {
        let phrase = sample_phrase();
        let yaml = phrase.to_yaml().unwrap();
        assert!(yaml.contains("unit-duration: 0.125"));
        assert!(yaml.contains("scale-root: E"));

        let restored = GridPhrase::from_yaml(&yaml).unwrap();
        assert_eq!(restored, phrase);
        assert_eq!(restored.default_articulation(), 0.6);
        assert_eq!(restored.scale().name, "dorian");
    }

    #[test]
    fn test_document_rejects_invalid_grid() {
        let mut document = sample_phrase().to_document();
        document.cell_types[3] = CellType::NoteSustain;
        assert_eq!(
            GridPhrase::from_document(document),
            Err(PhasingError::SustainAfterRest { index: 3 })
        );
    }

    #[test]
    fn test_document_rejects_mismatched_columns() {
        let mut document = sample_phrase().to_document();
        document.pans.pop();
        assert!(matches!(
            GridPhrase::from_document(document),
            Err(PhasingError::ColumnLengthMismatch { column: "pan", .. })
        ));
    }

    #[test]
    fn test_malformed_yaml() {
        let result = GridPhrase::from_yaml("unit-duration: [oops");
        assert!(matches!(result, Err(PhasingError::MetadataError(_))));
    }

    #[test]
    fn test_defaults_are_optional() {
        let yaml = r#"
unit-duration: 0.25
pitches: [60]
dynamics: [0.8]
articulations: [0.8]
pans: [0.0]
cell-types: [start]
"#;
        let phrase = GridPhrase::from_yaml(yaml).unwrap();
        assert_eq!(phrase.default_articulation(), DEFAULT_ARTICULATION);
        assert_eq!(phrase.default_pan(), 0.0);
        assert_eq!(phrase.scale(), &ScaleInfo::default());
        assert_eq!(phrase.total_duration(), 0.25);
    }

    #[test]
    fn test_default_document_is_empty_phrase() {
        let phrase = GridPhrase::from_document(PhraseDocument::default()).unwrap();
        assert!(phrase.is_empty());
        assert_eq!(phrase.unit_duration(), 0.0625);
    }
}
