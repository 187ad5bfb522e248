//! # Phrase File Parser
//!
//! Reads the plain-text phrase format into a [`GridPhrase`] plus playback
//! settings, and writes it back.
//!
//! ## Format
//! An optional YAML block between `---` lines, then the grid body. Body tokens
//! are separated by whitespace, one token per column:
//! - `64`, `61.5` - a note starting at that pitch, at the default dynamic
//! - `64:0.6` - a note with its own dynamic in [0, 1]
//! - `-` - holds the previous note for one more column
//! - `.` - a rest
//! - `|` - a bar line, ignored
//!
//! A column may override its articulation and pan with further `:` fields:
//! `pitch:dynamic:articulation:pan`, `-:articulation:pan` and
//! `.:articulation:pan`. An empty field keeps the default, so `.::0.5` is a
//! rest panned right. The last field may not be empty.
//!
//! ## Metadata Keys
//! | Key            | Default  | Meaning                                   |
//! |----------------|----------|-------------------------------------------|
//! | `title`        | none     | Display name                              |
//! | `unit`         | `0.0625` | Column length in whole notes              |
//! | `tempo`        | `72`     | Quarter-note BPM of player A              |
//! | `drift`        | `1.01`   | Tempo ratio of player B to player A       |
//! | `dynamic`      | `0.8`    | Dynamic of notes without an explicit one  |
//! | `articulation` | `0.8`    | Articulation of every column              |
//! | `pan`          | `0.0`    | Pan of every column                       |
//! | `root`, `scale`| empty    | Scale metadata, stored untouched          |
//!
//! ## Example
//! ```rust
//! use phasing::parse;
//!
//! let source = r#"---
//! title: Piano Phase
//! unit: 0.0625
//! ---
//! 64 66 71 73 | 74 66 64 73 | 71 66 74 73
//! "#;
//!
//! let file = parse(source)?;
//! assert_eq!(file.title, Some("Piano Phase".to_string()));
//! assert_eq!(file.phrase.len(), 12);
//! assert_eq!(file.phrase.total_duration(), 0.75);
//! # Ok::<(), phasing::PhasingError>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::cell::{CellType, GridCell};
use crate::error::PhasingError;
use crate::phrase::{GridPhrase, ScaleInfo, DEFAULT_ARTICULATION, DEFAULT_PAN};

pub const DEFAULT_UNIT: f64 = 0.0625;
pub const DEFAULT_TEMPO: f64 = 72.0;
pub const DEFAULT_DRIFT: f64 = 1.01;
pub const DEFAULT_DYNAMIC: f32 = 0.8;

const COLUMNS_PER_LINE: usize = 16;

/// Frontmatter as written in the file.
#[derive(Deserialize, Serialize, Debug, Default)]
#[serde(default, rename_all = "kebab-case")]
struct RawMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    unit: Option<f64>,
    tempo: Option<f64>,
    drift: Option<f64>,
    dynamic: Option<f32>,
    articulation: Option<f32>,
    pan: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scale: Option<String>,
}

/// A parsed phrase file: the grid plus how to play it.
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseFile {
    pub title: Option<String>,
    /// Quarter-note BPM of player A.
    pub tempo: f64,
    /// Player B runs at `tempo * drift`.
    pub drift: f64,
    /// Dynamic used for notes written without one.
    pub dynamic: f32,
    pub phrase: GridPhrase,
}

impl PhraseFile {
    /// Settings with every metadata default, around `phrase`.
    pub fn new(phrase: GridPhrase) -> Self {
        Self {
            title: None,
            tempo: DEFAULT_TEMPO,
            drift: DEFAULT_DRIFT,
            dynamic: DEFAULT_DYNAMIC,
            phrase,
        }
    }

    pub fn tempo_b(&self) -> f64 {
        self.tempo * self.drift
    }
}

/// Split a leading `---` block off the source.
///
/// Returns the metadata text, the body, and the 1-indexed line the body starts on.
fn extract_metadata(source: &str) -> (Option<String>, String, usize) {
    let lines: Vec<&str> = source.lines().collect();

    let start = match lines.iter().position(|line| !line.trim().is_empty()) {
        Some(i) if lines[i].trim() == "---" => i,
        _ => return (None, source.to_string(), 1),
    };
    let end = match lines[start + 1..].iter().position(|line| line.trim() == "---") {
        Some(offset) => start + 1 + offset,
        None => return (None, source.to_string(), 1),
    };

    let metadata_content = lines[start + 1..end].join("\n");
    let remaining = lines[end + 1..].join("\n");
    (Some(metadata_content), remaining, end + 2)
}

fn parse_yaml_metadata(content: &str) -> Result<RawMetadata, PhasingError> {
    if content.trim().is_empty() {
        return Ok(RawMetadata::default());
    }
    serde_yaml::from_str(content).map_err(|e| PhasingError::MetadataError(e.to_string()))
}

fn positive(key: &str, value: Option<f64>, default: f64) -> Result<f64, PhasingError> {
    match value {
        None => Ok(default),
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        Some(v) => Err(PhasingError::MetadataError(format!(
            "{} must be positive, got {}",
            key, v
        ))),
    }
}

fn valid_dynamic(value: f32) -> bool {
    value > 0.0 && value <= 1.0
}

fn finite(key: &str, value: Option<f32>, default: f32) -> Result<f32, PhasingError> {
    match value {
        None => Ok(default),
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(PhasingError::MetadataError(format!(
            "{} must be a finite number, got {}",
            key, v
        ))),
    }
}

/// Parse a phrase file.
///
/// # Errors
/// - `MetadataError` for malformed YAML or out-of-range settings
/// - `ParseError` for an unreadable token or a misplaced `-`
pub fn parse(source: &str) -> Result<PhraseFile, PhasingError> {
    let (metadata, body, first_line) = extract_metadata(source);
    let raw = match metadata {
        Some(content) => parse_yaml_metadata(&content)?,
        None => RawMetadata::default(),
    };

    let unit = positive("unit", raw.unit, DEFAULT_UNIT)?;
    let tempo = positive("tempo", raw.tempo, DEFAULT_TEMPO)?;
    let drift = positive("drift", raw.drift, DEFAULT_DRIFT)?;
    let dynamic = raw.dynamic.unwrap_or(DEFAULT_DYNAMIC);
    if !valid_dynamic(dynamic) {
        return Err(PhasingError::MetadataError(format!(
            "dynamic must be in (0, 1], got {}",
            dynamic
        )));
    }
    let articulation = finite("articulation", raw.articulation, DEFAULT_ARTICULATION)?;
    let pan = finite("pan", raw.pan, DEFAULT_PAN)?;

    let cells = parse_body(&body, first_line, dynamic, articulation, pan)?;
    let phrase = GridPhrase::from_cells(unit, cells)?
        .with_defaults(articulation, pan)
        .with_scale(ScaleInfo {
            root: raw.root.unwrap_or_default(),
            name: raw.scale.unwrap_or_default(),
        });

    Ok(PhraseFile {
        title: raw.title,
        tempo,
        drift,
        dynamic,
        phrase,
    })
}

fn parse_body(
    body: &str,
    first_line: usize,
    dynamic: f32,
    articulation: f32,
    pan: f32,
) -> Result<Vec<GridCell>, PhasingError> {
    let mut cells: Vec<GridCell> = Vec::new();

    for (offset, line) in body.lines().enumerate() {
        let line_number = first_line + offset;
        for (column, token) in tokens(line) {
            let error = |message: String| PhasingError::ParseError {
                line: line_number,
                column,
                message,
            };

            let mut fields = token.split(':');
            let head = fields.next().unwrap_or(token);
            let fields: Vec<&str> = fields.collect();

            let cell = match head {
                "|" if fields.is_empty() => continue,
                "." => {
                    let (art, pan) = column_style(&fields, articulation, pan).map_err(error)?;
                    GridCell::rest(art, pan)
                }
                "-" => {
                    let (art, pan) = column_style(&fields, articulation, pan).map_err(error)?;
                    match cells.last() {
                        Some(previous) if previous.cell_type.is_note() => {
                            GridCell::sustain(previous.pitch, previous.dynamic, art, pan)
                        }
                        Some(_) => return Err(error("'-' cannot follow a rest".to_string())),
                        None => return Err(error("'-' cannot open the phrase".to_string())),
                    }
                }
                _ => parse_note(token, head, &fields, dynamic, articulation, pan).map_err(error)?,
            };
            cells.push(cell);
        }
    }

    Ok(cells)
}

/// Read one optional `:` field, empty meaning `default`.
fn field(fields: &[&str], index: usize, name: &str, default: f32) -> Result<f32, String> {
    match fields.get(index) {
        None => Ok(default),
        Some(text) if text.is_empty() => {
            if index + 1 == fields.len() {
                Err(format!("Empty trailing {} field", name))
            } else {
                Ok(default)
            }
        }
        Some(text) => text
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("Invalid {} '{}'", name, text)),
    }
}

/// Articulation and pan fields of a rest or sustain token.
fn column_style(fields: &[&str], articulation: f32, pan: f32) -> Result<(f32, f32), String> {
    if fields.len() > 2 {
        return Err("Too many fields, expected articulation and pan at most".to_string());
    }
    Ok((
        field(fields, 0, "articulation", articulation)?,
        field(fields, 1, "pan", pan)?,
    ))
}

fn parse_note(
    token: &str,
    pitch_text: &str,
    fields: &[&str],
    default_dynamic: f32,
    articulation: f32,
    pan: f32,
) -> Result<GridCell, String> {
    let pitch: f32 = pitch_text
        .parse()
        .ok()
        .filter(|p: &f32| p.is_finite())
        .ok_or_else(|| format!("Invalid note '{}'", token))?;

    if fields.len() > 3 {
        return Err(format!("Too many fields in '{}'", token));
    }
    let dynamic = field(fields, 0, "dynamic", default_dynamic)?;
    if !(0.0..=1.0).contains(&dynamic) {
        return Err(format!("Invalid dynamic '{}', expected a number in [0, 1]", dynamic));
    }
    let articulation = field(fields, 1, "articulation", articulation)?;
    let pan = field(fields, 2, "pan", pan)?;

    Ok(GridCell::note(pitch, dynamic, articulation, pan))
}

/// Whitespace-separated tokens with their 1-indexed column.
fn tokens(line: &str) -> impl Iterator<Item = (usize, &str)> + '_ {
    let mut rest = line;
    let mut consumed = 0;
    std::iter::from_fn(move || {
        let start = rest.find(|c: char| !c.is_whitespace())?;
        let after = &rest[start..];
        let len = after.find(char::is_whitespace).unwrap_or(after.len());
        let token = &after[..len];
        let column = line[..consumed + start].chars().count() + 1;
        consumed += start + len;
        rest = &after[len..];
        Some((column, token))
    })
}

/// Join a token head with its override fields, dropping trailing defaults.
fn token_with_fields(head: String, fields: &[Option<f32>]) -> String {
    let used = fields.iter().rposition(Option::is_some).map_or(0, |last| last + 1);
    let mut token = head;
    for value in &fields[..used] {
        token.push(':');
        if let Some(value) = value {
            token.push_str(&value.to_string());
        }
    }
    token
}

fn unless_default(value: f32, default: f32) -> Option<f32> {
    (value != default).then_some(value)
}

fn column_token(
    file: &PhraseFile,
    index: usize,
    cell: GridCell,
    previous: Option<GridCell>,
) -> Result<String, PhasingError> {
    let phrase = &file.phrase;
    let unwritable = |what: String| {
        PhasingError::MetadataError(format!("column {} cannot be written: {}", index, what))
    };
    if !cell.articulation.is_finite() || !cell.pan.is_finite() {
        return Err(unwritable(format!(
            "articulation {} and pan {} must be finite",
            cell.articulation, cell.pan
        )));
    }
    let articulation = unless_default(cell.articulation, phrase.default_articulation());
    let pan = unless_default(cell.pan, phrase.default_pan());

    let token = match cell.cell_type {
        CellType::Rest => {
            if cell.pitch != 0.0 || cell.dynamic != 0.0 {
                return Err(unwritable(format!(
                    "rest carries pitch {} and dynamic {}",
                    cell.pitch, cell.dynamic
                )));
            }
            token_with_fields(".".to_string(), &[articulation, pan])
        }
        CellType::NoteSustain => match previous {
            Some(p) if p.cell_type.is_note() && p.pitch == cell.pitch && p.dynamic == cell.dynamic => {
                token_with_fields("-".to_string(), &[articulation, pan])
            }
            _ => {
                return Err(unwritable(
                    "sustain does not continue the note before it".to_string(),
                ))
            }
        },
        CellType::NoteStart => {
            if !cell.pitch.is_finite() {
                return Err(unwritable(format!("pitch {} is not finite", cell.pitch)));
            }
            if !(0.0..=1.0).contains(&cell.dynamic) {
                return Err(unwritable(format!("dynamic {} is outside [0, 1]", cell.dynamic)));
            }
            let dynamic = unless_default(cell.dynamic, file.dynamic);
            token_with_fields(cell.pitch.to_string(), &[dynamic, articulation, pan])
        }
    };
    Ok(token)
}

/// Write a phrase file back to text.
///
/// Parsing the output reproduces the same grid and settings.
///
/// # Errors
/// `MetadataError` when a setting or a column has no text form: settings
/// `parse` would reject, a rest with a pitch or dynamic, a sustain that does
/// not continue its note, or non-finite values.
pub fn to_source(file: &PhraseFile) -> Result<String, PhasingError> {
    let phrase = &file.phrase;
    positive("tempo", Some(file.tempo), DEFAULT_TEMPO)?;
    positive("drift", Some(file.drift), DEFAULT_DRIFT)?;
    if !valid_dynamic(file.dynamic) {
        return Err(PhasingError::MetadataError(format!(
            "dynamic must be in (0, 1], got {}",
            file.dynamic
        )));
    }
    finite("articulation", Some(phrase.default_articulation()), DEFAULT_ARTICULATION)?;
    finite("pan", Some(phrase.default_pan()), DEFAULT_PAN)?;

    let scale = phrase.scale();
    let raw = RawMetadata {
        title: file.title.clone(),
        unit: Some(phrase.unit_duration()),
        tempo: Some(file.tempo),
        drift: Some(file.drift),
        dynamic: Some(file.dynamic),
        articulation: Some(phrase.default_articulation()),
        pan: Some(phrase.default_pan()),
        root: (!scale.root.is_empty()).then(|| scale.root.clone()),
        scale: (!scale.name.is_empty()).then(|| scale.name.clone()),
    };
    let metadata =
        serde_yaml::to_string(&raw).map_err(|e| PhasingError::MetadataError(e.to_string()))?;

    let mut tokens = Vec::with_capacity(phrase.len());
    let mut previous = None;
    for (index, cell) in phrase.cells().enumerate() {
        tokens.push(column_token(file, index, cell, previous)?);
        previous = Some(cell);
    }

    let mut source = format!("---\n{}---\n", metadata);
    for line in tokens.chunks(COLUMNS_PER_LINE) {
        source.push_str(&line.join(" "));
        source.push('\n');
    }
    Ok(source)
}
