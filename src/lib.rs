pub mod cell;
pub mod clock;
pub mod document;
pub mod error;
pub mod parser;
pub mod performance;
pub mod phrase;
pub mod reader;
pub mod reversal;
pub mod session;
pub mod transport;

pub use cell::*;
pub use clock::{TickClock, DEFAULT_TICKS_PER_WHOLE};
pub use document::PhraseDocument;
pub use error::*;
pub use parser::{parse, to_source, PhraseFile};
pub use performance::{compile, NoteTrigger, Performance, PerformanceEntry};
pub use phrase::{GridPhrase, ScaleInfo, DEFAULT_ARTICULATION, DEFAULT_PAN};
pub use reader::{NoteListener, PhraseReader, ReaderId, Silent};
pub use reversal::{reverse_cell_types, Direction};
pub use session::{FrameDeltas, PhasingSession, PlayerId, ScheduledTrigger, SessionConfig, TriggerQueue};
pub use transport::{TickPosition, TransportSmoother, DEFAULT_DAMPING_GAIN};

/// Parse a phrase file and compile it, ready for a session.
///
/// # Example
/// ```
/// let file = phasing::load("60 - 64 .")?;
/// assert_eq!(file.phrase.entry_count(), 3);
/// assert!(file.phrase.is_compiled());
/// # Ok::<(), phasing::PhasingError>(())
/// ```
pub fn load(source: &str) -> Result<PhraseFile, PhasingError> {
    let file = parse(source)?;
    file.phrase.performance();
    Ok(file)
}
