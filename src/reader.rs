//! # Phrase Reader
//!
//! A cursor that walks a compiled [`Performance`] by musical-time deltas and
//! fires an event at every note boundary it crosses.
//!
//! ## State
//! - `current_index`: the entry being played, `None` before the first boundary
//! - `time_until_next_boundary`: musical time left before the next entry begins
//!
//! ## Entry Points
//! - [`PhraseReader::advance`] - move forward by a delta, firing the listener once
//!   per crossed boundary, in order (a large delta can cross several)
//! - [`PhraseReader::wake_up`] - silently relocate to an absolute position without
//!   replaying any events, e.g. when a dormant view becomes active again
//!
//! Readers hold no reference to a phrase; the caller passes the compiled
//! sequence on every call and must pass the same sequence each time. After a
//! structural edit the indices only make sense against the new sequence, so
//! callers must `wake_up` (or `reset`) their readers before advancing again.
//! [`PhasingSession`](crate::PhasingSession) does this for its two players.
//!
//! Non-finite deltas and positions are ignored and leave the reader untouched.
//!
//! ## Example
//! ```rust
//! use phasing::{GridCell, GridPhrase, PhraseReader, ReaderId};
//!
//! let phrase = GridPhrase::from_cells(0.5, [
//!     GridCell::note(60.0, 0.8, 0.8, 0.0),
//!     GridCell::note(62.0, 0.8, 0.8, 0.0),
//! ])?;
//!
//! let mut fired = Vec::new();
//! let mut reader = PhraseReader::new(ReaderId(0), |_: ReaderId, index: usize| fired.push(index));
//! reader.advance(phrase.performance(), 0.75);
//! assert_eq!(reader.current_index(), Some(1));
//! assert_eq!(reader.time_until_next_boundary(), 0.25);
//! drop(reader);
//! assert_eq!(fired, vec![0, 1]);
//! # Ok::<(), phasing::PhasingError>(())
//! ```

use crate::performance::Performance;

/// Identity passed to the listener so one listener can serve several readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReaderId(pub usize);

/// Receives note-boundary events.
///
/// Called synchronously from inside [`PhraseReader::advance`]; implementations
/// should only record the event (enqueue a trigger, store a highlighted index).
pub trait NoteListener {
    fn on_note(&mut self, reader: ReaderId, index: usize);
}

impl<F> NoteListener for F
where
    F: FnMut(ReaderId, usize),
{
    fn on_note(&mut self, reader: ReaderId, index: usize) {
        self(reader, index)
    }
}

/// Listener that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl NoteListener for Silent {
    fn on_note(&mut self, _reader: ReaderId, _index: usize) {}
}

/// Traversal cursor over one performance sequence.
#[derive(Debug, Clone)]
pub struct PhraseReader<L> {
    id: ReaderId,
    current_index: Option<usize>,
    time_until_next_boundary: f64,
    listener: L,
}

impl<L: NoteListener> PhraseReader<L> {
    /// A reader positioned before the first entry.
    pub fn new(id: ReaderId, listener: L) -> Self {
        Self {
            id,
            current_index: None,
            time_until_next_boundary: 0.0,
            listener,
        }
    }

    pub fn id(&self) -> ReaderId {
        self.id
    }

    /// Entry being played, `None` before the first boundary.
    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn time_until_next_boundary(&self) -> f64 {
        self.time_until_next_boundary
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    pub fn into_listener(self) -> L {
        self.listener
    }

    /// Return to the before-first state.
    pub fn reset(&mut self) {
        self.current_index = None;
        self.time_until_next_boundary = 0.0;
    }

    /// Move forward by `delta` musical time.
    ///
    /// Every boundary crossed fires the listener with the new index, in order.
    /// Returns the number of events fired. On an empty sequence this is a no-op.
    pub fn advance(&mut self, performance: &Performance, delta: f64) -> usize {
        if !delta.is_finite() || !is_playable(performance) {
            return 0;
        }
        debug_assert!(
            self.current_index.map_or(true, |index| index < performance.len()),
            "reader advanced against a sequence it was not woken on"
        );
        self.time_until_next_boundary -= delta;
        let mut fired = 0;
        while let Some(index) = self.cross_boundary(performance) {
            self.listener.on_note(self.id, index);
            fired += 1;
        }
        fired
    }

    /// Silently relocate to the state reached after traveling `position`
    /// musical time from the start of the phrase.
    ///
    /// No listener is invoked. The resulting state depends only on
    /// `position mod total_duration`. A non-finite position is ignored.
    pub fn wake_up(&mut self, performance: &Performance, position: f64) {
        if !position.is_finite() {
            return;
        }
        self.reset();
        if !is_playable(performance) {
            return;
        }
        self.time_until_next_boundary = -position.rem_euclid(performance.total_duration());
        while self.cross_boundary(performance).is_some() {}
    }

    /// Step over one boundary if the remainder has run out.
    fn cross_boundary(&mut self, performance: &Performance) -> Option<usize> {
        if self.time_until_next_boundary > 0.0 || !is_playable(performance) {
            return None;
        }
        let next = match self.current_index {
            Some(index) => (index + 1) % performance.len(),
            None => 0,
        };
        let duration = performance.entry(next)?.duration;
        self.current_index = Some(next);
        self.time_until_next_boundary += duration;
        Some(next)
    }
}

/// A sequence with no entries, or no length, has no boundaries to cross.
fn is_playable(performance: &Performance) -> bool {
    !performance.is_empty() && performance.total_duration() > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::GridCell;
    use crate::phrase::GridPhrase;

    fn two_note_phrase() -> GridPhrase {
        GridPhrase::from_cells(
            0.5,
            [
                GridCell::note(60.0, 0.8, 0.8, 0.0),
                GridCell::note(62.0, 0.8, 0.8, 0.0),
            ],
        )
        .unwrap()
    }

    #[derive(Debug, Default)]
    struct Recorder(Vec<(ReaderId, usize)>);

    impl NoteListener for Recorder {
        fn on_note(&mut self, reader: ReaderId, index: usize) {
            self.0.push((reader, index));
        }
    }

    fn recording_reader() -> PhraseReader<Recorder> {
        PhraseReader::new(ReaderId(7), Recorder::default())
    }

    #[test]
    fn test_advance_crosses_two_boundaries() {
        let phrase = two_note_phrase();
        let mut reader = recording_reader();

        let fired = reader.advance(phrase.performance(), 0.75);

        assert_eq!(fired, 2);
        assert_eq!(reader.current_index(), Some(1));
        assert_eq!(reader.time_until_next_boundary(), 0.25);
        assert_eq!(reader.listener().0, vec![(ReaderId(7), 0), (ReaderId(7), 1)]);
    }

    #[test]
    fn test_advance_small_steps() {
        let phrase = two_note_phrase();
        let mut reader = recording_reader();

        assert_eq!(reader.advance(phrase.performance(), 0.0), 1); // first entry starts at once
        assert_eq!(reader.advance(phrase.performance(), 0.25), 0);
        assert_eq!(reader.advance(phrase.performance(), 0.25), 1);
        assert_eq!(reader.current_index(), Some(1));
        assert_eq!(reader.advance(phrase.performance(), 0.5), 1);
        assert_eq!(reader.current_index(), Some(0)); // wrapped
    }

    #[test]
    fn test_advance_empty_sequence_is_noop() {
        let phrase = GridPhrase::new(0.25).unwrap();
        let mut reader = recording_reader();
        assert_eq!(reader.advance(phrase.performance(), 10.0), 0);
        assert_eq!(reader.current_index(), None);
        assert_eq!(reader.time_until_next_boundary(), 0.0);
        assert!(reader.listener().0.is_empty());
    }

    #[test]
    fn test_wake_up_fires_nothing() {
        let phrase = two_note_phrase();
        let mut reader = recording_reader();
        reader.wake_up(phrase.performance(), 0.75);
        assert_eq!(reader.current_index(), Some(1));
        assert_eq!(reader.time_until_next_boundary(), 0.25);
        assert!(reader.listener().0.is_empty());
    }

    #[test]
    fn test_wake_up_depends_only_on_position_mod_total() {
        let phrase = two_note_phrase();
        let mut reader = recording_reader();
        reader.advance(phrase.performance(), 3.3);

        reader.wake_up(phrase.performance(), 0.25);
        let first = (reader.current_index(), reader.time_until_next_boundary());
        reader.wake_up(phrase.performance(), 5.25);
        let second = (reader.current_index(), reader.time_until_next_boundary());
        reader.wake_up(phrase.performance(), -0.75);
        let third = (reader.current_index(), reader.time_until_next_boundary());

        assert_eq!(first, (Some(0), 0.25));
        assert_eq!(first, second);
        assert_eq!(first, third);
    }

    #[test]
    fn test_wake_up_on_boundary() {
        let phrase = two_note_phrase();
        let mut reader = recording_reader();
        reader.wake_up(phrase.performance(), 0.5);
        assert_eq!(reader.current_index(), Some(1));
        assert_eq!(reader.time_until_next_boundary(), 0.5);
    }

    #[test]
    fn test_wake_up_empty_sequence() {
        let phrase = GridPhrase::new(0.25).unwrap();
        let mut reader = recording_reader();
        reader.wake_up(phrase.performance(), 3.0);
        assert_eq!(reader.current_index(), None);
        assert_eq!(reader.time_until_next_boundary(), 0.0);
    }

    #[test]
    fn test_advance_after_wake_up_continues() {
        let phrase = two_note_phrase();
        let mut reader = recording_reader();
        reader.wake_up(phrase.performance(), 0.75);
        reader.advance(phrase.performance(), 0.25);
        assert_eq!(reader.listener().0, vec![(ReaderId(7), 0)]);
    }

    #[test]
    fn test_closure_listener() {
        let phrase = two_note_phrase();
        let mut count = 0;
        let mut reader = PhraseReader::new(ReaderId(1), |_: ReaderId, _: usize| count += 1);
        reader.advance(phrase.performance(), 1.0);
        drop(reader);
        assert_eq!(count, 3);
    }

    #[test]
    fn test_non_finite_delta_is_ignored() {
        let phrase = two_note_phrase();
        let mut reader = recording_reader();
        reader.advance(phrase.performance(), 0.75);

        for delta in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(reader.advance(phrase.performance(), delta), 0);
            assert_eq!(reader.current_index(), Some(1));
            assert_eq!(reader.time_until_next_boundary(), 0.25);
        }
        assert_eq!(reader.listener().0.len(), 2);
    }

    #[test]
    fn test_non_finite_wake_up_is_ignored() {
        let phrase = two_note_phrase();
        let mut reader = recording_reader();
        reader.wake_up(phrase.performance(), 0.75);

        for position in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            reader.wake_up(phrase.performance(), position);
            assert_eq!(reader.current_index(), Some(1));
            assert_eq!(reader.time_until_next_boundary(), 0.25);
        }
        // Still walks on normally afterwards
        assert_eq!(reader.advance(phrase.performance(), 0.25), 1);
        assert_eq!(reader.current_index(), Some(0));
    }

    #[test]
    fn test_into_listener_hands_back_events() {
        let phrase = two_note_phrase();
        let mut reader = recording_reader();
        reader.advance(phrase.performance(), 1.0);
        let recorder = reader.into_listener();
        assert_eq!(recorder.0, vec![(ReaderId(7), 0), (ReaderId(7), 1), (ReaderId(7), 0)]);
    }

    #[test]
    fn test_silent_listener_and_reset() {
        let phrase = two_note_phrase();
        let mut reader = PhraseReader::new(ReaderId(0), Silent);
        assert_eq!(reader.advance(phrase.performance(), 0.6), 2);
        reader.reset();
        assert_eq!(reader.current_index(), None);
        assert_eq!(reader.time_until_next_boundary(), 0.0);
    }
}
