//! # Phasing Session
//!
//! Binds one phrase to the two players of a phasing performance.
//!
//! ## Purpose
//! Both players play the same phrase, each against its own clock. Once per
//! frame the host reports both clock positions; the session smooths each
//! report into a clean delta, advances that player's reader by it, and hands
//! the same deltas back so rendering moves exactly as far as playback did.
//! Note boundaries crossed during the frame are queued and drained as
//! ready-to-send triggers.
//!
//! ## Example
//! ```rust
//! use phasing::{GridCell, GridPhrase, PhasingSession, PlayerId, SessionConfig};
//!
//! let phrase = GridPhrase::from_cells(0.25, [
//!     GridCell::note(60.0, 0.8, 0.8, 0.0),
//!     GridCell::note(64.0, 0.8, 0.8, 0.0),
//! ])?;
//! let mut session = PhasingSession::new(phrase, SessionConfig::default());
//!
//! let deltas = session.tick(0.1, 0.1);
//! assert_eq!(deltas.a, deltas.b);
//! let triggers = session.drain_triggers();
//! assert_eq!(triggers.len(), 2);
//! assert_eq!(triggers[0].player, PlayerId::A);
//! assert_eq!(triggers[0].trigger.pitch, 60.0);
//! # Ok::<(), phasing::PhasingError>(())
//! ```
//!
//! ## Related Modules
//! - `reader` - The per-player cursor
//! - `transport` - The per-player delta smoother
//! - `reversal` - The grid played when the direction is backward

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::performance::{NoteTrigger, Performance};
use crate::phrase::GridPhrase;
use crate::reader::{NoteListener, PhraseReader, ReaderId};
use crate::reversal::Direction;
use crate::transport::{TickPosition, TransportSmoother, DEFAULT_DAMPING_GAIN};

/// One of the two players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerId {
    A,
    B,
}

impl PlayerId {
    pub const ALL: [PlayerId; 2] = [PlayerId::A, PlayerId::B];

    fn slot(self) -> usize {
        match self {
            PlayerId::A => 0,
            PlayerId::B => 1,
        }
    }

    fn reader_id(self) -> ReaderId {
        ReaderId(self.slot())
    }
}

/// Session settings, loadable from YAML (`damping-gain`, `direction`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SessionConfig {
    pub damping_gain: f64,
    pub direction: Direction,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            damping_gain: DEFAULT_DAMPING_GAIN,
            direction: Direction::Forward,
        }
    }
}

/// Corrected musical-time deltas applied this frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameDeltas {
    pub a: f64,
    pub b: f64,
}

impl FrameDeltas {
    pub fn get(&self, player: PlayerId) -> f64 {
        match player {
            PlayerId::A => self.a,
            PlayerId::B => self.b,
        }
    }
}

/// A note boundary crossed by a player, ready for the audio engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledTrigger {
    pub player: PlayerId,
    pub index: usize,
    pub trigger: NoteTrigger,
}

/// Listener that queues crossed boundaries until the session drains them.
#[derive(Debug, Clone, Default)]
pub struct TriggerQueue {
    pending: Vec<usize>,
}

impl NoteListener for TriggerQueue {
    fn on_note(&mut self, _reader: ReaderId, index: usize) {
        self.pending.push(index);
    }
}

#[derive(Debug, Clone)]
struct Player {
    reader: PhraseReader<TriggerQueue>,
    smoother: TransportSmoother,
    /// Accumulated corrected position, wrapped to the loop.
    position: f64,
}

impl Player {
    fn new(id: PlayerId, total_duration: f64, gain: f64) -> Self {
        Self {
            reader: PhraseReader::new(id.reader_id(), TriggerQueue::default()),
            smoother: TransportSmoother::with_gain(total_duration, gain),
            position: 0.0,
        }
    }
}

fn wrap(position: f64, total: f64) -> f64 {
    if total > 0.0 {
        position.rem_euclid(total)
    } else {
        0.0
    }
}

/// Keep the same fraction of the loop when its length changes.
fn rescale(position: f64, old_total: f64, new_total: f64) -> f64 {
    if old_total > 0.0 {
        wrap(position / old_total * new_total, new_total)
    } else {
        0.0
    }
}

/// Two players reading one phrase against independent clocks.
#[derive(Debug, Clone)]
pub struct PhasingSession {
    phrase: GridPhrase,
    played: GridPhrase,
    direction: Direction,
    players: [Player; 2],
}

impl PhasingSession {
    pub fn new(phrase: GridPhrase, config: SessionConfig) -> Self {
        let played = phrase.oriented(config.direction);
        let total = played.total_duration();
        debug!(
            columns = phrase.len(),
            total,
            direction = ?config.direction,
            "starting phasing session"
        );
        Self {
            phrase,
            played,
            direction: config.direction,
            players: [
                Player::new(PlayerId::A, total, config.damping_gain),
                Player::new(PlayerId::B, total, config.damping_gain),
            ],
        }
    }

    /// The phrase as authored, regardless of direction.
    pub fn phrase(&self) -> &GridPhrase {
        &self.phrase
    }

    /// The compiled sequence actually being played.
    pub fn performance(&self) -> &Performance {
        self.played.performance()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn total_duration(&self) -> f64 {
        self.played.total_duration()
    }

    /// Feed both players' reported positions for this frame.
    ///
    /// Returns the corrected deltas each reader was advanced by; render with
    /// these so animation and audio agree.
    pub fn tick(&mut self, position_a: f64, position_b: f64) -> FrameDeltas {
        let performance = self.played.performance();
        let total = performance.total_duration();
        let mut deltas = [0.0; 2];
        for (player, (reported, delta)) in self
            .players
            .iter_mut()
            .zip([position_a, position_b].into_iter().zip(deltas.iter_mut()))
        {
            *delta = player.smoother.update(reported);
            player.reader.advance(performance, *delta);
            player.position = wrap(player.position + *delta, total);
        }
        FrameDeltas {
            a: deltas[0],
            b: deltas[1],
        }
    }

    /// Like [`tick`](Self::tick), for raw tick reports.
    pub fn tick_ticks(&mut self, position_a: TickPosition, position_b: TickPosition) -> FrameDeltas {
        let total = self.total_duration();
        self.tick(position_a.to_musical_time(total), position_b.to_musical_time(total))
    }

    /// Take every trigger queued since the last drain, player A first.
    pub fn drain_triggers(&mut self) -> Vec<ScheduledTrigger> {
        let performance = self.played.performance();
        let mut triggers = Vec::new();
        for (player, id) in self.players.iter_mut().zip(PlayerId::ALL) {
            for index in player.reader.listener_mut().pending.drain(..) {
                if let Some(trigger) = performance.trigger(index) {
                    triggers.push(ScheduledTrigger {
                        player: id,
                        index,
                        trigger,
                    });
                }
            }
        }
        triggers
    }

    /// Entry currently sounding for `player`, for view highlighting.
    pub fn active_index(&self, player: PlayerId) -> Option<usize> {
        self.players[player.slot()].reader.current_index()
    }

    /// Accumulated corrected position of `player`, wrapped to the loop.
    pub fn position(&self, player: PlayerId) -> f64 {
        self.players[player.slot()].position
    }

    /// How far B is ahead of A, wrapped into (-total/2, total/2].
    pub fn phase_offset(&self) -> f64 {
        let total = self.total_duration();
        if total <= 0.0 {
            return 0.0;
        }
        let offset = (self.position(PlayerId::B) - self.position(PlayerId::A)).rem_euclid(total);
        if offset > total / 2.0 {
            offset - total
        } else {
            offset
        }
    }

    /// Back to the top: readers before the first entry, smoothers without history.
    pub fn restart(&mut self) {
        for player in &mut self.players {
            player.reader.reset();
            player.reader.listener_mut().pending.clear();
            player.smoother.reset(0.0);
            player.position = 0.0;
        }
        debug!("session restarted");
    }

    /// Silently relocate both players, e.g. when a dormant view becomes active.
    ///
    /// No triggers are queued; anything still pending is dropped. A player
    /// given a non-finite position stays where it is.
    pub fn wake_up(&mut self, position_a: f64, position_b: f64) {
        let performance = self.played.performance();
        let total = performance.total_duration();
        for (player, reported) in self.players.iter_mut().zip([position_a, position_b]) {
            if !reported.is_finite() {
                continue;
            }
            let position = wrap(reported, total);
            player.reader.wake_up(performance, position);
            player.reader.listener_mut().pending.clear();
            player.smoother.reset(position);
            player.position = position;
        }
    }

    /// Mutate the phrase, then recompile and re-seat both players.
    ///
    /// Each player keeps the same fraction of the loop, so a structural edit
    /// never leaves a reader pointing past the end of the new sequence.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut GridPhrase) -> R) -> R {
        let old_total = self.total_duration();
        let result = f(&mut self.phrase);
        self.played = self.phrase.oriented(self.direction);

        let performance = self.played.performance();
        let new_total = performance.total_duration();
        for player in &mut self.players {
            let reported = rescale(player.smoother.previous_position(), old_total, new_total);
            player.smoother.set_total_duration(new_total, reported);
            player.position = rescale(player.position, old_total, new_total);
            player.reader.wake_up(performance, player.position);
            player.reader.listener_mut().pending.clear();
        }
        debug!(
            old_total,
            new_total,
            entries = performance.len(),
            "phrase edited"
        );
        result
    }

    /// Switch between the forward grid and its reversal.
    ///
    /// Each reader resumes at the mirrored point, so the note under it stays
    /// the same.
    pub fn set_direction(&mut self, direction: Direction) {
        if direction == self.direction {
            return;
        }
        self.direction = direction;
        self.played = self.phrase.oriented(direction);

        let performance = self.played.performance();
        let total = performance.total_duration();
        for player in &mut self.players {
            player.position = wrap(total - player.position, total);
            player.reader.wake_up(performance, player.position);
            player.reader.listener_mut().pending.clear();
        }
        debug!(?direction, "direction changed");
    }
}
