use crate::link::DisconnectReason;
use crate::score::{FinalScores, Side};
use crate::typing::Outcome;

/// Snapshot of the local player after a text change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalProgress {
    /// characters typed into the current passage (capped at its length)
    pub position: usize,
    /// characters matching the passage
    pub correct: usize,
    /// cumulative errors across the match
    pub errors: u32,
    /// `correct / passage length`
    pub progress: f64,
    /// outcome of the character at `position - 1`, if any
    pub last: Option<Outcome>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpponentProgress {
    pub position: usize,
    pub errors: u32,
    pub progress: f64,
    /// `None` when the source does not say (remote peers only report totals)
    pub last: Option<Outcome>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub scores: FinalScores,
    pub winner: Option<Side>,
    pub rounds_played: u32,
    pub passages_completed: (u32, u32),
    /// the opponent never delivered a final score
    pub opponent_defaulted: bool,
}

/// Coarse lifecycle stage of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    Countdown,
    Active,
    Paused,
    RoundTransition,
    Ended,
}

/// Everything the match tells the presentation layer
///
/// Calls arrive on the thread that drives the controller. All methods default to doing
/// nothing so a presenter only implements what it shows.
pub trait MatchObserver {
    fn on_phase(&mut self, _phase: Phase) {}

    fn on_countdown(&mut self, _seconds_left: u32) {}

    fn on_passage(&mut self, _side: Side, _index: usize, _passage: &str) {}

    fn on_local_progress(&mut self, _progress: &LocalProgress) {}

    fn on_opponent_progress(&mut self, _progress: &OpponentProgress) {}

    fn on_scores(&mut self, _scores: &FinalScores) {}

    fn on_round_timer(&mut self, _seconds_remaining: u32) {}

    fn on_faded(&mut self, _side: Side, _faded_upto: usize) {}

    fn on_passage_completed(&mut self, _side: Side, _completed: u32) {}

    fn on_round_ended(&mut self, _round: u32, _winner: Option<Side>, _scores: &FinalScores) {}

    fn on_match_ended(&mut self, _result: &MatchResult) {}

    fn on_opponent_disconnected(&mut self, _reason: &str) {}

    fn on_notice(&mut self, _message: &str) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl MatchObserver for NullObserver {}

/// Human-readable disconnect notice, worded for each role.
pub fn disconnect_notice(is_host: bool, reason: &DisconnectReason) -> String {
    let base = if is_host {
        "Opponent disconnected."
    } else {
        "Host ended the game."
    };
    match reason {
        DisconnectReason::Left => base.to_string(),
        DisconnectReason::Lost(detail) => format!("{} ({})", base, detail),
    }
}
