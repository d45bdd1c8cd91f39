use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_ROUND_SECS: u32 = 60;
pub const DEFAULT_REMOTE_ROUND_SECS: u32 = 20;
pub const DEFAULT_DIFFICULTY: u8 = 5;
pub const MAX_DIFFICULTY: u8 = 10;

/// How quickly mistakes are revealed to the player. Also selects the passage tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackMode {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl FeedbackMode {
    /// Value carried in the `CFG` message
    pub fn wire_value(self) -> u32 {
        match self {
            FeedbackMode::Easy => 1,
            FeedbackMode::Medium => 2,
            FeedbackMode::Hard => 3,
        }
    }

    /// Unknown values fall back to medium, matching how passages are picked for them.
    pub fn from_wire(value: u32) -> Self {
        match value {
            1 => FeedbackMode::Easy,
            3 => FeedbackMode::Hard,
            _ => FeedbackMode::Medium,
        }
    }

    pub fn fades_words(self) -> bool {
        self == FeedbackMode::Hard
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Joiner,
}

/// Who sits on the other side of the match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpponentKind {
    Simulated,
    Remote(Role),
}

impl OpponentKind {
    pub fn is_remote(&self) -> bool {
        matches!(self, OpponentKind::Remote(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            OpponentKind::Simulated => "computer",
            OpponentKind::Remote(_) => "opponent",
        }
    }
}

/// Settings for one match, already validated
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSettings {
    pub rounds: u32,
    pub round_secs: u32,
    pub difficulty: u8,
    pub mode: FeedbackMode,
    pub seed: Option<u64>,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            rounds: 1,
            round_secs: DEFAULT_ROUND_SECS,
            difficulty: DEFAULT_DIFFICULTY,
            mode: FeedbackMode::default(),
            seed: None,
        }
    }
}

impl MatchSettings {
    pub fn new(rounds: u32, round_secs: u32, difficulty: u8, mode: FeedbackMode) -> Self {
        Self {
            rounds: rounds.max(1),
            round_secs: round_secs.max(1),
            difficulty: difficulty.clamp(1, MAX_DIFFICULTY),
            mode,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Remote matches are a single race.
    pub fn for_remote(mut self) -> Self {
        self.rounds = 1;
        self
    }
}
