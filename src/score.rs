use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Local,
    Opponent,
}

/// Raw points and errors for one side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideScore {
    pub score: u32,
    pub errors: u32,
}

impl SideScore {
    pub fn new(score: u32, errors: u32) -> Self {
        Self { score, errors }
    }

    /// Points minus errors; this is what decides the winner.
    pub fn final_score(&self) -> i64 {
        self.score as i64 - self.errors as i64
    }
}

impl fmt::Display for SideScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Score: {} | Errors: {}", self.score, self.errors)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FinalScores {
    pub local: SideScore,
    pub opponent: SideScore,
}

impl FinalScores {
    /// `None` is a draw.
    pub fn winner(&self) -> Option<Side> {
        match self.local.final_score().cmp(&self.opponent.final_score()) {
            Ordering::Greater => Some(Side::Local),
            Ordering::Less => Some(Side::Opponent),
            Ordering::Equal => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    score: u32,
    banked_errors: u32,
    window_errors: u32,
}

impl Tally {
    fn errors(&self) -> u32 {
        self.banked_errors + self.window_errors
    }
}

/// Score bookkeeping for both sides of a match
///
/// Scores only grow. Errors are reported per accumulation window (usually one passage)
/// via [`ScoreManager::set_errors`], and [`ScoreManager::close_window`] banks them when
/// a side moves on, so a fresh window starts from zero without losing earlier errors.
#[derive(Debug, Clone, Default)]
pub struct ScoreManager {
    local: Tally,
    opponent: Tally,
}

impl ScoreManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn tally(&self, side: Side) -> &Tally {
        match side {
            Side::Local => &self.local,
            Side::Opponent => &self.opponent,
        }
    }

    fn tally_mut(&mut self, side: Side) -> &mut Tally {
        match side {
            Side::Local => &mut self.local,
            Side::Opponent => &mut self.opponent,
        }
    }

    pub fn award(&mut self, side: Side, correct_delta: u32) {
        let tally = self.tally_mut(side);
        tally.score = tally.score.saturating_add(correct_delta);
    }

    pub fn set_errors(&mut self, side: Side, count: u32) {
        self.tally_mut(side).window_errors = count;
    }

    pub fn close_window(&mut self, side: Side) {
        let tally = self.tally_mut(side);
        tally.banked_errors += tally.window_errors;
        tally.window_errors = 0;
    }

    pub fn score(&self, side: Side) -> u32 {
        self.tally(side).score
    }

    pub fn errors(&self, side: Side) -> u32 {
        self.tally(side).errors()
    }

    pub fn summary(&self, side: Side) -> SideScore {
        SideScore::new(self.score(side), self.errors(side))
    }

    pub fn final_score(&self, side: Side) -> i64 {
        self.summary(side).final_score()
    }

    pub fn final_scores(&self) -> FinalScores {
        FinalScores {
            local: self.summary(Side::Local),
            opponent: self.summary(Side::Opponent),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
