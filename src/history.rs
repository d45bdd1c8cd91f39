use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::HistoryError;
use crate::observer::MatchResult;
use crate::score::Side;
use crate::settings::{FeedbackMode, MatchSettings, OpponentKind};

/// One finished match, as stored in the history file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub date: DateTime<Local>,
    pub opponent: String,
    pub mode: FeedbackMode,
    pub difficulty: u8,
    pub rounds: u32,
    pub round_secs: u32,
    pub score: u32,
    pub errors: u32,
    pub opponent_score: u32,
    pub opponent_errors: u32,
    /// `win`, `loss` or `draw`
    pub outcome: String,
}

impl HistoryRecord {
    pub fn new(
        date: DateTime<Local>,
        kind: OpponentKind,
        settings: &MatchSettings,
        result: &MatchResult,
    ) -> Self {
        let outcome = match result.winner {
            Some(Side::Local) => "win",
            Some(Side::Opponent) => "loss",
            None => "draw",
        };
        Self {
            date,
            opponent: kind.label().to_string(),
            mode: settings.mode,
            difficulty: settings.difficulty,
            rounds: result.rounds_played,
            round_secs: settings.round_secs,
            score: result.scores.local.score,
            errors: result.scores.local.errors,
            opponent_score: result.scores.opponent.score,
            opponent_errors: result.scores.opponent.errors,
            outcome: outcome.to_string(),
        }
    }
}

/// Append-only CSV log of finished matches
#[derive(Debug, Clone)]
pub struct MatchHistory {
    path: PathBuf,
}

impl MatchHistory {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &HistoryRecord) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // If the file doesn't exist yet, we need to emit a header
        let needs_header = !self.path.exists();
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let records = reader
            .deserialize()
            .collect::<Result<Vec<HistoryRecord>, _>>()?;
        Ok(records)
    }
}
