//! Line-oriented wire protocol spoken between host and joiner.
//!
//! Every message is one UTF-8 line, `PREFIX[:field...]`. Framing is by prefix only and
//! the peer's progress is trusted for display; final scores are exchanged separately at
//! the end of a match.

use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;
use crate::settings::FeedbackMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// host -> joiner: the passage for the round
    Text(String),
    /// host -> joiner: round length, opponent speed and feedback mode
    Config {
        round_secs: u32,
        difficulty: u8,
        mode: FeedbackMode,
    },
    /// host -> joiner: begin the countdown
    Start,
    /// joiner -> host right after connecting
    Ready,
    /// correct characters typed so far and cumulative errors
    Progress { position: u32, errors: u32 },
    Finished,
    Pause,
    Resume,
    Disconnect,
    FinalScore { score: u32, errors: u32 },
}

impl Message {
    pub fn name(&self) -> &'static str {
        match self {
            Message::Text(_) => "TEXT",
            Message::Config { .. } => "CFG",
            Message::Start => "START",
            Message::Ready => "READY",
            Message::Progress { .. } => "PROGRESS",
            Message::Finished => "FINISHED",
            Message::Pause => "PAUSE",
            Message::Resume => "RESUME",
            Message::Disconnect => "DISCONNECT",
            Message::FinalScore { .. } => "FINALSCORE",
        }
    }

    /// Encoded form including the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // a passage must stay on one line
            Message::Text(text) => write!(f, "TEXT:{}", text.replace(['\r', '\n'], " ")),
            Message::Config {
                round_secs,
                difficulty,
                mode,
            } => write!(f, "CFG:{}:{}:{}", round_secs, difficulty, mode.wire_value()),
            Message::Progress { position, errors } => {
                write!(f, "PROGRESS:{}:{}", position, errors)
            }
            Message::FinalScore { score, errors } => write!(f, "FINALSCORE:{}:{}", score, errors),
            other => f.write_str(other.name()),
        }
    }
}

struct Fields<'a> {
    message: &'static str,
    parts: std::str::Split<'a, char>,
}

impl<'a> Fields<'a> {
    fn new(message: &'static str, rest: &'a str) -> Self {
        Self {
            message,
            parts: rest.split(':'),
        }
    }

    fn number(&mut self, field: &'static str) -> Result<u32, ProtocolError> {
        let raw = self.parts.next().ok_or(ProtocolError::MissingField {
            message: self.message,
            field,
        })?;
        raw.trim()
            .parse::<u32>()
            .map_err(|_| ProtocolError::BadNumber {
                message: self.message,
                field,
                value: raw.to_string(),
            })
    }
}

fn two_numbers(
    message: &'static str,
    rest: &str,
    first: &'static str,
    second: &'static str,
) -> Result<(u32, u32), ProtocolError> {
    let mut fields = Fields::new(message, rest);
    Ok((fields.number(first)?, fields.number(second)?))
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(ProtocolError::Empty);
        }

        if let Some(text) = line.strip_prefix("TEXT:") {
            return Ok(Message::Text(text.to_string()));
        }
        if let Some(rest) = line.strip_prefix("CFG:") {
            let mut fields = Fields::new("CFG", rest);
            let round_secs = fields.number("seconds")?;
            let difficulty = fields.number("difficulty")?;
            let mode = fields.number("mode")?;
            let difficulty = u8::try_from(difficulty).map_err(|_| ProtocolError::OutOfRange {
                message: "CFG",
                field: "difficulty",
                value: difficulty,
            })?;
            return Ok(Message::Config {
                round_secs,
                difficulty,
                mode: FeedbackMode::from_wire(mode),
            });
        }
        if let Some(rest) = line.strip_prefix("PROGRESS:") {
            let (position, errors) = two_numbers("PROGRESS", rest, "position", "errors")?;
            return Ok(Message::Progress { position, errors });
        }
        if let Some(rest) = line.strip_prefix("FINALSCORE:") {
            let (score, errors) = two_numbers("FINALSCORE", rest, "score", "errors")?;
            return Ok(Message::FinalScore { score, errors });
        }

        match line {
            "START" => Ok(Message::Start),
            "READY" => Ok(Message::Ready),
            "FINISHED" => Ok(Message::Finished),
            "PAUSE" => Ok(Message::Pause),
            "RESUME" => Ok(Message::Resume),
            "DISCONNECT" => Ok(Message::Disconnect),
            other => Err(ProtocolError::UnknownPrefix(other.to_string())),
        }
    }
}
