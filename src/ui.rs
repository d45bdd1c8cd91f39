use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use typeduel::{
    observer::{LocalProgress, MatchObserver, MatchResult, OpponentProgress, Phase},
    score::{FinalScores, Side, SideScore},
    settings::{MatchSettings, OpponentKind, Role},
};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

/// Everything the terminal shows, kept up to date by the match
#[derive(Debug)]
pub struct MatchView {
    kind: OpponentKind,
    rounds: u32,
    phase: Phase,
    countdown: u32,
    round: u32,
    seconds_remaining: u32,

    passage: Vec<char>,
    input: String,
    local_faded: usize,
    local_progress: f64,

    opponent_progress: f64,
    opponent_position: usize,
    opponent_passage_len: usize,

    scores: FinalScores,
    last_round: Option<(u32, Option<Side>)>,
    result: Option<MatchResult>,
    disconnect: Option<String>,
    notice: Option<String>,
}

impl MatchView {
    pub fn new(kind: OpponentKind, settings: &MatchSettings, notice: Option<String>) -> Self {
        Self {
            kind,
            rounds: if kind.is_remote() { 1 } else { settings.rounds },
            phase: Phase::Lobby,
            countdown: 0,
            round: 0,
            seconds_remaining: settings.round_secs,
            passage: Vec::new(),
            input: String::new(),
            local_faded: 0,
            local_progress: 0.0,
            opponent_progress: 0.0,
            opponent_position: 0,
            opponent_passage_len: 0,
            scores: FinalScores::default(),
            last_round: None,
            result: None,
            disconnect: None,
            notice,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Returns false when the key was not taken (not racing, or passage already full).
    pub fn push_char(&mut self, c: char) -> bool {
        if self.phase != Phase::Active || self.input.chars().count() >= self.passage.len() {
            return false;
        }
        self.input.push(c);
        true
    }

    pub fn backspace(&mut self) -> bool {
        self.phase == Phase::Active && self.input.pop().is_some()
    }

    fn opponent_name(&self) -> &'static str {
        match self.kind {
            OpponentKind::Simulated => "Computer",
            OpponentKind::Remote(_) => "Opponent",
        }
    }

    fn outcome_text(&self, winner: Option<Side>) -> &'static str {
        match winner {
            Some(Side::Local) => "You win!",
            Some(Side::Opponent) => match self.kind {
                OpponentKind::Simulated => "Computer wins!",
                OpponentKind::Remote(_) => "Opponent wins!",
            },
            None => "It's a draw!",
        }
    }

    fn render_centered(&self, area: Rect, buf: &mut Buffer, lines: Vec<Line>) {
        let height = lines.len() as u16;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Length(area.height.saturating_sub(height) / 2),
                Constraint::Length(height),
                Constraint::Min(0),
            ])
            .split(area);

        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(chunks[1], buf);
    }

    fn passage_spans(&self) -> Vec<Span<'static>> {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let green_bold_style = Style::default().patch(bold_style).fg(Color::Green);
        let red_bold_style = Style::default().patch(bold_style).fg(Color::Red);
        let dim_bold_style = Style::default()
            .patch(bold_style)
            .add_modifier(Modifier::DIM);
        let underlined_dim_bold_style = Style::default()
            .patch(dim_bold_style)
            .add_modifier(Modifier::UNDERLINED);

        let typed: Vec<char> = self.input.chars().collect();
        let cursor = typed.len();

        self.passage
            .iter()
            .enumerate()
            .map(|(idx, expected)| match typed.get(idx) {
                Some(c) if c == expected => Span::styled(expected.to_string(), green_bold_style),
                Some(c) => Span::styled(
                    match c {
                        ' ' => "·".to_owned(),
                        c => c.to_string(),
                    },
                    red_bold_style,
                ),
                None if idx < self.local_faded => Span::styled("░", dim_bold_style),
                None if idx == cursor => {
                    Span::styled(expected.to_string(), underlined_dim_bold_style)
                }
                None => Span::styled(expected.to_string(), dim_bold_style),
            })
            .collect()
    }

    fn render_race(&self, area: Rect, buf: &mut Buffer) {
        let dim_bold_style = Style::default()
            .add_modifier(Modifier::BOLD)
            .add_modifier(Modifier::DIM);

        let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
        let passage: String = self.passage.iter().collect();
        let prompt_occupied_lines = if passage.width() <= max_chars_per_line as usize {
            1
        } else {
            ((passage.width() as f64 / max_chars_per_line as f64).ceil() + 1.0) as u16
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1), // round / timer
                Constraint::Length(1), // scores
                Constraint::Min(1),
                Constraint::Length(prompt_occupied_lines),
                Constraint::Min(1),
                Constraint::Length(3), // local gauge
                Constraint::Length(3), // opponent gauge
                Constraint::Length(1), // status
            ])
            .split(area);

        let header = format!(
            "Round {}/{}  ·  {}s left",
            self.round.max(1),
            self.rounds,
            self.seconds_remaining
        );
        Paragraph::new(Span::styled(header, dim_bold_style))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        let scores = format!(
            "You {}   {} {}",
            self.scores.local,
            self.opponent_name(),
            self.scores.opponent
        );
        Paragraph::new(scores)
            .alignment(Alignment::Center)
            .render(chunks[1], buf);

        Paragraph::new(Line::from(self.passage_spans()))
            .alignment(if prompt_occupied_lines == 1 {
                Alignment::Center
            } else {
                Alignment::Left
            })
            .wrap(Wrap { trim: true })
            .render(chunks[3], buf);

        progress_gauge("You", self.local_progress, Color::Green).render(chunks[5], buf);
        progress_gauge(
            &format!(
                "{} {}/{}",
                self.opponent_name(),
                self.opponent_position,
                self.opponent_passage_len
            ),
            self.opponent_progress,
            Color::Magenta,
        )
        .render(chunks[6], buf);

        let status = if self.phase == Phase::Paused {
            match self.kind {
                OpponentKind::Remote(Role::Joiner) => "PAUSED by host",
                _ => "PAUSED - (esc) to resume",
            }
        } else {
            match self.kind {
                OpponentKind::Remote(Role::Joiner) => "(ctrl-c) leave",
                _ => "(esc) pause   (ctrl-c) leave",
            }
        };
        Paragraph::new(Span::styled(
            status,
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(chunks[7], buf);
    }

    fn results_lines(&self) -> Vec<Line<'static>> {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let mut lines = Vec::new();

        if let Some(reason) = &self.disconnect {
            lines.push(Line::from(Span::styled(
                reason.clone(),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::default());
        }

        match &self.result {
            Some(result) => {
                lines.push(Line::from(Span::styled(
                    self.outcome_text(result.winner),
                    bold.fg(Color::Cyan),
                )));
                lines.push(Line::default());
                lines.push(Line::from(final_line("You", &result.scores.local)));
                let mut opponent = final_line(self.opponent_name(), &result.scores.opponent);
                if result.opponent_defaulted {
                    opponent.push_str("  (no final score received)");
                }
                lines.push(Line::from(opponent));
                lines.push(Line::default());
                lines.push(Line::from(format!(
                    "passages completed: {}",
                    [result.passages_completed.0, result.passages_completed.1]
                        .iter()
                        .join(" vs ")
                )));
            }
            None if self.last_round.is_some() => {
                lines.push(Line::from("Waiting for opponent's final score..."))
            }
            None => {}
        }

        if let Some(notice) = &self.notice {
            if self.result.is_none() && self.disconnect.is_none() {
                lines.push(Line::default());
                lines.push(Line::from(notice.clone()));
            }
        }

        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "(q)uit",
            Style::default().add_modifier(Modifier::ITALIC),
        )));
        lines
    }
}

fn progress_gauge(title: &str, ratio: f64, color: Color) -> Gauge<'static> {
    Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .gauge_style(Style::default().fg(color))
        .ratio(ratio.clamp(0.0, 1.0))
}

fn final_line(name: &str, score: &SideScore) -> String {
    format!("{}: {}  →  {}", name, score, score.final_score())
}

impl Widget for &MatchView {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold = Style::default().add_modifier(Modifier::BOLD);

        match self.phase {
            Phase::Lobby => {
                let message = self
                    .notice
                    .clone()
                    .unwrap_or_else(|| "Waiting for an opponent...".to_string());
                self.render_centered(
                    area,
                    buf,
                    vec![
                        Line::from(Span::styled(message, bold.fg(Color::Yellow))),
                        Line::default(),
                        Line::from(Span::styled(
                            "(esc) cancel",
                            Style::default().add_modifier(Modifier::ITALIC),
                        )),
                    ],
                );
            }
            Phase::Countdown => {
                let label = match self.countdown {
                    0 => "GO!".to_string(),
                    n => n.to_string(),
                };
                let mut lines = Vec::new();
                if let Some((round, winner)) = self.last_round {
                    lines.push(Line::from(format!(
                        "Round {}: {}",
                        round,
                        self.outcome_text(winner)
                    )));
                    lines.push(Line::default());
                }
                lines.push(Line::from(format!("Round {}", self.round + 1)));
                lines.push(Line::from(Span::styled(label, bold.fg(Color::Cyan))));
                self.render_centered(area, buf, lines);
            }
            Phase::Active | Phase::Paused => self.render_race(area, buf),
            Phase::RoundTransition => {
                let (round, winner) = self.last_round.unwrap_or((self.round, None));
                self.render_centered(
                    area,
                    buf,
                    vec![
                        Line::from(Span::styled(
                            format!("Round {}: {}", round, self.outcome_text(winner)),
                            bold.fg(Color::Cyan),
                        )),
                        Line::from(format!(
                            "You {}   {} {}",
                            self.scores.local,
                            self.opponent_name(),
                            self.scores.opponent
                        )),
                    ],
                );
            }
            Phase::Ended => self.render_centered(area, buf, self.results_lines()),
        }
    }
}

impl MatchObserver for MatchView {
    fn on_phase(&mut self, phase: Phase) {
        if phase == Phase::Active && self.phase == Phase::Countdown {
            self.round += 1;
        }
        self.phase = phase;
    }

    fn on_countdown(&mut self, seconds_left: u32) {
        self.countdown = seconds_left;
    }

    fn on_passage(&mut self, side: Side, _index: usize, passage: &str) {
        match side {
            Side::Local => {
                self.passage = passage.chars().collect();
                self.input.clear();
                self.local_faded = 0;
                self.local_progress = 0.0;
            }
            Side::Opponent => {
                self.opponent_passage_len = passage.chars().count();
                self.opponent_position = 0;
                self.opponent_progress = 0.0;
            }
        }
    }

    fn on_local_progress(&mut self, progress: &LocalProgress) {
        self.local_progress = progress.progress;
    }

    fn on_opponent_progress(&mut self, progress: &OpponentProgress) {
        self.opponent_position = progress.position;
        self.opponent_progress = progress.progress;
    }

    fn on_scores(&mut self, scores: &FinalScores) {
        self.scores = *scores;
    }

    fn on_round_timer(&mut self, seconds_remaining: u32) {
        self.seconds_remaining = seconds_remaining;
    }

    fn on_faded(&mut self, side: Side, faded_upto: usize) {
        if side == Side::Local {
            self.local_faded = faded_upto;
        }
    }

    fn on_round_ended(&mut self, round: u32, winner: Option<Side>, scores: &FinalScores) {
        self.last_round = Some((round, winner));
        self.scores = *scores;
    }

    fn on_match_ended(&mut self, result: &MatchResult) {
        self.result = Some(result.clone());
    }

    fn on_opponent_disconnected(&mut self, reason: &str) {
        self.disconnect = Some(reason.to_string());
    }

    fn on_notice(&mut self, message: &str) {
        self.notice = Some(message.to_string());
    }
}
