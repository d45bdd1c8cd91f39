//! The match state machine.
//!
//! `Lobby -> Countdown -> Active <-> Paused -> RoundTransition -> Countdown ... -> Ended`
//!
//! The controller owns every piece of mutable match state (scores, positions, round
//! index). Background producers (periodic tasks, the peer receive loop, terminal input)
//! never touch it; they post events to the single thread that calls into the
//! controller. Time is passed in explicitly so the whole machine can be driven by tests.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::link::{DisconnectReason, Handshake, PeerChannel, PeerEvent};
use crate::observer::{
    disconnect_notice, LocalProgress, MatchObserver, MatchResult, OpponentProgress, Phase,
};
use crate::passage::PassageSequencer;
use crate::protocol::Message;
use crate::scheduler::{Schedule, TaskKind, Tick};
use crate::score::{FinalScores, ScoreManager, Side, SideScore};
use crate::settings::{MatchSettings, OpponentKind, Role};
use crate::typing::{LocalTyping, Outcome};
use crate::typist::{SimulatedTypist, TypistConfig, TypistEvent};

pub const COUNTDOWN: Duration = Duration::from_millis(3500);
pub const COUNTDOWN_FROM: u32 = 3;
pub const ROUND_TRANSITION: Duration = Duration::from_millis(1500);
pub const FINAL_SCORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Event contract shared by both kinds of opponent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpponentEvent {
    Progress {
        position: usize,
        errors: u32,
        last: Option<Outcome>,
    },
    Completed,
    Disconnected(DisconnectReason),
}

impl From<TypistEvent> for OpponentEvent {
    fn from(event: TypistEvent) -> Self {
        match event {
            TypistEvent::Progress {
                position,
                errors,
                correct,
            } => OpponentEvent::Progress {
                position,
                errors,
                last: Some(if correct {
                    Outcome::Correct
                } else {
                    Outcome::Incorrect
                }),
            },
            TypistEvent::Completed => OpponentEvent::Completed,
        }
    }
}

enum Opponent {
    Simulated {
        config: TypistConfig,
        typist: Option<SimulatedTypist>,
    },
    Remote {
        role: Role,
        link: Option<Box<dyn PeerChannel>>,
    },
}

impl Opponent {
    fn stop(&mut self) {
        match self {
            Opponent::Simulated { typist, .. } => {
                if let Some(typist) = typist {
                    typist.stop();
                }
            }
            Opponent::Remote { link, .. } => {
                if let Some(link) = link {
                    link.stop();
                }
            }
        }
    }

    fn link(&self) -> Option<&dyn PeerChannel> {
        match self {
            Opponent::Remote {
                link: Some(link), ..
            } => Some(&**link),
            _ => None,
        }
    }
}

/// Waits for both final scores before results are shown
#[derive(Debug, Default, Clone)]
pub struct FinalScoreBarrier {
    local_sent: bool,
    remote: Option<SideScore>,
    deadline: Option<Instant>,
}

impl FinalScoreBarrier {
    /// Returns false if the local score was already sent.
    fn mark_sent(&mut self, now: Instant) -> bool {
        if self.local_sent {
            return false;
        }
        self.local_sent = true;
        self.deadline = Some(now + FINAL_SCORE_TIMEOUT);
        true
    }

    fn record_remote(&mut self, score: SideScore) {
        self.remote = Some(score);
    }

    pub fn is_ready(&self) -> bool {
        self.local_sent && self.remote.is_some()
    }

    pub fn timed_out(&self, now: Instant) -> bool {
        self.local_sent && self.deadline.is_some_and(|deadline| now >= deadline)
    }

    pub fn remote(&self) -> Option<SideScore> {
        self.remote
    }
}

#[derive(Debug, Clone, Copy)]
enum PausedFrom {
    Countdown { left: Duration },
    Active,
}

/// Opponent bookkeeping for the passage it is currently on
#[derive(Debug, Default)]
struct OpponentTrack {
    passage_index: usize,
    passage_len: usize,
    position: usize,
    /// highest position a remote peer has reported; score is only awarded above it
    best: usize,
    faded_upto: usize,
    passages_completed: u32,
}

pub struct MatchController<O: MatchObserver, S: Schedule> {
    settings: MatchSettings,
    kind: OpponentKind,
    opponent: Opponent,
    sequencer: PassageSequencer,
    scores: ScoreManager,
    observer: O,
    scheduler: S,
    rng: StdRng,

    phase: Phase,
    paused_from: Option<PausedFrom>,
    round: u32,
    seconds_remaining: u32,
    epoch: u64,
    deadline: Option<Instant>,
    countdown_shown: Option<u32>,

    local: Option<LocalTyping>,
    local_passage_index: usize,
    local_faded_upto: usize,
    local_passages_completed: u32,
    opp: OpponentTrack,

    // remote messages that arrived while we were still counting down
    early: Vec<Message>,
    barrier: FinalScoreBarrier,
    result: Option<MatchResult>,
    exited: bool,
}

impl<O: MatchObserver, S: Schedule> MatchController<O, S> {
    /// A match against a locally simulated typist.
    pub fn simulated(
        settings: MatchSettings,
        sequencer: PassageSequencer,
        observer: O,
        scheduler: S,
    ) -> Self {
        let config = TypistConfig::from_difficulty(settings.difficulty);
        Self::with_typist(settings, config, sequencer, observer, scheduler)
    }

    /// A simulated match with an explicit typist configuration.
    pub fn with_typist(
        settings: MatchSettings,
        config: TypistConfig,
        sequencer: PassageSequencer,
        observer: O,
        scheduler: S,
    ) -> Self {
        let opponent = Opponent::Simulated {
            config,
            typist: None,
        };
        Self::build(
            settings,
            OpponentKind::Simulated,
            opponent,
            sequencer,
            observer,
            scheduler,
        )
    }

    /// A match against a peer; it waits in the lobby until [`Self::on_peer_connected`].
    pub fn remote(
        settings: MatchSettings,
        role: Role,
        sequencer: PassageSequencer,
        observer: O,
        scheduler: S,
    ) -> Self {
        let opponent = Opponent::Remote { role, link: None };
        Self::build(
            settings.for_remote(),
            OpponentKind::Remote(role),
            opponent,
            sequencer,
            observer,
            scheduler,
        )
    }

    fn build(
        settings: MatchSettings,
        kind: OpponentKind,
        opponent: Opponent,
        sequencer: PassageSequencer,
        observer: O,
        scheduler: S,
    ) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            seconds_remaining: settings.round_secs,
            settings,
            kind,
            opponent,
            sequencer,
            scores: ScoreManager::new(),
            observer,
            scheduler,
            rng,
            phase: Phase::Lobby,
            paused_from: None,
            round: 1,
            epoch: 0,
            deadline: None,
            countdown_shown: None,
            local: None,
            local_passage_index: 0,
            local_faded_upto: 0,
            local_passages_completed: 0,
            opp: OpponentTrack::default(),
            early: Vec::new(),
            barrier: FinalScoreBarrier::default(),
            result: None,
            exited: false,
        }
    }

    // ---------------------------------------------------------------- accessors

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn kind(&self) -> OpponentKind {
        self.kind
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.seconds_remaining
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn scores(&self) -> FinalScores {
        self.scores.final_scores()
    }

    pub fn result(&self) -> Option<&MatchResult> {
        self.result.as_ref()
    }

    pub fn barrier(&self) -> &FinalScoreBarrier {
        &self.barrier
    }

    pub fn has_exited(&self) -> bool {
        self.exited
    }

    pub fn is_paused(&self) -> bool {
        self.phase == Phase::Paused
    }

    pub fn local_passage_index(&self) -> usize {
        self.local_passage_index
    }

    pub fn opponent_passage_index(&self) -> usize {
        self.opp.passage_index
    }

    pub fn opponent_position(&self) -> usize {
        self.opp.position
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    fn is_host(&self) -> bool {
        self.kind == OpponentKind::Remote(Role::Host)
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            self.phase = phase;
            self.observer.on_phase(phase);
        }
    }

    // ---------------------------------------------------------------- lifecycle

    /// Begin a simulated match. Remote matches start from [`Self::on_peer_connected`].
    pub fn start(&mut self, now: Instant) {
        if self.phase != Phase::Lobby || self.kind.is_remote() || self.exited {
            return;
        }
        info!(rounds = self.settings.rounds, "starting match");
        self.begin_countdown(now);
    }

    /// The handshake finished; `handshake` is what the host shared (or received).
    pub fn on_peer_connected(
        &mut self,
        link: Box<dyn PeerChannel>,
        handshake: &Handshake,
        now: Instant,
    ) {
        if self.phase != Phase::Lobby || self.exited {
            link.stop();
            return;
        }
        if let Opponent::Remote { link: slot, .. } = &mut self.opponent {
            *slot = Some(link);
        } else {
            link.stop();
            return;
        }

        self.settings.round_secs = handshake.round_secs.max(1);
        self.settings.difficulty = handshake.difficulty;
        self.settings.mode = handshake.mode;
        self.seconds_remaining = self.settings.round_secs;
        self.sequencer.pin_first(handshake.passage.clone());

        info!(round_secs = self.settings.round_secs, "peer connected, starting match");
        self.observer.on_notice("Opponent connected!");
        self.begin_countdown(now);
    }

    pub fn on_connect_failed(&mut self, reason: &str) {
        if self.phase != Phase::Lobby {
            return;
        }
        warn!(%reason, "could not establish peer connection");
        self.observer.on_notice(reason);
        self.set_phase(Phase::Ended);
    }

    fn begin_countdown(&mut self, now: Instant) {
        self.deadline = Some(now + COUNTDOWN);
        self.countdown_shown = None;
        self.set_phase(Phase::Countdown);
        self.update_countdown(now);
    }

    fn update_countdown(&mut self, now: Instant) {
        let Some(deadline) = self.deadline else {
            return;
        };
        let left = deadline.saturating_duration_since(now);
        let elapsed = COUNTDOWN.saturating_sub(left).as_secs() as u32;
        let shown = COUNTDOWN_FROM.saturating_sub(elapsed);
        if self.countdown_shown != Some(shown) {
            self.countdown_shown = Some(shown);
            self.observer.on_countdown(shown);
        }
    }

    /// Advance deadline-driven transitions: countdown, round transition, barrier timeout.
    pub fn poll(&mut self, now: Instant) {
        match self.phase {
            Phase::Countdown => {
                self.update_countdown(now);
                if self.deadline.is_some_and(|deadline| now >= deadline) {
                    self.start_round(now);
                }
            }
            Phase::RoundTransition => {
                if self.deadline.is_some_and(|deadline| now >= deadline) {
                    self.begin_countdown(now);
                }
            }
            Phase::Ended => {
                if self.result.is_none() && self.barrier.timed_out(now) {
                    warn!("final score from opponent never arrived, showing results anyway");
                    self.release_results();
                }
            }
            Phase::Lobby | Phase::Active | Phase::Paused => {}
        }
    }

    fn start_round(&mut self, now: Instant) {
        self.deadline = None;
        self.seconds_remaining = self.settings.round_secs;

        let passage = self.sequencer.passage_at(0).to_string();
        self.local = Some(LocalTyping::new(&passage));
        self.local_passage_index = 0;
        self.local_faded_upto = 0;
        self.opp.passage_index = 0;
        self.reset_opponent_passage(passage.chars().count());

        if let Opponent::Simulated { config, typist } = &mut self.opponent {
            *typist = Some(SimulatedTypist::seeded(&passage, *config, self.rng.gen()));
        }

        self.observer.on_passage(Side::Local, 0, &passage);
        self.observer.on_passage(Side::Opponent, 0, &passage);
        self.observer.on_round_timer(self.seconds_remaining);
        self.observer.on_scores(&self.scores.final_scores());

        self.epoch += 1;
        let mut tasks = vec![TaskKind::RoundTimer];
        if !self.kind.is_remote() {
            tasks.push(TaskKind::OpponentTick);
        }
        if self.settings.mode.fades_words() {
            tasks.push(TaskKind::Fade);
        }
        self.scheduler.start(self.epoch, &tasks);

        info!(round = self.round, "round started");
        self.set_phase(Phase::Active);

        for msg in std::mem::take(&mut self.early) {
            self.handle_remote_message(msg, now);
        }
    }

    fn reset_opponent_passage(&mut self, len: usize) {
        self.opp.passage_len = len;
        self.opp.position = 0;
        self.opp.best = 0;
        self.opp.faded_upto = 0;
    }

    fn stop_round_tasks(&mut self) {
        // anything still in flight for the old epoch is dropped on arrival
        self.epoch += 1;
        self.scheduler.cancel();
        if let Opponent::Simulated { typist, .. } = &mut self.opponent {
            if let Some(typist) = typist {
                typist.stop();
            }
        }
    }

    fn end_round(&mut self, now: Instant) {
        if !matches!(self.phase, Phase::Active | Phase::Paused) {
            return;
        }
        self.stop_round_tasks();
        self.paused_from = None;

        // unfinished passages still count; the next round starts fresh windows
        self.scores.close_window(Side::Local);
        self.scores.close_window(Side::Opponent);

        let scores = self.scores.final_scores();
        info!(round = self.round, ?scores, "round ended");
        self.observer
            .on_round_ended(self.round, scores.winner(), &scores);

        if !self.kind.is_remote() && self.round < self.settings.rounds {
            self.round += 1;
            self.sequencer.reset();
            self.local = None;
            self.deadline = Some(now + ROUND_TRANSITION);
            self.set_phase(Phase::RoundTransition);
        } else {
            self.enter_ended(now);
        }
    }

    fn enter_ended(&mut self, now: Instant) {
        self.deadline = None;
        self.set_phase(Phase::Ended);

        if !self.kind.is_remote() {
            self.release_results();
            return;
        }

        let local = self.scores.summary(Side::Local);
        if self.barrier.mark_sent(now) {
            if let Some(link) = self.opponent.link() {
                link.send_final_score(local.score, local.errors);
            }
        }
        if self.barrier.is_ready() {
            self.release_results();
        }
    }

    fn release_results(&mut self) {
        if self.result.is_some() {
            return;
        }
        let local = self.scores.summary(Side::Local);
        let (opponent, defaulted) = if self.kind.is_remote() {
            match self.barrier.remote() {
                Some(remote) => (remote, false),
                None => (SideScore::default(), true),
            }
        } else {
            (self.scores.summary(Side::Opponent), false)
        };

        let scores = FinalScores { local, opponent };
        let result = MatchResult {
            scores,
            winner: scores.winner(),
            rounds_played: self.round,
            passages_completed: (self.local_passages_completed, self.opp.passages_completed),
            opponent_defaulted: defaulted,
        };
        info!(?result, "match ended");
        self.observer.on_match_ended(&result);
        self.result = Some(result);
    }

    // ---------------------------------------------------------------- local input

    /// The local input field now reads `text`.
    pub fn on_local_text_changed(&mut self, text: &str, now: Instant) {
        if self.phase != Phase::Active {
            return;
        }
        let Some(typing) = self.local.as_mut() else {
            return;
        };

        let update = typing.apply(text);
        let passage_errors = typing.errors();
        let progress = typing.progress();

        self.scores.award(Side::Local, update.newly_correct);
        self.scores.set_errors(Side::Local, passage_errors);
        let errors = self.scores.errors(Side::Local);

        self.observer.on_local_progress(&LocalProgress {
            position: update.position,
            correct: update.correct,
            errors,
            progress,
            last: update.last,
        });
        self.observer.on_scores(&self.scores.final_scores());

        if let Some(link) = self.opponent.link() {
            link.send_progress(update.correct as u32, errors);
        }

        if update.completed {
            self.on_local_passage_completed(now);
        }
    }

    fn on_local_passage_completed(&mut self, now: Instant) {
        self.local_passages_completed += 1;
        self.scores.close_window(Side::Local);
        self.observer
            .on_passage_completed(Side::Local, self.local_passages_completed);
        debug!(completed = self.local_passages_completed, "local passage completed");

        if self.kind.is_remote() {
            if let Some(link) = self.opponent.link() {
                link.send_finished();
            }
            self.end_round(now);
            return;
        }

        self.local_passage_index += 1;
        let passage = self
            .sequencer
            .passage_at(self.local_passage_index)
            .to_string();
        self.local = Some(LocalTyping::new(&passage));
        self.local_faded_upto = 0;
        self.observer
            .on_passage(Side::Local, self.local_passage_index, &passage);
    }

    // ---------------------------------------------------------------- pause / exit

    /// Toggle pause. Only the host may pause a remote match.
    pub fn on_pause_requested(&mut self, now: Instant) {
        if self.kind == OpponentKind::Remote(Role::Joiner) {
            debug!("joiner cannot pause a remote match");
            return;
        }
        let changed = match self.phase {
            Phase::Paused => self.resume(now),
            _ => self.pause(now),
        };
        if changed {
            if let Some(link) = self.opponent.link() {
                if self.phase == Phase::Paused {
                    link.send_pause();
                } else {
                    link.send_resume();
                }
            }
        }
    }

    fn pause(&mut self, now: Instant) -> bool {
        let from = match self.phase {
            Phase::Active => PausedFrom::Active,
            Phase::Countdown => PausedFrom::Countdown {
                left: self
                    .deadline
                    .map(|deadline| deadline.saturating_duration_since(now))
                    .unwrap_or(COUNTDOWN),
            },
            _ => return false,
        };
        if let Opponent::Simulated {
            typist: Some(typist),
            ..
        } = &mut self.opponent
        {
            typist.suspend();
        }
        self.paused_from = Some(from);
        self.set_phase(Phase::Paused);
        true
    }

    fn resume(&mut self, now: Instant) -> bool {
        match self.paused_from.take() {
            Some(PausedFrom::Active) => {
                self.set_phase(Phase::Active);
                true
            }
            Some(PausedFrom::Countdown { left }) => {
                self.deadline = Some(now + left);
                self.set_phase(Phase::Countdown);
                true
            }
            None => false,
        }
    }

    /// Leave the match: cancel everything and tell the peer we are going.
    pub fn on_exit_requested(&mut self) {
        if self.exited {
            return;
        }
        self.exited = true;
        self.stop_round_tasks();
        if let Some(link) = self.opponent.link() {
            link.send_disconnect();
        }
        self.opponent.stop();
        self.deadline = None;
        self.set_phase(Phase::Ended);
        info!("left the match");
    }

    // ---------------------------------------------------------------- periodic tasks

    pub fn on_tick(&mut self, tick: Tick) {
        if tick.epoch != self.epoch || self.phase != Phase::Active {
            return;
        }
        match tick.kind {
            TaskKind::RoundTimer => self.on_timer_tick(tick.at),
            TaskKind::OpponentTick => self.on_opponent_tick(tick.at),
            TaskKind::Fade => self.on_fade_tick(),
        }
    }

    fn on_timer_tick(&mut self, now: Instant) {
        self.seconds_remaining = self.seconds_remaining.saturating_sub(1);
        self.observer.on_round_timer(self.seconds_remaining);
        if self.seconds_remaining == 0 {
            info!("time's up");
            self.end_round(now);
        }
    }

    fn on_opponent_tick(&mut self, now: Instant) {
        let events = match &mut self.opponent {
            Opponent::Simulated {
                typist: Some(typist),
                ..
            } => typist.tick(now),
            _ => return,
        };
        for event in events {
            if self.phase != Phase::Active {
                break;
            }
            self.on_opponent_event(event.into(), now);
        }
    }

    fn on_fade_tick(&mut self) {
        if let Some(typing) = &self.local {
            let passage: Vec<char> = (0..typing.len())
                .filter_map(|idx| typing.get_expected_char(idx))
                .collect();
            self.local_faded_upto = next_word_end(&passage, self.local_faded_upto);
            self.observer.on_faded(Side::Local, self.local_faded_upto);
        }

        let opponent_passage: Vec<char> = self
            .sequencer
            .passage_at(self.opp.passage_index)
            .chars()
            .collect();
        self.opp.faded_upto = next_word_end(&opponent_passage, self.opp.faded_upto);
        self.observer.on_faded(Side::Opponent, self.opp.faded_upto);
    }

    // ---------------------------------------------------------------- opponent

    /// Apply an event from whichever opponent is active.
    pub fn on_opponent_event(&mut self, event: OpponentEvent, now: Instant) {
        match event {
            OpponentEvent::Progress {
                position,
                errors,
                last,
            } => self.on_opponent_progress(position, errors, last),
            OpponentEvent::Completed => self.on_opponent_completed(now),
            OpponentEvent::Disconnected(reason) => self.on_opponent_disconnected(&reason),
        }
    }

    fn on_opponent_progress(&mut self, position: usize, errors: u32, last: Option<Outcome>) {
        if !matches!(self.phase, Phase::Active | Phase::Paused) {
            return;
        }
        let position = position.min(self.opp.passage_len);

        if self.kind.is_remote() {
            // the peer reports totals; only growth beyond what we have seen scores
            if position > self.opp.best {
                self.scores
                    .award(Side::Opponent, (position - self.opp.best) as u32);
                self.opp.best = position;
            }
        } else if last == Some(Outcome::Correct) && position > self.opp.faded_upto {
            self.scores.award(Side::Opponent, 1);
        }
        self.scores.set_errors(Side::Opponent, errors);
        self.opp.position = position;

        let progress = if self.opp.passage_len == 0 {
            0.0
        } else {
            position as f64 / self.opp.passage_len as f64
        };
        self.observer.on_opponent_progress(&OpponentProgress {
            position,
            errors: self.scores.errors(Side::Opponent),
            progress,
            last,
        });
        self.observer.on_scores(&self.scores.final_scores());
    }

    fn on_opponent_completed(&mut self, now: Instant) {
        if !matches!(self.phase, Phase::Active | Phase::Paused) {
            return;
        }
        self.opp.passages_completed += 1;
        self.scores.close_window(Side::Opponent);
        self.observer
            .on_passage_completed(Side::Opponent, self.opp.passages_completed);

        if self.kind.is_remote() {
            info!("opponent finished the passage first");
            self.end_round(now);
            return;
        }

        self.opp.passage_index += 1;
        let passage = self
            .sequencer
            .passage_at(self.opp.passage_index)
            .to_string();
        self.reset_opponent_passage(passage.chars().count());
        if let Opponent::Simulated { config, typist } = &mut self.opponent {
            *typist = Some(SimulatedTypist::seeded(&passage, *config, self.rng.gen()));
        }
        self.observer
            .on_passage(Side::Opponent, self.opp.passage_index, &passage);
    }

    fn on_opponent_disconnected(&mut self, reason: &DisconnectReason) {
        if !self.kind.is_remote() || self.exited {
            return;
        }
        self.opponent.stop();
        if self.result.is_some() || self.phase == Phase::Lobby {
            return;
        }

        let notice = disconnect_notice(self.is_host(), reason);
        info!(%notice, "opponent left");
        self.stop_round_tasks();
        self.paused_from = None;
        self.deadline = None;
        self.barrier.local_sent = true;
        self.set_phase(Phase::Ended);
        self.observer.on_opponent_disconnected(&notice);
        self.release_results();
    }

    // ---------------------------------------------------------------- network

    /// Dispatch an event from the peer receive loop.
    pub fn on_peer_event(&mut self, event: PeerEvent, now: Instant) {
        match event {
            PeerEvent::Message(msg) => self.handle_remote_message(msg, now),
            PeerEvent::Disconnected(reason) => {
                self.on_opponent_event(OpponentEvent::Disconnected(reason), now)
            }
        }
    }

    fn handle_remote_message(&mut self, msg: Message, now: Instant) {
        if !self.kind.is_remote() || self.exited {
            return;
        }
        let counting_down = self.phase == Phase::Countdown
            || matches!(self.paused_from, Some(PausedFrom::Countdown { .. }));

        match msg {
            Message::Progress { .. } | Message::Finished if counting_down => self.early.push(msg),
            Message::Progress { position, errors } => self.on_opponent_event(
                OpponentEvent::Progress {
                    position: position as usize,
                    errors,
                    last: None,
                },
                now,
            ),
            Message::Finished => self.on_opponent_event(OpponentEvent::Completed, now),
            Message::Pause | Message::Resume if self.is_host() => {
                debug!(kind = msg.name(), "ignoring pause control from joiner");
            }
            Message::Pause => {
                if self.phase != Phase::Paused {
                    self.pause(now);
                }
            }
            Message::Resume => {
                if self.phase == Phase::Paused {
                    self.resume(now);
                }
            }
            Message::FinalScore { score, errors } => {
                self.barrier.record_remote(SideScore::new(score, errors));
                if self.phase == Phase::Ended && self.barrier.is_ready() {
                    self.release_results();
                }
            }
            other => debug!(kind = other.name(), "ignoring message mid-match"),
        }
    }
}

/// Index just past the next word boundary at or after `from`.
fn next_word_end(passage: &[char], from: usize) -> usize {
    let mut idx = from;
    while idx < passage.len() {
        let ch = passage[idx];
        idx += 1;
        if ch == ' ' {
            break;
        }
    }
    idx
}
