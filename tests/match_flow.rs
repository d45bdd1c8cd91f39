use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use typeduel::controller::{MatchController, OpponentEvent, COUNTDOWN, ROUND_TRANSITION};
use typeduel::link::{DisconnectReason, Handshake, PeerChannel, PeerEvent};
use typeduel::observer::{LocalProgress, MatchObserver, MatchResult, Phase};
use typeduel::passage::{FixedPassages, PassageSequencer};
use typeduel::protocol::Message;
use typeduel::scheduler::{ManualSchedule, TaskKind, Tick};
use typeduel::score::{FinalScores, Side, SideScore};
use typeduel::settings::{FeedbackMode, MatchSettings, Role};
use typeduel::typing::Outcome;

#[derive(Debug, Default)]
struct Recorder {
    phases: Vec<Phase>,
    countdowns: Vec<u32>,
    passages: Vec<(Side, usize, String)>,
    local: Vec<LocalProgress>,
    timers: Vec<u32>,
    faded: Vec<(Side, usize)>,
    rounds: Vec<(u32, Option<Side>)>,
    results: Vec<MatchResult>,
    disconnects: Vec<String>,
}

impl MatchObserver for Recorder {
    fn on_phase(&mut self, phase: Phase) {
        self.phases.push(phase);
    }

    fn on_countdown(&mut self, seconds_left: u32) {
        self.countdowns.push(seconds_left);
    }

    fn on_passage(&mut self, side: Side, index: usize, passage: &str) {
        self.passages.push((side, index, passage.to_string()));
    }

    fn on_local_progress(&mut self, progress: &LocalProgress) {
        self.local.push(*progress);
    }

    fn on_round_timer(&mut self, seconds_remaining: u32) {
        self.timers.push(seconds_remaining);
    }

    fn on_faded(&mut self, side: Side, faded_upto: usize) {
        self.faded.push((side, faded_upto));
    }

    fn on_round_ended(&mut self, round: u32, winner: Option<Side>, _scores: &FinalScores) {
        self.rounds.push((round, winner));
    }

    fn on_match_ended(&mut self, result: &MatchResult) {
        self.results.push(result.clone());
    }

    fn on_opponent_disconnected(&mut self, reason: &str) {
        self.disconnects.push(reason.to_string());
    }
}

#[derive(Clone)]
struct FakeChannel {
    role: Role,
    sent: Arc<Mutex<Vec<Message>>>,
    stopped: Arc<AtomicBool>,
}

impl FakeChannel {
    fn new(role: Role) -> Self {
        Self {
            role,
            sent: Arc::default(),
            stopped: Arc::default(),
        }
    }

    fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl PeerChannel for FakeChannel {
    fn role(&self) -> Role {
        self.role
    }

    fn send(&self, msg: &Message) {
        if !self.is_stopped() {
            self.sent.lock().unwrap().push(msg.clone());
        }
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

type Controller = MatchController<Recorder, ManualSchedule>;

fn sequencer(passages: &[&str]) -> PassageSequencer {
    PassageSequencer::new(Box::new(FixedPassages::new(passages.iter().copied())))
}

fn settings(rounds: u32, round_secs: u32, mode: FeedbackMode) -> MatchSettings {
    MatchSettings::new(rounds, round_secs, 5, mode).with_seed(11)
}

fn simulated(rounds: u32, round_secs: u32, mode: FeedbackMode, passages: &[&str]) -> Controller {
    MatchController::simulated(
        settings(rounds, round_secs, mode),
        sequencer(passages),
        Recorder::default(),
        ManualSchedule::new(),
    )
}

/// Start a simulated match and run its countdown out; returns the time the round began.
fn started(ctl: &mut Controller, t0: Instant) -> Instant {
    ctl.start(t0);
    let go = t0 + COUNTDOWN;
    ctl.poll(go);
    assert_eq!(ctl.phase(), Phase::Active);
    go
}

fn tick(ctl: &Controller, kind: TaskKind, at: Instant) -> Tick {
    Tick {
        kind,
        epoch: ctl.epoch(),
        at,
    }
}

fn type_text(ctl: &mut Controller, text: &str, now: Instant) {
    for end in 1..=text.chars().count() {
        let prefix: String = text.chars().take(end).collect();
        ctl.on_local_text_changed(&prefix, now);
    }
}

fn remote(role: Role, passage: &str) -> (Controller, FakeChannel, Instant) {
    let mut ctl = MatchController::remote(
        settings(3, 60, FeedbackMode::Easy),
        role,
        sequencer(&["unused"]),
        Recorder::default(),
        ManualSchedule::new(),
    );
    let channel = FakeChannel::new(role);
    let handshake = Handshake {
        passage: passage.to_string(),
        round_secs: 20,
        difficulty: 5,
        mode: FeedbackMode::Easy,
    };
    let t0 = Instant::now();
    assert_eq!(ctl.phase(), Phase::Lobby);
    ctl.on_peer_connected(Box::new(channel.clone()), &handshake, t0);
    let go = t0 + COUNTDOWN;
    ctl.poll(go);
    assert_eq!(ctl.phase(), Phase::Active);
    (ctl, channel, go)
}

#[test]
fn countdown_shows_three_two_one_go() {
    let mut ctl = simulated(1, 60, FeedbackMode::Easy, &["cat"]);
    let t0 = Instant::now();
    ctl.start(t0);
    for secs in 1..=3 {
        ctl.poll(t0 + Duration::from_secs(secs));
    }
    assert_eq!(ctl.phase(), Phase::Countdown);
    ctl.poll(t0 + COUNTDOWN);

    assert_eq!(ctl.observer().countdowns, vec![3, 2, 1, 0]);
    assert_eq!(ctl.phase(), Phase::Active);
    assert_eq!(
        ctl.scheduler().last_started(),
        Some(&(ctl.epoch(), vec![TaskKind::RoundTimer, TaskKind::OpponentTick]))
    );
    assert!(ctl
        .observer()
        .passages
        .contains(&(Side::Opponent, 0, "cat".to_string())));
}

#[test]
fn typing_a_passage_exactly_scores_it_and_moves_on() {
    let mut ctl = simulated(1, 60, FeedbackMode::Easy, &["cat", "dog"]);
    let now = started(&mut ctl, Instant::now());

    type_text(&mut ctl, "cat", now);

    let local = &ctl.observer().local;
    assert_eq!(local.len(), 3);
    assert!(local.iter().all(|p| p.last == Some(Outcome::Correct)));
    assert_eq!(ctl.scores().local.score, 3);
    assert_eq!(ctl.scores().local.errors, 0);
    assert_eq!(ctl.local_passage_index(), 1);
    assert_eq!(
        ctl.observer().passages.last(),
        Some(&(Side::Local, 1, "dog".to_string()))
    );
    assert_eq!(ctl.phase(), Phase::Active);
}

#[test]
fn a_wrong_character_costs_one_error_and_blocks_completion() {
    let mut ctl = simulated(1, 60, FeedbackMode::Easy, &["cat"]);
    let now = started(&mut ctl, Instant::now());

    ctl.on_local_text_changed("c", now);
    ctl.on_local_text_changed("cb", now);
    assert_eq!(ctl.observer().local[1].last, Some(Outcome::Incorrect));
    ctl.on_local_text_changed("cbt", now);

    assert_eq!(ctl.scores().local.score, 2);
    assert_eq!(ctl.scores().local.errors, 1);
    assert_eq!(ctl.local_passage_index(), 0);
}

#[test]
fn round_ends_when_timer_runs_out() {
    let mut ctl = simulated(1, 2, FeedbackMode::Easy, &["cat"]);
    let now = started(&mut ctl, Instant::now());
    ctl.on_local_text_changed("c", now);

    ctl.on_tick(tick(&ctl, TaskKind::RoundTimer, now));
    assert_eq!(ctl.seconds_remaining(), 1);
    ctl.on_tick(tick(&ctl, TaskKind::RoundTimer, now));

    assert_eq!(ctl.phase(), Phase::Ended);
    assert_eq!(ctl.observer().timers, vec![2, 1, 0]);
    assert!(!ctl.scheduler().is_active());
    let result = ctl.result().expect("results released");
    assert_eq!(result.winner, Some(Side::Local));
    assert_eq!(ctl.observer().results.len(), 1);

    // input after the end is ignored
    ctl.on_local_text_changed("ca", now);
    assert_eq!(ctl.scores().local.score, 1);
}

#[test]
fn stale_ticks_are_ignored() {
    let mut ctl = simulated(1, 10, FeedbackMode::Easy, &["cat"]);
    let now = started(&mut ctl, Instant::now());
    let stale = Tick {
        kind: TaskKind::RoundTimer,
        epoch: ctl.epoch() - 1,
        at: now,
    };
    ctl.on_tick(stale);
    assert_eq!(ctl.seconds_remaining(), 10);
}

#[test]
fn pause_freezes_the_round() {
    let mut ctl = simulated(1, 10, FeedbackMode::Easy, &["cat"]);
    let now = started(&mut ctl, Instant::now());

    ctl.on_pause_requested(now);
    assert!(ctl.is_paused());
    ctl.on_tick(tick(&ctl, TaskKind::RoundTimer, now));
    ctl.on_local_text_changed("c", now);
    assert_eq!(ctl.seconds_remaining(), 10);
    assert_eq!(ctl.scores().local.score, 0);

    ctl.on_pause_requested(now);
    assert_eq!(ctl.phase(), Phase::Active);
    ctl.on_tick(tick(&ctl, TaskKind::RoundTimer, now));
    assert_eq!(ctl.seconds_remaining(), 9);
}

#[test]
fn pausing_during_countdown_keeps_the_remaining_time() {
    let mut ctl = simulated(1, 10, FeedbackMode::Easy, &["cat"]);
    let t0 = Instant::now();
    ctl.start(t0);
    ctl.on_pause_requested(t0 + Duration::from_secs(1));
    ctl.poll(t0 + Duration::from_secs(10));
    assert!(ctl.is_paused());

    let resumed = t0 + Duration::from_secs(20);
    ctl.on_pause_requested(resumed);
    assert_eq!(ctl.phase(), Phase::Countdown);
    ctl.poll(resumed + Duration::from_millis(2400));
    assert_eq!(ctl.phase(), Phase::Countdown);
    ctl.poll(resumed + Duration::from_millis(2500));
    assert_eq!(ctl.phase(), Phase::Active);
}

#[test]
fn simulated_opponent_scores_and_advances() {
    let mut ctl = simulated(1, 60, FeedbackMode::Easy, &["ab", "cd"]);
    let now = started(&mut ctl, Instant::now());

    ctl.on_opponent_event(
        OpponentEvent::Progress {
            position: 1,
            errors: 0,
            last: Some(Outcome::Correct),
        },
        now,
    );
    ctl.on_opponent_event(
        OpponentEvent::Progress {
            position: 2,
            errors: 1,
            last: Some(Outcome::Incorrect),
        },
        now,
    );
    ctl.on_opponent_event(OpponentEvent::Completed, now);

    assert_eq!(ctl.scores().opponent.score, 1);
    assert_eq!(ctl.scores().opponent.errors, 1);
    assert_eq!(ctl.opponent_passage_index(), 1);
    assert_eq!(ctl.local_passage_index(), 0);
    assert_eq!(ctl.phase(), Phase::Active);
}

#[test]
fn simulated_typist_makes_progress_on_ticks() {
    let mut ctl = simulated(1, 60, FeedbackMode::Easy, &["the quick brown fox"]);
    let now = started(&mut ctl, Instant::now());

    ctl.on_tick(tick(&ctl, TaskKind::OpponentTick, now));
    ctl.on_tick(tick(&ctl, TaskKind::OpponentTick, now + Duration::from_secs(2)));

    // at difficulty 5 a keystroke takes well under a second
    assert!(ctl.opponent_position() > 1);
}

#[test]
fn hard_mode_fades_words_and_withholds_their_score() {
    let mut ctl = simulated(1, 60, FeedbackMode::Hard, &["ab cd"]);
    let now = started(&mut ctl, Instant::now());
    assert_eq!(
        ctl.scheduler().last_started().map(|(_, tasks)| tasks.clone()),
        Some(vec![
            TaskKind::RoundTimer,
            TaskKind::OpponentTick,
            TaskKind::Fade
        ])
    );

    ctl.on_tick(tick(&ctl, TaskKind::Fade, now));
    assert!(ctl.observer().faded.contains(&(Side::Opponent, 3)));
    assert!(ctl.observer().faded.contains(&(Side::Local, 3)));

    for position in 1..=4 {
        ctl.on_opponent_event(
            OpponentEvent::Progress {
                position,
                errors: 0,
                last: Some(Outcome::Correct),
            },
            now,
        );
    }
    // only position 4 lies beyond the faded word
    assert_eq!(ctl.scores().opponent.score, 1);
}

#[test]
fn multi_round_match_transitions_between_rounds() {
    let mut ctl = simulated(2, 1, FeedbackMode::Easy, &["cat", "dog"]);
    let now = started(&mut ctl, Instant::now());
    let first_epoch = ctl.epoch();

    ctl.on_tick(tick(&ctl, TaskKind::RoundTimer, now));
    assert_eq!(ctl.phase(), Phase::RoundTransition);
    assert!(ctl.result().is_none());

    ctl.poll(now + ROUND_TRANSITION);
    assert_eq!(ctl.phase(), Phase::Countdown);
    let go = now + ROUND_TRANSITION + COUNTDOWN;
    ctl.poll(go);
    assert_eq!(ctl.phase(), Phase::Active);
    assert_eq!(ctl.round(), 2);
    assert!(ctl.epoch() > first_epoch);
    assert_eq!(
        ctl.observer().passages.last(),
        Some(&(Side::Opponent, 0, "dog".to_string()))
    );

    ctl.on_tick(tick(&ctl, TaskKind::RoundTimer, go));
    assert_eq!(ctl.phase(), Phase::Ended);
    assert_eq!(ctl.result().map(|r| r.rounds_played), Some(2));
    assert_eq!(ctl.observer().rounds.len(), 2);
}

#[test]
fn unfinished_passage_tallies_carry_into_the_next_round() {
    let mut ctl = simulated(2, 1, FeedbackMode::Easy, &["cat", "dog"]);
    let now = started(&mut ctl, Instant::now());

    // round 1: both sides leave "cat" half typed with one error each
    type_text(&mut ctl, "cx", now);
    ctl.on_opponent_event(
        OpponentEvent::Progress {
            position: 1,
            errors: 1,
            last: Some(Outcome::Incorrect),
        },
        now,
    );
    ctl.on_opponent_event(
        OpponentEvent::Progress {
            position: 2,
            errors: 1,
            last: Some(Outcome::Correct),
        },
        now,
    );
    assert_eq!(ctl.scores().local, SideScore::new(1, 1));
    assert_eq!(ctl.scores().opponent, SideScore::new(1, 1));

    ctl.on_tick(tick(&ctl, TaskKind::RoundTimer, now));
    assert_eq!(ctl.phase(), Phase::RoundTransition);
    ctl.poll(now + ROUND_TRANSITION);
    let go = now + ROUND_TRANSITION + COUNTDOWN;
    ctl.poll(go);
    assert_eq!(ctl.round(), 2);

    // round 2 starts clean passages without wiping earlier errors
    type_text(&mut ctl, "d", go);
    ctl.on_opponent_event(
        OpponentEvent::Progress {
            position: 1,
            errors: 0,
            last: Some(Outcome::Correct),
        },
        go,
    );
    assert_eq!(ctl.scores().local, SideScore::new(2, 1));
    assert_eq!(ctl.scores().opponent, SideScore::new(2, 1));

    ctl.on_tick(tick(&ctl, TaskKind::RoundTimer, go));
    let result = ctl.result().expect("results released");
    assert_eq!(result.scores.local, SideScore::new(2, 1));
    assert_eq!(result.scores.opponent, SideScore::new(2, 1));
    assert_eq!(result.winner, None);
}

#[test]
fn remote_round_uses_host_passage_and_only_the_timer_task() {
    let (ctl, _channel, _) = remote(Role::Joiner, "hello world");
    assert_eq!(ctl.settings().rounds, 1);
    assert_eq!(ctl.seconds_remaining(), 20);
    assert_eq!(
        ctl.observer().passages.first(),
        Some(&(Side::Local, 0, "hello world".to_string()))
    );
    assert_eq!(
        ctl.scheduler().last_started().map(|(_, tasks)| tasks.clone()),
        Some(vec![TaskKind::RoundTimer])
    );
}

#[test]
fn peer_progress_scores_the_opponent() {
    let (mut ctl, _channel, now) = remote(Role::Host, "hello world");
    ctl.on_peer_event(
        PeerEvent::Message(Message::Progress {
            position: 5,
            errors: 0,
        }),
        now,
    );
    assert_eq!(ctl.opponent_position(), 5);
    assert_eq!(ctl.scores().opponent.score, 5);

    // a repeated report does not score twice
    ctl.on_peer_event(
        PeerEvent::Message(Message::Progress {
            position: 5,
            errors: 1,
        }),
        now,
    );
    assert_eq!(ctl.scores().opponent.score, 5);
    assert_eq!(ctl.scores().opponent.errors, 1);
}

#[test]
fn progress_during_countdown_is_applied_when_the_round_starts() {
    let mut ctl = MatchController::remote(
        settings(1, 60, FeedbackMode::Easy),
        Role::Joiner,
        sequencer(&["unused"]),
        Recorder::default(),
        ManualSchedule::new(),
    );
    let t0 = Instant::now();
    let handshake = Handshake {
        passage: "abc".into(),
        round_secs: 20,
        difficulty: 5,
        mode: FeedbackMode::Easy,
    };
    ctl.on_peer_connected(Box::new(FakeChannel::new(Role::Joiner)), &handshake, t0);
    ctl.on_peer_event(
        PeerEvent::Message(Message::Progress {
            position: 2,
            errors: 0,
        }),
        t0,
    );
    assert_eq!(ctl.scores().opponent.score, 0);

    ctl.poll(t0 + COUNTDOWN);
    assert_eq!(ctl.scores().opponent.score, 2);
}

#[test]
fn local_typing_is_reported_to_the_peer() {
    let (mut ctl, channel, now) = remote(Role::Joiner, "hello");
    ctl.on_local_text_changed("h", now);
    ctl.on_local_text_changed("hx", now);
    assert_eq!(
        channel.sent(),
        vec![
            Message::Progress {
                position: 1,
                errors: 0
            },
            Message::Progress {
                position: 1,
                errors: 1
            },
        ]
    );
}

#[test]
fn finishing_first_ends_a_remote_round() {
    let (mut ctl, channel, now) = remote(Role::Host, "hi");
    type_text(&mut ctl, "hi", now);

    assert_eq!(ctl.phase(), Phase::Ended);
    assert_eq!(
        channel.sent(),
        vec![
            Message::Progress {
                position: 1,
                errors: 0
            },
            Message::Progress {
                position: 2,
                errors: 0
            },
            Message::Finished,
            Message::FinalScore {
                score: 2,
                errors: 0
            },
        ]
    );
    // results wait for the peer's final score
    assert!(ctl.result().is_none());
    ctl.on_peer_event(
        PeerEvent::Message(Message::FinalScore {
            score: 1,
            errors: 0,
        }),
        now,
    );
    let result = ctl.result().expect("results released");
    assert_eq!(result.winner, Some(Side::Local));
    assert_eq!(result.scores.opponent.score, 1);
    assert!(!result.opponent_defaulted);
    assert!(!channel.is_stopped());
}

#[test]
fn peer_finishing_first_ends_the_round_and_early_final_score_counts() {
    let (mut ctl, channel, now) = remote(Role::Joiner, "hello");
    ctl.on_peer_event(
        PeerEvent::Message(Message::Progress {
            position: 5,
            errors: 0,
        }),
        now,
    );
    ctl.on_peer_event(PeerEvent::Message(Message::Finished), now);
    assert_eq!(ctl.phase(), Phase::Ended);
    assert_eq!(
        channel.sent().last(),
        Some(&Message::FinalScore {
            score: 0,
            errors: 0
        })
    );

    ctl.on_peer_event(
        PeerEvent::Message(Message::FinalScore {
            score: 5,
            errors: 0,
        }),
        now,
    );
    assert_eq!(ctl.result().and_then(|r| r.winner), Some(Side::Opponent));
}

#[test]
fn missing_final_score_defaults_to_zero_after_timeout() {
    let (mut ctl, _channel, now) = remote(Role::Host, "hello");
    ctl.on_peer_event(
        PeerEvent::Message(Message::Progress {
            position: 3,
            errors: 0,
        }),
        now,
    );
    ctl.on_peer_event(PeerEvent::Message(Message::Finished), now);
    assert!(ctl.result().is_none());

    ctl.poll(now + Duration::from_secs(4));
    assert!(ctl.result().is_none());
    ctl.poll(now + Duration::from_secs(5));

    let result = ctl.result().expect("released after timeout");
    assert!(result.opponent_defaulted);
    assert_eq!(result.scores.opponent.score, 0);
    assert_eq!(result.scores.opponent.errors, 0);
}

#[test]
fn joiner_cannot_pause_but_follows_the_host() {
    let (mut ctl, channel, now) = remote(Role::Joiner, "hello");

    ctl.on_pause_requested(now);
    assert_eq!(ctl.phase(), Phase::Active);
    assert!(channel.sent().is_empty());

    ctl.on_peer_event(PeerEvent::Message(Message::Pause), now);
    assert!(ctl.is_paused());
    ctl.on_tick(tick(&ctl, TaskKind::RoundTimer, now));
    assert_eq!(ctl.seconds_remaining(), 20);

    ctl.on_peer_event(PeerEvent::Message(Message::Resume), now);
    assert_eq!(ctl.phase(), Phase::Active);
}

#[test]
fn host_pause_is_sent_to_the_peer() {
    let (mut ctl, channel, now) = remote(Role::Host, "hello");

    ctl.on_pause_requested(now);
    assert!(ctl.is_paused());
    ctl.on_tick(tick(&ctl, TaskKind::RoundTimer, now));
    assert_eq!(ctl.seconds_remaining(), 20);
    ctl.on_pause_requested(now);

    assert_eq!(channel.sent(), vec![Message::Pause, Message::Resume]);

    // pause control from a joiner is ignored
    ctl.on_peer_event(PeerEvent::Message(Message::Pause), now);
    assert_eq!(ctl.phase(), Phase::Active);
}

#[test]
fn peer_disconnect_ends_the_match() {
    let (mut ctl, channel, now) = remote(Role::Joiner, "hello");
    ctl.on_local_text_changed("he", now);

    ctl.on_peer_event(PeerEvent::Disconnected(DisconnectReason::Left), now);

    assert_eq!(ctl.phase(), Phase::Ended);
    assert!(channel.is_stopped());
    assert_eq!(ctl.observer().disconnects, vec!["Host ended the game."]);
    let result = ctl.result().expect("results released");
    assert!(result.opponent_defaulted);
    assert_eq!(result.scores.local.score, 2);

    // a second notice is never produced
    ctl.on_peer_event(PeerEvent::Disconnected(DisconnectReason::Left), now);
    assert_eq!(ctl.observer().disconnects.len(), 1);
}

#[test]
fn host_sees_opponent_disconnected() {
    let (mut ctl, _channel, now) = remote(Role::Host, "hello");
    ctl.on_peer_event(
        PeerEvent::Disconnected(DisconnectReason::Lost("connection closed".into())),
        now,
    );
    assert_eq!(
        ctl.observer().disconnects,
        vec!["Opponent disconnected. (connection closed)"]
    );
}

#[test]
fn exit_tells_the_peer_and_stops_the_link() {
    let (mut ctl, channel, _) = remote(Role::Host, "hello");
    ctl.on_exit_requested();
    ctl.on_exit_requested();

    assert!(ctl.has_exited());
    assert_eq!(channel.sent(), vec![Message::Disconnect]);
    assert!(channel.is_stopped());
    assert_eq!(ctl.phase(), Phase::Ended);
}

#[test]
fn failed_connection_ends_in_the_lobby() {
    let mut ctl = MatchController::remote(
        MatchSettings::default(),
        Role::Joiner,
        sequencer(&["unused"]),
        Recorder::default(),
        ManualSchedule::new(),
    );
    ctl.on_connect_failed("connection refused");
    assert_eq!(ctl.phase(), Phase::Ended);
    assert!(ctl.result().is_none());
    assert_eq!(ctl.observer().phases, vec![Phase::Ended]);
}
