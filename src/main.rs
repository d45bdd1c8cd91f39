mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand, ValueEnum};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
        Arc,
    },
    thread,
    time::{Duration, Instant},
};
use tracing::{info, warn};

use typeduel::{
    app_dirs::AppDirs,
    config::{ConfigStore, FileConfigStore},
    controller::MatchController,
    error::LinkError,
    history::{HistoryRecord, MatchHistory},
    link::{Handshake, PeerLink},
    logging,
    observer::Phase,
    passage::{PassageSequencer, PassageSource, TieredPassages},
    runtime::{AppEvent, AppEventSource, CrosstermEventSource, FixedTicker, Runner, Ticker},
    scheduler::{Schedule, ThreadScheduler, Tick},
    settings::{FeedbackMode, MatchSettings, OpponentKind, Role, DEFAULT_REMOTE_ROUND_SECS},
};
use ui::MatchView;

const TICK_RATE_MS: u64 = 50;

/// head-to-head typing races in the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Race a simulated typist, or another player over TCP, through the same passages. Score one point per correct character; errors are subtracted at the end."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// number of rounds against the computer
    #[clap(short = 'r', long, global = true)]
    rounds: Option<u32>,

    /// number of seconds per round
    #[clap(short = 's', long, global = true)]
    secs: Option<u32>,

    /// opponent speed and accuracy, 1 (slow) to 10 (fast)
    #[clap(short = 'd', long, global = true)]
    difficulty: Option<u8>,

    /// feedback mode; also picks the passage tier
    #[clap(short = 'm', long, value_enum, global = true)]
    mode: Option<Mode>,

    /// port to host on or connect to
    #[clap(short = 'p', long, global = true)]
    port: Option<u16>,

    /// seed for passages and the simulated typist
    #[clap(long, global = true)]
    seed: Option<u64>,

    /// write logs here instead of the state directory
    #[clap(long, global = true)]
    log_file: Option<PathBuf>,

    /// remember the given options as the new defaults
    #[clap(long, global = true)]
    save: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// race the computer (default)
    Solo,
    /// wait for another player to join
    Host,
    /// join a hosting player
    Join {
        /// host address, `host` or `host:port`
        addr: String,
    },
}

#[derive(Debug, Copy, Clone, ValueEnum, strum_macros::Display)]
pub enum Mode {
    Easy,
    Medium,
    Hard,
}

impl From<Mode> for FeedbackMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Easy => FeedbackMode::Easy,
            Mode::Medium => FeedbackMode::Medium,
            Mode::Hard => FeedbackMode::Hard,
        }
    }
}

impl Cli {
    fn is_remote(&self) -> bool {
        matches!(self.command, Some(Command::Host) | Some(Command::Join { .. }))
    }
}

fn join_address(addr: &str, port: u16) -> String {
    if addr.contains(':') {
        addr.to_string()
    } else {
        format!("{}:{}", addr, port)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(path) = cli.log_file.clone().or_else(AppDirs::log_path) {
        if let Err(err) = logging::init_tracing(&path) {
            eprintln!("logging disabled: {}", err);
        }
    }

    let store = FileConfigStore::new();
    let mut config = store.load();
    if let Some(rounds) = cli.rounds {
        config.rounds = rounds;
    }
    if let Some(secs) = cli.secs {
        config.round_secs = secs;
    }
    if let Some(difficulty) = cli.difficulty {
        config.difficulty = difficulty;
    }
    if let Some(mode) = cli.mode {
        config.mode = mode.into();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.save {
        store.save(&config)?;
        info!(path = %store.path().display(), "saved defaults");
    }

    let mut settings = config.match_settings();
    if cli.is_remote() && cli.secs.is_none() {
        settings.round_secs = DEFAULT_REMOTE_ROUND_SECS;
    }
    if let Some(seed) = cli.seed {
        settings = settings.with_seed(seed);
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let outcome = start_tui(&mut terminal, &cli, settings, config.port);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    outcome
}

fn passage_source(settings: &MatchSettings) -> TieredPassages {
    match settings.seed {
        Some(seed) => TieredPassages::seeded(settings.mode, seed),
        None => TieredPassages::new(settings.mode),
    }
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    cli: &Cli,
    settings: MatchSettings,
    port: u16,
) -> Result<(), Box<dyn Error>> {
    let events = CrosstermEventSource::new();
    let tx = events.sender();
    let task_tx = tx.clone();
    let scheduler =
        ThreadScheduler::new(move |tick: Tick| task_tx.send(AppEvent::Task(tick)).is_ok());
    let runner = Runner::new(events, FixedTicker::new(Duration::from_millis(TICK_RATE_MS)));
    let cancel = Arc::new(AtomicBool::new(false));

    let mut source = passage_source(&settings);
    let command = cli.command.clone().unwrap_or(Command::Solo);

    let mut ctl = match command {
        Command::Solo => {
            let view = MatchView::new(OpponentKind::Simulated, &settings, None);
            let sequencer = PassageSequencer::new(Box::new(source));
            let mut ctl = MatchController::simulated(settings, sequencer, view, scheduler);
            ctl.start(Instant::now());
            ctl
        }
        Command::Host => {
            let handshake = Handshake {
                passage: source.next_passage(),
                round_secs: settings.round_secs,
                difficulty: settings.difficulty,
                mode: settings.mode,
            };
            let notice = format!("Hosting on port {}, waiting for an opponent...", port);
            let view = MatchView::new(OpponentKind::Remote(Role::Host), &settings, Some(notice));
            let sequencer = PassageSequencer::new(Box::new(source));
            spawn_host(port, handshake, Arc::clone(&cancel), tx);
            MatchController::remote(settings, Role::Host, sequencer, view, scheduler)
        }
        Command::Join { addr } => {
            let addr = join_address(&addr, port);
            let notice = format!("Connecting to {}...", addr);
            let view =
                MatchView::new(OpponentKind::Remote(Role::Joiner), &settings, Some(notice));
            let sequencer = PassageSequencer::new(Box::new(source));
            spawn_join(addr, tx);
            MatchController::remote(settings, Role::Joiner, sequencer, view, scheduler)
        }
    };

    let history = AppDirs::history_path().map(MatchHistory::new);
    let outcome = run_match(terminal, &runner, &mut ctl, history.as_ref());

    cancel.store(true, Ordering::SeqCst);
    ctl.on_exit_requested();
    outcome
}

/// Accept one joiner off the UI thread; Esc in the lobby sets `cancel`.
fn spawn_host(port: u16, handshake: Handshake, cancel: Arc<AtomicBool>, tx: Sender<AppEvent>) {
    thread::spawn(move || {
        let peer_tx = tx.clone();
        let sink = move |ev| {
            let _ = peer_tx.send(AppEvent::Peer(ev));
        };
        match PeerLink::host(port, &handshake, &cancel, sink) {
            Ok(link) => {
                let _ = tx.send(AppEvent::Connected(link, handshake));
            }
            Err(LinkError::Cancelled) => info!("stopped waiting for an opponent"),
            Err(err) => {
                warn!(%err, "hosting failed");
                let _ = tx.send(AppEvent::ConnectFailed(err.to_string()));
            }
        }
    });
}

fn spawn_join(addr: String, tx: Sender<AppEvent>) {
    thread::spawn(move || {
        let peer_tx = tx.clone();
        let sink = move |ev| {
            let _ = peer_tx.send(AppEvent::Peer(ev));
        };
        match PeerLink::join(addr.as_str(), sink) {
            Ok((link, handshake)) => {
                let _ = tx.send(AppEvent::Connected(link, handshake));
            }
            Err(err) => {
                warn!(%err, "joining failed");
                let _ = tx.send(AppEvent::ConnectFailed(err.to_string()));
            }
        }
    });
}

#[derive(Debug, PartialEq, Eq)]
enum KeyAction {
    Continue,
    Quit,
}

fn on_key<S: Schedule>(
    key: KeyEvent,
    ctl: &mut MatchController<MatchView, S>,
    now: Instant,
) -> KeyAction {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return KeyAction::Quit;
    }

    let phase = ctl.observer().phase();
    match key.code {
        KeyCode::Esc => match phase {
            Phase::Lobby | Phase::Ended => return KeyAction::Quit,
            _ => ctl.on_pause_requested(now),
        },
        KeyCode::Char('q') if phase == Phase::Ended => return KeyAction::Quit,
        KeyCode::Char(c) => {
            if ctl.observer_mut().push_char(c) {
                let text = ctl.observer().input().to_string();
                ctl.on_local_text_changed(&text, now);
            }
        }
        KeyCode::Backspace => {
            if ctl.observer_mut().backspace() {
                let text = ctl.observer().input().to_string();
                ctl.on_local_text_changed(&text, now);
            }
        }
        _ => {}
    }
    KeyAction::Continue
}

fn run_match<B, E, T, S>(
    terminal: &mut Terminal<B>,
    runner: &Runner<E, T>,
    ctl: &mut MatchController<MatchView, S>,
    history: Option<&MatchHistory>,
) -> Result<(), Box<dyn Error>>
where
    B: Backend,
    E: AppEventSource,
    T: Ticker,
    S: Schedule,
{
    let mut recorded = false;

    loop {
        terminal.draw(|f| f.render_widget(ctl.observer(), f.area()))?;

        let now = Instant::now();
        match runner.step() {
            AppEvent::Tick => ctl.poll(now),
            AppEvent::Resize => {}
            AppEvent::Task(tick) => ctl.on_tick(tick),
            AppEvent::Peer(event) => ctl.on_peer_event(event, now),
            AppEvent::Connected(link, handshake) => {
                ctl.on_peer_connected(Box::new(link), &handshake, now)
            }
            AppEvent::ConnectFailed(reason) => ctl.on_connect_failed(&reason),
            AppEvent::Key(key) => {
                if on_key(key, ctl, now) == KeyAction::Quit {
                    break;
                }
            }
        }

        if !recorded {
            if let (Some(result), Some(history)) = (ctl.result(), history) {
                recorded = true;
                let record =
                    HistoryRecord::new(chrono::Local::now(), ctl.kind(), ctl.settings(), result);
                if let Err(err) = history.append(&record) {
                    warn!(%err, path = %history.path().display(), "could not save match history");
                }
            }
        }
    }

    Ok(())
}
