use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

/// Periodic background work during a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    RoundTimer,
    OpponentTick,
    Fade,
}

impl TaskKind {
    pub fn interval(self) -> Duration {
        match self {
            TaskKind::RoundTimer => Duration::from_secs(1),
            TaskKind::OpponentTick => Duration::from_millis(100),
            TaskKind::Fade => Duration::from_secs(3),
        }
    }

    /// Delay before the first firing.
    pub fn initial_delay(self) -> Duration {
        match self {
            TaskKind::OpponentTick => Duration::ZERO,
            other => other.interval(),
        }
    }
}

/// One firing of a periodic task, tagged with the round epoch it was scheduled for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub kind: TaskKind,
    pub epoch: u64,
    pub at: Instant,
}

/// Something that can run the round's periodic tasks
///
/// Ticks are delivered back to the match through its event channel; the match drops
/// ticks whose epoch is stale, so a tick racing with `cancel` is harmless.
pub trait Schedule {
    fn start(&mut self, epoch: u64, tasks: &[TaskKind]);

    /// Stop every running task. Idempotent.
    fn cancel(&mut self);
}

/// Runs each task on its own thread at a fixed rate
pub struct ThreadScheduler<F> {
    post: Arc<F>,
    running: Vec<Arc<AtomicBool>>,
}

impl<F> ThreadScheduler<F>
where
    F: Fn(Tick) -> bool + Send + Sync + 'static,
{
    /// `post` delivers a tick and returns false once nobody is listening.
    pub fn new(post: F) -> Self {
        Self {
            post: Arc::new(post),
            running: Vec::new(),
        }
    }

    fn spawn(&mut self, kind: TaskKind, epoch: u64) {
        let running = Arc::new(AtomicBool::new(true));
        let post = Arc::clone(&self.post);
        let flag = Arc::clone(&running);

        let spawned = thread::Builder::new()
            .name(format!("{:?}", kind).to_lowercase())
            .spawn(move || {
                let interval = kind.interval();
                let mut next = Instant::now() + kind.initial_delay();
                loop {
                    let now = Instant::now();
                    if next > now {
                        thread::sleep(next - now);
                    }
                    if !flag.load(Ordering::SeqCst) {
                        break;
                    }
                    if !post(Tick {
                        kind,
                        epoch,
                        at: Instant::now(),
                    }) {
                        break;
                    }
                    // fixed rate: late firings do not push later ones back
                    next += interval;
                }
            });

        match spawned {
            Ok(_) => self.running.push(running),
            Err(err) => debug!(%err, ?kind, "could not spawn periodic task"),
        }
    }
}

impl<F> Schedule for ThreadScheduler<F>
where
    F: Fn(Tick) -> bool + Send + Sync + 'static,
{
    fn start(&mut self, epoch: u64, tasks: &[TaskKind]) {
        self.cancel();
        for kind in tasks {
            self.spawn(*kind, epoch);
        }
    }

    fn cancel(&mut self) {
        for flag in self.running.drain(..) {
            flag.store(false, Ordering::SeqCst);
        }
    }
}

impl<F> Drop for ThreadScheduler<F> {
    fn drop(&mut self) {
        for flag in self.running.drain(..) {
            flag.store(false, Ordering::SeqCst);
        }
    }
}

/// Schedule that only records what it was asked to do; ticks are fed by hand
#[derive(Debug, Default, Clone)]
pub struct ManualSchedule {
    pub started: Vec<(u64, Vec<TaskKind>)>,
    pub cancels: usize,
    active: bool,
}

impl ManualSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn last_started(&self) -> Option<&(u64, Vec<TaskKind>)> {
        self.started.last()
    }
}

impl Schedule for ManualSchedule {
    fn start(&mut self, epoch: u64, tasks: &[TaskKind]) {
        self.started.push((epoch, tasks.to_vec()));
        self.active = true;
    }

    fn cancel(&mut self) {
        self.cancels += 1;
        self.active = false;
    }
}
