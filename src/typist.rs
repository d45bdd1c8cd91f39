use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use thiserror::Error;

use crate::settings::MAX_DIFFICULTY;

/// Shortest gap between two simulated keystrokes
pub const MIN_DELAY_MS: f64 = 20.0;

#[derive(Debug, Error, PartialEq)]
pub enum TypistConfigError {
    #[error("mean delay must be > 0 ms, got {0}")]
    MeanDelay(f64),
    #[error("jitter must be >= 0 ms, got {0}")]
    Jitter(f64),
    #[error("error rate must be within 0..=1, got {0}")]
    ErrorRate(f64),
}

/// Speed and accuracy of a simulated typist
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypistConfig {
    mean_delay_ms: f64,
    jitter_ms: f64,
    error_rate: f64,
}

impl TypistConfig {
    pub fn new(
        mean_delay_ms: f64,
        jitter_ms: f64,
        error_rate: f64,
    ) -> Result<Self, TypistConfigError> {
        if !(mean_delay_ms > 0.0) {
            return Err(TypistConfigError::MeanDelay(mean_delay_ms));
        }
        if !(jitter_ms >= 0.0) {
            return Err(TypistConfigError::Jitter(jitter_ms));
        }
        if !(0.0..=1.0).contains(&error_rate) {
            return Err(TypistConfigError::ErrorRate(error_rate));
        }
        Ok(Self {
            mean_delay_ms,
            jitter_ms,
            error_rate,
        })
    }

    /// Map a 1..=10 difficulty to a typist: 1 is slow and sloppy (300ms, 25% errors),
    /// 10 is fast and precise (80ms, 1% errors).
    pub fn from_difficulty(difficulty: u8) -> Self {
        let step = (difficulty.clamp(1, MAX_DIFFICULTY) - 1) as f64;
        let mean = 300.0 - step * (220.0 / 9.0);
        let jitter = 80.0 - step * (60.0 / 9.0);
        let error = 0.25 - step * (0.24 / 9.0);
        Self {
            mean_delay_ms: mean,
            jitter_ms: jitter.max(10.0),
            error_rate: error.max(0.01),
        }
    }

    pub fn mean_delay_ms(&self) -> f64 {
        self.mean_delay_ms
    }

    pub fn jitter_ms(&self) -> f64 {
        self.jitter_ms
    }

    pub fn error_rate(&self) -> f64 {
        self.error_rate
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypistEvent {
    Progress {
        position: usize,
        errors: u32,
        correct: bool,
    },
    Completed,
}

/// A non-human opponent working through one passage
///
/// Driven by [`SimulatedTypist::tick`] from a periodic task. Each tick subtracts the
/// elapsed wall time from the delay until the next keystroke and emits as many
/// keystrokes as that deficit covers, so a late tick catches up instead of leaving the
/// typist permanently behind.
#[derive(Debug)]
pub struct SimulatedTypist<R: Rng = StdRng> {
    passage_len: usize,
    config: TypistConfig,
    rng: R,
    position: usize,
    errors: u32,
    running: bool,
    last_tick: Option<Instant>,
    remaining_ms: f64,
}

impl SimulatedTypist<StdRng> {
    pub fn new(passage: &str, config: TypistConfig) -> Self {
        Self::with_rng(passage, config, StdRng::from_entropy())
    }

    pub fn seeded(passage: &str, config: TypistConfig, seed: u64) -> Self {
        Self::with_rng(passage, config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> SimulatedTypist<R> {
    pub fn with_rng(passage: &str, config: TypistConfig, rng: R) -> Self {
        let mut typist = Self {
            passage_len: passage.chars().count(),
            config,
            rng,
            position: 0,
            errors: 0,
            running: true,
            last_tick: None,
            remaining_ms: 0.0,
        };
        typist.remaining_ms = typist.sample_delay_ms();
        typist
    }

    pub fn tick(&mut self, now: Instant) -> Vec<TypistEvent> {
        let mut events = Vec::new();
        if !self.running {
            return events;
        }

        let elapsed = self
            .last_tick
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(Duration::ZERO);
        self.last_tick = Some(now);
        self.remaining_ms -= elapsed.as_secs_f64() * 1000.0;

        while self.running && self.remaining_ms <= 0.0 {
            self.advance_one(&mut events);
            if !self.running {
                break;
            }
            self.remaining_ms += self.sample_delay_ms();
        }

        events
    }

    fn advance_one(&mut self, events: &mut Vec<TypistEvent>) {
        if self.position < self.passage_len {
            let mistake = self.rng.gen::<f64>() < self.config.error_rate;
            if mistake {
                self.errors += 1;
            }
            self.position += 1;
            events.push(TypistEvent::Progress {
                position: self.position,
                errors: self.errors,
                correct: !mistake,
            });
        }

        if self.position >= self.passage_len {
            self.running = false;
            events.push(TypistEvent::Completed);
        }
    }

    fn sample_delay_ms(&mut self) -> f64 {
        let jitter = self.rng.sample::<f64, _>(StandardNormal) * (self.config.jitter_ms / 2.0);
        (self.config.mean_delay_ms + jitter).max(MIN_DELAY_MS)
    }

    /// Forget the last tick time so the next tick does not count a pause as typing time.
    pub fn suspend(&mut self) {
        self.last_tick = None;
    }

    /// Stops without a completion event. Idempotent.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn errors(&self) -> u32 {
        self.errors
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn passage_len(&self) -> usize {
        self.passage_len
    }
}
