use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::settings::FeedbackMode;

const EASY_PASSAGES: &[&str] = &[
    "Typing fast takes time and practice.",
    "Every mistake is a chance to improve.",
    "Focus on accuracy before speed.",
    "Small steps lead to big progress.",
    "Keep your eyes on the screen.",
    "Practice typing every single day.",
    "Good habits make good programmers.",
    "Stay calm and type with rhythm.",
    "Learning to code is a useful skill.",
    "Rust is fun to learn and easy to read.",
];

const MEDIUM_PASSAGES: &[&str] = &[
    "A terminal is a fine place to race a friend at typing.",
    "This duel challenges your speed and accuracy against an opponent.",
    "Background threads let the timer and the opponent run side by side.",
    "Real-time feedback helps players correct mistakes immediately.",
    "Programming requires patience, practice, and problem-solving skills.",
];

const HARD_PASSAGES: &[&str] = &[
    "Concurrency bugs are notoriously difficult to reproduce, diagnose, and fix, especially under real-world timing conditions.",
    "While optimizing premature code is discouraged, ignoring performance implications entirely can lead to catastrophic bottlenecks.",
    "The quick brown fox jumps over the lazy dog; meanwhile, developers debug race conditions at 3:47 a.m.",
    "Typing accuracy suffers when cognitive load increases, punctuation multiplies, and syntax errors silently accumulate.",
    "A well-architected system balances scalability, maintainability, extensibility, and readability without overengineering.",
    "Misplaced semicolons, off-by-one errors, and incorrect assumptions are responsible for countless hours of debugging.",
    "Asynchronous event-driven architectures demand careful coordination between callbacks, threads, and shared resources.",
    "Readable code is written for humans first, compilers second, and future maintainers (who may be you).",
    "Edge cases appear precisely where developers least expect them, often during demos, interviews, or production releases.",
    "Software development is the art of transforming vague ideas into precise instructions that computers relentlessly follow.",
];

/// Produces fresh passage text on demand
pub trait PassageSource: Send {
    fn next_passage(&mut self) -> String;
}

/// Built-in passages, picked at random from the tier matching the feedback mode
pub struct TieredPassages {
    tier: &'static [&'static str],
    rng: StdRng,
}

impl TieredPassages {
    pub fn new(mode: FeedbackMode) -> Self {
        Self::with_rng(mode, StdRng::from_entropy())
    }

    pub fn seeded(mode: FeedbackMode, seed: u64) -> Self {
        Self::with_rng(mode, StdRng::seed_from_u64(seed))
    }

    fn with_rng(mode: FeedbackMode, rng: StdRng) -> Self {
        let tier = match mode {
            FeedbackMode::Easy => EASY_PASSAGES,
            FeedbackMode::Medium => MEDIUM_PASSAGES,
            FeedbackMode::Hard => HARD_PASSAGES,
        };
        Self { tier, rng }
    }
}

impl PassageSource for TieredPassages {
    fn next_passage(&mut self) -> String {
        self.tier
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(MEDIUM_PASSAGES[0])
            .to_string()
    }
}

/// Hands out the given passages in order, wrapping around
#[derive(Debug, Clone)]
pub struct FixedPassages {
    passages: Vec<String>,
    next: usize,
}

impl FixedPassages {
    pub fn new<I, S>(passages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let passages: Vec<String> = passages.into_iter().map(Into::into).collect();
        Self { passages, next: 0 }
    }
}

impl PassageSource for FixedPassages {
    fn next_passage(&mut self) -> String {
        if self.passages.is_empty() {
            return String::new();
        }
        let passage = self.passages[self.next % self.passages.len()].clone();
        self.next += 1;
        passage
    }
}

/// Shared, append-only passage sequence both sides index into
///
/// "Passage N" means the same text for the local player and the opponent, so a
/// simulated match never has to transmit text.
pub struct PassageSequencer {
    source: Box<dyn PassageSource>,
    sequence: Vec<String>,
}

impl PassageSequencer {
    pub fn new(source: Box<dyn PassageSource>) -> Self {
        Self {
            source,
            sequence: Vec::new(),
        }
    }

    pub fn passage_at(&mut self, index: usize) -> &str {
        while self.sequence.len() <= index {
            let passage = self.source.next_passage();
            self.sequence.push(passage);
        }
        &self.sequence[index]
    }

    /// Fix passage 0 to text received from the host.
    pub fn pin_first(&mut self, passage: impl Into<String>) {
        self.sequence.clear();
        self.sequence.push(passage.into());
    }

    /// Start a fresh sequence, used between rounds.
    pub fn reset(&mut self) {
        self.sequence.clear();
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}
