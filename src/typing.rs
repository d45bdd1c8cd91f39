#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum Outcome {
    Correct,
    Incorrect,
}

/// Result of comparing the current input against the passage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextUpdate {
    pub position: usize,
    pub correct: usize,
    /// positions that became correct for the first time
    pub newly_correct: u32,
    /// positions that became wrong for the first time
    pub new_errors: u32,
    pub last: Option<Outcome>,
    pub completed: bool,
}

/// The local player's attempt at one passage
///
/// The presentation layer reports the whole input text on every change; each passage
/// position awards score at most once and counts as an error at most once, so
/// backspacing and re-typing never double counts.
#[derive(Debug, Clone)]
pub struct LocalTyping {
    passage: Vec<char>,
    scored: Vec<bool>,
    faulted: Vec<bool>,
    errors: u32,
    correct: usize,
    position: usize,
}

impl LocalTyping {
    pub fn new(passage: &str) -> Self {
        let passage: Vec<char> = passage.chars().collect();
        let len = passage.len();
        Self {
            passage,
            scored: vec![false; len],
            faulted: vec![false; len],
            errors: 0,
            correct: 0,
            position: 0,
        }
    }

    pub fn apply(&mut self, text: &str) -> TextUpdate {
        let mut correct = 0;
        let mut newly_correct = 0;
        let mut new_errors = 0;
        let mut last = None;
        let mut position = 0;

        // extra characters past the end of the passage are ignored
        for (idx, (typed, expected)) in text.chars().zip(self.passage.iter()).enumerate() {
            position = idx + 1;
            if typed == *expected {
                correct += 1;
                last = Some(Outcome::Correct);
                if !self.scored[idx] {
                    self.scored[idx] = true;
                    newly_correct += 1;
                }
            } else {
                last = Some(Outcome::Incorrect);
                if !self.faulted[idx] {
                    self.faulted[idx] = true;
                    new_errors += 1;
                }
            }
        }

        self.errors += new_errors;
        self.correct = correct;
        self.position = position;

        TextUpdate {
            position,
            correct,
            newly_correct,
            new_errors,
            last,
            completed: !self.passage.is_empty() && correct == self.passage.len(),
        }
    }

    pub fn get_expected_char(&self, idx: usize) -> Option<char> {
        self.passage.get(idx).copied()
    }

    pub fn len(&self) -> usize {
        self.passage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passage.is_empty()
    }

    pub fn errors(&self) -> u32 {
        self.errors
    }

    pub fn correct(&self) -> usize {
        self.correct
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn progress(&self) -> f64 {
        if self.passage.is_empty() {
            0.0
        } else {
            self.correct as f64 / self.passage.len() as f64
        }
    }
}
