//! Single play-through state machine.
//!
//! A session is created from a fixed question sequence, counts down from its time
//! budget one `tick` at a time, and ends either when the sequence runs out or when
//! the countdown reaches zero. Ending yields a [`GameResult`] exactly once.

use super::clock::{format_clock, Clock};
use crate::types::Question;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Default per-game countdown in seconds
pub const DEFAULT_TIME_BUDGET_SECS: u32 = 90;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("No questions available")]
    ContentUnavailable,

    #[error("Time budget must be at least one second")]
    InvalidTimeBudget,

    #[error("Game is not active")]
    NotActive,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Every question was answered or skipped
    SequenceExhausted,
    /// The countdown reached zero
    TimeExpired,
    /// The caller ended the game early
    Stopped,
}

/// Summary handed to persistence when a session ends
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GameResult {
    pub score: u32,
    pub total_questions: u32,
    pub elapsed_secs: u32,
    /// `elapsed_secs` formatted as `m:ss`
    pub time_used: String,
    pub reason: EndReason,
}

/// What a single engine operation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Answer matched and the next question is up
    Correct,
    /// Answer did not match; nothing changed
    Incorrect,
    /// Moved past the current question without scoring
    Skipped,
    /// One second elapsed
    Ticked { remaining: u32 },
    /// The operation ended the session
    Finished(GameResult),
}

/// Read-only snapshot for rendering. Never includes the answer.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionView {
    pub emojis: Option<String>,
    /// 1-based position of the current question
    pub question_no: u32,
    pub total_questions: u32,
    pub score: u32,
    pub time_remaining: u32,
    pub hint_available: bool,
    pub hint: Option<String>,
    pub active: bool,
}

/// Trim and case-fold for answer comparison
pub fn normalize_answer(text: &str) -> String {
    text.trim().to_lowercase()
}

pub struct GameSession {
    questions: Vec<Question>,
    current_index: usize,
    score: u32,
    time_budget: u32,
    time_remaining: u32,
    hint_revealed: bool,
    active: bool,
    end_reason: Option<EndReason>,
    clock: Arc<dyn Clock>,
    started_at: Instant,
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("questions", &self.questions.len())
            .field("current_index", &self.current_index)
            .field("score", &self.score)
            .field("time_remaining", &self.time_remaining)
            .field("active", &self.active)
            .finish()
    }
}

impl GameSession {
    /// Begin a game over `questions` with a countdown of `time_budget` seconds.
    ///
    /// An empty sequence never produces a session.
    pub fn start(
        questions: Vec<Question>,
        time_budget: u32,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::ContentUnavailable);
        }
        if time_budget == 0 {
            return Err(SessionError::InvalidTimeBudget);
        }

        let started_at = clock.now();
        Ok(Self {
            questions,
            current_index: 0,
            score: 0,
            time_budget,
            time_remaining: time_budget,
            hint_revealed: false,
            active: true,
            end_reason: None,
            clock,
            started_at,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn current_question(&self) -> Option<&Question> {
        if self.active {
            self.questions.get(self.current_index)
        } else {
            None
        }
    }

    pub fn view(&self) -> SessionView {
        let question = self.current_question();
        SessionView {
            emojis: question.map(|q| q.emojis.clone()),
            question_no: (self.current_index + 1).min(self.questions.len()) as u32,
            total_questions: self.questions.len() as u32,
            score: self.score,
            time_remaining: self.time_remaining,
            hint_available: question.is_some_and(|q| q.hint.is_some()),
            hint: if self.hint_revealed {
                question.and_then(|q| q.hint.clone())
            } else {
                None
            },
            active: self.active,
        }
    }

    /// Compare `candidate` against the current question's answer
    pub fn submit_answer(&mut self, candidate: &str) -> Result<Outcome, SessionError> {
        let question = self.current_question().ok_or(SessionError::NotActive)?;

        if normalize_answer(candidate) != normalize_answer(&question.answer) {
            return Ok(Outcome::Incorrect);
        }

        self.score += 1;
        Ok(self.advance().unwrap_or(Outcome::Correct))
    }

    /// Move on without scoring
    pub fn skip(&mut self) -> Result<Outcome, SessionError> {
        if !self.active {
            return Err(SessionError::NotActive);
        }
        Ok(self.advance().unwrap_or(Outcome::Skipped))
    }

    /// One second of the countdown
    pub fn tick(&mut self) -> Result<Outcome, SessionError> {
        if !self.active {
            return Err(SessionError::NotActive);
        }

        self.time_remaining = self.time_remaining.saturating_sub(1);
        if self.time_remaining == 0 {
            return Ok(self.finish(EndReason::TimeExpired));
        }
        Ok(Outcome::Ticked {
            remaining: self.time_remaining,
        })
    }

    /// Reveal the current question's hint. Repeated calls return the same hint.
    pub fn reveal_hint(&mut self) -> Result<Option<String>, SessionError> {
        let hint = self
            .current_question()
            .ok_or(SessionError::NotActive)?
            .hint
            .clone();
        self.hint_revealed = true;
        Ok(hint)
    }

    /// Terminal transition. Returns the result only the first time.
    pub fn end(&mut self) -> Option<GameResult> {
        if !self.active {
            return None;
        }
        let reason = if self.current_index >= self.questions.len() {
            EndReason::SequenceExhausted
        } else if self.time_remaining == 0 {
            EndReason::TimeExpired
        } else {
            EndReason::Stopped
        };
        match self.finish(reason) {
            Outcome::Finished(result) => Some(result),
            _ => None,
        }
    }

    /// Step to the next question; ends the session when none remain
    fn advance(&mut self) -> Option<Outcome> {
        self.current_index += 1;
        self.hint_revealed = false;
        if self.current_index >= self.questions.len() {
            Some(self.finish(EndReason::SequenceExhausted))
        } else {
            None
        }
    }

    fn finish(&mut self, reason: EndReason) -> Outcome {
        self.active = false;
        self.end_reason = Some(reason);

        let elapsed = self.clock.now().saturating_duration_since(self.started_at);
        let elapsed_secs = (elapsed.as_secs() as u32).min(self.time_budget);

        tracing::debug!(
            score = self.score,
            elapsed_secs,
            ?reason,
            "Game session ended"
        );

        Outcome::Finished(GameResult {
            score: self.score,
            total_questions: self.questions.len() as u32,
            elapsed_secs,
            time_used: format_clock(elapsed_secs),
            reason,
        })
    }
}
