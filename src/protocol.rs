use crate::game::{EndReason, GameResult, SessionError, SessionView};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Begin a new game with a fresh question sample
    Start,
    SubmitAnswer {
        text: String,
    },
    Skip,
    /// Reveal the current question's hint
    Hint,
    /// End the running game early
    Quit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        username: String,
        time_budget_secs: u32,
        questions_per_game: u32,
    },
    Question {
        emojis: String,
        question_no: u32,
        total_questions: u32,
        score: u32,
        time_remaining: u32,
        hint_available: bool,
    },
    Incorrect {
        msg: String,
    },
    Tick {
        time_remaining: u32,
    },
    /// `text` is None when the question has no hint
    Hint {
        text: Option<String>,
    },
    GameOver {
        score: u32,
        total_questions: u32,
        time_used: String,
        reason: EndReason,
    },
    ResultSaved {
        saved: bool,
        msg: String,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    /// Current question of a running game, or None once it has ended
    pub fn question(view: &SessionView) -> Option<Self> {
        let emojis = view.emojis.clone()?;
        Some(ServerMessage::Question {
            emojis,
            question_no: view.question_no,
            total_questions: view.total_questions,
            score: view.score,
            time_remaining: view.time_remaining,
            hint_available: view.hint_available,
        })
    }

    pub fn game_over(result: &GameResult) -> Self {
        ServerMessage::GameOver {
            score: result.score,
            total_questions: result.total_questions,
            time_used: result.time_used.clone(),
            reason: result.reason,
        }
    }

    pub fn error(code: &str, msg: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            msg: msg.into(),
        }
    }
}

impl From<SessionError> for ServerMessage {
    fn from(err: SessionError) -> Self {
        let code = match err {
            SessionError::ContentUnavailable => "CONTENT_UNAVAILABLE",
            SessionError::InvalidTimeBudget => "INVALID_TIME_BUDGET",
            SessionError::NotActive => "NO_ACTIVE_GAME",
        };
        ServerMessage::error(code, err.to_string())
    }
}
