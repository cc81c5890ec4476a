//! WebSocket message dispatch
//!
//! Each connection owns at most one [`GameSession`]. Client messages and timer
//! ticks are turned into a [`Reply`] which the socket loop sends back and acts on.

use crate::game::{GameResult, GameSession, Outcome, SessionError};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::UserId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What the socket loop should do after a message or tick
#[derive(Debug, Default)]
pub struct Reply {
    pub messages: Vec<ServerMessage>,
    /// Set when this step ended the game; the caller hands it to persistence
    pub finished: Option<GameResult>,
    /// A new game started, so the countdown starts from a full second
    pub restart_timer: bool,
}

impl Reply {
    fn one(msg: ServerMessage) -> Self {
        Self {
            messages: vec![msg],
            ..Default::default()
        }
    }

    fn finished(result: GameResult) -> Self {
        Self {
            messages: vec![ServerMessage::game_over(&result)],
            finished: Some(result),
            restart_timer: false,
        }
    }
}

fn active_game(game: &mut Option<GameSession>) -> Result<&mut GameSession, SessionError> {
    game.as_mut()
        .filter(|g| g.is_active())
        .ok_or(SessionError::NotActive)
}

/// Translate an engine outcome into what the player sees next
fn outcome_reply(game: &GameSession, outcome: Outcome) -> Reply {
    match outcome {
        Outcome::Incorrect => Reply::one(ServerMessage::Incorrect {
            msg: "Not quite, try again".to_string(),
        }),
        Outcome::Correct | Outcome::Skipped => match ServerMessage::question(&game.view()) {
            Some(msg) => Reply::one(msg),
            None => Reply::default(),
        },
        Outcome::Ticked { remaining } => Reply::one(ServerMessage::Tick {
            time_remaining: remaining,
        }),
        Outcome::Finished(result) => Reply::finished(result),
    }
}

/// Handle a client message against this connection's game
pub async fn handle_message(
    msg: ClientMessage,
    game: &mut Option<GameSession>,
    state: &AppState,
) -> Reply {
    match msg {
        ClientMessage::Start => handle_start(game, state).await,

        ClientMessage::SubmitAnswer { text } => match active_game(game) {
            Ok(session) => match session.submit_answer(&text) {
                Ok(outcome) => outcome_reply(session, outcome),
                Err(e) => Reply::one(e.into()),
            },
            Err(e) => Reply::one(e.into()),
        },

        ClientMessage::Skip => match active_game(game).and_then(|s| {
            let outcome = s.skip()?;
            Ok(outcome_reply(s, outcome))
        }) {
            Ok(reply) => reply,
            Err(e) => Reply::one(e.into()),
        },

        ClientMessage::Hint => match active_game(game).and_then(|s| s.reveal_hint()) {
            Ok(text) => Reply::one(ServerMessage::Hint { text }),
            Err(e) => Reply::one(e.into()),
        },

        ClientMessage::Quit => match game.as_mut().and_then(|s| s.end()) {
            Some(result) => {
                tracing::info!(score = result.score, "Player quit the game");
                Reply::finished(result)
            }
            None => Reply::one(SessionError::NotActive.into()),
        },
    }
}

async fn handle_start(game: &mut Option<GameSession>, state: &AppState) -> Reply {
    if game.as_ref().is_some_and(|g| g.is_active()) {
        return Reply::one(ServerMessage::error(
            "GAME_IN_PROGRESS",
            "A game is already running",
        ));
    }

    let settings = &state.config.game;
    let questions = state.questions.random(settings.questions_per_game).await;

    match GameSession::start(questions, settings.time_budget_secs, state.clock.clone()) {
        Ok(session) => {
            tracing::info!(
                questions = session.total_questions(),
                time_budget = settings.time_budget_secs,
                "Game started"
            );
            let reply = Reply {
                messages: ServerMessage::question(&session.view()).into_iter().collect(),
                finished: None,
                restart_timer: true,
            };
            *game = Some(session);
            reply
        }
        Err(e) => {
            tracing::warn!("Could not start game: {}", e);
            Reply::one(e.into())
        }
    }
}

/// Advance the countdown by one second. Does nothing without a running game.
pub fn handle_tick(game: &mut Option<GameSession>) -> Reply {
    match active_game(game) {
        Ok(session) => match session.tick() {
            Ok(outcome) => outcome_reply(session, outcome),
            Err(_) => Reply::default(),
        },
        Err(_) => Reply::default(),
    }
}

/// Persist a finished game off the socket loop and report back on `tx`
pub fn spawn_save(
    state: Arc<AppState>,
    user_id: UserId,
    result: GameResult,
    tx: mpsc::UnboundedSender<ServerMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let msg = match state.record_session_result(user_id, &result).await {
            Ok(_) => ServerMessage::ResultSaved {
                saved: true,
                msg: "Your score has been saved".to_string(),
            },
            Err(e) => {
                tracing::error!(user_id, "Failed to save game result: {}", e);
                ServerMessage::ResultSaved {
                    saved: false,
                    msg: "Could not save your score".to_string(),
                }
            }
        };
        // Receiver is gone if the player already left
        let _ = tx.send(msg);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{EndReason, ManualClock};
    use crate::state::test_support::state_with_questions;
    use crate::store::{Store, StoreError, StoreResult};
    use crate::types::*;
    use std::time::Duration;

    const TWO_QUESTIONS: &str = r#"[
        {"id":1,"emojis":"🦁👑","answer":"The Lion King","hint":"Disney"},
        {"id":2,"emojis":"🕷️🧑","answer":"Spider-Man"}
    ]"#;

    fn question_no(msg: &ServerMessage) -> u32 {
        match msg {
            ServerMessage::Question { question_no, .. } => *question_no,
            other => panic!("Expected Question, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_start_sends_first_question() {
        let (_dir, state) = state_with_questions(TWO_QUESTIONS).await;
        let mut game = None;

        let reply = handle_message(ClientMessage::Start, &mut game, &state).await;
        assert!(reply.restart_timer);
        assert_eq!(reply.messages.len(), 1);
        assert_eq!(question_no(&reply.messages[0]), 1);
        assert!(game.as_ref().unwrap().is_active());

        let again = handle_message(ClientMessage::Start, &mut game, &state).await;
        assert!(matches!(
            &again.messages[0],
            ServerMessage::Error { code, .. } if code == "GAME_IN_PROGRESS"
        ));
    }

    #[tokio::test]
    async fn test_start_without_questions() {
        let (_dir, state) = state_with_questions("[]").await;
        let mut game = None;

        let reply = handle_message(ClientMessage::Start, &mut game, &state).await;
        assert!(matches!(
            &reply.messages[0],
            ServerMessage::Error { code, .. } if code == "CONTENT_UNAVAILABLE"
        ));
        assert!(game.is_none());
        assert!(!reply.restart_timer);
    }

    #[tokio::test]
    async fn test_commands_without_game() {
        let (_dir, state) = state_with_questions(TWO_QUESTIONS).await;
        let mut game = None;

        for msg in [
            ClientMessage::SubmitAnswer {
                text: "x".to_string(),
            },
            ClientMessage::Skip,
            ClientMessage::Hint,
            ClientMessage::Quit,
        ] {
            let reply = handle_message(msg, &mut game, &state).await;
            assert!(matches!(
                &reply.messages[0],
                ServerMessage::Error { code, .. } if code == "NO_ACTIVE_GAME"
            ));
        }
        assert!(handle_tick(&mut game).messages.is_empty());
    }

    #[tokio::test]
    async fn test_full_game_flow() {
        let (_dir, state) = state_with_questions(TWO_QUESTIONS).await;
        let clock = Arc::new(ManualClock::new());
        let state = state.with_clock(clock.clone());
        let mut game = None;

        handle_message(ClientMessage::Start, &mut game, &state).await;
        let first = game.as_ref().unwrap().current_question().unwrap().clone();

        let reply = handle_message(ClientMessage::Hint, &mut game, &state).await;
        assert_eq!(
            reply.messages,
            vec![ServerMessage::Hint {
                text: first.hint.clone()
            }]
        );

        let reply = handle_message(
            ClientMessage::SubmitAnswer {
                text: "definitely wrong".to_string(),
            },
            &mut game,
            &state,
        )
        .await;
        assert!(matches!(reply.messages[0], ServerMessage::Incorrect { .. }));

        let reply = handle_message(
            ClientMessage::SubmitAnswer {
                text: format!("  {}  ", first.answer.to_uppercase()),
            },
            &mut game,
            &state,
        )
        .await;
        assert_eq!(question_no(&reply.messages[0]), 2);

        clock.advance(Duration::from_secs(12));
        let reply = handle_message(ClientMessage::Skip, &mut game, &state).await;
        let result = reply.finished.unwrap();
        assert_eq!(result.score, 1);
        assert_eq!(result.time_used, "0:12");
        assert_eq!(result.reason, EndReason::SequenceExhausted);
        assert!(matches!(reply.messages[0], ServerMessage::GameOver { score: 1, .. }));

        // A finished game can be replaced by a new one
        let reply = handle_message(ClientMessage::Start, &mut game, &state).await;
        assert!(reply.restart_timer);
    }

    #[tokio::test]
    async fn test_ticks_run_out_the_clock() {
        let (_dir, state) = state_with_questions(TWO_QUESTIONS).await;
        let state = AppState {
            config: crate::config::AppConfig {
                game: crate::config::GameSettings {
                    time_budget_secs: 3,
                    questions_per_game: 10,
                },
                ..state.config.clone()
            },
            ..state
        };
        let mut game = None;
        handle_message(ClientMessage::Start, &mut game, &state).await;

        assert_eq!(
            handle_tick(&mut game).messages,
            vec![ServerMessage::Tick { time_remaining: 2 }]
        );
        handle_tick(&mut game);
        let reply = handle_tick(&mut game);
        assert_eq!(reply.finished.unwrap().reason, EndReason::TimeExpired);
        assert!(handle_tick(&mut game).finished.is_none());
    }

    #[tokio::test]
    async fn test_quit_ends_once() {
        let (_dir, state) = state_with_questions(TWO_QUESTIONS).await;
        let mut game = None;
        handle_message(ClientMessage::Start, &mut game, &state).await;

        let reply = handle_message(ClientMessage::Quit, &mut game, &state).await;
        assert_eq!(reply.finished.unwrap().reason, EndReason::Stopped);

        let reply = handle_message(ClientMessage::Quit, &mut game, &state).await;
        assert!(reply.finished.is_none());
    }

    #[tokio::test]
    async fn test_spawn_save_reports_success() {
        let (_dir, state) = state_with_questions(TWO_QUESTIONS).await;
        let state = Arc::new(state);
        let user = state
            .register(crate::state::RegisterInput {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = GameResult {
            score: 2,
            total_questions: 2,
            elapsed_secs: 40,
            time_used: "0:40".to_string(),
            reason: EndReason::SequenceExhausted,
        };

        spawn_save(state.clone(), user.id, result, tx).await.unwrap();
        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::ResultSaved { saved: true, .. })
        ));
        assert_eq!(state.player_history(user.id).await.unwrap().len(), 1);
    }

    /// Store whose writes always fail
    struct BrokenStore;

    #[async_trait::async_trait]
    impl Store for BrokenStore {
        async fn create_user(&self, _: NewUser) -> StoreResult<User> {
            Err(StoreError::Corrupt("broken".to_string()))
        }
        async fn find_user(&self, _: UserId) -> StoreResult<Option<User>> {
            Ok(None)
        }
        async fn find_user_by_username(&self, _: &str) -> StoreResult<Option<User>> {
            Ok(None)
        }
        async fn identity_taken(&self, _: &str, _: &str, _: Option<UserId>) -> StoreResult<bool> {
            Ok(false)
        }
        async fn update_user(&self, id: UserId, _: UserUpdate) -> StoreResult<User> {
            Err(StoreError::UserNotFound(id))
        }
        async fn count_users(&self, _: Role) -> StoreResult<u64> {
            Ok(0)
        }
        async fn insert_game(&self, _: UserId, _: u32, _: &str) -> StoreResult<GameRecord> {
            Err(StoreError::Corrupt("broken".to_string()))
        }
        async fn games_for_user(&self, _: UserId) -> StoreResult<Vec<GameRecord>> {
            Ok(Vec::new())
        }
        async fn count_games(&self) -> StoreResult<u64> {
            Ok(0)
        }
        async fn recent_games(&self, _: u32) -> StoreResult<Vec<ReportRow>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_spawn_save_reports_failure() {
        let (_dir, state) = state_with_questions(TWO_QUESTIONS).await;
        let state = Arc::new(AppState {
            store: Arc::new(BrokenStore),
            ..state
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = GameResult {
            score: 0,
            total_questions: 2,
            elapsed_secs: 90,
            time_used: "1:30".to_string(),
            reason: EndReason::TimeExpired,
        };

        spawn_save(state, 1, result, tx).await.unwrap();
        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::ResultSaved { saved: false, .. })
        ));
    }
}
