pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    Extension,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::auth::CurrentUser;
use crate::game::{GameSession, IntervalTicker, TickSource};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;

/// WebSocket upgrade handler (behind the player guard)
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(user): Extension<CurrentUser>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!(user = %user.username, "WebSocket connection request");

    ws.on_upgrade(move |socket| {
        handle_socket(socket, user, state, IntervalTicker::new(Duration::from_secs(1)))
    })
}

async fn send_message<S>(sender: &mut S, msg: &ServerMessage) -> bool
where
    S: Sink<Message> + Unpin,
{
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize message: {}", e);
            true
        }
    }
}

async fn handle_socket<T: TickSource>(
    socket: WebSocket,
    user: CurrentUser,
    state: Arc<AppState>,
    ticker: T,
) {
    let (sender, receiver) = socket.split();
    drive_connection(sender, receiver, user, state, ticker).await;
}

/// Drive one player's connection: client messages, countdown ticks and save reports
pub(crate) async fn drive_connection<S, R, T>(
    mut sender: S,
    mut receiver: R,
    user: CurrentUser,
    state: Arc<AppState>,
    mut ticker: T,
) where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
    T: TickSource,
{
    let (save_tx, mut save_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let mut game: Option<GameSession> = None;

    let settings = &state.config.game;
    let welcome = ServerMessage::Welcome {
        username: user.username.clone(),
        time_budget_secs: settings.time_budget_secs,
        questions_per_game: settings.questions_per_game as u32,
    };
    if !send_message(&mut sender, &welcome).await {
        tracing::error!("Failed to send welcome message");
        return;
    }

    loop {
        let reply = tokio::select! {
            _ = ticker.next_tick(), if game.as_ref().is_some_and(|g| g.is_active()) => {
                handlers::handle_tick(&mut game)
            }

            Some(saved) = save_rx.recv() => {
                if !send_message(&mut sender, &saved).await {
                    break;
                }
                continue;
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text.as_str());

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                handlers::handle_message(client_msg, &mut game, &state).await
                            }
                            Err(e) => {
                                tracing::warn!("Failed to parse client message: {}", e);
                                handlers::Reply {
                                    messages: vec![ServerMessage::error(
                                        "PARSE_ERROR",
                                        format!("Invalid message format: {}", e),
                                    )],
                                    ..Default::default()
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        };

        if reply.restart_timer {
            ticker.restart();
        }

        let mut open = true;
        for msg in &reply.messages {
            if !send_message(&mut sender, msg).await {
                open = false;
                break;
            }
        }

        if let Some(result) = reply.finished {
            handlers::spawn_save(state.clone(), user.user_id, result, save_tx.clone());
        }

        if !open {
            break;
        }
    }

    if game.as_ref().is_some_and(|g| g.is_active()) {
        tracing::info!(user = %user.username, "Player left mid-game, result discarded");
    }
    tracing::info!(user = %user.username, "WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, GameSettings};
    use crate::game::EndReason;
    use crate::state::test_support::state_with_questions;
    use crate::state::RegisterInput;
    use crate::types::Role;
    use futures::channel::mpsc as channel;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Ticks only when the test sends one
    struct ChannelTicker {
        ticks: mpsc::UnboundedReceiver<()>,
        restarts: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl TickSource for ChannelTicker {
        async fn next_tick(&mut self) {
            if self.ticks.recv().await.is_none() {
                std::future::pending::<()>().await;
            }
        }

        fn restart(&mut self) {
            self.restarts.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Connection {
        client: channel::UnboundedSender<Result<Message, axum::Error>>,
        server: channel::UnboundedReceiver<Message>,
        ticks: mpsc::UnboundedSender<()>,
        restarts: Arc<AtomicUsize>,
        task: tokio::task::JoinHandle<()>,
    }

    impl Connection {
        fn send(&self, msg: &ClientMessage) {
            let json = serde_json::to_string(msg).unwrap();
            self.client.unbounded_send(Ok(Message::Text(json.into()))).unwrap();
        }

        fn tick(&self) {
            self.ticks.send(()).unwrap();
        }

        async fn recv(&mut self) -> ServerMessage {
            let msg = tokio::time::timeout(Duration::from_secs(2), self.server.next())
                .await
                .expect("server message in time")
                .expect("connection open");
            match msg {
                Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
                other => panic!("Expected text frame, got {:?}", other),
            }
        }

        async fn assert_quiet(&mut self) {
            let next = tokio::time::timeout(Duration::from_millis(50), self.server.next()).await;
            assert!(next.is_err(), "unexpected message: {:?}", next);
        }
    }

    async fn connect(state: Arc<AppState>, user: CurrentUser) -> Connection {
        let (client, incoming) = channel::unbounded();
        let (outgoing, server) = channel::unbounded();
        let (ticks, tick_rx) = mpsc::unbounded_channel();
        let restarts = Arc::new(AtomicUsize::new(0));
        let ticker = ChannelTicker {
            ticks: tick_rx,
            restarts: restarts.clone(),
        };
        let task = tokio::spawn(drive_connection(outgoing, incoming, user, state, ticker));
        Connection {
            client,
            server,
            ticks,
            restarts,
            task,
        }
    }

    async fn player_state() -> (tempfile::TempDir, Arc<AppState>, CurrentUser) {
        let (dir, state) = state_with_questions(
            r#"[{"id":1,"emojis":"🦁👑","answer":"The Lion King"},
                {"id":2,"emojis":"🦈🏖️","answer":"Jaws"}]"#,
        )
        .await;
        let state = AppState {
            config: AppConfig {
                game: GameSettings {
                    time_budget_secs: 3,
                    questions_per_game: 10,
                },
                ..state.config.clone()
            },
            ..state
        };
        let alice = state
            .register(RegisterInput {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();
        let user = CurrentUser {
            user_id: alice.id,
            username: alice.username,
            role: Role::Player,
            token: "test".to_string(),
        };
        (dir, Arc::new(state), user)
    }

    #[tokio::test]
    async fn test_countdown_runs_game_to_saved_result() {
        let (_dir, state, user) = player_state().await;
        let mut conn = connect(state.clone(), user.clone()).await;

        assert!(matches!(conn.recv().await, ServerMessage::Welcome { time_budget_secs: 3, .. }));

        // No game yet, so the tick stays queued
        conn.tick();
        conn.assert_quiet().await;
        assert_eq!(conn.restarts.load(Ordering::SeqCst), 0);

        conn.send(&ClientMessage::Start);
        assert!(matches!(conn.recv().await, ServerMessage::Question { question_no: 1, .. }));
        assert_eq!(conn.restarts.load(Ordering::SeqCst), 1);

        assert_eq!(conn.recv().await, ServerMessage::Tick { time_remaining: 2 });
        conn.tick();
        assert_eq!(conn.recv().await, ServerMessage::Tick { time_remaining: 1 });
        conn.tick();
        match conn.recv().await {
            ServerMessage::GameOver { score, reason, .. } => {
                assert_eq!(score, 0);
                assert_eq!(reason, EndReason::TimeExpired);
            }
            other => panic!("Expected GameOver, got {:?}", other),
        }
        assert!(matches!(
            conn.recv().await,
            ServerMessage::ResultSaved { saved: true, .. }
        ));
        assert_eq!(state.player_history(user.user_id).await.unwrap().len(), 1);

        // Ticks after the game ended are not processed
        conn.tick();
        conn.assert_quiet().await;

        drop(conn.client);
        conn.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_mid_game_discards_result() {
        let (_dir, state, user) = player_state().await;
        let mut conn = connect(state.clone(), user.clone()).await;
        conn.recv().await;

        conn.send(&ClientMessage::Start);
        assert!(matches!(conn.recv().await, ServerMessage::Question { .. }));
        conn.tick();
        assert_eq!(conn.recv().await, ServerMessage::Tick { time_remaining: 2 });

        drop(conn.client);
        conn.task.await.unwrap();

        assert!(state.player_history(user.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_message_gets_parse_error() {
        let (_dir, state, user) = player_state().await;
        let mut conn = connect(state, user).await;
        conn.recv().await;

        conn.client
            .unbounded_send(Ok(Message::Text("{\"t\":\"dance\"}".into())))
            .unwrap();
        assert!(matches!(
            conn.recv().await,
            ServerMessage::Error { ref code, .. } if code == "PARSE_ERROR"
        ));
    }
}
