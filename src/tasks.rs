use crate::state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How often expired login sessions and stale throttle entries are dropped
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn a background task that periodically removes expired login sessions
/// and forgets old login-attempt counters
pub fn spawn_session_sweeper(state: Arc<AppState>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let sessions = state.sweep_expired_sessions().await;
            let counters = match state.login_limiter {
                Some(ref limiter) => limiter.cleanup().await,
                None => 0,
            };

            if sessions > 0 || counters > 0 {
                tracing::debug!(sessions, counters, "Swept expired entries");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::empty_state;
    use crate::types::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_sweeper_drops_expired_sessions() {
        let (_dir, state) = empty_state().await;
        let state = Arc::new(state);
        let user = User {
            id: 1,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: String::new(),
            role: Role::Player,
            created_at: Utc::now(),
        };
        let session = state.create_login_session(&user).await;
        if let Some(s) = state.sessions.write().await.get_mut(&session.token) {
            s.expires_at = Utc::now() - chrono::Duration::seconds(5);
        }

        let handle = spawn_session_sweeper(state.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert!(state.sessions.read().await.is_empty());
    }
}
