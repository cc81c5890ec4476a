use super::AppState;
use crate::types::*;
use chrono::{DateTime, Utc};

/// Authenticated browser session referenced by the `sid` cookie
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub token: SessionToken,
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl LoginSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl AppState {
    /// Open a login session for `user`
    pub async fn create_login_session(&self, user: &User) -> LoginSession {
        let ttl = chrono::Duration::from_std(self.config.session_ttl)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        let session = LoginSession {
            token: ulid::Ulid::new().to_string(),
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            expires_at: Utc::now() + ttl,
        };

        self.sessions
            .write()
            .await
            .insert(session.token.clone(), session.clone());
        session
    }

    /// Look up a live session; expired sessions are dropped on access
    pub async fn get_login_session(&self, token: &str) -> Option<LoginSession> {
        let session = self.sessions.read().await.get(token).cloned()?;
        if session.is_expired(Utc::now()) {
            self.sessions.write().await.remove(token);
            return None;
        }
        Some(session)
    }

    pub async fn end_login_session(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Keep every open session of `user_id` in sync after a rename
    pub async fn rename_session_user(&self, user_id: UserId, username: &str) {
        for session in self.sessions.write().await.values_mut() {
            if session.user_id == user_id {
                session.username = username.to_string();
            }
        }
    }

    /// Remove expired sessions, returning how many were dropped
    pub async fn sweep_expired_sessions(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        before - sessions.len()
    }
}
