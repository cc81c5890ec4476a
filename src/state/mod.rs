mod accounts;
mod history;
mod sessions;

pub use accounts::{AccountError, RegisterInput, SettingsInput};
pub use sessions::LoginSession;

use crate::abuse::{AbuseConfig, RateLimiter};
use crate::config::AppConfig;
use crate::game::{Clock, SystemClock};
use crate::questions::QuestionBank;
use crate::store::Store;
use crate::types::SessionToken;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn Store>,
    pub questions: QuestionBank,
    /// Login sessions keyed by cookie token
    pub sessions: Arc<RwLock<HashMap<SessionToken, LoginSession>>>,
    /// Per-username login throttling (None = disabled)
    pub login_limiter: Option<RateLimiter>,
    /// Time source for game sessions
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>, questions: QuestionBank) -> Self {
        Self {
            config,
            store,
            questions,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            login_limiter: AbuseConfig::default().login_limiter,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_abuse_config(mut self, abuse: AbuseConfig) -> Self {
        self.login_limiter = abuse.login_limiter;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::store::MemoryStore;

    /// State over an in-memory store and a question file in a temp dir
    pub async fn state_with_questions(json: &str) -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questions.json");
        std::fs::write(&path, json).unwrap();
        let questions = QuestionBank::load(&path).await.unwrap();
        let config = AppConfig {
            questions_path: path,
            ..AppConfig::default()
        };
        let state = AppState::new(config, Arc::new(MemoryStore::new()), questions)
            .with_abuse_config(AbuseConfig::disabled());
        (dir, state)
    }

    pub async fn empty_state() -> (tempfile::TempDir, AppState) {
        state_with_questions("[]").await
    }
}
