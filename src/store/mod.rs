//! Account and game history persistence.
//!
//! `MemoryStore` keeps everything in process (development and tests),
//! `PgStore` talks to Postgres when `DATABASE_URL` is configured.

mod memory;
mod postgres;

use async_trait::async_trait;

use crate::types::*;

pub use memory::MemoryStore;
pub use postgres::{create_pool, DbPoolConfig, PgStore};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("User {0} not found")]
    UserNotFound(UserId),

    #[error("Username or email already exists")]
    Duplicate,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Whether another account (other than `except`) uses this username or email
    async fn identity_taken(
        &self,
        username: &str,
        email: &str,
        except: Option<UserId>,
    ) -> StoreResult<bool>;

    async fn update_user(&self, id: UserId, update: UserUpdate) -> StoreResult<User>;

    async fn count_users(&self, role: Role) -> StoreResult<u64>;

    async fn insert_game(&self, user_id: UserId, score: u32, time_used: &str)
        -> StoreResult<GameRecord>;

    /// A player's games, newest first
    async fn games_for_user(&self, user_id: UserId) -> StoreResult<Vec<GameRecord>>;

    async fn count_games(&self) -> StoreResult<u64>;

    /// Latest games across all players, newest first
    async fn recent_games(&self, limit: u32) -> StoreResult<Vec<ReportRow>>;
}
