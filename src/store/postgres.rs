use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::str::FromStr;
use std::time::Duration;

use super::{Store, StoreError, StoreResult};
use crate::types::*;

/// Database pool configuration
#[derive(Debug, Clone)]
pub struct DbPoolConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for DbPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

impl DbPoolConfig {
    /// Load pool settings from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_connections: std::env::var("DB_POOL_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.max_connections),
            acquire_timeout: std::env::var("DB_POOL_ACQUIRE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.acquire_timeout),
        }
    }
}

/// Create a PostgreSQL connection pool
pub async fn create_pool(database_url: &str, config: DbPoolConfig) -> StoreResult<PgPool> {
    tracing::info!(
        "Creating database pool: max={}, acquire_timeout={:?}",
        config.max_connections,
        config.acquire_timeout
    );

    let connect_opts = PgConnectOptions::from_str(database_url)?;
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(connect_opts)
        .await?;

    tracing::info!("Database pool created");
    Ok(pool)
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'player',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS game_history (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        score INTEGER NOT NULL,
        time_used TEXT NOT NULL,
        played_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE INDEX IF NOT EXISTS game_history_user_idx ON game_history (user_id, played_at DESC)",
];

const USER_COLUMNS: &str = "id, username, email, password, role, created_at";
const GAME_COLUMNS: &str = "id, user_id, score, time_used, played_at";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap a pool and make sure the tables exist
    pub async fn connect(pool: PgPool) -> StoreResult<Self> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&pool).await?;
        }
        tracing::info!("Database schema ready");
        Ok(Self { pool })
    }
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password")?,
        role: Role::parse(&role).ok_or_else(|| StoreError::Corrupt(format!("role '{}'", role)))?,
        created_at: row.try_get("created_at")?,
    })
}

fn game_from_row(row: &PgRow) -> StoreResult<GameRecord> {
    let score: i32 = row.try_get("score")?;
    Ok(GameRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        score: score.max(0) as u32,
        time_used: row.try_get("time_used")?,
        played_at: row.try_get("played_at")?,
    })
}

/// Unique violations surface as `Duplicate`
fn map_unique(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db) = err {
        if db.code().as_deref() == Some("23505") {
            return StoreError::Duplicate;
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (username, email, password, role) VALUES ($1, $2, $3, $4) \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique)?;
        user_from_row(&row)
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE username = $1 LIMIT 1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn identity_taken(
        &self,
        username: &str,
        email: &str,
        except: Option<UserId>,
    ) -> StoreResult<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users \
             WHERE (username = $1 OR email = $2) AND ($3::BIGINT IS NULL OR id <> $3))",
        )
        .bind(username)
        .bind(email)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn update_user(&self, id: UserId, update: UserUpdate) -> StoreResult<User> {
        let row = sqlx::query(&format!(
            "UPDATE users SET username = $1, email = $2, password = COALESCE($3, password) \
             WHERE id = $4 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&update.username)
        .bind(&update.email)
        .bind(update.password_hash.as_deref())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique)?;

        match row {
            Some(row) => user_from_row(&row),
            None => Err(StoreError::UserNotFound(id)),
        }
    }

    async fn count_users(&self, role: Role) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn insert_game(
        &self,
        user_id: UserId,
        score: u32,
        time_used: &str,
    ) -> StoreResult<GameRecord> {
        let row = sqlx::query(&format!(
            "INSERT INTO game_history (user_id, score, time_used) VALUES ($1, $2, $3) \
             RETURNING {}",
            GAME_COLUMNS
        ))
        .bind(user_id)
        .bind(score as i32)
        .bind(time_used)
        .fetch_one(&self.pool)
        .await?;
        game_from_row(&row)
    }

    async fn games_for_user(&self, user_id: UserId) -> StoreResult<Vec<GameRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM game_history WHERE user_id = $1 ORDER BY played_at DESC, id DESC",
            GAME_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(game_from_row).collect()
    }

    async fn count_games(&self) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM game_history")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn recent_games(&self, limit: u32) -> StoreResult<Vec<ReportRow>> {
        let rows = sqlx::query(
            "SELECT u.username, gh.score, gh.time_used, gh.played_at \
             FROM game_history gh JOIN users u ON gh.user_id = u.id \
             ORDER BY gh.played_at DESC, gh.id DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> StoreResult<ReportRow> {
                let score: i32 = row.try_get("score")?;
                Ok(ReportRow {
                    username: row.try_get("username")?,
                    score: score.max(0) as u32,
                    time_used: row.try_get("time_used")?,
                    played_at: row.try_get("played_at")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_pool_config_from_env() {
        std::env::set_var("DB_POOL_MAX_CONNECTIONS", "4");
        std::env::set_var("DB_POOL_ACQUIRE_TIMEOUT_SECS", "3");
        let config = DbPoolConfig::from_env();
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.acquire_timeout, Duration::from_secs(3));

        std::env::set_var("DB_POOL_MAX_CONNECTIONS", "0");
        std::env::remove_var("DB_POOL_ACQUIRE_TIMEOUT_SECS");
        let config = DbPoolConfig::from_env();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout, Duration::from_secs(10));
        std::env::remove_var("DB_POOL_MAX_CONNECTIONS");
    }
}
