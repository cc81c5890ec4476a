use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Store, StoreError, StoreResult};
use crate::types::*;

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    games: RwLock<Vec<GameRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users
            .iter()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(StoreError::Duplicate);
        }

        let user = User {
            id: users.iter().map(|u| u.id).max().unwrap_or(0) + 1,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: chrono::Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn identity_taken(
        &self,
        username: &str,
        email: &str,
        except: Option<UserId>,
    ) -> StoreResult<bool> {
        Ok(self.users.read().await.iter().any(|u| {
            Some(u.id) != except && (u.username == username || u.email == email)
        }))
    }

    async fn update_user(&self, id: UserId, update: UserUpdate) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users
            .iter()
            .any(|u| u.id != id && (u.username == update.username || u.email == update.email))
        {
            return Err(StoreError::Duplicate);
        }

        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::UserNotFound(id))?;
        user.username = update.username;
        user.email = update.email;
        if let Some(hash) = update.password_hash {
            user.password_hash = hash;
        }
        Ok(user.clone())
    }

    async fn count_users(&self, role: Role) -> StoreResult<u64> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .filter(|u| u.role == role)
            .count() as u64)
    }

    async fn insert_game(
        &self,
        user_id: UserId,
        score: u32,
        time_used: &str,
    ) -> StoreResult<GameRecord> {
        if self.find_user(user_id).await?.is_none() {
            return Err(StoreError::UserNotFound(user_id));
        }

        let mut games = self.games.write().await;
        let record = GameRecord {
            id: games.len() as GameRecordId + 1,
            user_id,
            score,
            time_used: time_used.to_string(),
            played_at: chrono::Utc::now(),
        };
        games.push(record.clone());
        Ok(record)
    }

    async fn games_for_user(&self, user_id: UserId) -> StoreResult<Vec<GameRecord>> {
        // Insertion order is chronological; reverse for newest first
        Ok(self
            .games
            .read()
            .await
            .iter()
            .rev()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn count_games(&self) -> StoreResult<u64> {
        Ok(self.games.read().await.len() as u64)
    }

    async fn recent_games(&self, limit: u32) -> StoreResult<Vec<ReportRow>> {
        let users = self.users.read().await;
        let games = self.games.read().await;
        Ok(games
            .iter()
            .rev()
            .filter_map(|g| {
                let user = users.iter().find(|u| u.id == g.user_id)?;
                Some(ReportRow {
                    username: user.username.clone(),
                    score: g.score,
                    time_used: g.time_used.clone(),
                    played_at: g.played_at,
                })
            })
            .take(limit as usize)
            .collect())
    }
}
