//! Game results, player history and admin statistics

use super::AppState;
use crate::game::GameResult;
use crate::store::StoreResult;
use crate::types::*;

/// How many rows the admin report shows
pub const REPORT_LIMIT: u32 = 100;

impl AppState {
    /// Persist a finished game
    pub async fn save_game_result(
        &self,
        user_id: UserId,
        score: u32,
        time_used: &str,
    ) -> StoreResult<GameRecord> {
        let record = self.store.insert_game(user_id, score, time_used).await?;
        tracing::info!(user_id, score, time_used, "Saved game result");
        Ok(record)
    }

    /// Hand a session's result to persistence
    pub async fn record_session_result(
        &self,
        user_id: UserId,
        result: &GameResult,
    ) -> StoreResult<GameRecord> {
        self.save_game_result(user_id, result.score, &result.time_used)
            .await
    }

    pub async fn player_history(&self, user_id: UserId) -> StoreResult<Vec<GameRecord>> {
        self.store.games_for_user(user_id).await
    }

    pub async fn dashboard_stats(&self) -> StoreResult<DashboardStats> {
        Ok(DashboardStats {
            players: self.store.count_users(Role::Player).await?,
            games: self.store.count_games().await?,
            questions: self.questions.count().await,
        })
    }

    pub async fn reports(&self) -> StoreResult<Vec<ReportRow>> {
        self.store.recent_games(REPORT_LIMIT).await
    }
}
