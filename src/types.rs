use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type QuestionId = u32;
pub type UserId = i64;
pub type GameRecordId = i64;
pub type SessionToken = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Player => "player",
            Role::Admin => "admin",
        }
    }

    /// Parse the role column as stored by the database
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "player" => Some(Role::Player),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Landing page after login
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::Player => "/player/dashboard",
            Role::Admin => "/admin/dashboard",
        }
    }
}

/// A single emoji puzzle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: QuestionId,
    pub emojis: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Registered account
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Account data needed to insert a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Profile fields a player can change from the settings page
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub username: String,
    pub email: String,
    /// None keeps the current password
    pub password_hash: Option<String>,
}

/// One finished game as stored in the history table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameRecord {
    pub id: GameRecordId,
    pub user_id: UserId,
    pub score: u32,
    pub time_used: String,
    pub played_at: DateTime<Utc>,
}

/// History row joined with the player's name (admin reports)
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReportRow {
    pub username: String,
    pub score: u32,
    pub time_used: String,
    pub played_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardStats {
    pub players: u64,
    pub games: u64,
    pub questions: usize,
}
