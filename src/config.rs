//! Server configuration loaded from environment variables

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::game::DEFAULT_TIME_BUDGET_SECS;

/// Per-game rules
#[derive(Debug, Clone, PartialEq)]
pub struct GameSettings {
    /// Countdown for one game
    pub time_budget_secs: u32,
    /// How many questions a game samples from the bank
    pub questions_per_game: usize,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            time_budget_secs: DEFAULT_TIME_BUDGET_SECS,
            questions_per_game: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Postgres connection string (None = in-memory store)
    pub database_url: Option<String>,
    pub questions_path: PathBuf,
    pub static_dir: PathBuf,
    pub session_ttl: Duration,
    pub game: GameSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_url: None,
            questions_path: PathBuf::from("data/questions.json"),
            static_dir: PathBuf::from("static"),
            session_ttl: Duration::from_secs(60 * 60 * 24),
            game: GameSettings::default(),
        }
    }
}

/// Read a positive number from the environment, falling back to `default`
fn positive_env<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default + Copy + std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) if value > T::default() => value,
            _ => {
                tracing::warn!("Invalid {}={:?}, using default {}", key, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = positive_env("PORT", defaults.bind_addr.port());
        let ip = match non_empty_env("BIND_ADDR") {
            Some(raw) => raw.parse::<IpAddr>().unwrap_or_else(|_| {
                tracing::warn!("Invalid BIND_ADDR={:?}, using 0.0.0.0", raw);
                IpAddr::V4(Ipv4Addr::UNSPECIFIED)
            }),
            None => defaults.bind_addr.ip(),
        };

        let config = Self {
            bind_addr: SocketAddr::new(ip, port),
            database_url: non_empty_env("DATABASE_URL"),
            questions_path: non_empty_env("QUESTIONS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.questions_path),
            static_dir: non_empty_env("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            session_ttl: Duration::from_secs(positive_env(
                "SESSION_TTL_SECS",
                defaults.session_ttl.as_secs(),
            )),
            game: GameSettings {
                time_budget_secs: positive_env("GAME_TIME_SECS", defaults.game.time_budget_secs),
                questions_per_game: positive_env(
                    "QUESTIONS_PER_GAME",
                    defaults.game.questions_per_game,
                ),
            },
        };

        tracing::info!(
            bind_addr = %config.bind_addr,
            database = config.database_url.is_some(),
            questions_path = %config.questions_path.display(),
            time_budget_secs = config.game.time_budget_secs,
            questions_per_game = config.game.questions_per_game,
            "Configuration loaded"
        );
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "PORT",
        "BIND_ADDR",
        "DATABASE_URL",
        "QUESTIONS_PATH",
        "STATIC_DIR",
        "SESSION_TTL_SECS",
        "GAME_TIME_SECS",
        "QUESTIONS_PER_GAME",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        let config = AppConfig::from_env();
        assert_eq!(config.bind_addr.port(), 3000);
        assert!(config.database_url.is_none());
        assert_eq!(config.questions_path, PathBuf::from("data/questions.json"));
        assert_eq!(config.session_ttl, Duration::from_secs(86400));
        assert_eq!(config.game, GameSettings::default());
        assert_eq!(config.game.time_budget_secs, 90);
    }

    #[test]
    #[serial]
    fn test_values_from_env() {
        clear_env();
        std::env::set_var("PORT", "8080");
        std::env::set_var("BIND_ADDR", "127.0.0.1");
        std::env::set_var("DATABASE_URL", "postgres://localhost/emoji");
        std::env::set_var("GAME_TIME_SECS", "60");
        std::env::set_var("QUESTIONS_PER_GAME", "5");

        let config = AppConfig::from_env();
        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/emoji")
        );
        assert_eq!(config.game.time_budget_secs, 60);
        assert_eq!(config.game.questions_per_game, 5);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        clear_env();
        std::env::set_var("PORT", "not-a-port");
        std::env::set_var("GAME_TIME_SECS", "0");
        std::env::set_var("QUESTIONS_PER_GAME", "-3");
        std::env::set_var("DATABASE_URL", "   ");

        let config = AppConfig::from_env();
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.game.time_budget_secs, 90);
        assert_eq!(config.game.questions_per_game, 10);
        assert!(config.database_url.is_none());
        clear_env();
    }
}
