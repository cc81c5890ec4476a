//! Registration, login and profile settings

use super::{AppState, LoginSession};
use crate::abuse::login_key;
use crate::auth::{hash_password_blocking, verify_password_blocking, AuthConfig};
use crate::store::StoreError;
use crate::types::*;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Username or email already exists")]
    IdentityTaken,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Too many login attempts, try again later")]
    RateLimited,

    #[error("Password hashing failed: {0}")]
    Hashing(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => AccountError::IdentityTaken,
            other => AccountError::Store(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SettingsInput {
    pub username: String,
    pub email: String,
    /// Empty or None keeps the current password
    pub password: Option<String>,
}

fn required(value: &str, field: &'static str) -> Result<String, AccountError> {
    let value = value.trim();
    if value.is_empty() {
        Err(AccountError::MissingField(field))
    } else {
        Ok(value.to_string())
    }
}

impl AppState {
    /// Create a player account
    pub async fn register(&self, input: RegisterInput) -> Result<User, AccountError> {
        let username = required(&input.username, "username")?;
        let email = required(&input.email, "email")?;
        if input.password.is_empty() {
            return Err(AccountError::MissingField("password"));
        }

        if self.store.identity_taken(&username, &email, None).await? {
            return Err(AccountError::IdentityTaken);
        }

        let password_hash = hash_password_blocking(input.password).await?;
        let user = self
            .store
            .create_user(NewUser {
                username,
                email,
                password_hash,
                role: Role::Player,
            })
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, "Registered player");
        Ok(user)
    }

    /// Verify credentials and open a login session
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(User, LoginSession), AccountError> {
        let username = username.trim();
        let key = login_key(username);

        if let Some(ref limiter) = self.login_limiter {
            if !limiter.check(&key).await {
                tracing::warn!(username, "Login rate limited");
                return Err(AccountError::RateLimited);
            }
        }

        let verified = match self.store.find_user_by_username(username).await? {
            Some(user) => {
                let ok = verify_password_blocking(password.to_string(), user.password_hash.clone())
                    .await;
                ok.then_some(user)
            }
            None => None,
        };
        let Some(user) = verified else {
            tracing::info!(username, "Failed login attempt");
            return Err(AccountError::InvalidCredentials);
        };

        if let Some(ref limiter) = self.login_limiter {
            limiter.reset(&key).await;
        }

        let session = self.create_login_session(&user).await;
        tracing::info!(user_id = user.id, role = user.role.as_str(), "User logged in");
        Ok((user, session))
    }

    /// Update username, email and optionally password
    pub async fn update_settings(
        &self,
        user_id: UserId,
        input: SettingsInput,
    ) -> Result<User, AccountError> {
        let username = required(&input.username, "username")?;
        let email = required(&input.email, "email")?;
        let password_hash = match input.password.filter(|p| !p.is_empty()) {
            Some(password) => Some(hash_password_blocking(password).await?),
            None => None,
        };

        if self
            .store
            .identity_taken(&username, &email, Some(user_id))
            .await?
        {
            return Err(AccountError::IdentityTaken);
        }

        let user = self
            .store
            .update_user(
                user_id,
                UserUpdate {
                    username,
                    email,
                    password_hash,
                },
            )
            .await?;

        self.rename_session_user(user_id, &user.username).await;
        tracing::info!(user_id, "Updated account settings");
        Ok(user)
    }

    /// Create the configured admin account if it does not exist yet
    pub async fn ensure_admin(&self, auth: &AuthConfig) -> Result<Option<User>, AccountError> {
        let Some((username, password)) = auth.admin_credentials() else {
            return Ok(None);
        };

        if let Some(existing) = self.store.find_user_by_username(username).await? {
            if existing.role != Role::Admin {
                tracing::warn!(username, "Configured admin name belongs to a player account");
            }
            return Ok(None);
        }

        let password_hash = hash_password_blocking(password.to_string()).await?;
        let user = self
            .store
            .create_user(NewUser {
                username: username.to_string(),
                email: auth.admin_email.clone(),
                password_hash,
                role: Role::Admin,
            })
            .await?;

        tracing::info!(username, "Seeded admin account");
        Ok(Some(user))
    }
}
