//! Password hashing, login session cookies and role-gated routes

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, Response, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect},
    Json,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use crate::state::AppState;
use crate::types::{Role, SessionToken, UserId};

/// Name of the login session cookie
pub const SESSION_COOKIE: &str = "sid";

const HASH_SCHEME: &str = "sha256";
const HASH_ITERATIONS: u32 = 10_000;
const SALT_LEN: usize = 16;

/// Bootstrap admin account configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Admin username (None = no admin seeded)
    pub admin_username: Option<String>,
    /// Admin password
    pub admin_password: Option<String>,
    pub admin_email: String,
}

impl AuthConfig {
    /// Load admin seed from environment variables
    /// ADMIN_USERNAME and ADMIN_PASSWORD must both be set to seed an admin
    pub fn from_env() -> Self {
        let username = std::env::var("ADMIN_USERNAME")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let password = std::env::var("ADMIN_PASSWORD")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let email = std::env::var("ADMIN_EMAIL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "admin@localhost".to_string());

        if username.is_some() && password.is_some() {
            tracing::info!("Admin account seeding enabled");
            Self {
                admin_username: username,
                admin_password: password,
                admin_email: email,
            }
        } else {
            if username.is_some() || password.is_some() {
                tracing::warn!(
                    "ADMIN_USERNAME and ADMIN_PASSWORD must both be set to seed an admin account"
                );
            }
            Self {
                admin_username: None,
                admin_password: None,
                admin_email: email,
            }
        }
    }

    /// Credentials of the admin account to seed, if configured
    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        match (&self.admin_username, &self.admin_password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }
}

fn iterate_hash(salt: &[u8], password: &str, iterations: u32) -> [u8; 32] {
    let mut digest: [u8; 32] = Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize()
        .into();
    for _ in 1..iterations {
        digest = Sha256::new()
            .chain_update(salt)
            .chain_update(digest)
            .finalize()
            .into();
    }
    digest
}

/// Hash a password as `sha256$<iterations>$<salt hex>$<digest hex>`
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill(&mut salt[..]);
    let digest = iterate_hash(&salt, password, HASH_ITERATIONS);
    format!(
        "{}${}${}${}",
        HASH_SCHEME,
        HASH_ITERATIONS,
        hex::encode(salt),
        hex::encode(digest)
    )
}

/// Check a password against a stored hash. Malformed hashes never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != HASH_SCHEME {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    if iterations == 0 {
        return false;
    }
    let (Ok(salt), Ok(expected)) = (hex::decode(salt), hex::decode(expected)) else {
        return false;
    };

    let digest = iterate_hash(&salt, password, iterations);
    constant_time_eq(&digest, &expected)
}

/// [`hash_password`] on the blocking pool
pub async fn hash_password_blocking(password: String) -> Result<String, tokio::task::JoinError> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await
}

/// [`verify_password`] on the blocking pool. A failed task counts as a mismatch.
pub async fn verify_password_blocking(password: String, stored: String) -> bool {
    match tokio::task::spawn_blocking(move || verify_password(&password, &stored)).await {
        Ok(matches) => matches,
        Err(e) => {
            tracing::error!("Password verification task failed: {}", e);
            false
        }
    }
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// `Set-Cookie` value for a fresh login session
pub fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl.as_secs()
    )
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie() -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        SESSION_COOKIE
    )
}

/// Find a cookie value in the request headers
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Authenticated user attached to requests by the auth middleware
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub token: SessionToken,
}

impl AppState {
    /// Resolve the login session referenced by the request cookie
    pub async fn current_user(&self, headers: &HeaderMap) -> Option<CurrentUser> {
        let token = cookie_value(headers, SESSION_COOKIE)?;
        let session = self.get_login_session(&token).await?;
        Some(CurrentUser {
            user_id: session.user_id,
            username: session.username,
            role: session.role,
            token,
        })
    }
}

fn wants_json(request: &Request<Body>) -> bool {
    let path = request.uri().path();
    path.starts_with("/api/") || path == "/ws"
}

fn unauthenticated(request: &Request<Body>) -> Response<Body> {
    if wants_json(request) {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Unauthorized" })),
        )
            .into_response()
    } else {
        Redirect::to("/login").into_response()
    }
}

fn forbidden(request: &Request<Body>) -> Response<Body> {
    let msg = "Your role is not allowed to access this page";
    if wants_json(request) {
        (StatusCode::FORBIDDEN, Json(serde_json::json!({ "error": msg }))).into_response()
    } else {
        (StatusCode::FORBIDDEN, msg).into_response()
    }
}

async fn authorize(
    state: &AppState,
    role: Role,
    mut request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let Some(user) = state.current_user(request.headers()).await else {
        return unauthenticated(&request);
    };

    if user.role != role {
        tracing::warn!(
            user = %user.username,
            required = role.as_str(),
            path = %request.uri().path(),
            "Role not permitted"
        );
        return forbidden(&request);
    }

    request.extensions_mut().insert(user);
    next.run(request).await
}

/// Middleware for routes only players may use
pub async fn require_player(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    authorize(&state, Role::Player, request, next).await
}

/// Middleware for routes only admins may use
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    authorize(&state, Role::Admin, request, next).await
}
