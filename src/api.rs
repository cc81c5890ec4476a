//! JSON HTTP endpoints.
//!
//! Account endpoints are public; everything under `/api/game`, `/api/history`,
//! `/api/settings` and `/api/questions` is player-only, and `/api/admin/*` is
//! admin-only. Role checks happen in the route layers, so handlers just read the
//! [`CurrentUser`] extension.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{clear_session_cookie, session_cookie, CurrentUser};
use crate::game::parse_clock;
use crate::questions::{QuestionBankError, QuestionInput};
use crate::state::{AccountError, AppState, RegisterInput, SettingsInput};
use crate::store::StoreError;
use crate::types::*;

/// Error returned by API handlers, rendered as `{ "error": msg }`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    TooManyRequests(String),

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(ref detail) = self {
            tracing::error!("Request failed: {}", detail);
        }
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UserNotFound(_) => ApiError::NotFound(err.to_string()),
            StoreError::Duplicate => ApiError::Conflict(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::MissingField(_) => ApiError::BadRequest(err.to_string()),
            AccountError::IdentityTaken => ApiError::Conflict(err.to_string()),
            AccountError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            AccountError::RateLimited => ApiError::TooManyRequests(err.to_string()),
            AccountError::Hashing(_) => ApiError::Internal(err.to_string()),
            AccountError::Store(e) => e.into(),
        }
    }
}

impl From<QuestionBankError> for ApiError {
    fn from(err: QuestionBankError) -> Self {
        match err {
            QuestionBankError::NotFound(_) => ApiError::NotFound(err.to_string()),
            QuestionBankError::Invalid(_) => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// Accounts

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub username: String,
    pub role: Role,
    /// Dashboard to navigate to after login
    pub redirect: String,
}

/// POST /api/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Response> {
    let (user, session) = state.login(&req.username, &req.password).await?;
    let cookie = session_cookie(&session.token, state.config.session_ttl);

    let body = LoginResponse {
        username: user.username,
        role: user.role,
        redirect: user.role.dashboard_path().to_string(),
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<User> for AccountResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
        }
    }
}

/// POST /api/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AccountResponse>)> {
    let user = state
        .register(RegisterInput {
            username: req.username,
            email: req.email,
            password: req.password,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

async fn end_session(state: &AppState, headers: &HeaderMap) {
    if let Some(user) = state.current_user(headers).await {
        state.end_login_session(&user.token).await;
        tracing::info!(user = %user.username, "User logged out");
    }
}

/// POST /api/logout
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    end_session(&state, &headers).await;
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(serde_json::json!({ "ok": true })),
    )
        .into_response()
}

/// GET /logout, for plain links
pub async fn logout_redirect(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    end_session(&state, &headers).await;
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Redirect::to("/login"),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// GET /api/settings
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<AccountResponse>> {
    let account = state
        .store
        .find_user(user.user_id)
        .await?
        .ok_or(StoreError::UserNotFound(user.user_id))?;
    Ok(Json(account.into()))
}

/// POST /api/settings
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<SettingsRequest>,
) -> ApiResult<Json<AccountResponse>> {
    let updated = state
        .update_settings(
            user.user_id,
            SettingsInput {
                username: req.username,
                email: req.email,
                password: req.password,
            },
        )
        .await?;
    Ok(Json(updated.into()))
}

// Player game data

#[derive(Debug, Deserialize)]
pub struct QuestionsQuery {
    pub count: Option<usize>,
}

/// Question as sent to players before a game (answers included for client play)
#[derive(Debug, Serialize)]
pub struct QuestionsResponse {
    pub questions: Vec<Question>,
}

/// GET /api/questions?count=N
pub async fn questions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QuestionsQuery>,
) -> Json<QuestionsResponse> {
    let count = query
        .count
        .unwrap_or(state.config.game.questions_per_game);
    Json(QuestionsResponse {
        questions: state.questions.random(count).await,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveGameRequest {
    pub score: u32,
    pub time_used: String,
}

/// POST /api/game/save
pub async fn save_game(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<SaveGameRequest>,
) -> ApiResult<(StatusCode, Json<GameRecord>)> {
    let secs = parse_clock(&req.time_used)
        .ok_or_else(|| ApiError::BadRequest("timeUsed must look like m:ss".to_string()))?;
    if secs > state.config.game.time_budget_secs {
        return Err(ApiError::BadRequest(
            "timeUsed exceeds the game time limit".to_string(),
        ));
    }
    if req.score as usize > state.config.game.questions_per_game {
        return Err(ApiError::BadRequest(
            "score exceeds the number of questions".to_string(),
        ));
    }

    let record = state
        .save_game_result(user.user_id, req.score, req.time_used.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/history
pub async fn history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<GameRecord>>> {
    Ok(Json(state.player_history(user.user_id).await?))
}

// Admin

/// GET /api/admin/stats
pub async fn admin_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<DashboardStats>> {
    Ok(Json(state.dashboard_stats().await?))
}

/// GET /api/admin/reports
pub async fn admin_reports(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<ReportRow>>> {
    Ok(Json(state.reports().await?))
}

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub emojis: String,
    pub answer: String,
    #[serde(default)]
    pub hint: Option<String>,
}

impl From<QuestionRequest> for QuestionInput {
    fn from(req: QuestionRequest) -> Self {
        QuestionInput {
            emojis: req.emojis,
            answer: req.answer,
            hint: req.hint,
        }
    }
}

/// GET /api/admin/questions
pub async fn list_questions(State(state): State<Arc<AppState>>) -> Json<Vec<Question>> {
    Json(state.questions.all().await)
}

/// POST /api/admin/questions
pub async fn create_question(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QuestionRequest>,
) -> ApiResult<(StatusCode, Json<Question>)> {
    let question = state.questions.add(req.into()).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// PUT /api/admin/questions/{id}
pub async fn update_question(
    State(state): State<Arc<AppState>>,
    Path(id): Path<QuestionId>,
    Json(req): Json<QuestionRequest>,
) -> ApiResult<Json<Question>> {
    Ok(Json(state.questions.update(id, req.into()).await?))
}

/// DELETE /api/admin/questions/{id}
pub async fn delete_question(
    State(state): State<Arc<AppState>>,
    Path(id): Path<QuestionId>,
) -> ApiResult<StatusCode> {
    state.questions.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
