//! Server-rendered HTML shells. The pages themselves are static files under
//! `<static_dir>/pages`; all dynamic data comes from the JSON API and the game socket.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, MethodRouter},
};
use std::sync::Arc;

use crate::state::AppState;

/// Read `<static_dir>/pages/<name>.html`
pub async fn serve_page(state: &AppState, name: &str) -> Response {
    let path = state
        .config
        .static_dir
        .join("pages")
        .join(format!("{}.html", name));

    match tokio::fs::read_to_string(&path).await {
        Ok(content) => Html(content).into_response(),
        Err(e) => {
            tracing::warn!(path = %path.display(), "Page not readable: {}", e);
            (StatusCode::NOT_FOUND, "Page not found").into_response()
        }
    }
}

/// GET route serving one named page
pub fn page(name: &'static str) -> MethodRouter<Arc<AppState>> {
    get(move |State(state): State<Arc<AppState>>| async move { serve_page(&state, name).await })
}

/// GET /: send users to their dashboard
pub async fn root(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Redirect {
    match state.current_user(&headers).await {
        Some(user) => Redirect::to(user.role.dashboard_path()),
        None => Redirect::to("/login"),
    }
}

async fn public_page(state: &AppState, headers: &HeaderMap, name: &str) -> Response {
    match state.current_user(headers).await {
        Some(user) => Redirect::to(user.role.dashboard_path()).into_response(),
        None => serve_page(state, name).await,
    }
}

/// GET /login
pub async fn login_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    public_page(&state, &headers, "login").await
}

/// GET /register
pub async fn register_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    public_page(&state, &headers, "register").await
}
