use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::pages::page;
use crate::state::AppState;
use crate::{api, auth, pages, ws};

/// Assemble every route with its role guard
pub fn build_router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/", get(pages::root))
        .route("/login", get(pages::login_page))
        .route("/register", get(pages::register_page))
        .route("/logout", get(api::logout_redirect))
        .route("/api/login", post(api::login))
        .route("/api/register", post(api::register))
        .route("/api/logout", post(api::logout));

    let player_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/questions", get(api::questions))
        .route("/api/game/save", post(api::save_game))
        .route("/api/history", get(api::history))
        .route(
            "/api/settings",
            get(api::get_settings).post(api::update_settings),
        )
        .route("/player/dashboard", page("player_dashboard"))
        .route("/player/game", page("player_game"))
        .route("/player/history", page("player_history"))
        .route("/player/settings", page("player_settings"))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_player,
        ));

    let admin_routes = Router::new()
        .route("/api/admin/stats", get(api::admin_stats))
        .route("/api/admin/reports", get(api::admin_reports))
        .route(
            "/api/admin/questions",
            get(api::list_questions).post(api::create_question),
        )
        .route(
            "/api/admin/questions/{id}",
            put(api::update_question).delete(api::delete_question),
        )
        .route("/admin/dashboard", page("admin_dashboard"))
        .route("/admin/reports", page("admin_reports"))
        .route("/admin/questions", page("admin_questions"))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    let assets = ServeDir::new(state.config.static_dir.join("assets"));

    Router::new()
        .merge(public_routes)
        .merge(player_routes)
        .merge(admin_routes)
        .nest_service("/assets", assets)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
