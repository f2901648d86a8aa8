use crate::{AppState, auth, handlers};
use axum::{
    Router, middleware,
    routing::{get, post},
};

/// Admin Router Module
///
/// Moderation surface. `require_admin` answers 403 before any handler runs, so
/// an anonymous or non-admin request never touches the repository.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin
        // News composer, published list, and API module status.
        .route("/admin", get(handlers::admin_page))
        // POST /news
        // Publishes an article authored by the current admin.
        .route("/news", post(handlers::create_news))
        // POST /admin/apis/reload
        // Rescans the API descriptor directory.
        .route("/admin/apis/reload", post(handlers::reload_apis))
        .route_layer(middleware::from_fn(auth::require_admin))
}
