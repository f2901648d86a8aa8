use crate::{AppState, auth, handlers};
use axum::{Router, middleware, routing::get};

/// Authenticated Router Module
///
/// Pages for any logged-in user. `require_login` runs before every handler, so
/// handlers can rely on `AuthContext::user` being set.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /profile
        // POST replaces the profile wholesale and re-renders with a status line.
        .route(
            "/profile",
            get(handlers::profile_page).post(handlers::update_profile),
        )
        // GET /apitest
        // Interactive page listing the active API modules.
        .route("/apitest", get(handlers::apitest_page))
        .route_layer(middleware::from_fn(auth::require_login))
}
