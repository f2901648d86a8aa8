use crate::{AppState, handlers};
use axum::{Router, extract::DefaultBodyLimit, routing::get};

/// Public Router Module
///
/// Pages that work without a session, plus the plugin API. API modules see the
/// caller's identity (if any) but access control is theirs to enforce.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(handlers::health))
        // GET /
        // News feed and API widgets.
        .route("/", get(handlers::home))
        // GET/POST /login
        .route("/login", get(handlers::login_page).post(handlers::login))
        // GET/POST /register
        .route("/register", get(handlers::register_page).post(handlers::register))
        // GET /logout
        // Idempotent; clears the cookie even without a live session.
        .route("/logout", get(handlers::logout))
        // {GET,POST,PUT,PATCH,DELETE} /api/config.<name>  and  GET /api/info.<name>
        // The whole segment is captured; handlers split off the prefix.
        .route(
            "/api/{endpoint}",
            get(handlers::api_get)
                .post(handlers::execute_api)
                .put(handlers::execute_api)
                .patch(handlers::execute_api)
                .delete(handlers::execute_api)
                .layer(DefaultBodyLimit::max(handlers::MAX_BODY_BYTES)),
        )
}
