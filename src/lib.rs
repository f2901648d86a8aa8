use axum::{
    Router,
    extract::FromRef,
    handler::HandlerWithoutStateExt,
    http::{HeaderName, StatusCode},
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod session;
pub mod views;

// Route groups (public, authenticated, admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use api::{ApiRegistry, ApiRegistryState};
pub use config::AppConfig;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use session::{MemorySessionStore, PostgresSessionStore, SessionState};

/// ApiDoc
///
/// OpenAPI document for the JSON API, served at `/api-docs/openapi.json`. The
/// HTML pages are not part of it.
#[derive(OpenApi)]
#[openapi(
    paths(handlers::describe_api, handlers::execute_api),
    components(schemas(api::ApiConfig, api::Verb, handlers::ApiResult, error::ErrorBody)),
    tags((name = "newsdesk", description = "newsdesk plugin API"))
)]
struct ApiDoc;

/// AppState
///
/// Shared, cheaply clonable handles to every service a handler may need.
#[derive(Clone)]
pub struct AppState {
    /// Users and news.
    pub repo: RepositoryState,
    /// Server-side sessions.
    pub sessions: SessionState,
    /// Active API modules.
    pub apis: ApiRegistryState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for ApiRegistryState {
    fn from_ref(app_state: &AppState) -> ApiRegistryState {
        app_state.apis.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}

/// create_router
///
/// Assembles the route groups, the session-resolving middleware, static files,
/// and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // Unknown paths fall through to static files, then to a plain 404.
    let static_files =
        ServeDir::new(&state.config.public_dir).not_found_service(not_found.into_service());

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .merge(admin::admin_routes())
        .fallback_service(static_files)
        // Resolves the session once per request, before any guard or handler.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::resolve_auth,
        ))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the `http_request` span with method, URI and the request id so every
/// log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
