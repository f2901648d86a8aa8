use axum::{
    Form, Json,
    body::{Body, Bytes},
    extract::{FromRequest, Path, Query, Request, State},
    http::{Method, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, map::Entry};
use utoipa::ToSchema;

use crate::{
    AppState,
    api::{ApiCall, ApiConfig, Verb},
    auth::{self, AuthContext},
    error::{AppError, ErrorBody},
    models::{LoginForm, NewsForm, ProfileForm, RegisterForm},
    views,
};

/// Upper bound for API request bodies.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

// --- Pages ---

/// home
///
/// [Public Route] News feed, newest first, plus every API module's widget.
pub async fn home(auth: AuthContext, State(state): State<AppState>) -> Html<String> {
    let news = state.repo.list_news().await;
    let widgets = state.apis.widgets(auth.user.as_ref());
    Html(views::home(auth.user.as_ref(), &news, &widgets))
}

pub async fn login_page() -> Html<String> {
    Html(views::login(None))
}

pub async fn register_page() -> Html<String> {
    Html(views::register(None))
}

/// login
///
/// [Public Route] Bad credentials re-render the form; success sets the session
/// cookie and redirects home.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    match auth::login(&state, form).await {
        Ok((_, session)) => match auth::session_cookie(&state.config, &session) {
            Ok(cookie) => (jar.add(cookie), Redirect::to("/")).into_response(),
            Err(e) => e.into_response(),
        },
        Err(AppError::Auth) => Html(views::login(Some("Invalid credentials"))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// register
///
/// [Public Route] A taken username re-renders the form; success logs the new
/// user in.
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Response {
    match auth::register(&state, form).await {
        Ok((_, session)) => match auth::session_cookie(&state.config, &session) {
            Ok(cookie) => (jar.add(cookie), Redirect::to("/")).into_response(),
            Err(e) => e.into_response(),
        },
        Err(AppError::Conflict) => Html(views::register(Some("Username taken"))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// logout
///
/// [Public Route] Always succeeds, whether or not a session existed.
pub async fn logout(
    auth: AuthContext,
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    auth::logout(&state, &auth).await;
    (jar.remove(auth::removal_cookie()), Redirect::to("/"))
}

/// profile_page
///
/// [Authenticated Route]
pub async fn profile_page(auth: AuthContext) -> Response {
    match auth.user {
        Some(user) => Html(views::profile(&user, None)).into_response(),
        None => Redirect::to("/login").into_response(),
    }
}

/// update_profile
///
/// [Authenticated Route] Replaces the whole profile with the submitted fields.
pub async fn update_profile(
    auth: AuthContext,
    State(state): State<AppState>,
    Form(form): Form<ProfileForm>,
) -> Response {
    let Some(user) = auth.user else {
        return Redirect::to("/login").into_response();
    };

    match state.repo.update_profile(user.id, form.into()).await {
        Ok(Some(updated)) => Html(views::profile(&updated, Some("Profile updated"))).into_response(),
        Ok(None) => Redirect::to("/login").into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

/// apitest_page
///
/// [Authenticated Route] Lists the active API modules with a small request form.
pub async fn apitest_page(auth: AuthContext, State(state): State<AppState>) -> Response {
    match auth.user {
        Some(user) => Html(views::apitest(&user, &state.apis.modules())).into_response(),
        None => Redirect::to("/login").into_response(),
    }
}

/// admin_page
///
/// [Admin Route]
pub async fn admin_page(auth: AuthContext, State(state): State<AppState>) -> Response {
    let Some(user) = auth.user.filter(|u| u.is_admin()) else {
        return auth::forbidden();
    };
    let news = state.repo.list_news().await;
    Html(views::admin(&user, &news, &state.apis.names())).into_response()
}

/// create_news
///
/// [Admin Route] Publishes an article authored by the current admin.
pub async fn create_news(
    auth: AuthContext,
    State(state): State<AppState>,
    Form(form): Form<NewsForm>,
) -> Response {
    let Some(user) = auth.user.filter(|u| u.is_admin()) else {
        return auth::forbidden();
    };

    match state.repo.create_news(form.title, form.content, user.id).await {
        Ok(news) => {
            tracing::info!(news_id = %news.id, author = %user.username, "news published");
            Redirect::to("/").into_response()
        }
        Err(e) => AppError::from(e).into_response(),
    }
}

/// reload_apis
///
/// [Admin Route] Rescans the API descriptor directory.
pub async fn reload_apis(State(state): State<AppState>) -> Redirect {
    let active = state.apis.reload();
    tracing::info!(active, "API modules reloaded on request");
    Redirect::to("/admin")
}

// --- JSON API ---

/// ApiResult
///
/// Success envelope of the execution endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResult {
    #[schema(value_type = Object)]
    pub result: Value,
}

/// api_get
///
/// `GET /api/{endpoint}` serves both `info.<name>` and `config.<name>`.
pub async fn api_get(
    auth: AuthContext,
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    if endpoint.starts_with("info.") {
        return describe_api(State(state), Path(endpoint))
            .await
            .map(IntoResponse::into_response);
    }
    execute_api(auth, State(state), Path(endpoint), request)
        .await
        .map(IntoResponse::into_response)
}

/// describe_api
///
/// [Public Route] The module's declared config, or `{}` when it declares none.
#[utoipa::path(
    get,
    path = "/api/info.{name}",
    params(("name" = String, Path, description = "API module name")),
    responses(
        (status = 200, description = "Declared configuration", body = ApiConfig),
        (status = 404, description = "Unknown API", body = ErrorBody)
    )
)]
pub async fn describe_api(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
) -> Result<Json<ApiConfig>, AppError> {
    let name = endpoint.strip_prefix("info.").ok_or(AppError::NotFound)?;
    let module = state.apis.get(name).ok_or(AppError::NotFound)?;
    Ok(Json(module.config.clone().unwrap_or_default()))
}

/// execute_api
///
/// [Public Route] Runs the module handler for the request's verb.
///
/// Order of checks: unknown module (404), verb allow-list (405), no resolvable
/// handler (400). Only then is the parameter object built and the handler run;
/// a handler failure becomes a 500 carrying just its message.
#[utoipa::path(
    method(get, post, put, patch, delete),
    path = "/api/config.{name}",
    params(("name" = String, Path, description = "API module name")),
    responses(
        (status = 200, description = "Handler result", body = ApiResult),
        (status = 400, description = "No handler for this verb", body = ErrorBody),
        (status = 404, description = "Unknown API", body = ErrorBody),
        (status = 405, description = "Verb not allowed", body = ErrorBody),
        (status = 413, description = "Body over the size limit", body = ErrorBody),
        (status = 500, description = "Handler failed", body = ErrorBody)
    )
)]
pub async fn execute_api(
    auth: AuthContext,
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
    request: Request,
) -> Result<Json<ApiResult>, AppError> {
    let name = endpoint.strip_prefix("config.").ok_or(AppError::NotFound)?;
    let verb = Verb::from_method(request.method())
        .ok_or_else(|| AppError::BadRequest("Unsupported method.".to_string()))?;

    let module = state.apis.get(name).ok_or(AppError::NotFound)?;
    let handler = module.handlers.resolve(verb);

    if !module.allows(verb) {
        return Err(AppError::MethodNotAllowed(verb));
    }
    let handler =
        handler.ok_or_else(|| AppError::BadRequest(format!("No {verb} handler for this API.")))?;

    let params = read_params(verb, request).await?;
    tracing::debug!(api = %name, verb = %verb, "dispatching API call");

    let call = ApiCall {
        params,
        verb,
        user: auth.user,
    };
    match (*handler)(call).await {
        Ok(result) => Ok(Json(ApiResult { result })),
        Err(e) => {
            tracing::warn!(api = %name, verb = %verb, "API handler failed: {}", e);
            Err(AppError::Handler(e.0))
        }
    }
}

/// read_params
///
/// Query string for GET/DELETE. For the other verbs: JSON or url-encoded body;
/// an empty or untyped body yields `{}`. Repeated query or form keys collect
/// into an array. Bodies over `MAX_BODY_BYTES` are rejected with 413.
async fn read_params(verb: Verb, request: Request) -> Result<Value, AppError> {
    if verb.reads_query() {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(request.uri())
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        return Ok(group_pairs(pairs));
    }

    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    let bytes = Bytes::from_request(request, &()).await.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge
        } else {
            AppError::BadRequest(format!("Unreadable body: {}", e.body_text()))
        }
    })?;

    if bytes.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    if content_type.starts_with("application/json") {
        serde_json::from_slice(&bytes).map_err(|e| AppError::BadRequest(format!("Invalid JSON: {e}")))
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let request = Request::builder()
            .method(Method::POST)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(bytes))
            .map_err(|_| AppError::Internal)?;
        let Form(pairs) = Form::<Vec<(String, String)>>::from_request(request, &())
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(group_pairs(pairs))
    } else {
        Ok(Value::Object(Map::new()))
    }
}

/// One string per key; a key seen more than once becomes an array in order.
fn group_pairs(pairs: Vec<(String, String)>) -> Value {
    let mut map = Map::new();
    for (key, value) in pairs {
        match map.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(Value::String(value));
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Value::Array(values) => values.push(Value::String(value)),
                existing => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, Value::String(value)]);
                }
            },
        }
    }
    Value::Object(map)
}

/// health
///
/// [Public Route] Liveness probe.
pub async fn health() -> &'static str {
    "ok"
}
