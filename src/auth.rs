use std::convert::Infallible;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppState,
    config::{AppConfig, Env},
    error::AppError,
    models::{LoginForm, NewUser, RegisterForm, Role, User},
    session::Session,
};

/// Name of the cookie carrying the signed session reference.
pub const SESSION_COOKIE: &str = "newsdesk.sid";

/// Claims
///
/// Payload of the session cookie token. `sub` is the server-side session id, not
/// the user id: revoking the session row revokes the cookie.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

// --- Passwords ---

/// Hashes a password with Argon2 and a fresh random salt (PHC string format).
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            tracing::error!("password hashing failed: {}", e);
            AppError::Internal
        })
}

/// Returns false for a wrong password and for an unparseable stored hash.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("stored password hash is malformed: {}", e);
            false
        }
    }
}

/// Runs `hash_password` on the blocking pool; Argon2 is CPU-bound.
pub async fn hash_password_off_thread(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| {
            tracing::error!("password hashing task failed: {}", e);
            AppError::Internal
        })?
}

/// Runs `verify_password` on the blocking pool. A failed task counts as a
/// mismatch.
pub async fn verify_password_off_thread(password: String, stored_hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .unwrap_or_else(|e| {
            tracing::error!("password verification task failed: {}", e);
            false
        })
}

// --- Session Cookie ---

/// session_cookie
///
/// Signs a token for `session` and wraps it in the session cookie. The cookie
/// lives exactly as long as the server-side record.
pub fn session_cookie(config: &AppConfig, session: &Session) -> Result<Cookie<'static>, AppError> {
    let claims = Claims {
        sub: session.id,
        exp: session.expires_at.timestamp().max(0) as usize,
        iat: chrono::Utc::now().timestamp().max(0) as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.session_secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("session token encoding failed: {}", e);
        AppError::Internal
    })?;

    let max_age = (session.expires_at - chrono::Utc::now()).num_seconds().max(0);

    Ok(Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.env == Env::Production)
        .max_age(time::Duration::seconds(max_age))
        .build())
}

/// A cookie that removes the session cookie when added to a jar via `remove`.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

/// Verifies signature and expiry of a cookie token; returns the session id.
pub fn session_id_from_token(config: &AppConfig, token: &str) -> Option<Uuid> {
    let key = DecodingKey::from_secret(config.session_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    match decode::<Claims>(token, &key, &validation) {
        Ok(data) => Some(data.claims.sub),
        Err(e) => {
            tracing::debug!("rejected session token: {}", e);
            None
        }
    }
}

// --- Per-Request Auth Context ---

/// AuthContext
///
/// The identity behind a request, resolved once by `resolve_auth` and stored in
/// the request extensions. Anonymous requests have `user == None`.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub user: Option<User>,
    pub session_id: Option<Uuid>,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(User::is_admin)
    }
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .unwrap_or_default())
    }
}

/// resolve
///
/// Cookie token -> live session -> existing user. Every miss along the way
/// yields an anonymous context; a session whose user vanished is kept but has
/// no effect.
pub async fn resolve(state: &AppState, jar: &CookieJar) -> AuthContext {
    let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_owned()) else {
        return AuthContext::default();
    };
    let Some(session_id) = session_id_from_token(&state.config, &token) else {
        return AuthContext::default();
    };
    let Some(session) = state.sessions.get(session_id).await else {
        return AuthContext::default();
    };

    AuthContext {
        user: state.repo.get_user(session.user_id).await,
        session_id: Some(session.id),
    }
}

/// resolve_auth
///
/// Outermost application middleware: attaches an `AuthContext` to every request.
pub async fn resolve_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let auth = resolve(&state, &jar).await;
    request.extensions_mut().insert(auth);
    next.run(request).await
}

/// require_login
///
/// Guard for member pages: anonymous requests are redirected to `/login`.
pub async fn require_login(auth: AuthContext, request: Request, next: Next) -> Response {
    if auth.user.is_none() {
        return Redirect::to("/login").into_response();
    }
    next.run(request).await
}

/// require_admin
///
/// Guard for admin routes: anything but an admin gets a bare 403.
pub async fn require_admin(auth: AuthContext, request: Request, next: Next) -> Response {
    if !auth.is_admin() {
        return forbidden();
    }
    next.run(request).await
}

/// Plain-text 403 used for every role mismatch on pages.
pub fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "Forbidden").into_response()
}

// --- Account Operations ---

/// register
///
/// Creates a `user`-role account and opens a session for it.
/// Fails with `AppError::Conflict` when the username is taken.
pub async fn register(state: &AppState, form: RegisterForm) -> Result<(User, Session), AppError> {
    if state.repo.find_user_by_username(&form.username).await.is_some() {
        return Err(AppError::Conflict);
    }

    let password_hash = hash_password_off_thread(form.password).await?;
    let user = state
        .repo
        .create_user(NewUser {
            username: form.username,
            password_hash,
            email: form.email,
            role: Role::User,
        })
        .await?;

    let session = state.sessions.create(user.id).await?;
    tracing::info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((user, session))
}

/// login
///
/// Fails with `AppError::Auth` for an unknown username or a wrong password.
pub async fn login(state: &AppState, form: LoginForm) -> Result<(User, Session), AppError> {
    let user = state
        .repo
        .find_user_by_username(&form.username)
        .await
        .ok_or(AppError::Auth)?;

    if !verify_password_off_thread(form.password, user.password_hash.clone()).await {
        tracing::info!(username = %form.username, "login rejected");
        return Err(AppError::Auth);
    }

    let session = state.sessions.create(user.id).await?;
    tracing::info!(user_id = %user.id, "user logged in");
    Ok((user, session))
}

/// logout
///
/// Destroys the server-side session if there is one. Never fails the request.
pub async fn logout(state: &AppState, auth: &AuthContext) {
    if let Some(session_id) = auth.session_id {
        if let Err(e) = state.sessions.destroy(session_id).await {
            tracing::error!("session destroy failed: {}", e);
        }
    }
}
