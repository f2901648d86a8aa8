#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use newsdesk::{
    AppConfig, AppState, MemoryRepository, MemorySessionStore, create_router,
    api::{ApiModule, ApiRegistry},
    models::Role,
    repository::Repository,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// TestApp
///
/// The full router over in-memory storage. Keeps typed handles to the stores so
/// tests can inspect what was (or was not) written.
pub struct TestApp {
    pub router: Router,
    pub repo: Arc<MemoryRepository>,
    pub sessions: Arc<MemorySessionStore>,
    pub apis: Arc<ApiRegistry>,
    pub config: AppConfig,
}

pub fn spawn_app(modules: Vec<ApiModule>) -> TestApp {
    let repo = Arc::new(MemoryRepository::new());
    let sessions = Arc::new(MemorySessionStore::new());
    let apis = Arc::new(ApiRegistry::from_modules(modules));
    let config = AppConfig::default();

    let router = create_router(AppState {
        repo: repo.clone(),
        sessions: sessions.clone(),
        apis: apis.clone(),
        config: config.clone(),
    });

    TestApp {
        router,
        repo,
        sessions,
        apis,
        config,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, c);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, uri: &str, form: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, c);
        }
        self.send(builder.body(Body::from(form.to_string())).unwrap())
            .await
    }

    pub async fn send_json(&self, method: &str, uri: &str, json: &Value) -> Response<Body> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Registers a user and returns the `Cookie` header value of its session.
    pub async fn register(&self, username: &str, password: &str) -> String {
        let form = format!("username={username}&password={password}&email={username}%40example.com");
        let response = self.post_form("/register", &form, None).await;
        assert_eq!(response.status(), 303, "registration of {username} failed");
        session_cookie(&response).expect("registration sets a session cookie")
    }

    /// Registers a user, promotes it, and returns its session cookie.
    pub async fn register_admin(&self, username: &str, password: &str) -> String {
        let cookie = self.register(username, password).await;
        assert!(self.repo.set_role(username, Role::Admin).await.unwrap());
        cookie
    }
}

/// The `name=value` pair of the session cookie set by `response`, if any.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("newsdesk.sid=") && !v.starts_with("newsdesk.sid=;"))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub fn location(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub async fn body_json(response: Response<Body>) -> Value {
    let text = body_string(response).await;
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("invalid JSON body {text:?}: {e}"))
}
