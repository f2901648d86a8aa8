//! Plugin-style JSON API.
//!
//! An [`ApiModule`] bundles an optional [`ApiConfig`], a [`HandlerSet`] and an
//! optional home-page [`Widget`]. Modules live in an [`ApiRegistry`] and are
//! served under `/api/config.<name>`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::models::User;

pub mod googleai;
pub mod registry;

pub use registry::{ApiRegistry, ApiRegistryState};

/// Verb
///
/// The HTTP methods the dispatcher serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    pub const ALL: [Verb; 5] = [Verb::Get, Verb::Post, Verb::Put, Verb::Patch, Verb::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Post => "post",
            Verb::Put => "put",
            Verb::Patch => "patch",
            Verb::Delete => "delete",
        }
    }

    pub fn from_method(method: &Method) -> Option<Verb> {
        match *method {
            Method::GET | Method::HEAD => Some(Verb::Get),
            Method::POST => Some(Verb::Post),
            Method::PUT => Some(Verb::Put),
            Method::PATCH => Some(Verb::Patch),
            Method::DELETE => Some(Verb::Delete),
            _ => None,
        }
    }

    /// GET and DELETE take their parameters from the query string.
    pub fn reads_query(&self) -> bool {
        matches!(self, Verb::Get | Verb::Delete)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ApiConfig
///
/// Self-description of a module, served by `GET /api/info.<name>`. Every field
/// is optional; an empty config serializes to `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ApiConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
    /// Allow-list of verbs. `None` allows every verb.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<Vec<Verb>>,
}

impl ApiConfig {
    pub fn allows(&self, verb: Verb) -> bool {
        self.methods.as_ref().is_none_or(|m| m.contains(&verb))
    }
}

/// ApiCall
///
/// Everything a handler receives: the parameter object and the request context.
#[derive(Debug, Clone)]
pub struct ApiCall {
    pub params: Value,
    pub verb: Verb,
    pub user: Option<User>,
}

impl ApiCall {
    /// A string parameter, `None` when absent or not a string.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

/// HandlerError
///
/// A failure raised by a module handler. Only the message reaches the client.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for HandlerError {}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, HandlerError>> + Send>>;

/// A type-erased async handler.
pub type Handler = Arc<dyn Fn(ApiCall) -> HandlerFuture + Send + Sync>;

fn erase<F, Fut>(f: F) -> Handler
where
    F: Fn(ApiCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    Arc::new(move |call| -> HandlerFuture { Box::pin(f(call)) })
}

/// HandlerSet
///
/// Optional handler per verb plus the generic `api` and `execute` fallbacks.
/// Built with the chaining setters:
///
/// ```ignore
/// HandlerSet::new().get(|_| async { Ok(json!({"x": 1})) })
/// ```
#[derive(Clone, Default)]
pub struct HandlerSet {
    get: Option<Handler>,
    post: Option<Handler>,
    put: Option<Handler>,
    patch: Option<Handler>,
    delete: Option<Handler>,
    api: Option<Handler>,
    execute: Option<Handler>,
}

macro_rules! handler_setter {
    ($($field:ident),*) => {
        $(
            pub fn $field<F, Fut>(mut self, f: F) -> Self
            where
                F: Fn(ApiCall) -> Fut + Send + Sync + 'static,
                Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
            {
                self.$field = Some(erase(f));
                self
            }
        )*
    };
}

impl HandlerSet {
    pub fn new() -> Self {
        Self::default()
    }

    handler_setter!(get, post, put, patch, delete, api, execute);

    fn for_verb(&self, verb: Verb) -> Option<&Handler> {
        match verb {
            Verb::Get => self.get.as_ref(),
            Verb::Post => self.post.as_ref(),
            Verb::Put => self.put.as_ref(),
            Verb::Patch => self.patch.as_ref(),
            Verb::Delete => self.delete.as_ref(),
        }
    }

    /// Verb-specific handler, else `api`, else `execute`.
    pub fn resolve(&self, verb: Verb) -> Option<Handler> {
        self.for_verb(verb)
            .or(self.api.as_ref())
            .or(self.execute.as_ref())
            .cloned()
    }
}

impl fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSet")
            .field("get", &self.get.is_some())
            .field("post", &self.post.is_some())
            .field("put", &self.put.is_some())
            .field("patch", &self.patch.is_some())
            .field("delete", &self.delete.is_some())
            .field("api", &self.api.is_some())
            .field("execute", &self.execute.is_some())
            .finish()
    }
}

pub type WidgetRender = Arc<dyn Fn(Option<&User>) -> Result<String, HandlerError> + Send + Sync>;

/// Widget
///
/// Home-page markup contributed by a module: fixed, or rendered per request.
#[derive(Clone)]
pub enum Widget {
    Static(String),
    Render(WidgetRender),
}

impl Widget {
    pub fn render_with<F>(f: F) -> Self
    where
        F: Fn(Option<&User>) -> Result<String, HandlerError> + Send + Sync + 'static,
    {
        Widget::Render(Arc::new(f))
    }

    pub fn render(&self, user: Option<&User>) -> Result<String, HandlerError> {
        match self {
            Widget::Static(markup) => Ok(markup.clone()),
            Widget::Render(f) => f.as_ref()(user),
        }
    }
}

impl fmt::Debug for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Widget::Static(markup) => f.debug_tuple("Static").field(&markup.len()).finish(),
            Widget::Render(_) => f.write_str("Render(..)"),
        }
    }
}

/// ApiModule
///
/// A named unit served by the dispatcher.
#[derive(Debug, Clone)]
pub struct ApiModule {
    pub name: String,
    pub config: Option<ApiConfig>,
    pub handlers: HandlerSet,
    pub widget: Option<Widget>,
}

impl ApiModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: None,
            handlers: HandlerSet::new(),
            widget: None,
        }
    }

    pub fn with_config(mut self, config: ApiConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_handlers(mut self, handlers: HandlerSet) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn with_widget(mut self, widget: Widget) -> Self {
        self.widget = Some(widget);
        self
    }

    /// Checks the declared allow-list; modules without one accept every verb.
    pub fn allows(&self, verb: Verb) -> bool {
        self.config.as_ref().is_none_or(|c| c.allows(verb))
    }
}

/// Modules compiled into this binary. The descriptor directory decides which
/// of them are active.
pub fn builtin_modules() -> Vec<ApiModule> {
    vec![googleai::module(googleai::GoogleAiSettings::from_env())]
}
