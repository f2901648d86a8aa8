//! `googleai`: forwards prompts to the Google Gemini `generateContent` endpoint.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};

use super::{ApiCall, ApiConfig, ApiModule, HandlerError, HandlerSet, Verb, Widget};

pub const NAME: &str = "googleai";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-pro";
const USAGE: &str = r#"POST /api/config.googleai { "prompt": "Your question here" }"#;
const NO_RESPONSE: &str = "No response from Gemini.";

/// GeminiClient
///
/// Minimal client for the Gemini REST API.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

impl GeminiClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        }
    }

    /// generate
    ///
    /// Sends one prompt and returns the generated text.
    pub async fn generate(&self, api_key: &str, prompt: &str) -> Result<String, HandlerError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| HandlerError::new(format!("Gemini request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Gemini returned an error: {}", detail);
            return Err(HandlerError::new(format!("Gemini API error {status}")));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| HandlerError::new(format!("Invalid Gemini response: {e}")))?;

        Ok(extract_text(&payload))
    }
}

/// First candidate's first part, else a top-level `text`, else a fixed notice.
pub fn extract_text(payload: &Value) -> String {
    payload
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .or_else(|| payload.get("text").and_then(Value::as_str).filter(|s| !s.is_empty()))
        .unwrap_or(NO_RESPONSE)
        .to_string()
}

/// GoogleAiSettings
///
/// The module's own configuration. The API key is optional at startup; calls
/// fail with a handler error until it is set.
#[derive(Clone, Debug)]
pub struct GoogleAiSettings {
    pub api_key: Option<String>,
    pub client: GeminiClient,
}

impl GoogleAiSettings {
    /// Reads `GOOGLE_GEMINI_API_KEY`, `GEMINI_MODEL` and `GEMINI_BASE_URL`.
    pub fn from_env() -> Self {
        let api_key = env::var("GOOGLE_GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        let model = env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let base_url = env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        if api_key.is_none() {
            tracing::warn!("GOOGLE_GEMINI_API_KEY not set; googleai POST requests will fail");
        }

        Self {
            api_key,
            client: GeminiClient::new(base_url, model),
        }
    }
}

pub fn config() -> ApiConfig {
    ApiConfig {
        name: Some(NAME.to_string()),
        description: Some(
            "Generate text using Google Gemini AI (via Google Generative AI API)".to_string(),
        ),
        params: Some(vec!["prompt".to_string()]),
        usage: Some(USAGE.to_string()),
        methods: Some(Verb::ALL.to_vec()),
    }
}

async fn ask(settings: Arc<GoogleAiSettings>, call: ApiCall) -> Result<Value, HandlerError> {
    let api_key = settings
        .api_key
        .as_deref()
        .ok_or_else(|| HandlerError::new("Google Gemini API key not set."))?;
    let prompt = call
        .param_str("prompt")
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| HandlerError::new("Prompt is required."))?;

    let text = settings.client.generate(api_key, prompt).await?;
    Ok(json!({ "result": text }))
}

/// module
///
/// GET describes usage, POST asks Gemini, DELETE is refused explicitly, and the
/// generic `api` fallback answers PUT/PATCH.
pub fn module(settings: GoogleAiSettings) -> ApiModule {
    let settings = Arc::new(settings);

    let handlers = HandlerSet::new()
        .get(|_call| async { Ok(json!({ "usage": USAGE })) })
        .post(move |call| ask(settings.clone(), call))
        .delete(|_call| async { Err(HandlerError::new("DELETE not supported for this API.")) })
        .api(|_call| async { Ok(json!({ "note": "Fallback handler called" })) });

    ApiModule::new(NAME)
        .with_config(config())
        .with_handlers(handlers)
        .with_widget(Widget::render_with(|_user| Ok(WIDGET.to_string())))
}

const WIDGET: &str = r#"
<div class="widget">
  <h4>Google Gemini AI</h4>
  <form method="POST" action="/api/config.googleai" onsubmit="event.preventDefault(); googleAsk(this);">
    <input name="prompt" placeholder="Ask Google AI..." style="width:70%" required>
    <button>Ask</button>
  </form>
  <pre id="googleai-result" style="white-space:pre-wrap"></pre>
  <script>
    async function googleAsk(form) {
      const prompt = form.prompt.value;
      if (!prompt) return;
      const res = await fetch('/api/config.googleai', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ prompt })
      });
      const data = await res.json();
      document.getElementById('googleai-result').textContent =
        (data.result && data.result.result) || data.error || '';
    }
  </script>
</div>
"#;
