mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{body_json, spawn_app};
use newsdesk::api::{ApiConfig, ApiModule, HandlerError, HandlerSet, Verb};
use serde_json::{Value, json};

fn echo() -> ApiModule {
    ApiModule::new("echo").with_handlers(
        HandlerSet::new()
            .get(|call| async move { Ok(call.params) })
            .post(|call| async move { Ok(json!({ "verb": call.verb, "params": call.params })) })
            .put(|call| async move { Ok(call.params) })
            .delete(|call| async move { Ok(call.params) }),
    )
}

fn get_only() -> ApiModule {
    ApiModule::new("readonly")
        .with_config(ApiConfig {
            name: Some("readonly".to_string()),
            methods: Some(vec![Verb::Get]),
            ..Default::default()
        })
        .with_handlers(
            HandlerSet::new()
                .get(|_| async { Ok(json!("ok")) })
                .post(|_| async { Ok(json!("never reached")) }),
        )
}

fn fallbacks() -> ApiModule {
    ApiModule::new("fallback").with_handlers(
        HandlerSet::new()
            .get(|_| async { Ok(json!("get")) })
            .api(|call| async move { Ok(json!({ "via": "api", "verb": call.verb })) }),
    )
}

fn execute_only() -> ApiModule {
    ApiModule::new("exec")
        .with_handlers(HandlerSet::new().execute(|_| async { Ok(json!("execute")) }))
}

fn failing() -> ApiModule {
    ApiModule::new("broken")
        .with_handlers(HandlerSet::new().get(|_| async { Err(HandlerError::new("boom")) }))
}

fn empty() -> ApiModule {
    ApiModule::new("empty")
}

fn all_modules() -> Vec<ApiModule> {
    vec![echo(), get_only(), fallbacks(), execute_only(), failing(), empty()]
}

async fn call(app: &common::TestApp, method: &str, uri: &str) -> axum::response::Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.send(request).await
}

// --- Dispatch ---

#[tokio::test]
async fn test_get_returns_handler_result_with_query_params() {
    let app = spawn_app(all_modules());
    let response = call(&app, "GET", "/api/config.echo?x=1&name=ada").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "result": { "x": "1", "name": "ada" } })
    );
}

#[tokio::test]
async fn test_post_json_body_is_passed_through() {
    let app = spawn_app(all_modules());
    let response = app
        .send_json("POST", "/api/config.echo", &json!({ "x": 1, "nested": { "y": [true] } }))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "result": { "verb": "post", "params": { "x": 1, "nested": { "y": [true] } } } })
    );
}

#[tokio::test]
async fn test_post_form_body_is_passed_through() {
    let app = spawn_app(all_modules());
    let response = app
        .post_form("/api/config.echo", "prompt=hello+world&n=2", None)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["result"]["params"], json!({ "prompt": "hello world", "n": "2" }));
}

#[tokio::test]
async fn test_post_without_body_gets_empty_params() {
    let app = spawn_app(all_modules());
    let response = call(&app, "POST", "/api/config.echo").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["result"]["params"], json!({}));
}

#[tokio::test]
async fn test_delete_reads_query_string() {
    let app = spawn_app(all_modules());
    let response = call(&app, "DELETE", "/api/config.echo?id=7").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "result": { "id": "7" } }));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = spawn_app(all_modules());
    let request = Request::builder()
        .method("POST")
        .uri("/api/config.echo")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
}

// --- Errors ---

#[tokio::test]
async fn test_unknown_api_is_404_for_every_verb() {
    let app = spawn_app(all_modules());
    for method in ["GET", "POST", "PUT", "PATCH", "DELETE"] {
        let response = call(&app, method, "/api/config.zzz").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method}");
        assert_eq!(body_json(response).await, json!({ "error": "API not found" }));
    }
}

#[tokio::test]
async fn test_endpoint_without_prefix_is_404() {
    let app = spawn_app(all_modules());
    let response = call(&app, "POST", "/api/echo").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_verb_outside_allow_list_is_405() {
    let app = spawn_app(all_modules());

    let allowed = call(&app, "GET", "/api/config.readonly").await;
    assert_eq!(allowed.status(), StatusCode::OK);

    let response = app
        .send_json("POST", "/api/config.readonly", &json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Method POST not allowed for this API." })
    );
}

#[tokio::test]
async fn test_allow_list_is_checked_before_body() {
    let app = spawn_app(all_modules());
    let request = Request::builder()
        .method("PUT")
        .uri("/api/config.readonly")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_missing_handler_is_400() {
    let app = spawn_app(all_modules());
    let response = call(&app, "PATCH", "/api/config.echo").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "No patch handler for this API." })
    );

    let response = call(&app, "GET", "/api/config.empty").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_handler_error_is_500_with_message() {
    let app = spawn_app(all_modules());
    let response = call(&app, "GET", "/api/config.broken").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await, json!({ "error": "boom" }));
}

// --- Fallback chain ---

#[tokio::test]
async fn test_api_handler_covers_verbs_without_their_own() {
    let app = spawn_app(all_modules());

    let get = call(&app, "GET", "/api/config.fallback").await;
    assert_eq!(body_json(get).await, json!({ "result": "get" }));

    for (method, verb) in [("POST", "post"), ("PUT", "put"), ("DELETE", "delete")] {
        let response = call(&app, method, "/api/config.fallback").await;
        assert_eq!(response.status(), StatusCode::OK, "{method}");
        assert_eq!(
            body_json(response).await,
            json!({ "result": { "via": "api", "verb": verb } })
        );
    }
}

#[tokio::test]
async fn test_execute_is_the_last_resort() {
    let app = spawn_app(all_modules());
    for method in ["GET", "POST", "PATCH"] {
        let response = call(&app, method, "/api/config.exec").await;
        assert_eq!(body_json(response).await, json!({ "result": "execute" }));
    }
}

#[test]
fn test_handler_set_resolution_order() {
    let only_execute = HandlerSet::new().execute(|_| async { Ok(Value::Null) });
    assert!(only_execute.resolve(Verb::Put).is_some());

    let nothing = HandlerSet::new();
    for verb in Verb::ALL {
        assert!(nothing.resolve(verb).is_none());
    }
}

// --- Info endpoint ---

#[tokio::test]
async fn test_info_returns_declared_config() {
    let app = spawn_app(all_modules());
    let response = call(&app, "GET", "/api/info.readonly").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "name": "readonly", "methods": ["get"] })
    );
}

#[tokio::test]
async fn test_info_without_config_is_empty_object() {
    let app = spawn_app(all_modules());
    let response = call(&app, "GET", "/api/info.echo").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({}));
}

#[tokio::test]
async fn test_info_unknown_api_is_404() {
    let app = spawn_app(all_modules());
    let response = call(&app, "GET", "/api/info.zzz").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// --- Context ---

#[tokio::test]
async fn test_handler_sees_signed_in_user() {
    let whoami = ApiModule::new("whoami").with_handlers(HandlerSet::new().get(|call| async move {
        Ok(json!(call.user.map(|u| u.username)))
    }));
    let app = spawn_app(vec![whoami]);

    let anonymous = call(&app, "GET", "/api/config.whoami").await;
    assert_eq!(body_json(anonymous).await, json!({ "result": null }));

    let cookie = app.register("zoe", "pw").await;
    let signed_in = app.get("/api/config.whoami", Some(&cookie)).await;
    assert_eq!(body_json(signed_in).await, json!({ "result": "zoe" }));
}

#[test]
fn test_config_allows() {
    let open = ApiConfig::default();
    assert!(Verb::ALL.iter().all(|v| open.allows(*v)));

    let restricted = ApiConfig {
        methods: Some(vec![Verb::Post, Verb::Delete]),
        ..Default::default()
    };
    assert!(restricted.allows(Verb::Post));
    assert!(!restricted.allows(Verb::Get));
}

#[tokio::test]
async fn test_fixed_result_is_wrapped() {
    let fixed = ApiModule::new("echo")
        .with_handlers(HandlerSet::new().get(|_| async { Ok(json!({ "x": 1 })) }));
    let app = spawn_app(vec![fixed]);

    let response = call(&app, "GET", "/api/config.echo").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "result": { "x": 1 } }));
}

#[tokio::test]
async fn test_repeated_query_keys_become_array() {
    let app = spawn_app(all_modules());
    let response = call(&app, "GET", "/api/config.echo?tag=a&tag=b&tag=c&one=1").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "result": { "tag": ["a", "b", "c"], "one": "1" } })
    );
}

#[tokio::test]
async fn test_repeated_form_keys_become_array() {
    let app = spawn_app(all_modules());
    let response = app
        .post_form("/api/config.echo", "tag=a&tag=b", None)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["result"]["params"],
        json!({ "tag": ["a", "b"] })
    );
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let app = spawn_app(all_modules());
    let big = format!(r#"{{"blob":"{}"}}"#, "x".repeat(2 * 1024 * 1024));
    let request = Request::builder()
        .method("POST")
        .uri("/api/config.echo")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(big))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Request body too large." })
    );
}
