mod common;

use axum::http::{StatusCode, header};
use common::{body_string, location, spawn_app};
use newsdesk::{
    api::{ApiModule, HandlerError, Widget},
    repository::Repository,
};

// --- Home & news ---

#[tokio::test]
async fn test_home_without_news() {
    let app = spawn_app(vec![]);
    let response = app.get("/", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("No news yet."));
    assert!(body.contains(r#"href="/login""#));
}

#[tokio::test]
async fn test_admin_posts_news_shown_newest_first() {
    let app = spawn_app(vec![]);
    let admin = app.register_admin("root", "pw").await;

    for title in ["First", "Second", "Third"] {
        let form = format!("title={title}&content=Body+of+{title}");
        let response = app.post_form("/news", &form, Some(&admin)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response).as_deref(), Some("/"));
    }
    assert_eq!(app.repo.news_count(), 3);

    let body = body_string(app.get("/", None).await).await;
    let third = body.find("<h3>Third</h3>").expect("third listed");
    let second = body.find("<h3>Second</h3>").expect("second listed");
    let first = body.find("<h3>First</h3>").expect("first listed");
    assert!(third < second && second < first, "newest first");
    assert!(body.contains("by root"));
}

#[tokio::test]
async fn test_news_order_survives_interleaved_inserts() {
    let app = spawn_app(vec![]);
    app.register_admin("ed", "pw").await;
    let author = app.repo.find_user_by_username("ed").await.unwrap();

    for i in 0..5 {
        app.repo
            .create_news(format!("n{i}"), "x".to_string(), author.id)
            .await
            .unwrap();
        let listed = app.repo.list_news().await;
        assert_eq!(listed.len(), i + 1);
        assert_eq!(listed[0].title, format!("n{i}"));
        assert!(
            listed
                .windows(2)
                .all(|w| w[0].created_at >= w[1].created_at)
        );
    }
}

#[tokio::test]
async fn test_news_markup_is_escaped() {
    let app = spawn_app(vec![]);
    let admin = app.register_admin("root", "pw").await;
    app.post_form(
        "/news",
        "title=%3Cscript%3Ealert(1)%3C%2Fscript%3E&content=ok",
        Some(&admin),
    )
    .await;

    let body = body_string(app.get("/", None).await).await;
    assert!(body.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    assert!(!body.contains("<script>alert(1)"));
}

// --- Access control ---

#[tokio::test]
async fn test_member_pages_redirect_anonymous_to_login() {
    let app = spawn_app(vec![]);
    for path in ["/profile", "/apitest"] {
        let response = app.get(path, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(location(&response).as_deref(), Some("/login"));
    }

    let response = app.post_form("/profile", "name=x", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_admin_routes_forbidden_to_anonymous() {
    let app = spawn_app(vec![]);

    let page = app.get("/admin", None).await;
    assert_eq!(page.status(), StatusCode::FORBIDDEN);

    let post = app.post_form("/news", "title=t&content=c", None).await;
    assert_eq!(post.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_string(post).await, "Forbidden");
    assert_eq!(app.repo.news_count(), 0);
}

#[tokio::test]
async fn test_admin_routes_forbidden_to_regular_users() {
    let app = spawn_app(vec![]);
    let cookie = app.register("mallory", "pw").await;

    let page = app.get("/admin", Some(&cookie)).await;
    assert_eq!(page.status(), StatusCode::FORBIDDEN);

    let post = app
        .post_form("/news", "title=t&content=c", Some(&cookie))
        .await;
    assert_eq!(post.status(), StatusCode::FORBIDDEN);

    let reload = app.post_form("/admin/apis/reload", "", Some(&cookie)).await;
    assert_eq!(reload.status(), StatusCode::FORBIDDEN);

    assert_eq!(app.repo.news_count(), 0);
}

#[tokio::test]
async fn test_admin_page_lists_modules() {
    let app = spawn_app(vec![ApiModule::new("alpha"), ApiModule::new("beta")]);
    let admin = app.register_admin("root", "pw").await;

    let response = app.get("/admin", Some(&admin)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("Active: alpha, beta"));
    assert!(body.contains(r#"href="/admin""#));
}

#[tokio::test]
async fn test_reload_without_directory_keeps_modules() {
    let app = spawn_app(vec![ApiModule::new("alpha")]);
    let admin = app.register_admin("root", "pw").await;

    let response = app.post_form("/admin/apis/reload", "", Some(&admin)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/admin"));
    assert_eq!(app.apis.names(), vec!["alpha".to_string()]);
}

// --- Profile ---

#[tokio::test]
async fn test_profile_update_replaces_whole_profile() {
    let app = spawn_app(vec![]);
    let cookie = app.register("pat", "pw").await;

    let response = app
        .post_form(
            "/profile",
            "name=Pat&bio=Writes+things&avatar=https%3A%2F%2Fimg.test%2Fp.png",
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Profile updated"));

    let stored = app.repo.find_user_by_username("pat").await.unwrap();
    let profile = stored.profile.expect("profile set");
    assert_eq!(profile.name.as_deref(), Some("Pat"));
    assert_eq!(profile.bio.as_deref(), Some("Writes things"));

    // A second submission without bio or avatar clears them.
    app.post_form("/profile", "name=Patricia&bio=", Some(&cookie))
        .await;
    let profile = app
        .repo
        .find_user_by_username("pat")
        .await
        .unwrap()
        .profile
        .unwrap();
    assert_eq!(profile.name.as_deref(), Some("Patricia"));
    assert_eq!(profile.bio, None);
    assert_eq!(profile.avatar, None);
}

#[tokio::test]
async fn test_apitest_page_lists_modules() {
    let app = spawn_app(vec![ApiModule::new("echo")]);
    let cookie = app.register("tess", "pw").await;

    let response = app.get("/apitest", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("<td>echo</td>"));
}

// --- Widgets ---

#[tokio::test]
async fn test_failing_widget_does_not_break_home() {
    let modules = vec![
        ApiModule::new("a_static").with_widget(Widget::Static("<p>static widget</p>".to_string())),
        ApiModule::new("b_broken").with_widget(Widget::render_with(|_| {
            Err(HandlerError::new("render failed"))
        })),
        ApiModule::new("c_greeting").with_widget(Widget::render_with(|user| {
            let name = user.map(|u| u.username.as_str()).unwrap_or("guest");
            Ok(format!("<p>hello {name}</p>"))
        })),
    ];
    let app = spawn_app(modules);

    let response = app.get("/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("<p>static widget</p>"));
    assert!(body.contains("<p>hello guest</p>"));
    assert!(!body.contains("render failed"));

    let cookie = app.register("wanda", "pw").await;
    let body = body_string(app.get("/", Some(&cookie)).await).await;
    assert!(body.contains("<p>hello wanda</p>"));
}

// --- Static files & misc ---

#[tokio::test]
async fn test_static_stylesheet_is_served() {
    let app = spawn_app(vec![]);
    let response = app.get("/style.css", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/css"));
}

#[tokio::test]
async fn test_unknown_path_is_plain_404() {
    let app = spawn_app(vec![]);
    let response = app.get("/definitely/not/here", None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, "Not Found");
}

#[tokio::test]
async fn test_health() {
    let app = spawn_app(vec![]);
    let response = app.get("/health", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = spawn_app(vec![]);
    let response = app.get("/health", None).await;
    assert!(response.headers().contains_key("x-request-id"));
}
