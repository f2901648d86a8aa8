//! Server-rendered HTML pages.
//!
//! Everything user-supplied goes through [`escape`]. Widget markup comes from
//! compiled-in API modules and is inserted verbatim.

use std::fmt::Write;
use std::sync::Arc;

use crate::api::ApiModule;
use crate::models::{NewsItem, User};

/// Escapes text for use in HTML element content and quoted attributes.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, user: Option<&User>, body: &str) -> String {
    let account = match user {
        Some(u) => {
            let admin = if u.is_admin() {
                r#"<a href="/admin">Admin</a>"#
            } else {
                ""
            };
            format!(
                r#"<a href="/profile">{}</a><a href="/apitest">API test</a>{admin}<a href="/logout">Logout</a>"#,
                escape(&u.username)
            )
        }
        None => r#"<a href="/login">Login</a><a href="/register">Register</a>"#.to_string(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} - newsdesk</title>
<link rel="stylesheet" href="/style.css">
</head>
<body>
<nav><a href="/">Home</a><span class="spacer"></span>{account}</nav>
<main>
{body}
</main>
</body>
</html>"#,
        title = escape(title),
    )
}

fn error_line(message: Option<&str>) -> String {
    message
        .map(|m| format!(r#"<p class="error">{}</p>"#, escape(m)))
        .unwrap_or_default()
}

fn news_list(news: &[NewsItem]) -> String {
    if news.is_empty() {
        return "<p>No news yet.</p>".to_string();
    }
    let mut out = String::from(r#"<section class="news">"#);
    for item in news {
        let author = item.author_username.as_deref().unwrap_or("unknown");
        let _ = write!(
            out,
            r#"<article><h3>{}</h3><p class="meta">by {} on {}</p><p>{}</p></article>"#,
            escape(&item.title),
            escape(author),
            item.created_at.format("%Y-%m-%d %H:%M"),
            escape(&item.content),
        );
    }
    out.push_str("</section>");
    out
}

pub fn home(user: Option<&User>, news: &[NewsItem], widgets: &[String]) -> String {
    let body = format!(
        "<h1>News</h1>\n{}\n<aside class=\"widgets\">\n{}\n</aside>",
        news_list(news),
        widgets.join("\n")
    );
    layout("Home", user, &body)
}

pub fn login(error: Option<&str>) -> String {
    let body = format!(
        r#"<h1>Login</h1>
{}
<form method="POST" action="/login">
<label>Username <input name="username" required></label>
<label>Password <input name="password" type="password" required></label>
<button>Login</button>
</form>
<p>No account? <a href="/register">Register</a></p>"#,
        error_line(error)
    );
    layout("Login", None, &body)
}

pub fn register(error: Option<&str>) -> String {
    let body = format!(
        r#"<h1>Register</h1>
{}
<form method="POST" action="/register">
<label>Username <input name="username" required></label>
<label>Email <input name="email" type="email"></label>
<label>Password <input name="password" type="password" required></label>
<button>Register</button>
</form>"#,
        error_line(error)
    );
    layout("Register", None, &body)
}

pub fn profile(user: &User, message: Option<&str>) -> String {
    let profile = user.profile.clone().unwrap_or_default();
    let field = |v: &Option<String>| escape(v.as_deref().unwrap_or(""));
    let avatar = profile
        .avatar
        .as_deref()
        .filter(|a| !a.is_empty())
        .map(|a| format!(r#"<img src="{}" alt="avatar" width="96">"#, escape(a)))
        .unwrap_or_default();

    let body = format!(
        r#"<h1>Profile of {username}</h1>
{message}
{avatar}
<p>Email: {email} &middot; Role: {role}</p>
<form method="POST" action="/profile">
<label>Name <input name="name" value="{name}"></label>
<label>Bio <textarea name="bio">{bio}</textarea></label>
<label>Avatar URL <input name="avatar" value="{avatar_url}"></label>
<button>Save</button>
</form>"#,
        username = escape(&user.username),
        message = error_line(message),
        email = escape(&user.email),
        role = user.role,
        name = field(&profile.name),
        bio = field(&profile.bio),
        avatar_url = field(&profile.avatar),
    );
    layout("Profile", Some(user), &body)
}

pub fn admin(user: &User, news: &[NewsItem], api_names: &[String]) -> String {
    let apis = if api_names.is_empty() {
        "none".to_string()
    } else {
        api_names.iter().map(|n| escape(n)).collect::<Vec<_>>().join(", ")
    };

    let body = format!(
        r#"<h1>Admin</h1>
<h2>Post news</h2>
<form method="POST" action="/news">
<label>Title <input name="title" required></label>
<label>Content <textarea name="content" rows="6" required></textarea></label>
<button>Publish</button>
</form>
<h2>API modules</h2>
<p>Active: {apis}</p>
<form method="POST" action="/admin/apis/reload"><button>Reload API modules</button></form>
<h2>Published</h2>
{news}"#,
        news = news_list(news),
    );
    layout("Admin", Some(user), &body)
}

pub fn apitest(user: &User, modules: &[Arc<ApiModule>]) -> String {
    let mut rows = String::new();
    for module in modules {
        let config = module.config.clone().unwrap_or_default();
        let methods = config
            .methods
            .as_ref()
            .map(|m| m.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", "))
            .unwrap_or_else(|| "any".to_string());
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td><code>{}</code></td></tr>",
            escape(&module.name),
            escape(config.description.as_deref().unwrap_or("")),
            escape(&methods),
            escape(config.usage.as_deref().unwrap_or("")),
        );
    }

    let options: String = modules
        .iter()
        .map(|m| format!(r#"<option>{}</option>"#, escape(&m.name)))
        .collect();

    let body = format!(
        r#"<h1>API test</h1>
<table><tr><th>Name</th><th>Description</th><th>Methods</th><th>Usage</th></tr>{rows}</table>
<form id="apitest" onsubmit="event.preventDefault(); runApi(this);">
<label>API <select name="api">{options}</select></label>
<label>Method <select name="method"><option>GET</option><option>POST</option><option>PUT</option><option>PATCH</option><option>DELETE</option></select></label>
<label>Params (JSON) <textarea name="params" rows="4">{{}}</textarea></label>
<button>Send</button>
</form>
<pre id="apitest-result" style="white-space:pre-wrap"></pre>
<script>
async function runApi(form) {{
  const method = form.method.value;
  let url = '/api/config.' + form.api.value;
  const init = {{ method, headers: {{ 'Content-Type': 'application/json' }} }};
  const params = JSON.parse(form.params.value || '{{}}');
  if (method === 'GET' || method === 'DELETE') {{
    url += '?' + new URLSearchParams(params).toString();
  }} else {{
    init.body = JSON.stringify(params);
  }}
  const res = await fetch(url, init);
  document.getElementById('apitest-result').textContent = res.status + '\n' + await res.text();
}}
</script>"#
    );
    layout("API test", Some(user), &body)
}
