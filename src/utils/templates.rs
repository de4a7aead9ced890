use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use chrono::DateTime;
use handlebars::{handlebars_helper, Handlebars};
use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::error;

use crate::error::{AppError, Result};

/// 编译期内嵌的模板：(名称, 源码)
const TEMPLATES: &[(&str, &str)] = &[
    ("header", include_str!("../../templates/partials/header.hbs")),
    ("footer", include_str!("../../templates/partials/footer.hbs")),
    ("pagination", include_str!("../../templates/partials/pagination.hbs")),
    ("post_card", include_str!("../../templates/partials/post_card.hbs")),
    ("posts/index", include_str!("../../templates/posts/index.hbs")),
    ("posts/follow", include_str!("../../templates/posts/follow.hbs")),
    ("posts/group_list", include_str!("../../templates/posts/group_list.hbs")),
    ("posts/profile", include_str!("../../templates/posts/profile.hbs")),
    ("posts/post_detail", include_str!("../../templates/posts/post_detail.hbs")),
    ("posts/post_create", include_str!("../../templates/posts/post_create.hbs")),
    ("posts/group_create", include_str!("../../templates/posts/group_create.hbs")),
    ("posts/profile_edit", include_str!("../../templates/posts/profile_edit.hbs")),
    ("users/signup", include_str!("../../templates/users/signup.hbs")),
    ("users/login", include_str!("../../templates/users/login.hbs")),
    ("users/logged_out", include_str!("../../templates/users/logged_out.hbs")),
    ("about/author", include_str!("../../templates/about/author.hbs")),
    ("about/tech", include_str!("../../templates/about/tech.hbs")),
    ("about/project", include_str!("../../templates/about/project.hbs")),
    ("core/400", include_str!("../../templates/core/400.hbs")),
    ("core/403", include_str!("../../templates/core/403.hbs")),
    ("core/403csrf", include_str!("../../templates/core/403csrf.hbs")),
    ("core/404", include_str!("../../templates/core/404.hbs")),
    ("core/500", include_str!("../../templates/core/500.hbs")),
];

handlebars_helper!(date: |value: str| {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.format("%d %b %Y %H:%M").to_string())
        .unwrap_or_else(|_| value.to_string())
});

handlebars_helper!(truncate: |value: str, chars: u64| {
    value.chars().take(chars as usize).collect::<String>()
});

static REGISTRY: Lazy<std::result::Result<Handlebars<'static>, String>> = Lazy::new(build_registry);

fn build_registry() -> std::result::Result<Handlebars<'static>, String> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(false);
    registry.register_helper("date", Box::new(date));
    registry.register_helper("truncate", Box::new(truncate));

    for (name, source) in TEMPLATES {
        registry
            .register_template_string(name, *source)
            .map_err(|e| format!("failed to register template {}: {}", name, e))?;
    }

    Ok(registry)
}

/// 渲染模板为 HTML
pub fn render<T: Serialize>(name: &str, data: &T) -> Result<Html<String>> {
    let registry = REGISTRY
        .as_ref()
        .map_err(|e| AppError::Internal(e.clone()))?;
    Ok(Html(registry.render(name, data)?))
}

/// 渲染带状态码的页面；模板本身出错时退回纯文本
pub fn render_status_page<T: Serialize>(status: StatusCode, name: &str, data: &T) -> Response {
    match render(name, data) {
        Ok(html) => (status, html).into_response(),
        Err(e) => {
            error!("Failed to render {}: {}", name, e);
            (status, status.canonical_reason().unwrap_or("Error")).into_response()
        }
    }
}
