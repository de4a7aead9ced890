use crate::{
    error::Result,
    routes::page_context,
    services::auth::OptionalUser,
    state::AppState,
    utils::templates,
};
use axum::{extract::State, response::Html, routing::get, Router};
use serde_json::json;
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/about/author/", get(author))
        .route("/about/tech/", get(tech))
        .route("/about/project/", get(project))
}

fn render_static(state: &AppState, viewer: OptionalUser, template: &str, title: &str) -> Result<Html<String>> {
    let context = page_context(state, viewer.0.as_ref(), title, json!({}));
    templates::render(template, &context)
}

/// GET /about/author/
async fn author(State(state): State<Arc<AppState>>, viewer: OptionalUser) -> Result<Html<String>> {
    render_static(&state, viewer, "about/author", "About the author")
}

/// GET /about/tech/
async fn tech(State(state): State<Arc<AppState>>, viewer: OptionalUser) -> Result<Html<String>> {
    render_static(&state, viewer, "about/tech", "Technologies")
}

/// GET /about/project/
async fn project(State(state): State<Arc<AppState>>, viewer: OptionalUser) -> Result<Html<String>> {
    render_static(&state, viewer, "about/project", "About the project")
}
