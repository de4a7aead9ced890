use crate::{
    error::{AppError, Result},
    models::{group::*, post::PostScope},
    routes::{page_context, PageQuery},
    services::{
        auth::{AuthUser, OptionalUser},
        policy,
    },
    state::AppState,
    utils::{form::FormData, templates, validation::FormErrors},
};
use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use serde_json::json;
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/group_create/", get(group_create_form).post(group_create))
        .route("/group/:slug/", get(group_posts))
        .route("/group/:slug/edit/", get(group_edit_form).post(group_edit))
        .route("/group/:slug/delete/", get(group_delete).post(group_delete))
}

fn group_url(slug: &str) -> String {
    format!("/group/{}/", slug)
}

/// 社区的帖子列表
/// GET /group/:slug/
async fn group_posts(
    State(state): State<Arc<AppState>>,
    OptionalUser(viewer): OptionalUser,
    Path(slug): Path<String>,
    query: PageQuery,
) -> Result<Html<String>> {
    let group = state.group_service.get_by_slug(&slug).await?;
    let page_obj = state
        .post_service
        .list_posts(&PostScope::Group(group.slug.clone()), query.page.as_deref())
        .await?;

    let context = page_context(
        &state,
        viewer.as_ref(),
        &group.title,
        json!({
            "can_modify": policy::can_modify(viewer.as_ref(), &group),
            "group": group,
            "page_obj": page_obj,
        }),
    );
    templates::render("posts/group_list", &context)
}

fn render_group_form(
    state: &AppState,
    user: &AuthUser,
    form: &GroupForm,
    errors: &FormErrors,
    editing: Option<&Group>,
) -> Result<Html<String>> {
    let title = if editing.is_some() { "Edit group" } else { "New group" };
    let context = page_context(
        state,
        Some(user),
        title,
        json!({
            "form": form,
            "errors": errors,
            "is_edit": editing.is_some(),
            "slug": editing.map(|g| g.slug.as_str()),
        }),
    );
    templates::render("posts/group_create", &context)
}

/// GET /group_create/
async fn group_create_form(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Html<String>> {
    render_group_form(&state, &user, &GroupForm::default(), &FormErrors::new(), None)
}

/// 创建社区，成功后跳转到社区页
/// POST /group_create/
async fn group_create(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    data: FormData,
) -> Result<Response> {
    let form: GroupForm = data.parse()?;

    match state.group_service.create_group(&user, form.clone()).await {
        Ok(group) => Ok(Redirect::to(&group_url(&group.slug)).into_response()),
        Err(AppError::Form(errors)) => {
            Ok(render_group_form(&state, &user, &form, &errors, None)?.into_response())
        }
        Err(e) => Err(e),
    }
}

/// GET /group/:slug/edit/
async fn group_edit_form(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> Result<Response> {
    let group = state.group_service.get_by_slug(&slug).await?;
    if !policy::can_modify(Some(&user), &group) {
        return Ok(Redirect::to(&group_url(&group.slug)).into_response());
    }

    let form = GroupForm::from(&group);
    Ok(render_group_form(&state, &user, &form, &FormErrors::new(), Some(&group))?.into_response())
}

/// 编辑社区；非创建者被送回社区页
/// POST /group/:slug/edit/
async fn group_edit(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(slug): Path<String>,
    data: FormData,
) -> Result<Response> {
    let group = state.group_service.get_by_slug(&slug).await?;
    if !policy::can_modify(Some(&user), &group) {
        return Ok(Redirect::to(&group_url(&group.slug)).into_response());
    }

    let form: GroupForm = data.parse()?;

    match state.group_service.update_group(&user, &group, form.clone()).await {
        Ok(updated) => Ok(Redirect::to(&group_url(&updated.slug)).into_response()),
        Err(AppError::Form(errors)) => {
            Ok(render_group_form(&state, &user, &form, &errors, Some(&group))?.into_response())
        }
        Err(e) => Err(e),
    }
}

/// 删除社区；非创建者的请求不做修改
/// GET|POST /group/:slug/delete/
async fn group_delete(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> Result<Redirect> {
    let group = state.group_service.get_by_slug(&slug).await?;
    state.group_service.delete_group(&user, &group).await?;
    Ok(Redirect::to("/"))
}
