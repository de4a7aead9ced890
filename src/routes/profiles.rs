use crate::{
    error::{AppError, Result},
    models::{post::PostScope, user::ProfileForm},
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
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profile/:username/", get(profile))
        .route("/profile/:username/follow/", get(profile_follow).post(profile_follow))
        .route("/profile/:username/unfollow/", get(profile_unfollow).post(profile_unfollow))
        .route("/profile/:username/edit/", get(profile_edit_form).post(profile_edit))
}

fn profile_url(username: &str) -> String {
    format!("/profile/{}/", username)
}

/// 作者主页：资料、统计和帖子
/// GET /profile/:username/
async fn profile(
    State(state): State<Arc<AppState>>,
    OptionalUser(viewer): OptionalUser,
    Path(username): Path<String>,
    query: PageQuery,
) -> Result<Html<String>> {
    let author = state.user_service.get_by_username(&username).await?;
    let profile = state.user_service.get_profile(author.id).await?;
    let posts_num = state.post_service.count_by_author(author.id).await?;
    let stats = state.follow_service.stats(author.id).await?;
    let following = match viewer.as_ref() {
        Some(v) => Some(state.follow_service.is_following(v.id, author.id).await?),
        None => None,
    };
    let page_obj = state
        .post_service
        .list_posts(&PostScope::Author(username.clone()), query.page.as_deref())
        .await?;

    let is_owner = viewer
        .as_ref()
        .map_or(false, |v| policy::can_edit_profile(v, &username));

    let context = page_context(
        &state,
        viewer.as_ref(),
        &format!("Profile of {}", author.username),
        json!({
            "author": author,
            "profile": profile,
            "posts_num": posts_num,
            "followers_num": stats.followers_num,
            "following_num": stats.following_num,
            "following": following,
            "is_owner": is_owner,
            "page_obj": page_obj,
        }),
    );
    templates::render("posts/profile", &context)
}

/// 关注作者；重复关注和关注自己都被忽略
/// GET|POST /profile/:username/follow/
async fn profile_follow(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(username): Path<String>,
) -> Result<Redirect> {
    let author = state.user_service.get_by_username(&username).await?;
    state.follow_service.follow(&user, author.id).await?;
    Ok(Redirect::to(&profile_url(&username)))
}

/// 取消关注
/// GET|POST /profile/:username/unfollow/
async fn profile_unfollow(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(username): Path<String>,
) -> Result<Redirect> {
    let author = state.user_service.get_by_username(&username).await?;
    if !state.follow_service.unfollow(&user, author.id).await? {
        debug!("User {} was not following {}", user.username, username);
    }
    Ok(Redirect::to(&profile_url(&username)))
}

async fn render_profile_form(
    state: &AppState,
    user: &AuthUser,
    form: &ProfileForm,
    errors: &FormErrors,
) -> Result<Html<String>> {
    let current = state.user_service.get_profile(user.id).await?;
    let context = page_context(
        state,
        Some(user),
        "Edit profile",
        json!({
            "form": form,
            "errors": errors,
            "username": user.username,
            "current_photo": current.photo,
        }),
    );
    templates::render("posts/profile_edit", &context)
}

/// GET /profile/:username/edit/
async fn profile_edit_form(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(username): Path<String>,
) -> Result<Response> {
    if !policy::can_edit_profile(&user, &username) {
        return Ok(Redirect::to(&profile_url(&username)).into_response());
    }

    let profile = state.user_service.get_profile(user.id).await?;
    let form = ProfileForm { bio: profile.bio };
    Ok(render_profile_form(&state, &user, &form, &FormErrors::new())
        .await?
        .into_response())
}

/// 编辑自己的资料；编辑别人的资料会被送回其主页
/// POST /profile/:username/edit/
async fn profile_edit(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(username): Path<String>,
    mut data: FormData,
) -> Result<Response> {
    if !policy::can_edit_profile(&user, &username) {
        return Ok(Redirect::to(&profile_url(&username)).into_response());
    }

    let form = ProfileForm { bio: data.text("bio") };
    let photo = data.take_file("photo");

    match state.user_service.update_profile(&user, &form, photo.as_ref()).await {
        Ok(_) => Ok(Redirect::to(&profile_url(&username)).into_response()),
        Err(AppError::Form(errors)) => Ok(render_profile_form(&state, &user, &form, &errors)
            .await?
            .into_response()),
        Err(e) => Err(e),
    }
}
