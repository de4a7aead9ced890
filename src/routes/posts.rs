use crate::{
    error::{AppError, Result},
    models::{comment::CommentForm, post::*},
    routes::{page_context, parse_id, PageQuery},
    services::{
        auth::{AuthUser, OptionalUser},
        policy,
    },
    state::AppState,
    utils::{cache::page_key, form::FormData, templates, validation::FormErrors},
};
use axum::{
    extract::{OriginalUri, Path, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/follow/", get(follow_index))
        .route("/create/", get(post_create_form).post(post_create))
        .route("/posts/:post_id/", get(post_detail))
        .route("/posts/:post_id/edit/", get(post_edit_form).post(post_edit))
        .route("/posts/:post_id/delete/", get(post_delete).post(post_delete))
        .route("/posts/:post_id/comment/", post(add_comment))
}

/// 首页：所有帖子，整页缓存
/// GET /
async fn index(
    State(state): State<Arc<AppState>>,
    OptionalUser(viewer): OptionalUser,
    OriginalUri(uri): OriginalUri,
    query: PageQuery,
) -> Result<Response> {
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let key = page_key(
        &state.config.cache_key_prefix,
        viewer.as_ref().map(|v| v.id),
        path_and_query,
    );

    if let Some(body) = state.cache.get(&key).await {
        debug!("Serving {} from cache", key);
        return Ok(Html(body).into_response());
    }

    let page_obj = state
        .post_service
        .list_posts(&PostScope::All, query.page.as_deref())
        .await?;
    let context = page_context(
        &state,
        viewer.as_ref(),
        "Latest posts",
        json!({ "page_name": "index", "page_obj": page_obj }),
    );
    let Html(body) = templates::render("posts/index", &context)?;

    state
        .cache
        .set(&key, body.clone(), Duration::from_secs(state.config.cache_timeout))
        .await;

    Ok(Html(body).into_response())
}

/// 关注作者的帖子
/// GET /follow/
async fn follow_index(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    query: PageQuery,
) -> Result<Html<String>> {
    let page_obj = state
        .post_service
        .following_feed(user.id, query.page.as_deref())
        .await?;
    let context = page_context(
        &state,
        Some(&user),
        "Following",
        json!({ "page_name": "follow_index", "page_obj": page_obj }),
    );
    templates::render("posts/follow", &context)
}

/// 帖子详情和评论
/// GET /posts/:post_id/
async fn post_detail(
    State(state): State<Arc<AppState>>,
    OptionalUser(viewer): OptionalUser,
    Path(post_id): Path<String>,
) -> Result<Html<String>> {
    let post_id = parse_id(&post_id, "Post")?;
    let post = state.post_service.get_post_with_author(post_id).await?;
    let num_posts = state.post_service.count_by_author(post.author_id).await?;
    let comments = state.comment_service.list_for_post(post.id).await?;

    let title = post.preview(state.config.chars_shown);
    let context = page_context(
        &state,
        viewer.as_ref(),
        &title,
        json!({
            "post": post,
            "can_modify": policy::can_modify(viewer.as_ref(), &post),
            "num_posts": num_posts,
            "num_comments": comments.len(),
            "comments": comments,
            "form": CommentForm::default(),
        }),
    );
    templates::render("posts/post_detail", &context)
}

/// 渲染新建/编辑帖子的表单
async fn render_post_form(
    state: &AppState,
    user: &AuthUser,
    form: &PostForm,
    errors: &FormErrors,
    editing: Option<&Post>,
) -> Result<Html<String>> {
    let selected = form.group_choice();
    let group_choices: Vec<_> = state
        .group_service
        .list_groups()
        .await?
        .into_iter()
        .map(|group| {
            let id = group.id.to_string();
            json!({
                "selected": selected == Some(id.as_str()),
                "id": id,
                "title": group.title,
            })
        })
        .collect();

    let title = if editing.is_some() { "Edit post" } else { "New post" };
    let context = page_context(
        state,
        Some(user),
        title,
        json!({
            "form": form,
            "errors": errors,
            "group_choices": group_choices,
            "is_edit": editing.is_some(),
            "post_id": editing.map(|p| p.id),
            "current_image": editing.and_then(|p| p.image.clone()),
        }),
    );
    templates::render("posts/post_create", &context)
}

fn post_form_from(data: &mut FormData, image_clear: bool) -> PostForm {
    PostForm {
        text: data.text("text"),
        group: data.get("group").map(str::to_string),
        image: data.take_file("image"),
        image_clear,
    }
}

/// GET /create/
async fn post_create_form(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Html<String>> {
    render_post_form(&state, &user, &PostForm::default(), &FormErrors::new(), None).await
}

/// 发布帖子，成功后跳转到作者主页
/// POST /create/
async fn post_create(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    mut data: FormData,
) -> Result<Response> {
    let form = post_form_from(&mut data, false);

    match state.post_service.create_post(&user, &form).await {
        Ok(_) => Ok(Redirect::to(&format!("/profile/{}/", user.username)).into_response()),
        Err(AppError::Form(errors)) => {
            Ok(render_post_form(&state, &user, &form, &errors, None).await?.into_response())
        }
        Err(e) => Err(e),
    }
}

/// GET /posts/:post_id/edit/
async fn post_edit_form(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(post_id): Path<String>,
) -> Result<Response> {
    let post = state.post_service.get_post(parse_id(&post_id, "Post")?).await?;
    if !policy::can_modify(Some(&user), &post) {
        return Ok(Redirect::to(&format!("/posts/{}/", post.id)).into_response());
    }

    let form = PostForm::from_post(&post);
    Ok(render_post_form(&state, &user, &form, &FormErrors::new(), Some(&post))
        .await?
        .into_response())
}

/// 编辑帖子；非作者被送回详情页
/// POST /posts/:post_id/edit/
async fn post_edit(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(post_id): Path<String>,
    mut data: FormData,
) -> Result<Response> {
    let post = state.post_service.get_post(parse_id(&post_id, "Post")?).await?;
    let detail = Redirect::to(&format!("/posts/{}/", post.id)).into_response();
    if !policy::can_modify(Some(&user), &post) {
        return Ok(detail);
    }

    let image_clear = data.flag("image-clear");
    let form = post_form_from(&mut data, image_clear);

    match state.post_service.update_post(&user, &post, &form).await {
        Ok(_) => Ok(detail),
        Err(AppError::Form(errors)) => Ok(render_post_form(&state, &user, &form, &errors, Some(&post))
            .await?
            .into_response()),
        Err(e) => Err(e),
    }
}

/// 删除帖子；非作者的请求不做修改，同样跳转到作者主页
/// GET|POST /posts/:post_id/delete/
async fn post_delete(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(post_id): Path<String>,
) -> Result<Redirect> {
    let post = state
        .post_service
        .get_post_with_author(parse_id(&post_id, "Post")?)
        .await?;
    state.post_service.delete_post(&user, post.id).await?;
    Ok(Redirect::to(&format!("/profile/{}/", post.author_username)))
}

/// 添加评论；无效评论不保存，但同样跳转回评论区
/// POST /posts/:post_id/comment/
async fn add_comment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(post_id): Path<String>,
    data: FormData,
) -> Result<Redirect> {
    let post = state.post_service.get_post(parse_id(&post_id, "Post")?).await?;
    let form = CommentForm { text: data.text("text") };
    state.comment_service.add_comment(&user, post.id, &form).await?;
    Ok(Redirect::to(&format!("/posts/{}/#comments", post.id)))
}
