use crate::{
    error::{AppError, Result},
    models::user::{LoginForm, SignupForm},
    routes::{last_query_param, page_context},
    services::auth::{AuthUser, OptionalUser},
    state::AppState,
    utils::{
        form::FormData,
        templates,
        validation::{safe_next_path, FormErrors},
    },
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup/", get(signup_form).post(signup))
        .route("/auth/login/", get(login_form).post(login))
        .route("/auth/logout/", get(logout).post(logout))
}

/// 登录后的跳转地址 `?next=`
#[derive(Debug, Default)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for NextQuery
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        Ok(NextQuery {
            next: last_query_param(parts.uri.query(), "next"),
        })
    }
}

fn render_signup(state: &AppState, viewer: Option<&AuthUser>, form: &SignupForm, errors: &FormErrors) -> Result<Html<String>> {
    let context = page_context(
        state,
        viewer,
        "Sign up",
        json!({ "form": form, "errors": errors }),
    );
    templates::render("users/signup", &context)
}

/// GET /auth/signup/
async fn signup_form(
    State(state): State<Arc<AppState>>,
    OptionalUser(viewer): OptionalUser,
) -> Result<Html<String>> {
    render_signup(&state, viewer.as_ref(), &SignupForm::default(), &FormErrors::new())
}

/// 注册，成功后跳转到登录页
/// POST /auth/signup/
async fn signup(
    State(state): State<Arc<AppState>>,
    OptionalUser(viewer): OptionalUser,
    data: FormData,
) -> Result<Response> {
    let form: SignupForm = data.parse()?;

    match state.user_service.register(&form).await {
        Ok(_) => Ok(Redirect::to("/auth/login/").into_response()),
        Err(AppError::Form(errors)) => {
            Ok(render_signup(&state, viewer.as_ref(), &form, &errors)?.into_response())
        }
        Err(e) => Err(e),
    }
}

fn render_login(state: &AppState, form: &LoginForm, errors: &FormErrors) -> Result<Html<String>> {
    let context = page_context(
        state,
        None,
        "Log in",
        json!({
            "form": form,
            "errors": errors,
            "next": form.next.as_deref().unwrap_or_default(),
        }),
    );
    templates::render("users/login", &context)
}

/// GET /auth/login/
async fn login_form(
    State(state): State<Arc<AppState>>,
    query: NextQuery,
) -> Result<Html<String>> {
    let form = LoginForm {
        next: query.next,
        ..LoginForm::default()
    };
    render_login(&state, &form, &FormErrors::new())
}

/// 登录：写入会话 cookie 并跳转到 `next`
/// POST /auth/login/
async fn login(State(state): State<Arc<AppState>>, data: FormData) -> Result<Response> {
    let form: LoginForm = data.parse()?;

    match state.user_service.authenticate(&form).await {
        Ok(user) => {
            let token = state.auth_service.issue_token(&user)?;
            let cookie = state.auth_service.session_cookie(&token);
            let next = safe_next_path(form.next.as_deref());
            info!("User {} logged in, redirecting to {}", user.username, next);
            Ok(([(header::SET_COOKIE, cookie)], Redirect::to(&next)).into_response())
        }
        Err(AppError::Form(errors)) => Ok(render_login(&state, &form, &errors)?.into_response()),
        Err(e) => Err(e),
    }
}

/// 退出登录
/// GET|POST /auth/logout/
async fn logout(
    State(state): State<Arc<AppState>>,
    OptionalUser(viewer): OptionalUser,
) -> Result<Response> {
    if let Some(user) = viewer {
        info!("User {} logged out", user.username);
    }
    let context = page_context(&state, None, "Logged out", json!({}));
    let page = templates::render("users/logged_out", &context)?;
    Ok(([(header::SET_COOKIE, state.auth_service.clear_cookie())], page).into_response())
}
