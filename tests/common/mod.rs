#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use social_blog::{
    build_router, build_state,
    config::Config,
    models::{group::{Group, GroupForm}, post::{Post, PostForm}, user::SignupForm},
    services::auth::AuthUser,
    state::AppState,
};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "Str0ng-pass";

// 2x1 GIF
pub const SMALL_GIF: &[u8] = b"\x47\x49\x46\x38\x39\x61\x02\x00\x01\x00\x80\x00\x00\x00\x00\x00\
\xFF\xFF\xFF\x21\xF9\x04\x00\x00\x00\x00\x00\x2C\x00\x00\x00\x00\x02\x00\x01\x00\x00\x02\x02\x0C\
\x0A\x00\x3B";

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers.get(header::LOCATION).and_then(|v| v.to_str().ok())
    }

    pub fn is_redirect_to(&self, target: &str) -> bool {
        self.status.is_redirection() && self.location() == Some(target)
    }

    /// 页面中帖子卡片的数量
    pub fn post_cards(&self) -> usize {
        self.body.matches("<article class=\"post\"").count()
    }
}

pub struct TestUser {
    pub user: AuthUser,
    pub token: String,
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub media: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let media = tempfile::tempdir().expect("temp media root");
        let config = Config {
            database_url: "sqlite::memory:".to_string(),
            media_root: media.path().to_string_lossy().into_owned(),
            cache_timeout: 60,
            ..Config::default()
        };
        let state = build_state(config).await.expect("application state");
        let router = build_router(state.clone());
        Self { router, state, media }
    }

    pub async fn create_user(&self, username: &str) -> TestUser {
        let user = self
            .state
            .user_service
            .register(&SignupForm {
                username: username.to_string(),
                password1: PASSWORD.to_string(),
                password2: PASSWORD.to_string(),
            })
            .await
            .expect("register user");
        let token = self.state.auth_service.issue_token(&user).expect("token");
        TestUser {
            user: AuthUser::from(&user),
            token,
        }
    }

    pub async fn create_group(&self, creator: &TestUser, slug: &str) -> Group {
        self.state
            .group_service
            .create_group(
                &creator.user,
                GroupForm {
                    title: "Тестовая группа".to_string(),
                    slug: slug.to_string(),
                    description: "Тестовое описание".to_string(),
                },
            )
            .await
            .expect("create group")
    }

    pub async fn create_post(&self, author: &TestUser, text: &str, group: Option<&Group>) -> Post {
        self.state
            .post_service
            .create_post(
                &author.user,
                &PostForm {
                    text: text.to_string(),
                    group: group.map(|g| g.id.to_string()),
                    ..PostForm::default()
                },
            )
            .await
            .expect("create post")
    }

    pub async fn count(&self, sql: &str) -> i64 {
        let (count,): (i64,) = sqlx::query_as(sql)
            .fetch_one(self.state.db.pool())
            .await
            .expect("count query");
        count
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = hyper::body::to_bytes(response.into_body()).await.expect("body");
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    fn builder(method: Method, uri: &str, user: Option<&TestUser>) -> axum::http::request::Builder {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, "testserver");
        if let Some(user) = user {
            builder = builder.header(header::COOKIE, format!("token={}", user.token));
        }
        builder
    }

    pub async fn get(&self, uri: &str, user: Option<&TestUser>) -> TestResponse {
        let request = Self::builder(Method::GET, uri, user).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn post_form(&self, uri: &str, user: Option<&TestUser>, fields: &[(&str, &str)]) -> TestResponse {
        let body = serde_urlencoded::to_string(fields).unwrap();
        let request = Self::builder(Method::POST, uri, user)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        user: Option<&TestUser>,
        fields: &[(&str, &str)],
        file: Option<(&str, &str, &[u8])>,
    ) -> TestResponse {
        let boundary = "----socialblogtestboundary";
        let mut body: Vec<u8> = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    boundary, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((name, file_name, data)) = file {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: image/gif\r\n\r\n",
                    boundary, name, file_name
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        let request = Self::builder(Method::POST, uri, user)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }
}
