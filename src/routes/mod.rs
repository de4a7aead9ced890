pub mod about;
pub mod auth;
pub mod groups;
pub mod posts;
pub mod profiles;

use crate::{error::AppError, services::auth::AuthUser, state::AppState};
use axum::{
    async_trait,
    extract::{FromRequestParts, OriginalUri},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};

/// 查询串中的 `page`；重复出现时取最后一个，从不拒绝请求
#[derive(Debug, Default)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for PageQuery
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, AppError> {
        Ok(PageQuery {
            page: last_query_param(parts.uri.query(), "page"),
        })
    }
}

/// 取查询串中某个参数的最后一个值
pub fn last_query_param(query: Option<&str>, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .filter(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .last()
}

/// 页面公共上下文：标题、当前用户和媒体地址，再合并页面自己的数据
pub fn page_context(state: &AppState, viewer: Option<&AuthUser>, title: &str, extra: Value) -> Value {
    let mut context = json!({
        "title": title,
        "viewer": viewer,
        "media_url": state.config.media_url,
    });
    if let (Value::Object(base), Value::Object(extra)) = (&mut context, extra) {
        base.extend(extra);
    }
    context
}

/// 路径中的数字 ID；无法解析时按不存在处理
pub fn parse_id(raw: &str, resource: &str) -> Result<i64, AppError> {
    raw.parse::<i64>().map_err(|_| AppError::not_found(resource))
}

/// 未匹配任何路由
pub async fn fallback(OriginalUri(uri): OriginalUri) -> Response {
    tracing::debug!("No route for {}", uri);
    AppError::NotFound(format!("{} not found", uri.path())).into_response()
}
