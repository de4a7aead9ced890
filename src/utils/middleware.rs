use crate::{
    error::AppError,
    services::auth::{AuthUser, SESSION_COOKIE},
    state::AppState,
};
use axum::{
    body::Body,
    extract::State,
    headers::{authorization::Bearer, Authorization, Cookie, HeaderMapExt},
    http::{header, HeaderMap, HeaderValue, Method, Request},
    middleware::Next,
    response::Response,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{debug, info, warn};
use url::Url;

/// 认证中间件
///
/// 从 `Authorization: Bearer` 头或 `token` cookie 中读取 JWT，
/// 验证通过且用户仍存在时把 `AuthUser` 放入请求扩展。
/// 无效的令牌不会导致请求失败，只按匿名访问处理。
pub async fn auth_middleware(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    if let Some(token) = extract_token(&headers) {
        match app_state.auth_service.verify_jwt(&token) {
            Ok(claims) => match app_state.user_service.get_by_id(claims.sub).await? {
                Some(user) => {
                    debug!("Authenticated user: {} ({})", user.username, user.id);
                    request.extensions_mut().insert(AuthUser::from(&user));
                }
                None => warn!("Token refers to missing user {}", claims.sub),
            },
            Err(e) => {
                debug!("JWT verification failed: {}", e);
            }
        }
    }

    Ok(next.run(request).await)
}

fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_string());
    }

    headers
        .typed_get::<Cookie>()
        .and_then(|cookie| cookie.get(SESSION_COOKIE).map(str::to_string))
        .filter(|token| !token.is_empty())
}

/// CSRF 检查配置
#[derive(Debug, Clone, Copy, Default)]
pub struct CsrfConfig {
    /// 为 true 时，非安全方法必须带 Origin 或 Referer
    pub require_origin: bool,
}

/// CSRF 中间件
///
/// 非安全方法的请求若带有 Origin（或 Referer），其主机必须与 Host 一致。
pub async fn csrf_middleware(
    State(csrf): State<CsrfConfig>,
    request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    if is_safe_method(request.method()) {
        return Ok(next.run(request).await);
    }

    let headers = request.headers();
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_ascii_lowercase);

    let (source, value) = match (headers.get(header::ORIGIN), headers.get(header::REFERER)) {
        (Some(origin), _) => ("Origin", origin),
        (None, Some(referer)) => ("Referer", referer),
        // 跨站表单提交带不上 SameSite=Lax 的会话 cookie
        (None, None) if !csrf.require_origin => return Ok(next.run(request).await),
        (None, None) => {
            return Err(AppError::Csrf(
                "Origin checking failed - no Origin or Referer header.".to_string(),
            ))
        }
    };

    let source_host = value
        .to_str()
        .ok()
        .and_then(|v| Url::parse(v).ok())
        .and_then(|url| {
            url.host_str().map(|h| match url.port() {
                Some(port) => format!("{}:{}", h, port),
                None => h.to_string(),
            })
        })
        .map(|h| h.to_ascii_lowercase());

    match (source_host, host) {
        (Some(source_host), Some(host)) if source_host == host => Ok(next.run(request).await),
        (source_host, host) => Err(AppError::Csrf(format!(
            "{} checking failed - {} does not match trusted origins ({}).",
            source,
            source_host.unwrap_or_else(|| "null".to_string()),
            host.unwrap_or_default()
        ))),
    }
}

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE)
}

/// 请求日志中间件
pub async fn request_logging_middleware(
    request: Request<Body>,
    next: Next<Body>,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client_ip = get_client_ip(&request);

    let start_time = std::time::Instant::now();

    debug!("Incoming request: {} {} from {}", method, uri, client_ip);

    let response = next.run(request).await;

    let elapsed = start_time.elapsed();
    let status = response.status();

    info!(
        "Request completed: {} {} {} - {}ms",
        method,
        uri,
        status.as_u16(),
        elapsed.as_millis()
    );

    response
}

/// 安全头中间件
pub async fn security_headers_middleware(
    request: Request<Body>,
    next: Next<Body>,
) -> Response {
    let is_https = is_https_request(&request);
    let mut response = next.run(request).await;

    let headers = response.headers_mut();

    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert("referrer-policy", HeaderValue::from_static("same-origin"));

    if is_https {
        headers.insert(
            "strict-transport-security",
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    response
}

// 辅助函数

/// 获取客户端 IP 地址
fn get_client_ip(request: &Request<Body>) -> String {
    let headers = request.headers();

    if let Some(forwarded_for) = headers.get("x-forwarded-for") {
        if let Ok(ip_str) = forwarded_for.to_str() {
            if let Some(ip) = ip_str.split(',').next() {
                return ip.trim().to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return ip_str.to_string();
        }
    }

    request
        .extensions()
        .get::<axum::extract::ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// 检查请求是否为 HTTPS
fn is_https_request(request: &Request<Body>) -> bool {
    if request.uri().scheme_str() == Some("https") {
        return true;
    }

    request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|proto| proto.to_str().ok())
        .map_or(false, |proto| proto == "https")
}
