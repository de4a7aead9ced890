pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

use axum::{extract::DefaultBodyLimit, middleware, Router};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    config::Config,
    error::Result,
    services::{
        AuthService, CommentService, Database, FollowService, GroupService, MediaService,
        PostService, UserService,
    },
    state::AppState,
    utils::{
        cache::{Cache, ResponseCache},
        middleware::{
            auth_middleware, csrf_middleware, CsrfConfig, request_logging_middleware,
            security_headers_middleware,
        },
    },
};

/// 初始化日志；`LOG_FORMAT=json` 时输出 JSON
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if config.log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// 使用内存缓存构建应用状态
pub async fn build_state(config: Config) -> Result<Arc<AppState>> {
    let cache: Arc<dyn ResponseCache> = Arc::new(Cache::<String>::new());
    build_state_with_cache(config, cache).await
}

/// 连接数据库、执行迁移并初始化所有服务
pub async fn build_state_with_cache(config: Config, cache: Arc<dyn ResponseCache>) -> Result<Arc<AppState>> {
    let db = Arc::new(Database::new(&config).await?);
    db.verify_connection().await?;
    db.migrate().await?;

    let auth_service = AuthService::new(&config);
    let media_service = MediaService::new(&config).await?;
    let user_service = UserService::new(db.clone(), auth_service.clone(), media_service.clone()).await?;
    let post_service = PostService::new(db.clone(), media_service.clone(), &config).await?;
    let group_service = GroupService::new(db.clone()).await?;
    let comment_service = CommentService::new(db.clone()).await?;
    let follow_service = FollowService::new(db.clone()).await?;

    info!("Application state initialized");

    Ok(Arc::new(AppState {
        config,
        db,
        auth_service,
        user_service,
        post_service,
        group_service,
        comment_service,
        follow_service,
        media_service,
        cache,
    }))
}

/// 组装路由和中间件
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(routes::posts::router())
        .merge(routes::groups::router())
        .merge(routes::profiles::router())
        .merge(routes::auth::router())
        .merge(routes::about::router())
        .fallback(routes::fallback);

    let media_path = state.config.media_url.trim_end_matches('/');
    if media_path.starts_with('/') && media_path.len() > 1 {
        app = app.nest_service(media_path, ServeDir::new(&state.config.media_root));
    }

    app.layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(middleware::from_fn_with_state(
            CsrfConfig {
                require_origin: state.config.secure_cookies,
            },
            csrf_middleware,
        ))
        .layer(DefaultBodyLimit::max(state.config.max_upload_size + 1024 * 1024))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_logging_middleware))
        .with_state(state)
}
