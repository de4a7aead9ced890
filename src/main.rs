use std::{net::SocketAddr, sync::Arc};
use tokio::time::{interval, Duration};
use tracing::{debug, info};

use social_blog::{build_router, build_state, config::Config, init_tracing, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 初始化日志
    init_tracing(&config);

    info!("Starting social-blog service...");

    let app_state = build_state(config.clone()).await?;
    if app_state.is_production() {
        info!("Running in production mode");
    }

    // 启动后台任务
    start_background_tasks(app_state.clone());

    let app = build_router(app_state);

    // 启动主服务器
    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr.parse()?)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    Ok(())
}

fn start_background_tasks(app_state: Arc<AppState>) {
    // 清理过期的缓存页面
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(60));

        loop {
            interval.tick().await;
            let purged = app_state.cache.purge_expired().await;
            if purged > 0 {
                debug!("Purged {} expired cache entries", purged);
            }
        }
    });

    info!("Background tasks started successfully");
}
