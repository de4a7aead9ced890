use crate::{
    config::Config,
    services::{
        database::Database,
        auth::AuthService,
        user::UserService,
        post::PostService,
        group::GroupService,
        comment::CommentService,
        follow::FollowService,
        media::MediaService,
    },
    utils::cache::ResponseCache,
};
use std::sync::Arc;

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 数据库连接
    pub db: Arc<Database>,

    /// 认证服务
    pub auth_service: AuthService,

    /// 用户服务
    pub user_service: UserService,

    /// 帖子服务
    pub post_service: PostService,

    /// 社区服务
    pub group_service: GroupService,

    /// 评论服务
    pub comment_service: CommentService,

    /// 关注服务
    pub follow_service: FollowService,

    /// 媒体服务
    pub media_service: MediaService,

    /// 首页响应缓存
    pub cache: Arc<dyn ResponseCache>,
}

impl AppState {
    /// 检查是否为生产环境
    pub fn is_production(&self) -> bool {
        self.config.is_production()
    }
}
