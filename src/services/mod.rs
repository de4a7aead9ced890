pub mod database;
pub mod auth;
pub mod policy;
pub mod user;
pub mod post;
pub mod group;
pub mod comment;
pub mod follow;
pub mod media;

// 重新导出常用类型
pub use database::Database;
pub use auth::AuthService;
pub use user::UserService;
pub use post::PostService;
pub use group::GroupService;
pub use comment::CommentService;
pub use follow::FollowService;
pub use media::MediaService;
