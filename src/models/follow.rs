use serde::Serialize;

/// 关注统计：粉丝数和关注数
#[derive(Debug, Clone, Default, Serialize)]
pub struct FollowStats {
    pub followers_num: i64,
    pub following_num: i64,
}
