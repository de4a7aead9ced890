use chrono::{DateTime, Utc};
use serde::Serialize;
use validator::Validate;

use crate::models::media::UploadedFile;
use crate::utils::validation::not_blank;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author_id: i64,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

/// 列表和详情页展示用的帖子，附带作者和社区信息
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PostWithAuthor {
    pub id: i64,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author_id: i64,
    pub author_username: String,
    pub group_id: Option<i64>,
    pub group_slug: Option<String>,
    pub group_title: Option<String>,
    pub image: Option<String>,
}

impl PostWithAuthor {
    /// 帖子文本的前 `chars` 个字符
    pub fn preview(&self, chars: usize) -> String {
        self.text.chars().take(chars).collect()
    }
}

/// 帖子列表的筛选范围
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostScope {
    All,
    Group(String),
    Author(String),
    Following(i64),
}

/// 创建/编辑帖子的表单
///
/// `group` 保留原始提交值，由服务层解析为社区 ID。
#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct PostForm {
    #[validate(custom = "not_blank")]
    pub text: String,
    pub group: Option<String>,
    #[serde(skip_serializing)]
    pub image: Option<UploadedFile>,
    pub image_clear: bool,
}

impl PostForm {
    pub fn from_post(post: &Post) -> Self {
        Self {
            text: post.text.clone(),
            group: post.group_id.map(|id| id.to_string()),
            image: None,
            image_clear: false,
        }
    }

    /// 空字符串视为未选择社区
    pub fn group_choice(&self) -> Option<&str> {
        self.group.as_deref().map(str::trim).filter(|g| !g.is_empty())
    }
}
