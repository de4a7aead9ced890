//! 访问控制规则
//!
//! 修改和删除只允许资源的所有者；关注要求对方不是自己。

use crate::models::{
    group::Group,
    post::{Post, PostWithAuthor},
};
use crate::services::auth::AuthUser;

/// 有所有者的资源
pub trait Owned {
    fn owner_id(&self) -> i64;
}

impl Owned for Post {
    fn owner_id(&self) -> i64 {
        self.author_id
    }
}

impl Owned for PostWithAuthor {
    fn owner_id(&self) -> i64 {
        self.author_id
    }
}

impl Owned for Group {
    fn owner_id(&self) -> i64 {
        self.creator_id
    }
}

pub fn can_modify<R: Owned>(actor: Option<&AuthUser>, resource: &R) -> bool {
    actor.map_or(false, |user| user.id == resource.owner_id())
}

pub fn can_edit_profile(actor: &AuthUser, username: &str) -> bool {
    actor.username == username
}

pub fn can_follow(actor: &AuthUser, author_id: i64) -> bool {
    actor.id != author_id
}
