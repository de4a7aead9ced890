use crate::{
    error::Result,
    models::follow::*,
    services::{auth::AuthUser, policy, Database},
};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct FollowService {
    db: Arc<Database>,
}

impl FollowService {
    pub async fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self { db })
    }

    /// 关注作者；重复关注和关注自己都不报错，返回是否新建了关系
    pub async fn follow(&self, actor: &AuthUser, author_id: i64) -> Result<bool> {
        debug!("User {} following user {}", actor.id, author_id);

        // 防止自己关注自己
        if !policy::can_follow(actor, author_id) {
            warn!("User {} tried to follow themselves", actor.username);
            return Ok(false);
        }

        let mut tx = self.db.begin().await?;
        let result = sqlx::query("INSERT OR IGNORE INTO follows (user_id, author_id) VALUES (?, ?)")
            .bind(actor.id)
            .bind(author_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let created = result.rows_affected() > 0;
        if created {
            info!("User {} followed user {}", actor.id, author_id);
        }
        Ok(created)
    }

    /// 取消关注；没有关注关系时什么也不做
    pub async fn unfollow(&self, actor: &AuthUser, author_id: i64) -> Result<bool> {
        debug!("User {} unfollowing user {}", actor.id, author_id);

        let mut tx = self.db.begin().await?;
        let result = sqlx::query("DELETE FROM follows WHERE user_id = ? AND author_id = ?")
            .bind(actor.id)
            .bind(author_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM follows WHERE user_id = ? AND author_id = ?")
                .bind(user_id)
                .bind(author_id)
                .fetch_one(self.db.pool())
                .await?;
        Ok(count > 0)
    }

    pub async fn stats(&self, user_id: i64) -> Result<FollowStats> {
        let (followers_num, following_num): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM follows WHERE author_id = ?),
                (SELECT COUNT(*) FROM follows WHERE user_id = ?)
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(FollowStats {
            followers_num,
            following_num,
        })
    }
}
