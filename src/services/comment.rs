use crate::{
    error::Result,
    models::comment::*,
    services::{auth::AuthUser, Database},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use validator::Validate;

#[derive(Clone)]
pub struct CommentService {
    db: Arc<Database>,
}

impl CommentService {
    pub async fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self { db })
    }

    /// 添加评论；表单无效时不写入，返回 None
    pub async fn add_comment(&self, actor: &AuthUser, post_id: i64, form: &CommentForm) -> Result<Option<Comment>> {
        debug!("User {} commenting on post {}", actor.username, post_id);

        if let Err(e) = form.validate() {
            debug!("Comment rejected: {}", e);
            return Ok(None);
        }

        let mut tx = self.db.begin().await?;

        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (post_id, author_id, text, created)
            VALUES (?, ?, ?, ?)
            RETURNING id, post_id, author_id, text, created
            "#,
        )
        .bind(post_id)
        .bind(actor.id)
        .bind(form.text.trim())
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!("Comment {} added to post {}", comment.id, post_id);
        Ok(Some(comment))
    }

    /// 帖子的评论，最早的在前
    pub async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>> {
        let comments = sqlx::query_as::<_, CommentWithAuthor>(
            r#"
            SELECT c.id, c.post_id, c.author_id, u.username AS author_username, c.text, c.created
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.post_id = ?
            ORDER BY c.created ASC, c.id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(comments)
    }
}
