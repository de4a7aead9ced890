use crate::{
    config::Config,
    error::{AppError, Result},
    models::post::*,
    services::{
        auth::AuthUser,
        database::{Page, PageRequest},
        media::MediaKind,
        Database, MediaService,
    },
    utils::validation::FormErrors,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

pub const INVALID_CHOICE_MESSAGE: &str =
    "Select a valid choice. That choice is not one of the available choices.";

const POST_COLUMNS: &str = r#"
    p.id, p.text, p.pub_date, p.author_id, u.username AS author_username,
    p.group_id, g.slug AS group_slug, g.title AS group_title, p.image
"#;

const POST_FROM: &str = r#"
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN post_groups g ON g.id = p.group_id
"#;

/// 帖子服务：列表查询和帖子的增删改
#[derive(Clone)]
pub struct PostService {
    db: Arc<Database>,
    media: MediaService,
    config: Config,
}

impl PostService {
    pub async fn new(db: Arc<Database>, media: MediaService, config: &Config) -> Result<Self> {
        Ok(Self {
            db,
            media,
            config: config.clone(),
        })
    }

    /// 把筛选范围解析为 WHERE 子句和参数；未知的社区或作者返回 404
    async fn scope_filter(&self, scope: &PostScope) -> Result<(&'static str, Option<i64>)> {
        match scope {
            PostScope::All => Ok(("", None)),
            PostScope::Group(slug) => {
                let (id,): (i64,) = sqlx::query_as("SELECT id FROM post_groups WHERE slug = ?")
                    .bind(slug)
                    .fetch_optional(self.db.pool())
                    .await?
                    .ok_or_else(|| AppError::not_found("Group"))?;
                Ok(("WHERE p.group_id = ?", Some(id)))
            }
            PostScope::Author(username) => {
                let (id,): (i64,) = sqlx::query_as("SELECT id FROM users WHERE username = ?")
                    .bind(username)
                    .fetch_optional(self.db.pool())
                    .await?
                    .ok_or_else(|| AppError::not_found("User"))?;
                Ok(("WHERE p.author_id = ?", Some(id)))
            }
            PostScope::Following(user_id) => Ok((
                "WHERE p.author_id IN (SELECT author_id FROM follows WHERE user_id = ?)",
                Some(*user_id),
            )),
        }
    }

    /// 按范围分页列出帖子，最新的在前
    pub async fn list_posts(&self, scope: &PostScope, page: Option<&str>) -> Result<Page<PostWithAuthor>> {
        debug!("Listing posts for {:?}, page {:?}", scope, page);

        let (filter, param) = self.scope_filter(scope).await?;

        let count_sql = format!("SELECT COUNT(*) {} {}", POST_FROM, filter);
        let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
        if let Some(id) = param {
            count_query = count_query.bind(id);
        }
        let (total,) = count_query.fetch_one(self.db.pool()).await?;
        let total = total.max(0) as usize;

        let request = PageRequest::resolve(page, total, self.config.posts_per_page);

        let list_sql = format!(
            "SELECT {} {} {} ORDER BY p.pub_date DESC, p.id DESC LIMIT ? OFFSET ?",
            POST_COLUMNS, POST_FROM, filter
        );
        let mut list_query = sqlx::query_as::<_, PostWithAuthor>(&list_sql);
        if let Some(id) = param {
            list_query = list_query.bind(id);
        }
        let items = list_query
            .bind(request.limit())
            .bind(request.offset())
            .fetch_all(self.db.pool())
            .await?;

        Ok(Page::new(items, request, total))
    }

    /// 关注作者的帖子流
    pub async fn following_feed(&self, user_id: i64, page: Option<&str>) -> Result<Page<PostWithAuthor>> {
        self.list_posts(&PostScope::Following(user_id), page).await
    }

    pub async fn get_post(&self, post_id: i64) -> Result<Post> {
        sqlx::query_as::<_, Post>(
            "SELECT id, text, pub_date, author_id, group_id, image FROM posts WHERE id = ?",
        )
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?
        .ok_or_else(|| AppError::not_found("Post"))
    }

    pub async fn get_post_with_author(&self, post_id: i64) -> Result<PostWithAuthor> {
        let sql = format!("SELECT {} {} WHERE p.id = ?", POST_COLUMNS, POST_FROM);
        sqlx::query_as::<_, PostWithAuthor>(&sql)
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::not_found("Post"))
    }

    pub async fn count_by_author(&self, author_id: i64) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE author_id = ?")
            .bind(author_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// 校验表单，返回解析后的社区 ID
    async fn validate_form(&self, form: &PostForm) -> Result<Option<i64>> {
        let mut errors = match form.validate() {
            Ok(()) => FormErrors::new(),
            Err(e) => FormErrors::from(&e),
        };

        let mut group_id = None;
        if let Some(raw) = form.group_choice() {
            match raw.parse::<i64>() {
                Ok(id) if self.group_exists(id).await? => group_id = Some(id),
                _ => errors.add("group", INVALID_CHOICE_MESSAGE),
            }
        }

        if let Some(file) = &form.image {
            if let Err(message) = self.media.validate_image(file) {
                errors.add("image", message);
            }
        }

        errors.into_result()?;
        Ok(group_id)
    }

    async fn group_exists(&self, group_id: i64) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM post_groups WHERE id = ?")
            .bind(group_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count > 0)
    }

    /// 发布帖子；作者总是当前用户
    pub async fn create_post(&self, actor: &AuthUser, form: &PostForm) -> Result<Post> {
        debug!("Creating post for user: {}", actor.username);

        let group_id = self.validate_form(form).await?;
        let image = match &form.image {
            Some(file) => Some(self.media.store_image(MediaKind::Post, file).await?),
            None => None,
        };

        // 写库失败时删除刚保存的图片
        let post = match self.insert_post(actor, form, group_id, image.as_deref()).await {
            Ok(post) => post,
            Err(e) => {
                if let Some(path) = &image {
                    self.media.remove(path).await;
                }
                return Err(e);
            }
        };

        info!("Post {} created by {}", post.id, actor.username);
        Ok(post)
    }

    /// 编辑帖子；发布时间保持不变
    pub async fn update_post(&self, actor: &AuthUser, post: &Post, form: &PostForm) -> Result<Post> {
        debug!("Updating post {} by {}", post.id, actor.username);

        if post.author_id != actor.id {
            return Err(AppError::forbidden("Only the author can edit this post"));
        }

        let group_id = self.validate_form(form).await?;
        let image = match &form.image {
            Some(file) => Some(self.media.store_image(MediaKind::Post, file).await?),
            None if form.image_clear => None,
            None => post.image.clone(),
        };

        let stored_new = form.image.is_some();
        let updated = match self.write_post(actor, post.id, form, group_id, image.as_deref()).await {
            Ok(updated) => updated,
            Err(e) => {
                if let (true, Some(path)) = (stored_new, &image) {
                    self.media.remove(path).await;
                }
                return Err(e);
            }
        };

        if let Some(old) = &post.image {
            if updated.image.as_ref() != Some(old) {
                self.media.remove(old).await;
            }
        }

        info!("Post {} updated by {}", post.id, actor.username);
        Ok(updated)
    }

    async fn insert_post(
        &self,
        actor: &AuthUser,
        form: &PostForm,
        group_id: Option<i64>,
        image: Option<&str>,
    ) -> Result<Post> {
        let mut tx = self.db.begin().await?;

        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (text, pub_date, author_id, group_id, image)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, text, pub_date, author_id, group_id, image
            "#,
        )
        .bind(form.text.trim())
        .bind(Utc::now())
        .bind(actor.id)
        .bind(group_id)
        .bind(image)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(post)
    }

    async fn write_post(
        &self,
        actor: &AuthUser,
        post_id: i64,
        form: &PostForm,
        group_id: Option<i64>,
        image: Option<&str>,
    ) -> Result<Post> {
        let mut tx = self.db.begin().await?;

        let updated = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET text = ?, group_id = ?, image = ?
            WHERE id = ? AND author_id = ?
            RETURNING id, text, pub_date, author_id, group_id, image
            "#,
        )
        .bind(form.text.trim())
        .bind(group_id)
        .bind(image)
        .bind(post_id)
        .bind(actor.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?;

        tx.commit().await?;
        Ok(updated)
    }

    /// 删除帖子；非作者的请求不做任何修改，返回 false
    pub async fn delete_post(&self, actor: &AuthUser, post_id: i64) -> Result<bool> {
        debug!("Deleting post {} by {}", post_id, actor.username);

        let mut tx = self.db.begin().await?;

        let image: Option<(Option<String>,)> =
            sqlx::query_as("DELETE FROM posts WHERE id = ? AND author_id = ? RETURNING image")
                .bind(post_id)
                .bind(actor.id)
                .fetch_optional(&mut *tx)
                .await?;

        tx.commit().await?;

        match image {
            Some((image,)) => {
                if let Some(path) = image {
                    self.media.remove(&path).await;
                }
                info!("Post {} deleted by {}", post_id, actor.username);
                Ok(true)
            }
            None => {
                warn!("User {} may not delete post {}", actor.username, post_id);
                Ok(false)
            }
        }
    }
}
