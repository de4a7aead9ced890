use crate::{
    error::{AppError, Result},
    models::group::*,
    services::{auth::AuthUser, Database},
    utils::validation::FormErrors,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

pub const DUPLICATE_SLUG_MESSAGE: &str = "Group with this Slug already exists.";

/// 社区服务
#[derive(Clone)]
pub struct GroupService {
    db: Arc<Database>,
}

impl GroupService {
    pub async fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self { db })
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Group> {
        sqlx::query_as::<_, Group>(
            "SELECT id, creator_id, title, slug, description FROM post_groups WHERE slug = ?",
        )
        .bind(slug)
        .fetch_optional(self.db.pool())
        .await?
        .ok_or_else(|| AppError::not_found("Group"))
    }

    /// 所有社区，按名称排序，用于帖子表单的下拉框
    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        let groups = sqlx::query_as::<_, Group>(
            "SELECT id, creator_id, title, slug, description FROM post_groups ORDER BY title, id",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(groups)
    }

    /// 校验表单；`current_id` 为编辑中的社区，slug 与自身相同不算重复
    async fn validate_form(&self, form: &GroupForm, current_id: Option<i64>) -> Result<()> {
        let mut errors = match form.validate() {
            Ok(()) => FormErrors::new(),
            Err(e) => FormErrors::from(&e),
        };

        if !errors.has("slug") {
            let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM post_groups WHERE slug = ?")
                .bind(&form.slug)
                .fetch_optional(self.db.pool())
                .await?;
            if matches!(existing, Some((id,)) if Some(id) != current_id) {
                errors.add("slug", DUPLICATE_SLUG_MESSAGE);
            }
        }

        Ok(errors.into_result()?)
    }

    pub async fn create_group(&self, actor: &AuthUser, form: GroupForm) -> Result<Group> {
        debug!("Creating group by user: {}", actor.username);

        let form = form.normalized();
        self.validate_form(&form, None).await?;

        let mut tx = self.db.begin().await?;

        let group = sqlx::query_as::<_, Group>(
            r#"
            INSERT INTO post_groups (creator_id, title, slug, description)
            VALUES (?, ?, ?, ?)
            RETURNING id, creator_id, title, slug, description
            "#,
        )
        .bind(actor.id)
        .bind(&form.title)
        .bind(&form.slug)
        .bind(&form.description)
        .fetch_one(&mut *tx)
        .await
        .map_err(duplicate_slug)?;

        tx.commit().await?;

        info!("Group {} created by {}", group.slug, actor.username);
        Ok(group)
    }

    pub async fn update_group(&self, actor: &AuthUser, group: &Group, form: GroupForm) -> Result<Group> {
        debug!("Updating group {} by {}", group.slug, actor.username);

        if group.creator_id != actor.id {
            return Err(AppError::forbidden("Only the creator can edit this group"));
        }

        let form = form.normalized();
        self.validate_form(&form, Some(group.id)).await?;

        let mut tx = self.db.begin().await?;

        let updated = sqlx::query_as::<_, Group>(
            r#"
            UPDATE post_groups
            SET title = ?, slug = ?, description = ?
            WHERE id = ? AND creator_id = ?
            RETURNING id, creator_id, title, slug, description
            "#,
        )
        .bind(&form.title)
        .bind(&form.slug)
        .bind(&form.description)
        .bind(group.id)
        .bind(actor.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(duplicate_slug)?
        .ok_or_else(|| AppError::not_found("Group"))?;

        tx.commit().await?;

        info!("Group {} updated by {}", updated.slug, actor.username);
        Ok(updated)
    }

    /// 删除社区，帖子保留但不再属于任何社区；非创建者返回 false
    pub async fn delete_group(&self, actor: &AuthUser, group: &Group) -> Result<bool> {
        debug!("Deleting group {} by {}", group.slug, actor.username);

        let mut tx = self.db.begin().await?;
        let result = sqlx::query("DELETE FROM post_groups WHERE id = ? AND creator_id = ?")
            .bind(group.id)
            .bind(actor.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            warn!("User {} may not delete group {}", actor.username, group.slug);
            return Ok(false);
        }

        info!("Group {} deleted by {}", group.slug, actor.username);
        Ok(true)
    }
}

/// 并发创建时的唯一约束冲突同样作为表单错误返回
fn duplicate_slug(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            let mut errors = FormErrors::new();
            errors.add("slug", DUPLICATE_SLUG_MESSAGE);
            AppError::Form(errors)
        }
        _ => AppError::Database(err),
    }
}
