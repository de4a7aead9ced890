use crate::{
    error::{AppError, Result},
    models::{media::UploadedFile, user::*},
    services::{
        auth::AuthUser,
        media::{MediaKind, DEFAULT_PROFILE_PHOTO},
        AuthService, Database, MediaService,
    },
    utils::validation::{FormErrors, REQUIRED_MESSAGE},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

pub const PASSWORD_MISMATCH_MESSAGE: &str = "The two password fields didn’t match.";
pub const DUPLICATE_USERNAME_MESSAGE: &str = "A user with that username already exists.";
pub const INVALID_LOGIN_MESSAGE: &str = "Please enter a correct username and password. Note that both fields may be case-sensitive.";

/// 用户服务，处理账号和个人资料
#[derive(Clone)]
pub struct UserService {
    db: Arc<Database>,
    auth: AuthService,
    media: MediaService,
}

impl UserService {
    /// 创建新的用户服务实例
    pub async fn new(db: Arc<Database>, auth: AuthService, media: MediaService) -> Result<Self> {
        Ok(Self { db, auth, media })
    }

    /// 注册新用户，同一事务中创建其个人资料
    pub async fn register(&self, form: &SignupForm) -> Result<User> {
        debug!("Registering user: {}", form.username);

        let mut errors = match form.validate() {
            Ok(()) => FormErrors::new(),
            Err(e) => FormErrors::from(&e),
        };
        if form.password2.is_empty() {
            errors.add("password2", REQUIRED_MESSAGE);
        } else if form.password1 != form.password2 {
            errors.add("password2", PASSWORD_MISMATCH_MESSAGE);
        }
        if !errors.has("username") && self.find_by_username(&form.username).await?.is_some() {
            errors.add("username", DUPLICATE_USERNAME_MESSAGE);
        }
        errors.into_result()?;

        let password_hash = self.auth.hash_password(&form.password1)?;

        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, date_joined)
            VALUES (?, ?, ?)
            RETURNING id, username, password_hash, date_joined
            "#,
        )
        .bind(&form.username)
        .bind(&password_hash)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(duplicate_username)?;

        sqlx::query("INSERT INTO profiles (user_id) VALUES (?)")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("Registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// 校验用户名和密码
    pub async fn authenticate(&self, form: &LoginForm) -> Result<User> {
        debug!("Authenticating user: {}", form.username);

        let mut errors = FormErrors::new();
        if form.username.trim().is_empty() {
            errors.add("username", REQUIRED_MESSAGE);
        }
        if form.password.is_empty() {
            errors.add("password", REQUIRED_MESSAGE);
        }
        errors.into_result()?;

        match self.find_by_username(&form.username).await? {
            Some(user) if self.auth.verify_password(&form.password, &user.password_hash) => {
                info!("User {} logged in", user.username);
                Ok(user)
            }
            _ => {
                warn!("Failed login attempt for {}", form.username);
                let mut errors = FormErrors::new();
                errors.add_non_field(INVALID_LOGIN_MESSAGE);
                Err(errors.into())
            }
        }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, date_joined FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(user)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, date_joined FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(user)
    }

    /// 按用户名查找，不存在时返回 404
    pub async fn get_by_username(&self, username: &str) -> Result<User> {
        self.find_by_username(username)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    pub async fn get_profile(&self, user_id: i64) -> Result<Profile> {
        sqlx::query_as::<_, Profile>(
            "SELECT id, user_id, photo, bio FROM profiles WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?
        .ok_or_else(|| AppError::not_found("Profile"))
    }

    /// 更新个人资料；只能修改自己的
    pub async fn update_profile(
        &self,
        actor: &AuthUser,
        form: &ProfileForm,
        photo: Option<&UploadedFile>,
    ) -> Result<Profile> {
        debug!("Updating profile for user: {}", actor.username);

        let mut errors = match form.validate() {
            Ok(()) => FormErrors::new(),
            Err(e) => FormErrors::from(&e),
        };
        if let Some(file) = photo {
            if let Err(message) = self.media.validate_image(file) {
                errors.add("photo", message);
            }
        }
        errors.into_result()?;

        let previous = match photo {
            Some(_) => Some(self.get_profile(actor.id).await?.photo),
            None => None,
        };
        let stored_photo = match photo {
            Some(file) => Some(self.media.store_image(MediaKind::Profile, file).await?),
            None => None,
        };

        let profile = match self.write_profile(actor, form, stored_photo.as_deref()).await {
            Ok(profile) => profile,
            Err(e) => {
                if let Some(path) = &stored_photo {
                    self.media.remove(path).await;
                }
                return Err(e);
            }
        };

        // 换了新头像后删除旧文件，默认头像保留
        if let Some(old) = previous {
            if old != DEFAULT_PROFILE_PHOTO && old != profile.photo {
                self.media.remove(&old).await;
            }
        }

        info!("Profile updated for user {}", actor.username);
        Ok(profile)
    }

    async fn write_profile(&self, actor: &AuthUser, form: &ProfileForm, photo: Option<&str>) -> Result<Profile> {
        let mut tx = self.db.begin().await?;

        let profile = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET bio = ?, photo = COALESCE(?, photo)
            WHERE user_id = ?
            RETURNING id, user_id, photo, bio
            "#,
        )
        .bind(form.bio.trim())
        .bind(photo)
        .bind(actor.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Profile"))?;

        tx.commit().await?;
        Ok(profile)
    }

    /// 删除用户及其资料、帖子、评论、关注关系和创建的社区
    pub async fn delete_user(&self, user_id: i64) -> Result<bool> {
        debug!("Deleting user: {}", user_id);

        let mut tx = self.db.begin().await?;
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!("Deleted user {}", user_id);
        }
        Ok(deleted)
    }
}

/// 并发注册同名用户时由唯一索引兜底
fn duplicate_username(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            let mut errors = FormErrors::new();
            errors.add("username", DUPLICATE_USERNAME_MESSAGE);
            AppError::Form(errors)
        }
        _ => err.into(),
    }
}
