use crate::{
    config::Config,
    error::{AppError, Result},
    models::user::User,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// 会话 cookie 名称
pub const SESSION_COOKIE: &str = "token";

#[derive(Clone)]
pub struct AuthService {
    config: Config,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,          // 用户ID
    pub username: String,  // 用户名
    pub exp: i64,          // 过期时间
    pub iat: i64,          // 签发时间
}

/// 当前登录用户
///
/// 由认证中间件放入请求扩展；处理器把它作为提取器使用时，
/// 匿名访问会被重定向到登录页。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

impl AuthService {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// 为用户签发 JWT
    pub fn issue_token(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            exp: (now + Duration::hours(self.config.jwt_expiry_hours)).timestamp(),
            iat: now.timestamp(),
        };

        let key = EncodingKey::from_secret(self.config.jwt_secret.as_ref());
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &key)?)
    }

    pub fn verify_jwt(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.config.jwt_secret.as_ref());
        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(token_data) => {
                debug!("JWT token verified for user: {}", token_data.claims.sub);
                Ok(token_data.claims)
            }
            Err(e) => {
                warn!("JWT verification failed: {}", e);
                Err(AppError::Authentication("Invalid token".to_string()))
            }
        }
    }

    pub fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
        Ok(hash.to_string())
    }

    pub fn verify_password(&self, password: &str, password_hash: &str) -> bool {
        match PasswordHash::new(password_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                warn!("Stored password hash is malformed: {}", e);
                false
            }
        }
    }

    /// 登录成功后写入的 Set-Cookie 值
    pub fn session_cookie(&self, token: &str) -> String {
        let max_age = self.config.jwt_expiry_hours * 3600;
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE, token, max_age
        );
        if self.config.secure_cookies {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// 退出登录时清除 cookie
    pub fn clear_cookie(&self) -> String {
        format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        match parts.extensions.get::<AuthUser>() {
            Some(user) => Ok(user.clone()),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");
                Err(AppError::login_required(next))
            }
        }
    }
}

// Optional authentication extractor
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<AuthUser>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        Ok(OptionalUser(parts.extensions.get::<AuthUser>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn service() -> AuthService {
        AuthService::new(&Config::default())
    }

    fn user() -> User {
        User {
            id: 42,
            username: "auth".to_string(),
            password_hash: String::new(),
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn test_token_roundtrip() {
        let auth = service();
        let token = auth.issue_token(&user()).unwrap();
        let claims = auth.verify_jwt(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.username, "auth");
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let other = AuthService::new(&Config {
            jwt_secret: "another-secret".to_string(),
            ..Config::default()
        });
        let token = other.issue_token(&user()).unwrap();
        assert!(service().verify_jwt(&token).is_err());
        assert!(service().verify_jwt("garbage").is_err());
    }

    #[test]
    fn test_password_hashing() {
        let auth = service();
        let hash = auth.hash_password("s3cret-pass").unwrap();
        assert_ne!(hash, "s3cret-pass");
        assert!(auth.verify_password("s3cret-pass", &hash));
        assert!(!auth.verify_password("wrong-pass", &hash));
        assert!(!auth.verify_password("s3cret-pass", "not-a-hash"));
    }

    #[test]
    fn test_session_cookie_flags() {
        let cookie = service().session_cookie("abc");
        assert!(cookie.starts_with("token=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Secure"));

        let secure = AuthService::new(&Config {
            secure_cookies: true,
            ..Config::default()
        });
        assert!(secure.session_cookie("abc").ends_with("; Secure"));
        assert!(service().clear_cookie().contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_extractor_requires_login() {
        let request = Request::builder().uri("/create/?x=1").body(()).unwrap();
        let (mut parts, _) = request.into_parts();
        match AuthUser::from_request_parts(&mut parts, &()).await {
            Err(AppError::LoginRequired { next }) => assert_eq!(next, "/create/?x=1"),
            other => panic!("unexpected result: {:?}", other.map(|u| u.id)),
        }

        parts.extensions.insert(AuthUser { id: 1, username: "auth".to_string() });
        let user = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.id, 1);
        let OptionalUser(viewer) = OptionalUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(viewer.is_some());
    }
}
