use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,
    pub log_format: String,

    // Database configuration
    pub database_url: String,
    pub database_max_connections: u32,

    // Authentication configuration
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub secure_cookies: bool,

    // Response cache
    pub cache_timeout: u64,
    pub cache_key_prefix: String,

    // Media storage
    pub media_root: String,
    pub media_url: String,
    pub max_upload_size: usize,
    pub allowed_image_types: String,

    // Content settings
    pub posts_per_page: usize,
    pub chars_shown: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: env::var("LOG_FORMAT").unwrap_or(defaults.log_format),

            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,

            jwt_secret: env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "168".to_string())
                .parse()?,
            secure_cookies: env::var("SECURE_COOKIES")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,

            cache_timeout: env::var("CACHE_TIMEOUT")
                .unwrap_or_else(|_| "1".to_string())
                .parse()?,
            cache_key_prefix: env::var("CACHE_KEY_PREFIX").unwrap_or(defaults.cache_key_prefix),

            media_root: env::var("MEDIA_ROOT").unwrap_or(defaults.media_root),
            media_url: env::var("MEDIA_URL").unwrap_or(defaults.media_url),
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .unwrap_or_else(|_| "5242880".to_string())
                .parse()?,
            allowed_image_types: env::var("ALLOWED_IMAGE_TYPES")
                .unwrap_or(defaults.allowed_image_types),

            posts_per_page: env::var("POSTS_PER_PAGE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            chars_shown: env::var("CHARS_SHOWN")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 允许上传的图片扩展名
    pub fn allowed_image_extensions(&self) -> Vec<String> {
        self.allowed_image_types
            .split(',')
            .map(|ext| ext.trim().to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            environment: "development".to_string(),
            log_level: "social_blog=debug,tower_http=debug".to_string(),
            log_format: "pretty".to_string(),
            database_url: "sqlite://social_blog.db".to_string(),
            database_max_connections: 5,
            jwt_secret: "development-secret-change-me".to_string(),
            jwt_expiry_hours: 168,
            secure_cookies: false,
            cache_timeout: 1,
            cache_key_prefix: "index_page".to_string(),
            media_root: "media".to_string(),
            media_url: "/media/".to_string(),
            max_upload_size: 5 * 1024 * 1024,
            allowed_image_types: "jpeg,jpg,png,gif,webp".to_string(),
            posts_per_page: 10,
            chars_shown: 30,
        }
    }
}
