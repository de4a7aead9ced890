use crate::{
    config::Config,
    error::{AppError, Result},
    models::media::UploadedFile,
};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 新建资料时的默认头像
pub const DEFAULT_PROFILE_PHOTO: &str = "profile/default.png";

pub const INVALID_IMAGE_MESSAGE: &str = "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// 上传目录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Post,
    Profile,
}

impl MediaKind {
    fn subdir(&self) -> &'static str {
        match self {
            MediaKind::Post => "posts",
            MediaKind::Profile => "profile",
        }
    }
}

#[derive(Clone)]
pub struct MediaService {
    config: Config,
}

impl MediaService {
    pub async fn new(config: &Config) -> Result<Self> {
        let service = Self {
            config: config.clone(),
        };
        for kind in [MediaKind::Post, MediaKind::Profile] {
            fs::create_dir_all(service.root().join(kind.subdir())).await?;
        }
        Ok(service)
    }

    fn root(&self) -> &Path {
        Path::new(&self.config.media_root)
    }

    /// 检查上传文件是否为允许的图片类型
    ///
    /// 返回 Err 时携带的是展示给用户的字段错误信息。
    pub fn validate_image(&self, file: &UploadedFile) -> std::result::Result<(), String> {
        if file.size() == 0 {
            return Err("The submitted file is empty.".to_string());
        }

        if file.size() > self.config.max_upload_size {
            return Err(format!(
                "File too large. Maximum size is {} bytes.",
                self.config.max_upload_size
            ));
        }

        let allowed = self.config.allowed_image_extensions();
        match file.extension() {
            Some(ext) if allowed.contains(&ext) => {}
            _ => return Err(INVALID_IMAGE_MESSAGE.to_string()),
        }

        if let Err(e) = imagesize::blob_size(&file.data) {
            debug!("Rejected upload {}: {}", file.file_name, e);
            return Err(INVALID_IMAGE_MESSAGE.to_string());
        }

        Ok(())
    }

    /// 保存图片，返回相对于 MEDIA_ROOT 的路径
    pub async fn store_image(&self, kind: MediaKind, file: &UploadedFile) -> Result<String> {
        self.validate_image(file).map_err(AppError::FileUpload)?;

        let ext = file.extension().unwrap_or_else(|| "bin".to_string());
        let relative = format!("{}/{}.{}", kind.subdir(), Uuid::new_v4(), ext);
        let path = self.root().join(&relative);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &file.data).await?;

        info!("Stored upload {} as {}", file.file_name, relative);
        Ok(relative)
    }

    /// 删除已保存的文件；文件不存在时只记录日志
    pub async fn remove(&self, relative: &str) {
        let path: PathBuf = self.root().join(relative);
        if let Err(e) = fs::remove_file(&path).await {
            warn!("Failed to remove media file {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 透明 GIF
    pub const SMALL_GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x21, 0xf9,
        0x04, 0x01, 0x0a, 0x00, 0x01, 0x00, 0x2c, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00,
        0x00, 0x02, 0x02, 0x4c, 0x01, 0x00, 0x3b,
    ];

    fn upload(name: &str, data: &[u8]) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            content_type: Some("image/gif".to_string()),
            data: data.to_vec(),
        }
    }

    async fn service() -> (MediaService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            media_root: dir.path().to_string_lossy().into_owned(),
            ..Config::default()
        };
        (MediaService::new(&config).await.unwrap(), dir)
    }

    #[tokio::test]
    async fn test_validate_image() {
        let (media, _dir) = service().await;
        assert!(media.validate_image(&upload("small.gif", SMALL_GIF)).is_ok());
        assert!(media.validate_image(&upload("small.txt", SMALL_GIF)).is_err());
        assert!(media.validate_image(&upload("fake.gif", b"not an image")).is_err());
        assert!(media.validate_image(&upload("empty.gif", b"")).is_err());
    }

    #[tokio::test]
    async fn test_store_image_writes_under_subdir() {
        let (media, dir) = service().await;
        let relative = media
            .store_image(MediaKind::Post, &upload("small.gif", SMALL_GIF))
            .await
            .unwrap();
        assert!(relative.starts_with("posts/"));
        assert!(relative.ends_with(".gif"));
        assert!(dir.path().join(&relative).exists());

        media.remove(&relative).await;
        assert!(!dir.path().join(&relative).exists());
    }
}
