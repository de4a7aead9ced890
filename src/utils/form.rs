use crate::{
    error::{AppError, Result},
    models::media::UploadedFile,
};
use axum::{
    async_trait,
    body::{Body, Bytes},
    extract::{FromRequest, Multipart},
    http::{header, Request},
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::debug;

/// 表单提交的数据
///
/// 同时支持 `application/x-www-form-urlencoded` 和 `multipart/form-data`；
/// 没有选择文件的空文件字段会被忽略。
#[derive(Debug, Default, Clone)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl FormData {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// 字段值，缺省时为空字符串
    pub fn text(&self, name: &str) -> String {
        self.get(name).unwrap_or_default().to_string()
    }

    /// 复选框是否被勾选
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.get(name), Some(value) if !value.is_empty() && value != "off" && value != "false")
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    /// 把文本字段反序列化为表单结构体
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        let value = serde_json::to_value(&self.fields)
            .map_err(|e| AppError::BadRequest(format!("Invalid form data: {}", e)))?;
        serde_json::from_value(value).map_err(|e| AppError::BadRequest(format!("Invalid form data: {}", e)))
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await? {
            let name = match field.name() {
                Some(name) => name.to_string(),
                None => continue,
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await?;
                    if file_name.is_empty() && data.is_empty() {
                        continue;
                    }
                    debug!("Received upload {} ({} bytes)", file_name, data.len());
                    form.files.insert(
                        name,
                        UploadedFile {
                            file_name,
                            content_type,
                            data: data.to_vec(),
                        },
                    );
                }
                None => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    fn from_urlencoded(body: &Bytes) -> Result<Self> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid form data: {}", e)))?;
        Ok(FormData {
            fields: pairs.into_iter().collect(),
            files: HashMap::new(),
        })
    }
}

#[async_trait]
impl<S> FromRequest<S, Body> for FormData
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(request: Request<Body>, state: &S) -> Result<Self> {
        let is_multipart = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map_or(false, |value| value.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(request, state)
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            Self::from_multipart(multipart).await
        } else {
            let body = Bytes::from_request(request, state)
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            Self::from_urlencoded(&body)
        }
    }
}
