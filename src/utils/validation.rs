use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use validator::{ValidationError, ValidationErrors};

static SLUG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap());

static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.@+-]+$").unwrap());

pub const REQUIRED_MESSAGE: &str = "This field is required.";

/// 表单错误：字段名 → 错误信息列表
///
/// `__all__` 用于不属于任何字段的错误（例如登录失败）。
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub const NON_FIELD: &'static str = "__all__";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.add(Self::NON_FIELD, message);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, field: &str) -> bool {
        !self.field(field).is_empty()
    }

    /// 没有错误时返回 Ok，否则返回自身
    pub fn into_result(self) -> Result<(), FormErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<&ValidationErrors> for FormErrors {
    fn from(errors: &ValidationErrors) -> Self {
        let mut form_errors = FormErrors::new();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors {
                let message = error
                    .message
                    .clone()
                    .unwrap_or_else(|| Cow::from("Enter a valid value."));
                form_errors.add(field, message.into_owned());
            }
        }
        form_errors
    }
}

fn error_with_message(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::from(message));
    error
}

/// 必填字段：去掉首尾空白后不能为空
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error_with_message("required", REQUIRED_MESSAGE));
    }
    Ok(())
}

/// 社区 slug：只允许字母、数字、下划线和连字符
pub fn valid_slug(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error_with_message("required", REQUIRED_MESSAGE));
    }
    if !SLUG_REGEX.is_match(value) {
        return Err(error_with_message(
            "invalid_slug",
            "Enter a valid “slug” consisting of letters, numbers, underscores or hyphens.",
        ));
    }
    Ok(())
}

/// 用户名格式：字母、数字以及 @/./+/-/_
pub fn valid_username(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error_with_message("required", REQUIRED_MESSAGE));
    }
    if value.chars().count() > 150 {
        return Err(error_with_message(
            "max_length",
            "Ensure this value has at most 150 characters.",
        ));
    }
    if !USERNAME_REGEX.is_match(value) {
        return Err(error_with_message(
            "invalid_username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    Ok(())
}

/// 登录后跳转地址只允许站内路径
pub fn safe_next_path(next: Option<&str>) -> String {
    match next.map(str::trim) {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}
