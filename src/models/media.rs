use serde::Serialize;

/// 表单中上传的文件
#[derive(Debug, Clone, Serialize)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    #[serde(skip_serializing)]
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .filter(|ext| !ext.is_empty())
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}
