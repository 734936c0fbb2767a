//! Object storage for store logos and backup archives
//!
//! Keys are `/`-separated relative paths. `put` returns a URL the frontend
//! can load directly.

pub mod local;
pub mod s3;

use async_trait::async_trait;

use shared::error::{AppError, AppResult, ErrorCode};

pub use local::LocalStorage;
pub use s3::S3Storage;

/// Logo upload limit (2 MB)
pub const MAX_LOGO_SIZE: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<StoredObject>;

    async fn get(&self, key: &str) -> AppResult<Vec<u8>>;

    /// Keys under `prefix`, sorted
    async fn list(&self, prefix: &str) -> AppResult<Vec<String>>;
}

/// Reject keys that could escape the storage root
pub fn check_key(key: &str) -> AppResult<()> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(AppError::invalid_request(format!("Invalid object key: {key}")));
    }
    Ok(())
}

/// Logo pre-upload check: image MIME (by extension), non-empty, at most 2 MB.
/// Returns the MIME type to store the object with.
pub fn validate_logo(file_name: &str, bytes: &[u8]) -> AppResult<String> {
    let mime = mime_guess::from_path(file_name).first_or_octet_stream();
    if mime.type_() != mime_guess::mime::IMAGE {
        return Err(AppError::with_message(
            ErrorCode::UnsupportedFileFormat,
            "이미지 파일만 업로드할 수 있습니다.",
        )
        .with_detail("mime", mime.essence_str().to_string()));
    }
    if bytes.is_empty() {
        return Err(AppError::new(ErrorCode::EmptyFile));
    }
    if bytes.len() > MAX_LOGO_SIZE {
        return Err(AppError::with_message(
            ErrorCode::FileTooLarge,
            "이미지 크기는 2MB 이하여야 합니다.",
        )
        .with_detail("size", bytes.len())
        .with_detail("max", MAX_LOGO_SIZE));
    }
    Ok(mime.essence_str().to_string())
}

/// File name reduced to a safe key segment
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.trim_matches('.') {
        "" => "file".to_string(),
        s => s.to_string(),
    }
}
