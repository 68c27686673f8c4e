//! Image upload contract: client-side policy, the file handed to an
//! uploader, and the response shape returned by the upload endpoint.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::RemoteError;

/// Default upper bound for uploaded images (5 MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Image types accepted by default.
pub const DEFAULT_ACCEPTED_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// A file picked for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl UploadFile {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, deriving the MIME type from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime_type = mime_for_path(path).to_string();
        debug!(%name, %mime_type, size = bytes.len(), "Loaded upload from disk");
        Ok(Self::new(name, mime_type, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Best-effort MIME type from a file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Why a file was refused before upload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("unsupported file type {mime_type}")]
    UnsupportedType { mime_type: String },

    #[error("file is {size} bytes, the limit is {max}")]
    TooLarge { size: u64, max: u64 },
}

/// Client-side checks applied before any upload request is made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadPolicy {
    pub accepted_types: Vec<String>,
    pub max_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            accepted_types: DEFAULT_ACCEPTED_TYPES.iter().map(|t| t.to_string()).collect(),
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl UploadPolicy {
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn accepts(&self, mime_type: &str) -> bool {
        self.accepted_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(mime_type))
    }

    pub fn check(&self, file: &UploadFile) -> Result<(), UploadRejection> {
        if !self.accepts(&file.mime_type) {
            return Err(UploadRejection::UnsupportedType {
                mime_type: file.mime_type.clone(),
            });
        }
        if file.size() > self.max_bytes {
            return Err(UploadRejection::TooLarge {
                size: file.size(),
                max: self.max_bytes,
            });
        }
        Ok(())
    }
}

/// The stored file reported back by the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Wire shape of the upload endpoint: `{ success, file: { url, name }, message }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(deserialize_with = "bool_or_flag")]
    pub success: bool,
    #[serde(default)]
    pub file: Option<UploadedFile>,
    #[serde(default)]
    pub message: Option<String>,
}

impl UploadResponse {
    /// Interpret the response; a success without a usable url is an error.
    pub fn into_result(self) -> Result<UploadedFile, RemoteError> {
        match (self.success, self.file) {
            (true, Some(file)) if !file.url.is_empty() => Ok(file),
            (true, _) => Err(RemoteError::InvalidResponse(
                "upload succeeded without a file url".into(),
            )),
            (false, _) => Err(RemoteError::Rejected(
                self.message.unwrap_or_else(|| "upload failed".into()),
            )),
        }
    }
}

// Servers send either `true` or `1`.
fn bool_or_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }
    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(n) => n != 0,
    })
}

/// Sends an image to storage and reports where it ended up.
#[async_trait]
pub trait ImageUploader: Send + Sync {
    async fn upload(&self, file: UploadFile) -> Result<UploadedFile, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn png(size: usize) -> UploadFile {
        UploadFile::new("a.png", "image/png", vec![0u8; size])
    }

    #[test]
    fn test_default_policy_accepts_common_images() {
        let policy = UploadPolicy::default();
        for mime in DEFAULT_ACCEPTED_TYPES {
            assert!(policy.accepts(mime));
        }
        assert!(policy.accepts("IMAGE/PNG"));
        assert!(!policy.accepts("image/svg+xml"));
        assert!(!policy.accepts("application/pdf"));
    }

    #[test]
    fn test_policy_rejects_unsupported_type() {
        let file = UploadFile::new("doc.pdf", "application/pdf", vec![1, 2, 3]);
        assert_eq!(
            UploadPolicy::default().check(&file),
            Err(UploadRejection::UnsupportedType {
                mime_type: "application/pdf".into()
            })
        );
    }

    #[test]
    fn test_policy_size_limit_is_inclusive() {
        let policy = UploadPolicy::default().with_max_bytes(10);
        assert!(policy.check(&png(10)).is_ok());
        assert_eq!(
            policy.check(&png(11)),
            Err(UploadRejection::TooLarge { size: 11, max: 10 })
        );
    }

    #[test]
    fn test_policy_from_partial_config() {
        let policy: UploadPolicy = serde_json::from_value(json!({"max_bytes": 1024})).unwrap();
        assert_eq!(policy.max_bytes, 1024);
        assert_eq!(policy.accepted_types.len(), DEFAULT_ACCEPTED_TYPES.len());
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("a/b/Photo.JPG")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("x.webp")), "image/webp");
        assert_eq!(mime_for_path(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_response_success_with_numeric_flag() {
        let resp: UploadResponse = serde_json::from_value(json!({
            "success": 1,
            "file": {"url": "/storage/a.png", "name": "a.png"}
        }))
        .unwrap();
        assert_eq!(
            resp.into_result().unwrap(),
            UploadedFile {
                url: "/storage/a.png".into(),
                name: Some("a.png".into())
            }
        );
    }

    #[test]
    fn test_response_failure_carries_message() {
        let resp: UploadResponse =
            serde_json::from_value(json!({"success": false, "message": "disk full"})).unwrap();
        assert_eq!(
            resp.into_result(),
            Err(RemoteError::Rejected("disk full".into()))
        );
    }

    #[test]
    fn test_response_success_without_url_is_invalid() {
        let resp: UploadResponse =
            serde_json::from_value(json!({"success": true, "file": {"url": ""}})).unwrap();
        assert!(matches!(
            resp.into_result(),
            Err(RemoteError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_file_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.png");
        tokio::fs::write(&path, b"\x89PNG").await.unwrap();

        let file = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(file.name, "cover.png");
        assert_eq!(file.mime_type, "image/png");
        assert_eq!(file.size(), 4);
    }

    #[test]
    fn test_missing_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = tokio_test::block_on(UploadFile::from_path(dir.path().join("gone.png")));
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::NotFound);
    }
}
