//! Previously uploaded media and the selection handed back by the picker.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

/// Page size used when the picker loads the library.
pub const DEFAULT_PICKER_PAGE_SIZE: u32 = 50;

/// An image already stored in the media library.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaAsset {
    pub id: u64,
    pub url: String,
    pub alt_text: Option<String>,
    pub original_name: String,
    pub filename: String,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    pub usage_count: u32,
}

impl MediaAsset {
    pub fn display_size(&self) -> String {
        format_file_size(self.size_bytes)
    }
}

/// What the picker returns for a chosen asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSelection {
    pub url: String,
    pub caption: String,
}

impl MediaSelection {
    pub fn new(url: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            caption: caption.into(),
        }
    }

    /// Caption is the asset's alt text, or its original file name.
    pub fn from_asset(asset: &MediaAsset) -> Self {
        let caption = asset
            .alt_text
            .as_deref()
            .filter(|alt| !alt.is_empty())
            .unwrap_or(&asset.original_name);
        Self::new(asset.url.clone(), caption)
    }
}

/// Human readable size in base-1024 units with up to two decimals.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut exp = 0;
    let mut scale = 1u64;
    while exp + 1 < UNITS.len() && bytes >= scale * 1024 {
        scale *= 1024;
        exp += 1;
    }
    let value = bytes as f64 / scale as f64;
    let rounded = (value * 100.0).round() / 100.0;

    // Trailing zeros are dropped: 1.50 -> 1.5, 2.00 -> 2.
    let mut text = format!("{rounded:.2}");
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }
    format!("{text} {}", UNITS[exp])
}

/// Read access to the media library.
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    async fn list_images(&self, per_page: u32) -> Result<Vec<MediaAsset>, RemoteError>;
}
