//! Posts as served by the API, and the draft sent back on save.

use std::fmt;

use chrono::NaiveDate;
use folio_content::{
    BlockDocument, RenderedContent, SaveOptions, WORDS_PER_MINUTE, render_with_read_time,
};
use folio_editor::EditingSession;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{ApiError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tag {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

/// A blog post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(default, deserialize_with = "date_prefix")]
    pub published_at: Option<NaiveDate>,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub category_id: Option<u64>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default, deserialize_with = "document_or_string")]
    pub content: BlockDocument,
}

impl Post {
    /// Body HTML and read time for the public detail page.
    pub fn rendered(&self) -> RenderedContent {
        render_with_read_time(&self.content, WORDS_PER_MINUTE)
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default = "first_page")]
    pub current_page: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default = "first_page")]
    pub last_page: u32,
}

fn first_page() -> u32 {
    1
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.current_page < self.last_page
    }
}

// Dates arrive as `2024-06-01` or a full timestamp; only the day matters.
fn date_prefix<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<NaiveDate>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => {
            let day = s.get(..10).unwrap_or(s);
            NaiveDate::parse_from_str(day, "%Y-%m-%d")
                .map(Some)
                .map_err(serde::de::Error::custom)
        }
    }
}

// Some backends store content as a JSON string column.
fn document_or_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<BlockDocument, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(BlockDocument::new()),
        Value::String(s) if s.trim().is_empty() => Ok(BlockDocument::new()),
        Value::String(s) => BlockDocument::from_json(&s).map_err(serde::de::Error::custom),
        other => BlockDocument::from_value(other).map_err(serde::de::Error::custom),
    }
}

/// A post being written, in the shape the editor form holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct PostDraft {
    /// Set when editing an existing post.
    pub id: Option<u64>,
    pub title: String,
    pub excerpt: String,
    pub category_id: Option<u64>,
    pub status: PostStatus,
    pub published_at: Option<NaiveDate>,
    pub tags: Vec<u64>,
    pub content: BlockDocument,
    /// How `content` is written into the request body.
    pub save: SaveOptions,
}

/// Request body for create/update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostPayload {
    pub title: String,
    pub excerpt: String,
    pub status: PostStatus,
    pub content: Value,
    pub tags: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<NaiveDate>,
}

impl PostDraft {
    pub fn new(title: impl Into<String>, content: BlockDocument) -> Self {
        Self {
            id: None,
            title: title.into(),
            excerpt: String::new(),
            category_id: None,
            status: PostStatus::Draft,
            published_at: None,
            tags: Vec::new(),
            content,
            save: SaveOptions::default(),
        }
    }

    pub fn with_save_options(mut self, save: SaveOptions) -> Self {
        self.save = save;
        self
    }

    /// Take the content from an editing session, along with the session's
    /// save options.
    pub async fn apply_session(&mut self, session: &EditingSession) -> Result<()> {
        self.content = session.save().await?;
        self.save = session.config().tool.save;
        Ok(())
    }

    pub fn from_post(post: &Post) -> Self {
        Self {
            id: Some(post.id),
            title: post.title.clone(),
            excerpt: post.excerpt.clone().unwrap_or_default(),
            category_id: post.category_id,
            status: post.status,
            published_at: post.published_at,
            tags: post.tags.iter().map(|t| t.id).collect(),
            content: post.content.clone(),
            save: SaveOptions::default(),
        }
    }

    /// Build the save payload.
    ///
    /// `status` overrides the draft's own status (the "save draft" and
    /// "publish" buttons). Publishing without a date uses `today`.
    pub fn prepare(&self, status: Option<PostStatus>, today: NaiveDate) -> Result<PostPayload> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ApiError::MissingTitle);
        }

        let status = status.unwrap_or(self.status);
        let published_at = match (self.published_at, status) {
            (None, PostStatus::Published) => Some(today),
            (date, _) => date,
        };

        Ok(PostPayload {
            title: title.to_string(),
            excerpt: self.excerpt.clone(),
            status,
            content: self.content.to_value_with(self.save),
            tags: self.tags.clone(),
            category_id: self.category_id.filter(|id| *id != 0),
            published_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_content::{Block, ImageBlockData};
    use serde_json::json;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_prepare_requires_title() {
        let draft = PostDraft::new("   ", BlockDocument::new());
        assert!(matches!(
            draft.prepare(None, day("2024-06-01")),
            Err(ApiError::MissingTitle)
        ));
    }

    #[test]
    fn test_publish_without_date_uses_today() {
        let draft = PostDraft::new("Hello", BlockDocument::new());
        let payload = draft
            .prepare(Some(PostStatus::Published), day("2024-06-01"))
            .unwrap();
        assert_eq!(payload.status, PostStatus::Published);
        assert_eq!(payload.published_at, Some(day("2024-06-01")));
    }

    #[test]
    fn test_publish_keeps_existing_date() {
        let mut draft = PostDraft::new("Hello", BlockDocument::new());
        draft.published_at = Some(day("2023-01-02"));
        let payload = draft
            .prepare(Some(PostStatus::Published), day("2024-06-01"))
            .unwrap();
        assert_eq!(payload.published_at, Some(day("2023-01-02")));
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let draft = PostDraft::new(
            " Hello ",
            BlockDocument::with_blocks(vec![Block::paragraph("x")]),
        );
        let payload =
            serde_json::to_value(draft.prepare(None, day("2024-06-01")).unwrap()).unwrap();

        assert_eq!(payload["title"], json!("Hello"));
        assert_eq!(payload["status"], json!("draft"));
        assert!(payload.get("category_id").is_none());
        assert!(payload.get("published_at").is_none());
        assert_eq!(payload["content"]["blocks"][0]["type"], json!("paragraph"));
    }

    #[test]
    fn test_legacy_mirror_reaches_payload() {
        let doc = BlockDocument::with_blocks(vec![Block::image(ImageBlockData::new("/a.png"))]);

        let plain = PostDraft::new("Hello", doc.clone());
        let payload = plain.prepare(None, day("2024-06-01")).unwrap();
        assert!(payload.content["blocks"][0]["data"].get("file").is_none());

        let mirrored =
            PostDraft::new("Hello", doc).with_save_options(SaveOptions::with_legacy_mirror());
        let payload = mirrored.prepare(None, day("2024-06-01")).unwrap();
        assert_eq!(payload.content["blocks"][0]["data"]["url"], json!("/a.png"));
        assert_eq!(payload.content["blocks"][0]["data"]["file"]["url"], json!("/a.png"));
    }

    #[test]
    fn test_post_from_api_json() {
        let post: Post = serde_json::from_value(json!({
            "id": 3,
            "title": "Shipping",
            "slug": "shipping",
            "excerpt": null,
            "status": "published",
            "published_at": "2024-06-01T00:00:00.000000Z",
            "category_id": 2,
            "tags": [{"id": 1, "name": "rust", "slug": "rust"}],
            "content": "{\"time\":1,\"version\":\"2.28.2\",\"blocks\":[{\"type\":\"paragraph\",\"data\":{\"text\":\"Hi\"}}]}"
        }))
        .unwrap();

        assert_eq!(post.published_at, Some(day("2024-06-01")));
        assert_eq!(post.content.blocks.len(), 1);
        assert_eq!(post.rendered().html, "<p>Hi</p>");

        let draft = PostDraft::from_post(&post);
        assert_eq!(draft.id, Some(3));
        assert_eq!(draft.tags, vec![1]);
    }

    #[test]
    fn test_post_with_missing_content() {
        let post: Post =
            serde_json::from_value(json!({"id": 1, "title": "t", "content": null})).unwrap();
        assert!(post.content.is_empty());
        assert_eq!(post.status, PostStatus::Draft);
    }
}
