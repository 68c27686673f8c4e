//! # Folio API
//!
//! Typed client for the blog backend.
//!
//! - Public: [`FolioClient::fetch_post`], [`FolioClient::list_posts`]
//! - Admin (needs a [`SessionContext`]): saving posts, listing the media
//!   library, uploading editor images
//!
//! [`FolioClient`] also implements the editor's [`ImageUploader`] and
//! [`MediaLibrary`] seams, so it can back an editing session directly.
//!
//! [`ImageUploader`]: folio_editor::ImageUploader
//! [`MediaLibrary`]: folio_editor::MediaLibrary

pub mod client;
pub mod config;
pub mod error;
pub mod post;
pub mod session;

pub use client::{EDITOR_UPLOAD_PATH, FolioClient, UPLOAD_FIELD};
pub use config::{API_URL_ENV, ApiConfig, DEFAULT_BASE_URL};
pub use error::{ApiError, Result};
pub use post::{Page, Post, PostDraft, PostPayload, PostStatus, Tag};
pub use session::{SessionContext, User};
