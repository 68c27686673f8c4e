//! # Folio Editor
//!
//! Authoring side of Folio post content.
//!
//! - [`ImageTool`]: the image block tool and its Empty / Uploading / Populated
//!   lifecycle
//! - [`UploadPolicy`] and [`ImageUploader`]: client-side file checks and the
//!   upload seam
//! - [`MediaPicker`]: session-scoped channel for choosing an already uploaded
//!   image
//! - [`EditingSession`]: one post's blocks behind a shared lock, with
//!   last-write-wins async operations and atomic saves
//!
//! ## Example
//!
//! ```rust,ignore
//! use folio_editor::*;
//!
//! let (picker, mut requests) = media_picker_channel(8);
//! let session = EditingSession::builder(document, uploader)
//!     .picker(picker)
//!     .build();
//!
//! let block = session.add_image_block().await;
//! session.upload_image(&block, UploadFile::from_path("cover.png").await?).await?;
//! let saved = session.save().await?;
//! ```

pub mod error;
pub mod image_tool;
pub mod media;
pub mod picker;
pub mod session;
pub mod tool;
pub mod upload;

pub use error::{RemoteError, SessionError, SessionResult, ToolError};
pub use image_tool::{ImageTool, ImageView, ToolConfig, ToolState, UploadTicket};
pub use media::{
    DEFAULT_PICKER_PAGE_SIZE, MediaAsset, MediaLibrary, MediaSelection, format_file_size,
};
pub use picker::{MediaPicker, PickerRequest, PickerRequests, media_picker_channel};
pub use session::{EditingSession, SessionBuilder, SessionConfig};
pub use tool::{BlockTool, EditorHost, NoopHost, SettingButton, Toolbox};
pub use upload::{
    DEFAULT_ACCEPTED_TYPES, DEFAULT_MAX_UPLOAD_BYTES, ImageUploader, UploadFile, UploadPolicy,
    UploadRejection, UploadResponse, UploadedFile, mime_for_path,
};
