//! # Folio Content
//!
//! The block-content model behind Folio posts.
//!
//! - [`BlockDocument`]: ordered, typed blocks persisted as
//!   `{ time, blocks: [{ type, data }], version }`
//! - [`ImageBlockData`]: canonical image payload, loaded from either the
//!   `url` or the legacy `file.url` shape
//! - [`render`]: read-only HTML projection used by the blog detail page
//! - [`estimate_read_time`]: words over all text-bearing blocks at 200 wpm

pub mod document;
pub mod error;
pub mod image;
pub mod reading;
pub mod render;

pub use document::{
    Block, BlockData, BlockDocument, CodeData, HeaderData, ListData, ListItem, ListStyle,
    OpaqueBlock, ParagraphData, QuoteData, SCHEMA_VERSION, TableData, validate_document,
};
pub use error::{ContentError, Result};
pub use image::{DisplayFlag, ImageBlockData, SaveOptions, validate_image_data};
pub use reading::{
    ReadTime, WORDS_PER_MINUTE, estimate_read_time, estimate_read_time_at, word_count,
};
pub use render::{RenderedContent, render, render_block, render_value, render_with_read_time};
