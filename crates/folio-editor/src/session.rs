//! An editing session over one post's content.
//!
//! The session owns the block list behind an `Arc<RwLock>`. Image blocks are
//! backed by an [`ImageTool`]; every other block is kept as loaded. Async
//! operations (upload, choose existing) never hold the lock across an await:
//! they take it to start, release it while the uploader or picker works, and
//! take it again to apply the result. Concurrent operations on the same block
//! therefore resolve last-write-wins.

use std::sync::Arc;

use folio_content::{Block, BlockData, BlockDocument, DisplayFlag, ImageBlockData};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::error::{SessionError, SessionResult};
use crate::image_tool::{ImageTool, ImageView, ToolConfig, ToolState};
use crate::picker::MediaPicker;
use crate::tool::{BlockTool, EditorHost, NoopHost};
use crate::upload::{ImageUploader, UploadFile, UploadPolicy};

/// Session-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub upload_policy: UploadPolicy,
    pub tool: ToolConfig,
}

struct SessionBlock {
    id: String,
    content: BlockContent,
}

enum BlockContent {
    Static(BlockData),
    Image(ImageTool),
}

struct SessionState {
    time: i64,
    version: String,
    blocks: Vec<SessionBlock>,
}

impl SessionState {
    fn position(&self, block_id: &str) -> SessionResult<usize> {
        self.blocks
            .iter()
            .position(|b| b.id == block_id)
            .ok_or_else(|| SessionError::BlockNotFound(block_id.to_string()))
    }

    fn image_tool(&self, block_id: &str) -> SessionResult<&ImageTool> {
        let index = self.position(block_id)?;
        match &self.blocks[index].content {
            BlockContent::Image(tool) => Ok(tool),
            BlockContent::Static(_) => Err(SessionError::NotAnImage(block_id.to_string())),
        }
    }

    fn image_tool_mut(&mut self, block_id: &str) -> SessionResult<&mut ImageTool> {
        let index = self.position(block_id)?;
        match &mut self.blocks[index].content {
            BlockContent::Image(tool) => Ok(tool),
            BlockContent::Static(_) => Err(SessionError::NotAnImage(block_id.to_string())),
        }
    }
}

/// Builder for [`EditingSession`].
pub struct SessionBuilder {
    document: BlockDocument,
    config: SessionConfig,
    uploader: Arc<dyn ImageUploader>,
    picker: Option<MediaPicker>,
    host: Arc<dyn EditorHost>,
}

impl SessionBuilder {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn picker(mut self, picker: MediaPicker) -> Self {
        self.picker = Some(picker);
        self
    }

    pub fn host(mut self, host: Arc<dyn EditorHost>) -> Self {
        self.host = host;
        self
    }

    pub fn build(self) -> EditingSession {
        let blocks = self
            .document
            .blocks
            .into_iter()
            .map(|block| wrap_block(block, self.config.tool, &self.host))
            .collect::<Vec<_>>();
        debug!(blocks = blocks.len(), "Editing session opened");

        EditingSession {
            state: Arc::new(RwLock::new(SessionState {
                time: self.document.time,
                version: self.document.version,
                blocks,
            })),
            uploader: self.uploader,
            picker: self.picker,
            host: self.host,
            config: Arc::new(self.config),
        }
    }
}

fn new_block_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(10);
    id
}

fn wrap_block(block: Block, tool_config: ToolConfig, host: &Arc<dyn EditorHost>) -> SessionBlock {
    let id = block.id.unwrap_or_else(new_block_id);
    let content = match block.data {
        BlockData::Image(image) => BlockContent::Image(
            ImageTool::from_data(id.clone(), image, tool_config).with_host(host.clone()),
        ),
        other => BlockContent::Static(other),
    };
    SessionBlock { id, content }
}

/// Shared handle to one post being edited. Cloning is cheap.
#[derive(Clone)]
pub struct EditingSession {
    state: Arc<RwLock<SessionState>>,
    uploader: Arc<dyn ImageUploader>,
    picker: Option<MediaPicker>,
    host: Arc<dyn EditorHost>,
    config: Arc<SessionConfig>,
}

impl EditingSession {
    pub fn builder(document: BlockDocument, uploader: Arc<dyn ImageUploader>) -> SessionBuilder {
        SessionBuilder {
            document,
            config: SessionConfig::default(),
            uploader,
            picker: None,
            host: Arc::new(NoopHost),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub async fn block_ids(&self) -> Vec<String> {
        self.state
            .read()
            .await
            .blocks
            .iter()
            .map(|b| b.id.clone())
            .collect()
    }

    /// Insert a block at `index` (clamped to the end). Returns its id.
    pub async fn insert_block(&self, index: usize, block: Block) -> String {
        let block = wrap_block(block, self.config.tool, &self.host);
        let id = block.id.clone();
        let mut state = self.state.write().await;
        let index = index.min(state.blocks.len());
        state.blocks.insert(index, block);
        debug!(block = %id, index, "Block inserted");
        id
    }

    pub async fn append_block(&self, block: Block) -> String {
        self.insert_block(usize::MAX, block).await
    }

    /// Append an empty image block ready for upload or selection.
    pub async fn add_image_block(&self) -> String {
        self.append_block(Block::image(ImageBlockData::default()))
            .await
    }

    pub async fn remove_block(&self, block_id: &str) -> SessionResult<()> {
        let mut state = self.state.write().await;
        let index = state.position(block_id)?;
        state.blocks.remove(index);
        debug!(block = block_id, "Block removed");
        Ok(())
    }

    pub async fn image(&self, block_id: &str) -> SessionResult<ImageBlockData> {
        Ok(self.state.read().await.image_tool(block_id)?.data().clone())
    }

    pub async fn tool_state(&self, block_id: &str) -> SessionResult<ToolState> {
        Ok(self.state.read().await.image_tool(block_id)?.state())
    }

    pub async fn render_image(&self, block_id: &str) -> SessionResult<ImageView> {
        Ok(self.state.read().await.image_tool(block_id)?.render())
    }

    /// Upload `file` into an image block.
    ///
    /// The file is checked against the session's upload policy before any
    /// request is made. The lock is released while the upload runs.
    #[instrument(skip(self, file), fields(block = block_id, file = %file.name))]
    pub async fn upload_image(
        &self,
        block_id: &str,
        file: UploadFile,
    ) -> SessionResult<ImageBlockData> {
        let ticket = {
            let mut state = self.state.write().await;
            state
                .image_tool_mut(block_id)?
                .begin_upload(&file, &self.config.upload_policy)?
        };

        let outcome = self.uploader.upload(file).await;

        let mut state = self.state.write().await;
        let tool = match state.image_tool_mut(block_id) {
            Ok(tool) => tool,
            Err(err) => {
                warn!("Block went away before its upload finished");
                return Err(err);
            }
        };
        let data = tool.finish_upload(ticket, outcome)?.clone();
        info!(url = %data.url, "Image uploaded");
        Ok(data)
    }

    /// Ask the media picker for an existing image and apply it.
    ///
    /// Returns `Ok(None)` when the picker is cancelled.
    #[instrument(skip(self), fields(block = block_id))]
    pub async fn select_existing(&self, block_id: &str) -> SessionResult<Option<ImageBlockData>> {
        self.state.read().await.image_tool(block_id)?;
        let picker = self.picker.as_ref().ok_or(SessionError::PickerClosed)?;

        let Some(selection) = picker.request(block_id).await? else {
            debug!("Picker cancelled");
            return Ok(None);
        };

        let mut state = self.state.write().await;
        let data = state
            .image_tool_mut(block_id)?
            .select_existing(selection)?
            .clone();
        Ok(Some(data))
    }

    pub async fn toggle_flag(&self, block_id: &str, flag: DisplayFlag) -> SessionResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.image_tool_mut(block_id)?.toggle_flag(flag)?)
    }

    pub async fn edit_caption(&self, block_id: &str, text: impl Into<String>) -> SessionResult<()> {
        let mut state = self.state.write().await;
        Ok(state.image_tool_mut(block_id)?.edit_caption(text)?)
    }

    pub async fn blur_caption(&self, block_id: &str) -> SessionResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.image_tool_mut(block_id)?.blur_caption()?)
    }

    /// Whether any image upload is still running.
    pub async fn has_pending_uploads(&self) -> bool {
        self.state.read().await.blocks.iter().any(|b| {
            matches!(&b.content, BlockContent::Image(tool) if tool.uploads_in_flight() > 0)
        })
    }

    /// Snapshot the session as a persisted document.
    ///
    /// Taken under a single read lock, so it reflects one consistent moment
    /// even while uploads are in flight. Every image block is validated; the
    /// first invalid one aborts the save.
    #[instrument(skip(self))]
    pub async fn save(&self) -> SessionResult<BlockDocument> {
        let state = self.state.read().await;
        let mut blocks = Vec::with_capacity(state.blocks.len());

        for block in &state.blocks {
            let data = match &block.content {
                BlockContent::Static(data) => data.clone(),
                BlockContent::Image(tool) => {
                    let saved = tool.save();
                    if !tool.validate(&saved) {
                        return Err(SessionError::InvalidBlock {
                            id: block.id.clone(),
                        });
                    }
                    BlockData::Image(ImageBlockData::normalize(&saved))
                }
            };
            blocks.push(Block {
                id: Some(block.id.clone()),
                data,
            });
        }

        let mut document = BlockDocument {
            time: state.time,
            blocks,
            version: state.version.clone(),
        };
        drop(state);
        document.touch();
        debug!(blocks = document.len(), "Session saved");
        Ok(document)
    }

    /// Save to the persisted JSON string, honouring the tool save options.
    pub async fn save_json(&self) -> SessionResult<String> {
        let document = self.save().await?;
        Ok(document.to_json_with(self.config.tool.save)?)
    }
}
