//! Session-scoped channel between image blocks and the media picker.
//!
//! A block sends a [`PickerRequest`] carrying a oneshot reply; whoever drives
//! the picker UI answers it with a selection or drops it to cancel.

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::{RemoteError, SessionError, SessionResult};
use crate::media::{DEFAULT_PICKER_PAGE_SIZE, MediaAsset, MediaLibrary, MediaSelection};

/// A pending "choose existing image" request for one block.
#[derive(Debug)]
pub struct PickerRequest {
    pub block_id: String,
    reply: oneshot::Sender<Option<MediaSelection>>,
}

impl PickerRequest {
    /// Answer with a selection. Returns false if the block stopped waiting.
    pub fn respond(self, selection: MediaSelection) -> bool {
        self.reply.send(Some(selection)).is_ok()
    }

    /// The library page shown while this request is open.
    pub async fn load_assets(
        &self,
        library: &dyn MediaLibrary,
    ) -> Result<Vec<MediaAsset>, RemoteError> {
        let assets = library.list_images(DEFAULT_PICKER_PAGE_SIZE).await?;
        debug!(block = %self.block_id, count = assets.len(), "Picker assets loaded");
        Ok(assets)
    }

    pub fn respond_with_asset(self, asset: &MediaAsset) -> bool {
        self.respond(MediaSelection::from_asset(asset))
    }

    /// Close the picker without choosing anything.
    pub fn cancel(self) {
        let _ = self.reply.send(None);
    }
}

/// Sending half, held by the editing session.
#[derive(Debug, Clone)]
pub struct MediaPicker {
    tx: mpsc::Sender<PickerRequest>,
}

impl MediaPicker {
    /// Open the picker for `block_id` and wait for the user's choice.
    ///
    /// `Ok(None)` means the picker was cancelled.
    pub async fn request(&self, block_id: &str) -> SessionResult<Option<MediaSelection>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PickerRequest {
                block_id: block_id.to_string(),
                reply,
            })
            .await
            .map_err(|_| SessionError::PickerClosed)?;
        debug!(block = block_id, "Picker opened");

        // A dropped request counts as a cancel.
        Ok(rx.await.unwrap_or(None))
    }
}

/// Receiving half, drained by the picker UI.
pub type PickerRequests = mpsc::Receiver<PickerRequest>;

/// Create a picker channel with room for `capacity` queued requests.
pub fn media_picker_channel(capacity: usize) -> (MediaPicker, PickerRequests) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (MediaPicker { tx }, rx)
}
