//! Authoring-side image block tool.
//!
//! The tool moves between three states:
//!
//! ```text
//! Empty --begin_upload--> Uploading --finish_upload(ok)--> Populated
//!   ^                        |
//!   +--finish_upload(err)----+
//!
//! any state --select_existing--> Populated
//! ```
//!
//! Uploads are split in two halves so the network request can run without
//! holding the tool: [`ImageTool::begin_upload`] validates the file and hands
//! out a ticket, [`ImageTool::finish_upload`] applies the outcome. Whatever
//! lands last wins.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use folio_content::{DisplayFlag, ImageBlockData, SaveOptions, validate_image_data};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::{RemoteError, ToolError};
use crate::media::MediaSelection;
use crate::tool::{BlockTool, EditorHost, NoopHost, SettingButton, Toolbox};
use crate::upload::{UploadFile, UploadPolicy, UploadedFile};

const TOOLBOX_ICON: &str = r#"<svg width="17" height="15" viewBox="0 0 336 276"><path d="M291 150V79c0-19-15-34-34-34H79c-19 0-34 15-34 34v42l67-44 81 72 56-29 42 30zm0 52l-43-30-56 30-81-67-66 39v23c0 19 15 34 34 34h178c17 0 31-13 34-29zM79 0h178c44 0 79 35 79 79v118c0 44-35 79-79 79H79c-44 0-79-35-79-79V79C0 35 35 0 79 0z"/></svg>"#;

/// Lifecycle state of an image block while it is being edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolState {
    Empty,
    Uploading,
    Populated,
}

impl fmt::Display for ToolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ToolState::Empty => "empty",
            ToolState::Uploading => "uploading",
            ToolState::Populated => "populated",
        })
    }
}

/// Handle for one in-flight upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UploadTicket(u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolConfig {
    pub read_only: bool,
    pub save: SaveOptions,
}

/// What the editor should draw for the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageView {
    /// Upload / choose-existing prompt, with the last failure if any.
    Placeholder {
        error: Option<String>,
        can_choose_existing: bool,
    },
    Uploading,
    Image {
        url: String,
        caption: String,
        classes: Vec<String>,
        caption_editable: bool,
    },
}

pub struct ImageTool {
    block_id: String,
    data: ImageBlockData,
    state: ToolState,
    in_flight: BTreeSet<u64>,
    next_ticket: u64,
    caption_draft: Option<String>,
    last_error: Option<String>,
    config: ToolConfig,
    host: Arc<dyn EditorHost>,
}

impl fmt::Debug for ImageTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageTool")
            .field("block_id", &self.block_id)
            .field("data", &self.data)
            .field("state", &self.state)
            .field("in_flight", &self.in_flight.len())
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl ImageTool {
    /// Build the tool from raw persisted data in either image shape.
    pub fn new(block_id: impl Into<String>, raw: &Value, config: ToolConfig) -> Self {
        Self::from_data(block_id, ImageBlockData::normalize(raw), config)
    }

    pub fn from_data(
        block_id: impl Into<String>,
        data: ImageBlockData,
        config: ToolConfig,
    ) -> Self {
        let state = if data.is_empty() {
            ToolState::Empty
        } else {
            ToolState::Populated
        };
        Self {
            block_id: block_id.into(),
            data,
            state,
            in_flight: BTreeSet::new(),
            next_ticket: 0,
            caption_draft: None,
            last_error: None,
            config,
            host: Arc::new(NoopHost),
        }
    }

    pub fn with_host(mut self, host: Arc<dyn EditorHost>) -> Self {
        self.host = host;
        self
    }

    pub fn block_id(&self) -> &str {
        &self.block_id
    }

    pub fn data(&self) -> &ImageBlockData {
        &self.data
    }

    pub fn state(&self) -> ToolState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn caption_draft(&self) -> Option<&str> {
        self.caption_draft.as_deref()
    }

    pub fn uploads_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn ensure_writable(&self) -> Result<(), ToolError> {
        if self.config.read_only {
            Err(ToolError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn ensure_populated(&self, operation: &'static str) -> Result<(), ToolError> {
        self.ensure_writable()?;
        if self.state != ToolState::Populated {
            return Err(ToolError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Validate `file` and move to `Uploading`.
    ///
    /// A rejected file leaves the block exactly as it was.
    #[instrument(skip(self, file, policy), fields(block = %self.block_id, file = %file.name))]
    pub fn begin_upload(
        &mut self,
        file: &UploadFile,
        policy: &UploadPolicy,
    ) -> Result<UploadTicket, ToolError> {
        self.ensure_writable()?;
        if self.state == ToolState::Populated {
            return Err(ToolError::InvalidState {
                operation: "upload",
                state: self.state,
            });
        }
        if let Err(rejection) = policy.check(file) {
            debug!(%rejection, "File rejected before upload");
            self.last_error = Some(rejection.to_string());
            return Err(rejection.into());
        }

        self.next_ticket += 1;
        let ticket = UploadTicket(self.next_ticket);
        self.in_flight.insert(ticket.0);
        self.state = ToolState::Uploading;
        self.last_error = None;
        debug!(ticket = ticket.0, "Upload started");
        Ok(ticket)
    }

    /// Apply the outcome of an upload started with [`Self::begin_upload`].
    ///
    /// On success the url replaces the current image; the caption, any
    /// caption draft and the display flags are kept.
    /// On failure the block returns to `Empty` unless another upload is still
    /// running or another operation has populated it in the meantime.
    #[instrument(skip(self, outcome), fields(block = %self.block_id, ticket = ticket.0))]
    pub fn finish_upload(
        &mut self,
        ticket: UploadTicket,
        outcome: Result<UploadedFile, RemoteError>,
    ) -> Result<&ImageBlockData, ToolError> {
        if !self.in_flight.remove(&ticket.0) {
            warn!("Upload finished for a ticket that is not in flight");
            return Err(ToolError::StaleTicket);
        }

        match outcome {
            Ok(file) if !file.url.is_empty() => {
                self.data.url = file.url;
                self.state = ToolState::Populated;
                self.last_error = None;
                debug!(url = %self.data.url, "Upload applied");
                Ok(&self.data)
            }
            Ok(_) => self.fail_upload(RemoteError::InvalidResponse(
                "upload returned an empty url".into(),
            )),
            Err(err) => self.fail_upload(err),
        }
    }

    fn fail_upload(&mut self, err: RemoteError) -> Result<&ImageBlockData, ToolError> {
        warn!(error = %err, "Upload failed");
        self.last_error = Some(err.to_string());
        if self.state == ToolState::Uploading && self.in_flight.is_empty() {
            self.state = ToolState::Empty;
        }
        Err(err.into())
    }

    /// Replace the image with one chosen from the media library.
    ///
    /// Valid from any state. Display flags are preserved.
    #[instrument(skip(self, selection), fields(block = %self.block_id, url = %selection.url))]
    pub fn select_existing(
        &mut self,
        selection: MediaSelection,
    ) -> Result<&ImageBlockData, ToolError> {
        self.ensure_writable()?;
        if selection.url.is_empty() {
            return Err(ToolError::EmptySelection);
        }
        self.data.url = selection.url;
        self.data.caption = selection.caption;
        self.caption_draft = None;
        self.state = ToolState::Populated;
        self.last_error = None;
        Ok(&self.data)
    }

    /// Flip a display flag and return its new value.
    pub fn toggle_flag(&mut self, flag: DisplayFlag) -> Result<bool, ToolError> {
        self.ensure_populated("toggle a flag")?;
        let value = self.data.toggle_flag(flag);
        if flag == DisplayFlag::Stretched {
            self.host.stretch_block(&self.block_id, value);
        }
        debug!(block = %self.block_id, flag = flag.key(), value, "Flag toggled");
        Ok(value)
    }

    /// Record caption keystrokes. Nothing is committed until [`Self::blur_caption`].
    pub fn edit_caption(&mut self, text: impl Into<String>) -> Result<(), ToolError> {
        self.ensure_populated("edit the caption")?;
        self.caption_draft = Some(text.into());
        Ok(())
    }

    /// Commit the caption draft. Returns whether the caption changed.
    pub fn blur_caption(&mut self) -> Result<bool, ToolError> {
        self.ensure_populated("edit the caption")?;
        match self.caption_draft.take() {
            Some(draft) if draft != self.data.caption => {
                self.data.caption = draft;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl BlockTool for ImageTool {
    type View = ImageView;

    fn toolbox(&self) -> Toolbox {
        Toolbox {
            title: "Image",
            icon: TOOLBOX_ICON,
        }
    }

    fn render(&self) -> ImageView {
        match self.state {
            ToolState::Empty => ImageView::Placeholder {
                error: self.last_error.clone(),
                can_choose_existing: !self.config.read_only,
            },
            ToolState::Uploading => ImageView::Uploading,
            ToolState::Populated => ImageView::Image {
                url: self.data.url.clone(),
                caption: self
                    .caption_draft
                    .clone()
                    .unwrap_or_else(|| self.data.caption.clone()),
                classes: self
                    .data
                    .active_flags()
                    .map(|flag| format!("image-tool--{}", flag.key()))
                    .collect(),
                caption_editable: !self.config.read_only,
            },
        }
    }

    fn settings(&self) -> Vec<SettingButton> {
        DisplayFlag::ALL
            .into_iter()
            .map(|flag| SettingButton {
                flag,
                label: match flag {
                    DisplayFlag::WithBorder => "With border",
                    DisplayFlag::WithBackground => "With background",
                    DisplayFlag::Stretched => "Stretch image",
                },
                active: self.data.flag(flag),
            })
            .collect()
    }

    fn save(&self) -> Value {
        self.data.persist(self.config.save)
    }

    fn validate(&self, saved: &Value) -> bool {
        validate_image_data(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHost {
        calls: Mutex<Vec<(String, bool)>>,
    }

    impl EditorHost for RecordingHost {
        fn stretch_block(&self, block_id: &str, stretched: bool) {
            self.calls.lock().unwrap().push((block_id.to_string(), stretched));
        }
    }

    fn png() -> UploadFile {
        UploadFile::new("cat.png", "image/png", vec![0u8; 16])
    }

    fn uploaded(url: &str, name: Option<&str>) -> UploadedFile {
        UploadedFile {
            url: url.into(),
            name: name.map(Into::into),
        }
    }

    fn empty_tool() -> ImageTool {
        ImageTool::new("b1", &json!({}), ToolConfig::default())
    }

    #[test]
    fn test_initial_state_follows_data() {
        assert_eq!(empty_tool().state(), ToolState::Empty);
        let tool = ImageTool::new("b1", &json!({"file": {"url": "/a.png"}}), ToolConfig::default());
        assert_eq!(tool.state(), ToolState::Populated);
        assert_eq!(tool.data().url, "/a.png");
    }

    #[test]
    fn test_upload_success_sets_url_only() {
        let mut tool = empty_tool();
        let ticket = tool.begin_upload(&png(), &UploadPolicy::default()).unwrap();
        assert_eq!(tool.state(), ToolState::Uploading);
        assert_eq!(tool.render(), ImageView::Uploading);

        let data = tool
            .finish_upload(ticket, Ok(uploaded("/storage/cat.png", Some("cat.png"))))
            .unwrap();
        assert_eq!(data.url, "/storage/cat.png");
        assert_eq!(data.caption, "");
        assert_eq!(tool.state(), ToolState::Populated);
    }

    #[test]
    fn test_upload_keeps_existing_caption() {
        let mut tool =
            ImageTool::new("b1", &json!({"caption": "Hero shot"}), ToolConfig::default());
        assert_eq!(tool.state(), ToolState::Empty);

        let file = UploadFile::new("IMG_2034.jpg", "image/jpeg", vec![0u8; 4]);
        let ticket = tool.begin_upload(&file, &UploadPolicy::default()).unwrap();
        tool.finish_upload(ticket, Ok(uploaded("/storage/IMG_2034.jpg", Some("IMG_2034.jpg"))))
            .unwrap();

        assert_eq!(tool.data().caption, "Hero shot");
        assert_eq!(
            folio_content::render_block(&folio_content::Block::image(tool.data().clone())),
            r#"<figure><img src="/storage/IMG_2034.jpg" alt="Hero shot" loading="lazy" /><figcaption>Hero shot</figcaption></figure>"#
        );
    }

    #[test]
    fn test_upload_failure_reverts_to_empty_with_error() {
        let mut tool = empty_tool();
        let ticket = tool.begin_upload(&png(), &UploadPolicy::default()).unwrap();
        let err = tool
            .finish_upload(ticket, Err(RemoteError::Rejected("too big".into())))
            .unwrap_err();
        assert!(matches!(err, ToolError::Upload(RemoteError::Rejected(_))));
        assert_eq!(tool.state(), ToolState::Empty);
        assert_eq!(tool.data(), &ImageBlockData::default());
        assert!(matches!(
            tool.render(),
            ImageView::Placeholder { error: Some(_), .. }
        ));
    }

    #[test]
    fn test_rejected_file_leaves_block_unchanged() {
        let mut tool = empty_tool();
        let pdf = UploadFile::new("cv.pdf", "application/pdf", vec![1]);
        let err = tool.begin_upload(&pdf, &UploadPolicy::default()).unwrap_err();
        assert!(matches!(err, ToolError::Rejected(_)));
        assert_eq!(tool.state(), ToolState::Empty);
        assert_eq!(tool.uploads_in_flight(), 0);
    }

    #[test]
    fn test_upload_not_allowed_when_populated() {
        let mut tool =
            ImageTool::from_data("b1", ImageBlockData::new("/a.png"), ToolConfig::default());
        let err = tool.begin_upload(&png(), &UploadPolicy::default()).unwrap_err();
        assert!(matches!(
            err,
            ToolError::InvalidState {
                state: ToolState::Populated,
                ..
            }
        ));
    }

    #[test]
    fn test_failure_keeps_uploading_while_another_upload_runs() {
        let mut tool = empty_tool();
        let first = tool.begin_upload(&png(), &UploadPolicy::default()).unwrap();
        let second = tool.begin_upload(&png(), &UploadPolicy::default()).unwrap();

        let _ = tool.finish_upload(first, Err(RemoteError::Transport("reset".into())));
        assert_eq!(tool.state(), ToolState::Uploading);

        tool.finish_upload(second, Ok(uploaded("/b.png", None))).unwrap();
        assert_eq!(tool.state(), ToolState::Populated);
        assert_eq!(tool.data().url, "/b.png");
    }

    #[test]
    fn test_stale_ticket_is_refused() {
        let mut tool = empty_tool();
        let ticket = tool.begin_upload(&png(), &UploadPolicy::default()).unwrap();
        tool.finish_upload(ticket, Ok(uploaded("/a.png", None))).unwrap();
        assert!(matches!(
            tool.finish_upload(ticket, Ok(uploaded("/b.png", None))),
            Err(ToolError::StaleTicket)
        ));
        assert_eq!(tool.data().url, "/a.png");
    }

    #[test]
    fn test_select_existing_preserves_flags() {
        let mut data = ImageBlockData::new("/old.png").with_caption("old");
        data.set_flag(DisplayFlag::WithBorder, true);
        let mut tool = ImageTool::from_data("b1", data, ToolConfig::default());

        let data = tool
            .select_existing(MediaSelection::new("/new.png", "A new one"))
            .unwrap();
        assert_eq!(data.url, "/new.png");
        assert_eq!(data.caption, "A new one");
        assert!(data.with_border);
    }

    #[test]
    fn test_select_existing_while_uploading_then_upload_lands() {
        let mut tool = empty_tool();
        let ticket = tool.begin_upload(&png(), &UploadPolicy::default()).unwrap();
        tool.select_existing(MediaSelection::new("/picked.png", "picked"))
            .unwrap();
        assert_eq!(tool.state(), ToolState::Populated);

        tool.finish_upload(ticket, Ok(uploaded("/uploaded.png", None)))
            .unwrap();
        assert_eq!(tool.data().url, "/uploaded.png");
        assert_eq!(tool.data().caption, "picked");
    }

    #[test]
    fn test_late_upload_failure_does_not_clear_selection() {
        let mut tool = empty_tool();
        let ticket = tool.begin_upload(&png(), &UploadPolicy::default()).unwrap();
        tool.select_existing(MediaSelection::new("/picked.png", "picked"))
            .unwrap();

        assert!(tool
            .finish_upload(ticket, Err(RemoteError::Transport("timeout".into())))
            .is_err());
        assert_eq!(tool.state(), ToolState::Populated);
        assert_eq!(tool.data().url, "/picked.png");
    }

    #[test]
    fn test_empty_selection_is_refused() {
        let mut tool = empty_tool();
        assert!(matches!(
            tool.select_existing(MediaSelection::new("", "x")),
            Err(ToolError::EmptySelection)
        ));
        assert_eq!(tool.state(), ToolState::Empty);
    }

    #[test]
    fn test_toggle_flag_requires_populated() {
        let mut tool = empty_tool();
        assert!(matches!(
            tool.toggle_flag(DisplayFlag::WithBorder),
            Err(ToolError::InvalidState {
                state: ToolState::Empty,
                ..
            })
        ));
    }

    #[test]
    fn test_stretch_toggle_notifies_host() {
        let host = Arc::new(RecordingHost::default());
        let mut tool =
            ImageTool::from_data("b7", ImageBlockData::new("/a.png"), ToolConfig::default())
                .with_host(host.clone());

        assert!(tool.toggle_flag(DisplayFlag::Stretched).unwrap());
        assert!(tool.toggle_flag(DisplayFlag::WithBackground).unwrap());
        assert!(!tool.toggle_flag(DisplayFlag::Stretched).unwrap());

        assert_eq!(
            *host.calls.lock().unwrap(),
            vec![("b7".to_string(), true), ("b7".to_string(), false)]
        );
    }

    #[test]
    fn test_caption_commits_on_blur() {
        let mut tool = ImageTool::from_data(
            "b1",
            ImageBlockData::new("/a.png").with_caption("before"),
            ToolConfig::default(),
        );
        tool.edit_caption("after").unwrap();
        assert_eq!(tool.data().caption, "before");
        assert_eq!(tool.save()["caption"], json!("before"));

        assert!(tool.blur_caption().unwrap());
        assert_eq!(tool.data().caption, "after");
        assert!(!tool.blur_caption().unwrap());
    }

    #[test]
    fn test_read_only_refuses_edits() {
        let config = ToolConfig {
            read_only: true,
            ..Default::default()
        };
        let mut tool = ImageTool::from_data("b1", ImageBlockData::new("/a.png"), config);
        assert!(matches!(
            tool.toggle_flag(DisplayFlag::WithBorder),
            Err(ToolError::ReadOnly)
        ));
        assert!(matches!(
            tool.select_existing(MediaSelection::new("/b.png", "")),
            Err(ToolError::ReadOnly)
        ));
        match tool.render() {
            ImageView::Image {
                caption_editable, ..
            } => assert!(!caption_editable),
            other => panic!("unexpected view: {other:?}"),
        }
    }

    #[test]
    fn test_render_and_settings_reflect_flags() {
        let mut data = ImageBlockData::new("/a.png");
        data.set_flag(DisplayFlag::WithBackground, true);
        let tool = ImageTool::from_data("b1", data, ToolConfig::default());

        match tool.render() {
            ImageView::Image { classes, .. } => {
                assert_eq!(classes, vec!["image-tool--withBackground".to_string()])
            }
            other => panic!("unexpected view: {other:?}"),
        }
        let active: Vec<_> = tool
            .settings()
            .into_iter()
            .filter(|b| b.active)
            .map(|b| b.flag)
            .collect();
        assert_eq!(active, vec![DisplayFlag::WithBackground]);
        assert_eq!(tool.toolbox().title, "Image");
    }

    #[test]
    fn test_save_and_validate() {
        let config = ToolConfig {
            save: SaveOptions::with_legacy_mirror(),
            ..Default::default()
        };
        let tool = ImageTool::from_data("b1", ImageBlockData::new("/a.png"), config);
        let saved = tool.save();
        assert_eq!(saved["url"], json!("/a.png"));
        assert_eq!(saved["file"]["url"], json!("/a.png"));
        assert!(tool.validate(&saved));
        assert!(!tool.validate(&json!({"url": 5})));
    }
}
