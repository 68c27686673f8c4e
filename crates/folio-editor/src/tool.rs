//! The contract every block tool exposes to the editor host.

use folio_content::DisplayFlag;
use serde_json::Value;

/// Entry shown in the editor's "add block" menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toolbox {
    pub title: &'static str,
    pub icon: &'static str,
}

/// One toggle in a block's settings menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingButton {
    pub flag: DisplayFlag,
    pub label: &'static str,
    pub active: bool,
}

/// A block tool: renders its own editing view and persists its own data.
pub trait BlockTool: Send + Sync {
    type View;

    fn toolbox(&self) -> Toolbox;

    fn render(&self) -> Self::View;

    fn settings(&self) -> Vec<SettingButton>;

    /// Data to persist for this block.
    fn save(&self) -> Value;

    /// Whether saved data is acceptable for persistence.
    fn validate(&self, saved: &Value) -> bool;
}

/// Callbacks into the surrounding editor.
pub trait EditorHost: Send + Sync {
    /// Ask the editor to widen or restore the block's layout.
    fn stretch_block(&self, block_id: &str, stretched: bool);
}

/// Host that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHost;

impl EditorHost for NoopHost {
    fn stretch_block(&self, _block_id: &str, _stretched: bool) {}
}
