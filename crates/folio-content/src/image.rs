//! Image block data and its normalization.
//!
//! Stored posts carry image blocks in two shapes: `{url, caption, ...}` and
//! the older `{file: {url}, caption, ...}`. Both load into the canonical
//! [`ImageBlockData`]; on save only the canonical fields are written unless
//! [`SaveOptions::legacy_file_mirror`] asks for the nested `file.url` copy.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// Keys are part of the persisted format.
const URL_KEY: &str = "url";
const FILE_KEY: &str = "file";
const CAPTION_KEY: &str = "caption";

/// Canonical in-memory shape of an image block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBlockData {
    /// Absolute or relative image URL. Empty means the block has no image yet.
    pub url: String,
    pub caption: String,
    pub with_border: bool,
    pub with_background: bool,
    pub stretched: bool,
}

/// Toggle-able display flags of an image block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DisplayFlag {
    WithBorder,
    WithBackground,
    Stretched,
}

impl DisplayFlag {
    pub const ALL: [DisplayFlag; 3] = [
        DisplayFlag::WithBorder,
        DisplayFlag::WithBackground,
        DisplayFlag::Stretched,
    ];

    /// Persisted key of the flag.
    pub fn key(&self) -> &'static str {
        match self {
            DisplayFlag::WithBorder => "withBorder",
            DisplayFlag::WithBackground => "withBackground",
            DisplayFlag::Stretched => "stretched",
        }
    }

    /// CSS hook applied by the HTML projection when the flag is set.
    pub fn css_class(&self) -> &'static str {
        match self {
            DisplayFlag::WithBorder => "image-with-border",
            DisplayFlag::WithBackground => "image-with-background",
            DisplayFlag::Stretched => "image-stretched",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| flag.key() == key)
    }
}

/// Options for the save direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Also write `file: {url}` for consumers that still read the nested key.
    pub legacy_file_mirror: bool,
}

impl SaveOptions {
    pub fn with_legacy_mirror() -> Self {
        Self {
            legacy_file_mirror: true,
        }
    }
}

impl ImageBlockData {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    /// Whether the block is still an empty draft.
    pub fn is_empty(&self) -> bool {
        self.url.is_empty()
    }

    /// Resolve either persisted shape into the canonical form.
    ///
    /// Never fails: anything without a usable URL becomes an empty block, and
    /// flags or captions of the wrong type fall back to their defaults.
    pub fn normalize(raw: &Value) -> Self {
        let non_empty = |v: Option<&Value>| {
            v.and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };

        let url = non_empty(raw.get(URL_KEY))
            .or_else(|| non_empty(raw.get(FILE_KEY).and_then(|f| f.get(URL_KEY))))
            .unwrap_or_default();

        let flag = |flag: DisplayFlag| {
            raw.get(flag.key())
                .and_then(Value::as_bool)
                .unwrap_or(false)
        };

        Self {
            url,
            caption: raw
                .get(CAPTION_KEY)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            with_border: flag(DisplayFlag::WithBorder),
            with_background: flag(DisplayFlag::WithBackground),
            stretched: flag(DisplayFlag::Stretched),
        }
    }

    /// Persisted payload for this block.
    pub fn persist(&self, options: SaveOptions) -> Value {
        let mut map = Map::new();
        map.insert(URL_KEY.into(), Value::String(self.url.clone()));
        map.insert(CAPTION_KEY.into(), Value::String(self.caption.clone()));
        for flag in DisplayFlag::ALL {
            map.insert(flag.key().into(), Value::Bool(self.flag(flag)));
        }
        if options.legacy_file_mirror {
            let mut file = Map::new();
            file.insert(URL_KEY.into(), Value::String(self.url.clone()));
            map.insert(FILE_KEY.into(), Value::Object(file));
        }
        Value::Object(map)
    }

    pub fn flag(&self, flag: DisplayFlag) -> bool {
        match flag {
            DisplayFlag::WithBorder => self.with_border,
            DisplayFlag::WithBackground => self.with_background,
            DisplayFlag::Stretched => self.stretched,
        }
    }

    pub fn set_flag(&mut self, flag: DisplayFlag, value: bool) {
        match flag {
            DisplayFlag::WithBorder => self.with_border = value,
            DisplayFlag::WithBackground => self.with_background = value,
            DisplayFlag::Stretched => self.stretched = value,
        }
    }

    /// Flip a flag and return its new value.
    pub fn toggle_flag(&mut self, flag: DisplayFlag) -> bool {
        let value = !self.flag(flag);
        self.set_flag(flag, value);
        value
    }

    /// Active flags in persisted-key order.
    pub fn active_flags(&self) -> impl Iterator<Item = DisplayFlag> + '_ {
        DisplayFlag::ALL.into_iter().filter(|f| self.flag(*f))
    }
}

impl<'de> Deserialize<'de> for ImageBlockData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(Self::normalize(&raw))
    }
}

/// Check a raw image payload before a save is accepted.
///
/// Accepts empty drafts (no `url`, or an empty one, and no `file`), a
/// non-empty string `url`, or a non-empty string `file.url`. Rejects
/// everything else, including a `url` of the wrong type.
pub fn validate_image_data(raw: &Value) -> bool {
    let Some(obj) = raw.as_object() else {
        return false;
    };

    match obj.get(URL_KEY) {
        Some(Value::String(url)) if !url.is_empty() => return true,
        Some(Value::String(_)) | Some(Value::Null) | None => {}
        Some(_) => return false,
    }

    match obj.get(FILE_KEY) {
        None | Some(Value::Null) => true,
        Some(file) => file
            .get(URL_KEY)
            .and_then(Value::as_str)
            .is_some_and(|url| !url.is_empty()),
    }
}
