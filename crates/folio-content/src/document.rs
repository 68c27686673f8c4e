//! Block document model: the persisted rich content of a post.
//!
//! A document is an ordered list of typed blocks, persisted as
//! `{ time, blocks: [{ id?, type, data }], version }`. Blocks whose type is
//! unknown, or whose data does not match their declared type, are kept as
//! [`OpaqueBlock`]s so that loading and saving never loses a block. Entries
//! of `blocks` that are not objects are skipped with a warning.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{ContentError, Result};
use crate::image::{ImageBlockData, SaveOptions, validate_image_data};

/// Schema version written into new documents.
pub const SCHEMA_VERSION: &str = "2.28.2";

/// Header levels accepted on load. The editor only produces 2 through 6.
pub const HEADER_LEVELS: std::ops::RangeInclusive<u8> = 1..=6;

/// The rich content of a post.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockDocument {
    /// Creation/modification time, epoch millis.
    #[serde(default)]
    pub time: i64,
    /// Blocks in display order.
    #[serde(default, deserialize_with = "deserialize_blocks")]
    pub blocks: Vec<Block>,
    /// Opaque schema version, carried through unchanged.
    #[serde(default)]
    pub version: String,
}

impl Default for BlockDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDocument {
    /// An empty document stamped with the current time.
    pub fn new() -> Self {
        Self {
            time: Utc::now().timestamp_millis(),
            blocks: Vec::new(),
            version: SCHEMA_VERSION.to_string(),
        }
    }

    pub fn with_blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks,
            ..Self::new()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(ContentError::NotADocument(format!(
                "expected an object, found {}",
                json_kind(&value)
            )));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Canonical JSON (no legacy image keys).
    pub fn to_json(&self) -> Result<String> {
        self.to_json_with(SaveOptions::default())
    }

    pub fn to_json_with(&self, options: SaveOptions) -> Result<String> {
        Ok(serde_json::to_string(&self.to_value_with(options))?)
    }

    pub fn to_value_with(&self, options: SaveOptions) -> Value {
        let mut map = Map::new();
        map.insert("time".into(), Value::from(self.time));
        map.insert(
            "blocks".into(),
            Value::Array(self.blocks.iter().map(|b| b.to_value(options)).collect()),
        );
        map.insert("version".into(), Value::String(self.version.clone()));
        Value::Object(map)
    }

    /// Stamp the document with the current time.
    pub fn touch(&mut self) {
        self.time = Utc::now().timestamp_millis();
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Image blocks with their positions.
    pub fn images(&self) -> impl Iterator<Item = (usize, &ImageBlockData)> {
        self.blocks
            .iter()
            .enumerate()
            .filter_map(|(i, b)| match &b.data {
                BlockData::Image(image) => Some((i, image)),
                _ => None,
            })
    }
}

/// Check every image block of a raw persisted document before a save.
pub fn validate_document(raw: &Value) -> Result<()> {
    let Some(blocks) = raw.get("blocks") else {
        return Ok(());
    };
    let Some(blocks) = blocks.as_array() else {
        return Err(ContentError::NotADocument("`blocks` is not an array".into()));
    };
    for (index, block) in blocks.iter().enumerate() {
        if block.get("type").and_then(Value::as_str) != Some("image") {
            continue;
        }
        let data = block.get("data").unwrap_or(&Value::Null);
        if !validate_image_data(data) {
            return Err(ContentError::InvalidImageBlock { index });
        }
    }
    Ok(())
}

fn deserialize_blocks<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<Block>, D::Error> {
    let raw: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| {
            let block = Block::from_value(value);
            if block.is_none() {
                warn!(index, "Skipping block entry that is not an object");
            }
            block
        })
        .collect())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// One block of a document.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    /// Editor-assigned block id, carried through when present.
    pub id: Option<String>,
    pub data: BlockData,
}

/// Type-specific payload of a block.
#[derive(Clone, Debug, PartialEq)]
pub enum BlockData {
    Paragraph(ParagraphData),
    Header(HeaderData),
    List(ListData),
    Quote(QuoteData),
    Code(CodeData),
    Table(TableData),
    Image(ImageBlockData),
    /// Unknown type, or data that does not match the declared type.
    Opaque(OpaqueBlock),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParagraphData {
    /// May contain inline HTML from the editor toolbar.
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeaderData {
    pub text: String,
    pub level: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListStyle {
    Ordered,
    #[default]
    Unordered,
}

impl ListStyle {
    pub fn tag(&self) -> &'static str {
        match self {
            ListStyle::Ordered => "ol",
            ListStyle::Unordered => "ul",
        }
    }
}

/// A list entry: a plain string, or an item with nested children.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListItem {
    Text(String),
    Nested {
        content: String,
        #[serde(default)]
        items: Vec<ListItem>,
    },
}

impl ListItem {
    pub fn content(&self) -> &str {
        match self {
            ListItem::Text(text) => text,
            ListItem::Nested { content, .. } => content,
        }
    }

    pub fn children(&self) -> &[ListItem] {
        match self {
            ListItem::Text(_) => &[],
            ListItem::Nested { items, .. } => items,
        }
    }
}

impl From<&str> for ListItem {
    fn from(text: &str) -> Self {
        ListItem::Text(text.to_string())
    }
}

impl From<String> for ListItem {
    fn from(text: String) -> Self {
        ListItem::Text(text)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListData {
    #[serde(default)]
    pub style: ListStyle,
    pub items: Vec<ListItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteData {
    pub text: String,
    #[serde(default)]
    pub caption: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CodeData {
    /// Raw source text. Not HTML-escaped.
    pub code: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    #[serde(
        default,
        rename = "withHeadings",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub with_headings: bool,
    pub content: Vec<Vec<String>>,
}

/// A block carried through untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct OpaqueBlock {
    pub block_type: String,
    pub data: Value,
}

impl Block {
    pub fn new(data: BlockData) -> Self {
        Self { id: None, data }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::new(BlockData::Paragraph(ParagraphData { text: text.into() }))
    }

    pub fn header(text: impl Into<String>, level: u8) -> Self {
        Self::new(BlockData::Header(HeaderData {
            text: text.into(),
            level,
        }))
    }

    pub fn list<I, T>(style: ListStyle, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ListItem>,
    {
        Self::new(BlockData::List(ListData {
            style,
            items: items.into_iter().map(Into::into).collect(),
        }))
    }

    pub fn quote(text: impl Into<String>, caption: impl Into<String>) -> Self {
        Self::new(BlockData::Quote(QuoteData {
            text: text.into(),
            caption: caption.into(),
        }))
    }

    pub fn code(code: impl Into<String>) -> Self {
        Self::new(BlockData::Code(CodeData { code: code.into() }))
    }

    pub fn table(content: Vec<Vec<String>>) -> Self {
        Self::new(BlockData::Table(TableData {
            with_headings: false,
            content,
        }))
    }

    pub fn image(image: ImageBlockData) -> Self {
        Self::new(BlockData::Image(image))
    }

    pub fn opaque(block_type: impl Into<String>, data: Value) -> Self {
        Self::new(BlockData::Opaque(OpaqueBlock {
            block_type: block_type.into(),
            data,
        }))
    }

    /// The persisted `type` tag.
    pub fn type_name(&self) -> &str {
        match &self.data {
            BlockData::Paragraph(_) => "paragraph",
            BlockData::Header(_) => "header",
            BlockData::List(_) => "list",
            BlockData::Quote(_) => "quote",
            BlockData::Code(_) => "code",
            BlockData::Table(_) => "table",
            BlockData::Image(_) => "image",
            BlockData::Opaque(opaque) => &opaque.block_type,
        }
    }

    pub fn as_image(&self) -> Option<&ImageBlockData> {
        match &self.data {
            BlockData::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn as_image_mut(&mut self) -> Option<&mut ImageBlockData> {
        match &mut self.data {
            BlockData::Image(image) => Some(image),
            _ => None,
        }
    }

    /// Parse one persisted block. Returns `None` only for non-object entries.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut obj) = value else {
            return None;
        };
        let id = obj.get("id").and_then(Value::as_str).map(str::to_owned);
        let block_type = obj
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let data = obj.remove("data").unwrap_or(Value::Null);

        Some(Self {
            id,
            data: BlockData::parse(block_type, data),
        })
    }

    /// Persisted `{id?, type, data}` form.
    pub fn to_value(&self, options: SaveOptions) -> Value {
        let data = match &self.data {
            BlockData::Paragraph(d) => to_data(d),
            BlockData::Header(d) => to_data(d),
            BlockData::List(d) => to_data(d),
            BlockData::Quote(d) => to_data(d),
            BlockData::Code(d) => to_data(d),
            BlockData::Table(d) => to_data(d),
            BlockData::Image(d) => d.persist(options),
            BlockData::Opaque(o) => o.data.clone(),
        };

        let mut map = Map::new();
        if let Some(id) = &self.id {
            map.insert("id".into(), Value::String(id.clone()));
        }
        map.insert("type".into(), Value::String(self.type_name().to_owned()));
        map.insert("data".into(), data);
        Value::Object(map)
    }
}

impl BlockData {
    fn parse(block_type: String, data: Value) -> Self {
        let parsed = match block_type.as_str() {
            "paragraph" => typed(&data).map(BlockData::Paragraph),
            "header" => typed::<HeaderData>(&data)
                .filter(|h| HEADER_LEVELS.contains(&h.level))
                .map(BlockData::Header),
            "list" => typed(&data).map(BlockData::List),
            "quote" => typed(&data).map(BlockData::Quote),
            "code" => typed(&data).map(BlockData::Code),
            "table" => typed(&data).map(BlockData::Table),
            "image" if data.is_object() => Some(BlockData::Image(ImageBlockData::normalize(&data))),
            "image" => None,
            other => {
                debug!(block_type = other, "Carrying unknown block type through");
                return BlockData::Opaque(OpaqueBlock { block_type, data });
            }
        };

        parsed.unwrap_or_else(|| {
            warn!(
                block_type = %block_type,
                "Block data does not match its type, keeping it opaque"
            );
            BlockData::Opaque(OpaqueBlock { block_type, data })
        })
    }
}

fn typed<T: DeserializeOwned>(data: &Value) -> Option<T> {
    T::deserialize(data).ok()
}

fn to_data<T: Serialize>(data: &T) -> Value {
    serde_json::to_value(data).unwrap_or_default()
}

impl Serialize for Block {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value(SaveOptions::default()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Block {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Block::from_value(value).ok_or_else(|| serde::de::Error::custom("block must be an object"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_document_is_stamped() {
        let doc = BlockDocument::new();
        assert!(doc.is_empty());
        assert!(doc.time > 0);
        assert_eq!(doc.version, SCHEMA_VERSION);
    }

    #[test]
    fn test_load_all_known_types() {
        let doc = BlockDocument::from_value(json!({
            "time": 1700000000000i64,
            "version": "2.28.2",
            "blocks": [
                {"id": "p1", "type": "paragraph", "data": {"text": "Hello <i>world</i>"}},
                {"type": "header", "data": {"text": "Title", "level": 3}},
                {"type": "list", "data": {"style": "ordered", "items": ["one", "two"]}},
                {"type": "quote", "data": {"text": "Be brief"}},
                {"type": "code", "data": {"code": "<script>x()</script>"}},
                {"type": "table", "data": {"content": [["a", "b"], ["c", "d"]]}},
                {"type": "image", "data": {"file": {"url": "/img/a.png"}}}
            ]
        }))
        .unwrap();

        assert_eq!(doc.time, 1_700_000_000_000);
        assert_eq!(doc.len(), 7);
        assert_eq!(doc.blocks[0].id.as_deref(), Some("p1"));
        assert_eq!(doc.blocks[0], Block::paragraph("Hello <i>world</i>").with_id("p1"));
        assert_eq!(doc.blocks[1], Block::header("Title", 3));
        assert_eq!(doc.blocks[2], Block::list(ListStyle::Ordered, ["one", "two"]));
        assert_eq!(doc.blocks[3], Block::quote("Be brief", ""));
        assert_eq!(doc.blocks[4], Block::code("<script>x()</script>"));
        assert_eq!(
            doc.blocks[5],
            Block::table(vec![
                vec!["a".into(), "b".into()],
                vec!["c".into(), "d".into()]
            ])
        );
        assert_eq!(doc.blocks[6], Block::image(ImageBlockData::new("/img/a.png")));
    }

    #[test]
    fn test_unknown_and_malformed_blocks_stay_opaque() {
        let doc = BlockDocument::from_value(json!({
            "blocks": [
                {"type": "embed", "data": {"service": "youtube"}},
                {"type": "header", "data": {"text": "No level"}},
                {"type": "header", "data": {"text": "Too deep", "level": 9}},
                {"type": "list", "data": {"style": "checklist", "items": ["x"]}},
                {"type": "image", "data": "not-an-object"}
            ]
        }))
        .unwrap();

        assert_eq!(doc.len(), 5);
        for block in &doc.blocks {
            assert!(matches!(block.data, BlockData::Opaque(_)), "{block:?}");
        }
        assert_eq!(doc.blocks[0].type_name(), "embed");
        assert_eq!(doc.blocks[1].type_name(), "header");
    }

    #[test]
    fn test_opaque_blocks_round_trip_unchanged() {
        let raw = json!({"id": "e1", "type": "embed", "data": {"service": "youtube", "width": 580}});
        let block = Block::from_value(raw.clone()).unwrap();
        assert_eq!(block.to_value(SaveOptions::default()), raw);
    }

    #[test]
    fn test_non_object_entries_are_skipped() {
        let doc = BlockDocument::from_value(json!({
            "blocks": [42, {"type": "paragraph", "data": {"text": "kept"}}, null]
        }))
        .unwrap();
        assert_eq!(doc.blocks, vec![Block::paragraph("kept")]);

        let saved = doc.to_value_with(SaveOptions::default());
        assert_eq!(saved["blocks"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_missing_fields_default() {
        let doc = BlockDocument::from_value(json!({})).unwrap();
        assert!(doc.blocks.is_empty());
        assert_eq!(doc.time, 0);
        assert_eq!(doc.version, "");

        let doc = BlockDocument::from_value(json!({"blocks": null})).unwrap();
        assert!(doc.blocks.is_empty());
    }

    #[test]
    fn test_non_object_document_is_rejected() {
        let err = BlockDocument::from_json("[1, 2]").unwrap_err();
        assert!(matches!(err, ContentError::NotADocument(_)));

        let err = BlockDocument::from_json("{not json").unwrap_err();
        assert!(matches!(err, ContentError::Json(_)));
    }

    #[test]
    fn test_nested_list_items() {
        let raw = json!({
            "type": "list",
            "data": {
                "style": "unordered",
                "items": [
                    "plain",
                    {"content": "parent", "items": [{"content": "child", "items": []}], "meta": {}}
                ]
            }
        });
        let block = Block::from_value(raw).unwrap();
        let BlockData::List(list) = &block.data else {
            panic!("expected a list, got {block:?}");
        };
        assert_eq!(list.items[0], ListItem::Text("plain".into()));
        assert_eq!(list.items[1].content(), "parent");
        assert_eq!(list.items[1].children()[0].content(), "child");

        let saved = block.to_value(SaveOptions::default());
        assert_eq!(saved["data"]["items"][0], json!("plain"));
        assert_eq!(saved["data"]["items"][1]["content"], json!("parent"));
    }

    #[test]
    fn test_list_style_defaults_to_unordered() {
        let block = Block::from_value(json!({"type": "list", "data": {"items": ["a"]}})).unwrap();
        assert_eq!(block, Block::list(ListStyle::Unordered, ["a"]));
    }

    #[test]
    fn test_document_round_trip() {
        let mut doc = BlockDocument::with_blocks(vec![
            Block::header("Intro", 2).with_id("h"),
            Block::paragraph("Body"),
            Block::image(ImageBlockData::new("/a.png").with_caption("A")),
            Block::opaque("delimiter", json!({})),
        ]);
        doc.version = "2.30.0".into();

        let json = doc.to_json().unwrap();
        assert_eq!(BlockDocument::from_json(&json).unwrap(), doc);

        let legacy = doc.to_json_with(SaveOptions::with_legacy_mirror()).unwrap();
        assert!(legacy.contains(r#""file":{"url":"/a.png"}"#));
        assert_eq!(BlockDocument::from_json(&legacy).unwrap(), doc);
    }

    #[test]
    fn test_table_headings_flag() {
        let block = Block::from_value(json!({
            "type": "table",
            "data": {"withHeadings": true, "content": [["h"], ["v"]]}
        }))
        .unwrap();
        let BlockData::Table(table) = &block.data else {
            panic!("expected a table");
        };
        assert!(table.with_headings);
        assert_eq!(block.to_value(SaveOptions::default())["data"]["withHeadings"], json!(true));

        let plain = Block::table(vec![vec!["x".into()]]).to_value(SaveOptions::default());
        assert!(plain["data"].get("withHeadings").is_none());
    }

    #[test]
    fn test_validate_document() {
        assert!(validate_document(&json!({"blocks": [
            {"type": "image", "data": {}},
            {"type": "image", "data": {"file": {"url": "/a.png"}}},
            {"type": "paragraph", "data": {"text": 5}}
        ]}))
        .is_ok());

        let err = validate_document(&json!({"blocks": [
            {"type": "image", "data": {"url": "/ok.png"}},
            {"type": "image", "data": {"url": 123}}
        ]}))
        .unwrap_err();
        assert!(matches!(err, ContentError::InvalidImageBlock { index: 1 }));

        assert!(validate_document(&json!({"blocks": {}})).is_err());
    }

    #[test]
    fn test_images_iterator() {
        let doc = BlockDocument::with_blocks(vec![
            Block::paragraph("x"),
            Block::image(ImageBlockData::new("/a.png")),
        ]);
        let images: Vec<_> = doc.images().collect();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].0, 1);
        assert_eq!(images[0].1.url, "/a.png");
    }
}
