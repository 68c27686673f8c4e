//! Reading content files: either a bare block document or a post object
//! carrying the document under `content`.

use std::path::Path;

use anyhow::{Context, Result, bail};
use folio_content::BlockDocument;
use serde_json::Value;

/// Raw document value from a file.
pub fn read_document_value(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    extract_document(value).with_context(|| format!("In {}", path.display()))
}

pub fn read_document(path: &Path) -> Result<BlockDocument> {
    Ok(BlockDocument::from_value(read_document_value(path)?)?)
}

/// Pick the block document out of `value`.
pub fn extract_document(value: Value) -> Result<Value> {
    if value.get("blocks").is_some() {
        return Ok(value);
    }
    match value.get("content") {
        Some(Value::String(s)) => {
            serde_json::from_str(s).context("Post content is not valid JSON")
        }
        Some(content @ Value::Object(_)) => Ok(content.clone()),
        Some(Value::Null) | None => {
            bail!("Expected a document with `blocks` or a post with `content`")
        }
        Some(_) => bail!("Post content must be an object or a JSON string"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_document() {
        let doc = json!({"blocks": []});
        assert_eq!(extract_document(doc.clone()).unwrap(), doc);
    }

    #[test]
    fn test_post_with_object_content() {
        let post = json!({"title": "x", "content": {"blocks": [{"type": "paragraph", "data": {"text": "a"}}]}});
        assert_eq!(extract_document(post).unwrap()["blocks"][0]["type"], "paragraph");
    }

    #[test]
    fn test_post_with_string_content() {
        let post = json!({"title": "x", "content": "{\"blocks\":[]}"});
        assert_eq!(extract_document(post).unwrap(), json!({"blocks": []}));
    }

    #[test]
    fn test_neither_shape_is_an_error() {
        assert!(extract_document(json!({"title": "x"})).is_err());
        assert!(extract_document(json!({"content": 5})).is_err());
        assert!(extract_document(json!([1, 2])).is_err());
    }

    #[test]
    fn test_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("post.json");
        std::fs::write(
            &path,
            r#"{"content": {"time": 5, "version": "2.28.2", "blocks": [{"type": "header", "data": {"text": "Hi", "level": 2}}]}}"#,
        )
        .unwrap();
        let doc = read_document(&path).unwrap();
        assert_eq!(doc.time, 5);
        assert_eq!(doc.len(), 1);
    }
}
