//! HTML projection of a block document for the public blog.
//!
//! Rendering never fails. Unknown or malformed blocks produce no output and
//! leave their siblings untouched. Paragraph, header, list, quote, table and
//! caption text is editor output and is inserted as inline HTML; code is
//! always escaped so it shows as literal text.

use std::fmt::Write as _;

use pulldown_cmark_escape::{escape_href, escape_html};
use serde_json::Value;
use tracing::trace;

use crate::document::{Block, BlockData, BlockDocument, ListItem, ListStyle, TableData};
use crate::image::ImageBlockData;
use crate::reading::{ReadTime, estimate_read_time_at};

/// Rendered markup plus the read-time shown next to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedContent {
    pub html: String,
    pub read_time: ReadTime,
}

/// Render a whole document. Blocks are concatenated in order.
pub fn render(doc: &BlockDocument) -> String {
    let mut html = String::new();
    for block in &doc.blocks {
        render_block_into(block, &mut html);
    }
    html
}

/// Render a document and estimate its reading time.
pub fn render_with_read_time(doc: &BlockDocument, words_per_minute: u32) -> RenderedContent {
    RenderedContent {
        html: render(doc),
        read_time: estimate_read_time_at(doc, words_per_minute),
    }
}

/// Render raw persisted content without a typed load first.
///
/// Anything without a `blocks` array renders as an empty string.
pub fn render_value(content: &Value) -> String {
    let Some(blocks) = content.get("blocks").and_then(Value::as_array) else {
        return String::new();
    };
    let mut html = String::new();
    for block in blocks.iter().cloned().filter_map(Block::from_value) {
        render_block_into(&block, &mut html);
    }
    html
}

pub fn render_block(block: &Block) -> String {
    let mut html = String::new();
    render_block_into(block, &mut html);
    html
}

fn render_block_into(block: &Block, out: &mut String) {
    match &block.data {
        BlockData::Paragraph(p) => {
            let _ = write!(out, "<p>{}</p>", p.text);
        }
        BlockData::Header(h) => {
            let _ = write!(out, "<h{level}>{}</h{level}>", h.text, level = h.level);
        }
        BlockData::List(list) => render_list(list.style, &list.items, out),
        BlockData::Quote(q) => {
            let _ = write!(
                out,
                "<blockquote><p>{}</p><footer>{}</footer></blockquote>",
                q.text, q.caption
            );
        }
        BlockData::Code(code) => {
            out.push_str("<pre><code>");
            let _ = escape_html(&mut *out, &code.code);
            out.push_str("</code></pre>");
        }
        BlockData::Table(table) => render_table(table, out),
        BlockData::Image(image) => render_image(image, out),
        BlockData::Opaque(opaque) => {
            trace!(block_type = %opaque.block_type, "No projection for block");
        }
    }
}

fn render_list(style: ListStyle, items: &[ListItem], out: &mut String) {
    let tag = style.tag();
    let _ = write!(out, "<{tag}>");
    for item in items {
        out.push_str("<li>");
        out.push_str(item.content());
        if !item.children().is_empty() {
            render_list(style, item.children(), out);
        }
        out.push_str("</li>");
    }
    let _ = write!(out, "</{tag}>");
}

fn render_table(table: &TableData, out: &mut String) {
    let mut rows = table.content.iter();
    out.push_str("<table>");
    if table.with_headings {
        if let Some(head) = rows.next() {
            out.push_str("<thead>");
            render_row(head, "th", out);
            out.push_str("</thead>");
        }
    }
    out.push_str("<tbody>");
    for row in rows {
        render_row(row, "td", out);
    }
    out.push_str("</tbody></table>");
}

fn render_row(cells: &[String], cell_tag: &str, out: &mut String) {
    out.push_str("<tr>");
    for cell in cells {
        let _ = write!(out, "<{cell_tag}>{cell}</{cell_tag}>");
    }
    out.push_str("</tr>");
}

fn render_image(image: &ImageBlockData, out: &mut String) {
    if image.is_empty() {
        trace!("Skipping image block without a url");
        return;
    }

    let classes: Vec<&str> = image.active_flags().map(|f| f.css_class()).collect();
    if classes.is_empty() {
        out.push_str("<figure>");
    } else {
        let _ = write!(out, r#"<figure class="{}">"#, classes.join(" "));
    }
    out.push_str(r#"<img src=""#);
    let _ = escape_href(&mut *out, &image.url);
    out.push_str(r#"" alt=""#);
    let _ = escape_html(&mut *out, &image.caption);
    out.push_str(r#"" loading="lazy" />"#);
    if !image.caption.is_empty() {
        let _ = write!(out, "<figcaption>{}</figcaption>", image.caption);
    }
    out.push_str("</figure>");
}
