//! Read-time estimate for the blog detail page.

use std::fmt;

use crate::document::{Block, BlockData, BlockDocument, ListItem};

/// Reading speed used by the blog pages.
pub const WORDS_PER_MINUTE: u32 = 200;

/// Estimated reading time, in whole minutes (at least one).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReadTime(u32);

impl ReadTime {
    pub fn minutes(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ReadTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} min", self.0)
    }
}

/// Words across all text-bearing blocks.
///
/// Paragraphs, headers and quotes count their `text`; lists count every item
/// including nested ones; code counts its raw source. Other blocks count zero.
pub fn word_count(doc: &BlockDocument) -> usize {
    doc.blocks.iter().map(block_words).sum()
}

pub fn estimate_read_time(doc: &BlockDocument) -> ReadTime {
    estimate_read_time_at(doc, WORDS_PER_MINUTE)
}

/// Estimate at a custom reading speed. A zero speed is treated as one word
/// per minute.
pub fn estimate_read_time_at(doc: &BlockDocument, words_per_minute: u32) -> ReadTime {
    let words = word_count(doc) as u64;
    let minutes = words.div_ceil(u64::from(words_per_minute.max(1))).max(1);
    ReadTime(u32::try_from(minutes).unwrap_or(u32::MAX))
}

fn block_words(block: &Block) -> usize {
    match &block.data {
        BlockData::Paragraph(p) => words(&p.text),
        BlockData::Header(h) => words(&h.text),
        BlockData::Quote(q) => words(&q.text),
        BlockData::List(list) => list.items.iter().map(item_words).sum(),
        BlockData::Code(code) => words(&code.code),
        BlockData::Table(_) | BlockData::Image(_) | BlockData::Opaque(_) => 0,
    }
}

fn item_words(item: &ListItem) -> usize {
    words(item.content()) + item.children().iter().map(item_words).sum::<usize>()
}

fn words(text: &str) -> usize {
    text.split_whitespace().count()
}
