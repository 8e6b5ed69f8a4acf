#![allow(dead_code)]

use std::path::PathBuf;

use studysheet::{BodyNode, CoverSheet, FlowBlock, ListItem, ListNode, SplitMode};
use studysheet_render::{BlockMeasurer, MeasureContext, Page, TRUNCATION_MARK};
use url::Url;

/// Cover height that yields exactly 4 px/mm.
pub const COVER_PX: f32 = 1188.0;

pub fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/fixtures");
    path.push(name);
    path
}

/// Deterministic geometry: padding 20, header 40, list item 150,
/// paragraph 20 px per started group of 10 words, other nodes 100,
/// images by declared height.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedMetrics;

impl BlockMeasurer for FixedMetrics {
    fn measure_block(&self, block: &FlowBlock, ctx: &MeasureContext) -> f32 {
        let mut height = 20.0;
        if block.header.is_some() {
            height += 40.0;
        }
        for node in &block.body {
            height += match node {
                BodyNode::Paragraph(p) => p.word_count().div_ceil(10) as f32 * 20.0,
                BodyNode::List(list) => list.items.len() as f32 * 150.0,
                BodyNode::Image(img) => img.height_px.unwrap_or(100.0),
                BodyNode::Other(_) => 100.0,
            } * ctx.type_scale;
        }
        height
    }

    fn cover_height_px(&self, _cover: &CoverSheet) -> Option<f32> {
        Some(COVER_PX)
    }
}

pub fn words(n: usize, prefix: &str) -> String {
    (1..=n)
        .map(|i| format!("{}{}", prefix, i))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn paragraph_block(id: &str, n_words: usize) -> FlowBlock {
    FlowBlock::new()
        .with_id(id)
        .with_node(BodyNode::paragraph(words(n_words, id)))
}

pub fn list_block(id: &str, title: &str, n_items: usize, ordered: bool) -> FlowBlock {
    FlowBlock::new()
        .with_id(id)
        .with_split(SplitMode::List)
        .with_title(title)
        .with_node(BodyNode::List(ListNode {
            ordered,
            start: None,
            items: (1..=n_items)
                .map(|i| ListItem::new(format!("{} item {}", id, i)))
                .collect(),
        }))
}

/// Every body word in flow order, with truncation markers dropped.
pub fn body_words<'a>(blocks: impl IntoIterator<Item = &'a FlowBlock>) -> Vec<String> {
    let marker = TRUNCATION_MARK.trim();
    blocks
        .into_iter()
        .flat_map(|block| {
            block
                .body_text()
                .split_whitespace()
                .filter(|w| *w != marker)
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

pub fn page_blocks(pages: &[Page]) -> impl Iterator<Item = &FlowBlock> {
    pages.iter().flat_map(|page| page.inner.blocks.iter())
}

/// Ordered list fragments in page order: (start index, item count).
pub fn list_fragments(pages: &[Page]) -> Vec<(u32, usize)> {
    page_blocks(pages)
        .flat_map(|block| block.body.iter())
        .filter_map(|node| match node {
            BodyNode::List(list) if list.ordered => Some((list.start_index(), list.items.len())),
            _ => None,
        })
        .collect()
}

pub fn location(query: &str) -> Url {
    let mut url = Url::parse("https://sheets.example.org/week-3/").expect("base url");
    if !query.is_empty() {
        url.set_query(Some(query));
    }
    url
}

#[derive(Debug, Default)]
pub struct RecordingNavigator {
    pub assigned: Vec<Url>,
    pub reloads: usize,
}

impl studysheet::Navigator for RecordingNavigator {
    fn assign(&mut self, url: &Url) {
        self.assigned.push(url.clone());
    }

    fn reload(&mut self) {
        self.reloads += 1;
    }
}
