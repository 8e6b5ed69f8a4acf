//! Block splitting strategies.
//!
//! The source block is always the last block on its page. Each strategy moves
//! tail content into a continuation fragment until the source fits, and
//! restores the source untouched when it cannot.

use core::fmt;

use studysheet::{BodyNode, FlowBlock, ListNode, Paragraph, SplitMode};

use crate::render_metrics::{BlockMeasurer, MeasureContext};
use crate::render_page::FitCheck;

/// Marker appended to the kept half of a word-split paragraph.
pub const TRUNCATION_MARK: &str = " …";

/// Strategy that produced a split.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    /// Trailing list items moved to the continuation.
    List,
    /// Trailing body children moved to the continuation.
    Children,
    /// A long paragraph divided at a word boundary.
    Words,
}

impl fmt::Display for SplitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::List => "list",
            Self::Children => "children",
            Self::Words => "words",
        })
    }
}

/// Successful split result. The source block now fits its page.
#[derive(Clone, Debug, PartialEq)]
pub struct SplitOutcome {
    /// Strategy that achieved the fit.
    pub strategy: SplitStrategy,
    /// Continuation fragment holding the moved tail content.
    pub remainder: FlowBlock,
    /// Measured height of the source after the split.
    pub source_height_px: f32,
}

/// Escalating splitter: list, then children, then words.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockSplitter {
    /// Paragraphs need at least this many words to be word-split.
    pub min_split_words: usize,
    /// Words kept on each side of a word split.
    pub edge_words: usize,
}

struct Fit<'a, M: ?Sized> {
    measurer: &'a M,
    ctx: &'a MeasureContext,
    check: FitCheck,
}

impl<M: BlockMeasurer + ?Sized> Fit<'_, M> {
    fn height(&self, block: &FlowBlock) -> f32 {
        self.measurer.measure_block(block, self.ctx)
    }

    fn overflows(&self, block: &FlowBlock) -> bool {
        self.check.overflows(self.height(block))
    }
}

impl BlockSplitter {
    /// Try every strategy in order. On `None` the source is unchanged.
    pub fn split<M: BlockMeasurer + ?Sized>(
        &self,
        source: &mut FlowBlock,
        check: FitCheck,
        measurer: &M,
        ctx: &MeasureContext,
    ) -> Option<SplitOutcome> {
        let fit = Fit {
            measurer,
            ctx,
            check,
        };
        for strategy in [
            SplitStrategy::List,
            SplitStrategy::Children,
            SplitStrategy::Words,
        ] {
            let original = source.clone();
            let attempt = match strategy {
                SplitStrategy::List => self.split_list(source, &fit),
                SplitStrategy::Children => self.split_children(source, &fit),
                SplitStrategy::Words => self.split_words(source, &fit),
            };
            match attempt {
                Some(remainder) => {
                    return Some(SplitOutcome {
                        strategy,
                        remainder,
                        source_height_px: fit.height(source),
                    });
                }
                None => *source = original,
            }
        }
        None
    }

    fn split_list<M: BlockMeasurer + ?Sized>(
        &self,
        source: &mut FlowBlock,
        fit: &Fit<'_, M>,
    ) -> Option<FlowBlock> {
        if source.split != SplitMode::List {
            return None;
        }
        let mut cont = source.continuation_shell();
        let (list_idx, list) = source.first_list_mut()?;
        if list.items.len() < 2 {
            return None;
        }
        let start = list.start_index();
        let mut moved = list.empty_like();
        let trailing: Vec<BodyNode> = source.body.drain(list_idx + 1..).collect();

        while fit.overflows(source) {
            let list = list_at(source, list_idx)?;
            if list.items.len() <= 1 {
                break;
            }
            let item = list.items.pop()?;
            moved.items.insert(0, item);
        }
        if fit.overflows(source) {
            return None;
        }

        if !moved.items.is_empty() {
            if moved.ordered {
                let kept = list_at(source, list_idx)?.items.len() as u32;
                moved.start = Some(start + kept);
            }
            cont.body.push(BodyNode::List(moved));
        }
        cont.body.extend(trailing);
        Some(cont)
    }

    fn split_children<M: BlockMeasurer + ?Sized>(
        &self,
        source: &mut FlowBlock,
        fit: &Fit<'_, M>,
    ) -> Option<FlowBlock> {
        if source.content_len() < 2 {
            return None;
        }
        let mut cont = source.continuation_shell();
        while fit.overflows(source) && source.content_len() > 1 {
            let node = source.body.pop()?;
            cont.body.insert(0, node);
        }
        if fit.overflows(source) {
            return None;
        }
        Some(cont)
    }

    fn split_words<M: BlockMeasurer + ?Sized>(
        &self,
        source: &mut FlowBlock,
        fit: &Fit<'_, M>,
    ) -> Option<FlowBlock> {
        let min_words = self.min_split_words.max(2 * self.edge_words + 1);
        let mut candidates: Vec<(usize, usize)> = source
            .body
            .iter()
            .enumerate()
            .filter_map(|(idx, node)| match node {
                BodyNode::Paragraph(p) => Some((idx, p.word_count())),
                _ => None,
            })
            .filter(|(_, words)| *words >= min_words)
            .collect();
        // Longest first; ties keep document order.
        candidates.sort_by(|a, b| b.1.cmp(&a.1));

        let original = source.clone();
        for (idx, _) in candidates {
            *source = original.clone();
            if let Some(cont) = self.split_paragraph_at(source, idx, fit) {
                return Some(cont);
            }
        }
        None
    }

    fn split_paragraph_at<M: BlockMeasurer + ?Sized>(
        &self,
        source: &mut FlowBlock,
        idx: usize,
        fit: &Fit<'_, M>,
    ) -> Option<FlowBlock> {
        let words: Vec<String> = match source.body.get(idx)? {
            BodyNode::Paragraph(p) => p.text.split_whitespace().map(str::to_string).collect(),
            _ => return None,
        };
        let trailing: Vec<BodyNode> = source.body.drain(idx + 1..).collect();

        let lo = self.edge_words.max(1);
        let hi = words.len().checked_sub(self.edge_words)?;
        if lo > hi {
            return None;
        }
        let fits_with = |source: &mut FlowBlock, keep: usize| -> bool {
            set_paragraph(source, idx, kept_text(&words[..keep]));
            !fit.overflows(source)
        };
        if !fits_with(source, lo) {
            return None;
        }
        let (mut low, mut high, mut best) = (lo + 1, hi, lo);
        while low <= high {
            let mid = low + (high - low) / 2;
            if fits_with(source, mid) {
                best = mid;
                low = mid + 1;
            } else {
                high = mid - 1;
            }
        }
        set_paragraph(source, idx, kept_text(&words[..best]));

        let mut cont = source.continuation_shell();
        cont.body
            .push(BodyNode::Paragraph(Paragraph::new(words[best..].join(" "))));
        cont.body.extend(trailing);
        Some(cont)
    }
}

fn list_at(block: &mut FlowBlock, idx: usize) -> Option<&mut ListNode> {
    match block.body.get_mut(idx)? {
        BodyNode::List(list) => Some(list),
        _ => None,
    }
}

fn kept_text(words: &[String]) -> String {
    let mut text = words.join(" ");
    text.push_str(TRUNCATION_MARK);
    text
}

fn set_paragraph(block: &mut FlowBlock, idx: usize, text: String) {
    if let Some(BodyNode::Paragraph(p)) = block.body.get_mut(idx) {
        p.text = text;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studysheet::{CoverSheet, ListItem};

    /// header 40, padding 20, item 150, paragraph 20 per 10 words, other 100.
    struct Fixed;

    impl BlockMeasurer for Fixed {
        fn measure_block(&self, block: &FlowBlock, _ctx: &MeasureContext) -> f32 {
            let mut h = 20.0;
            if block.header.is_some() {
                h += 40.0;
            }
            for node in &block.body {
                h += match node {
                    BodyNode::Paragraph(p) => ((p.word_count() + 9) / 10) as f32 * 20.0,
                    BodyNode::List(list) => list.items.len() as f32 * 150.0,
                    _ => 100.0,
                };
            }
            h
        }

        fn cover_height_px(&self, _cover: &CoverSheet) -> Option<f32> {
            None
        }
    }

    const CTX: MeasureContext = MeasureContext {
        content_width_px: 700.0,
        type_scale: 1.0,
    };

    fn splitter() -> BlockSplitter {
        BlockSplitter {
            min_split_words: 40,
            edge_words: 10,
        }
    }

    fn room(room: f32) -> FitCheck {
        FitCheck {
            room_px: room,
            fuzz_px: 3.0,
        }
    }

    fn list_block(n: usize, ordered: bool, start: Option<u32>) -> FlowBlock {
        FlowBlock::new()
            .with_id("steps")
            .with_split(SplitMode::List)
            .with_title("Steps")
            .with_node(BodyNode::List(ListNode {
                ordered,
                start,
                items: (1..=n).map(|i| ListItem::new(format!("item {}", i))).collect(),
            }))
    }

    fn words(n: usize, prefix: &str) -> String {
        (1..=n)
            .map(|i| format!("{}{}", prefix, i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn list_split_keeps_numbering_contiguous() {
        let mut source = list_block(10, true, Some(3));
        let out = splitter()
            .split(&mut source, room(976.0), &Fixed, &CTX)
            .expect("split");
        assert_eq!(out.strategy, SplitStrategy::List);
        assert_eq!(out.source_height_px, 960.0);
        let BodyNode::List(kept) = &source.body[0] else {
            panic!("list expected");
        };
        let BodyNode::List(moved) = &out.remainder.body[0] else {
            panic!("list expected");
        };
        assert_eq!(kept.items.len(), 6);
        assert_eq!(moved.items.len(), 4);
        assert_eq!(moved.start, Some(3 + 6));
        assert_eq!(moved.items[0].text, "item 7");
        assert_eq!(out.remainder.id, None);
        assert_eq!(
            out.remainder.header.as_ref().and_then(|h| h.title.as_deref()),
            Some("Steps (cont.)")
        );
    }

    #[test]
    fn list_split_moves_following_content_first() {
        let mut source = list_block(4, false, None).with_node(BodyNode::paragraph("after the list"));
        // 60 + 600 + 20 = 680; without the paragraph the list alone fits in 663.
        let out = splitter()
            .split(&mut source, room(660.0), &Fixed, &CTX)
            .expect("split");
        assert_eq!(out.strategy, SplitStrategy::List);
        assert_eq!(source.content_len(), 1);
        assert_eq!(out.remainder.content_len(), 1);
        assert_eq!(out.remainder.body[0].text_content(), "after the list");
    }

    #[test]
    fn list_split_aborts_when_single_item_overflows() {
        let mut source = list_block(3, true, None);
        let before = source.clone();
        // One item needs 210px; only 150 available. No paragraphs for words.
        assert!(splitter()
            .split(&mut source, room(150.0), &Fixed, &CTX)
            .is_none());
        assert_eq!(source, before);
    }

    #[test]
    fn children_split_moves_trailing_nodes() {
        let mut source = FlowBlock::new()
            .with_title("Notes")
            .with_node(BodyNode::paragraph(words(10, "a")))
            .with_node(BodyNode::paragraph(words(10, "b")))
            .with_node(BodyNode::paragraph(words(10, "c")));
        let out = splitter()
            .split(&mut source, room(105.0), &Fixed, &CTX)
            .expect("split");
        assert_eq!(out.strategy, SplitStrategy::Children);
        assert_eq!(source.content_len(), 2);
        assert_eq!(out.remainder.content_len(), 1);
        assert_eq!(out.remainder.body[0].text_content(), words(10, "c"));
    }

    #[test]
    fn word_split_divides_longest_paragraph() {
        let text = words(100, "w");
        let mut source = FlowBlock::new()
            .with_title("Reading")
            .with_node(BodyNode::paragraph(text.clone()));
        // 60 + 20 * ceil(k / 10) with k plus the marker word must stay <= 203.
        let out = splitter()
            .split(&mut source, room(200.0), &Fixed, &CTX)
            .expect("split");
        assert_eq!(out.strategy, SplitStrategy::Words);
        let kept = source.body[0].text_content();
        assert!(kept.ends_with(TRUNCATION_MARK));
        let kept_words = kept.trim_end_matches(TRUNCATION_MARK).split_whitespace().count();
        assert_eq!(kept_words, 69);
        let rest = out.remainder.body[0].text_content();
        let rejoined = format!("{} {}", kept.trim_end_matches(TRUNCATION_MARK), rest);
        assert_eq!(rejoined, text);
    }

    #[test]
    fn word_split_skips_short_paragraphs() {
        let mut source = FlowBlock::new()
            .with_title("Short")
            .with_node(BodyNode::paragraph(words(39, "s")));
        let before = source.clone();
        assert!(splitter()
            .split(&mut source, room(70.0), &Fixed, &CTX)
            .is_none());
        assert_eq!(source, before);
    }

    #[test]
    fn word_split_prefers_longest_eligible_paragraph() {
        let mut source = FlowBlock::new()
            .with_node(BodyNode::paragraph(words(50, "a")))
            .with_node(BodyNode::paragraph(words(120, "b")));
        let fit = Fit {
            measurer: &Fixed,
            ctx: &CTX,
            check: room(300.0),
        };
        // Cutting either paragraph could fit 303px; the 120-word one is cut.
        let cont = splitter().split_words(&mut source, &fit).expect("split");
        assert_eq!(source.body[0].text_content(), words(50, "a"));
        let kept = source.body[1].text_content();
        assert!(kept.ends_with(TRUNCATION_MARK));
        assert_eq!(
            kept.trim_end_matches(TRUNCATION_MARK).split_whitespace().count(),
            89
        );
        assert_eq!(cont.content_len(), 1);
        assert!(cont.body[0].text_content().starts_with("b90 "));
    }

    #[test]
    fn word_split_falls_back_to_next_candidate() {
        let mut source = FlowBlock::new()
            .with_node(BodyNode::paragraph(words(50, "a")))
            .with_node(BodyNode::paragraph(words(120, "b")));
        // The 50-word paragraph alone needs 120px, so trailing children
        // cannot be peeled off, and keeping it whole leaves no room to cut
        // the longer paragraph. Only cutting the shorter one fits 113px.
        let out = splitter()
            .split(&mut source, room(110.0), &Fixed, &CTX)
            .expect("split");
        assert_eq!(out.strategy, SplitStrategy::Words);
        assert_eq!(source.content_len(), 1);
        let kept = source.body[0].text_content();
        assert_eq!(
            kept.trim_end_matches(TRUNCATION_MARK).split_whitespace().count(),
            39
        );
        assert_eq!(out.source_height_px, 100.0);
        assert_eq!(out.remainder.content_len(), 2);
        assert!(out.remainder.body[0].text_content().starts_with("a40 "));
        assert_eq!(out.remainder.body[1].text_content(), words(120, "b"));
    }

    #[test]
    fn word_split_moves_later_children_to_continuation() {
        let mut source = FlowBlock::new()
            .with_node(BodyNode::paragraph(words(60, "p")))
            .with_node(BodyNode::paragraph(words(5, "tail")));
        let out = splitter()
            .split(&mut source, room(60.0), &Fixed, &CTX)
            .expect("split");
        assert_eq!(out.strategy, SplitStrategy::Words);
        assert_eq!(source.content_len(), 1);
        assert_eq!(out.remainder.content_len(), 2);
        assert_eq!(out.remainder.body[1].text_content(), words(5, "tail"));
        assert!(out.remainder.continuation);
    }
}
