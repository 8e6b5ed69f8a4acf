use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use studysheet::{CoverSheet, FlowBlock, SheetError};

use crate::render_metrics::{BlockMeasurer, MeasureContext};
use crate::render_page::{
    make_page, overflows, px_per_mm, remaining_px, FitCheck, Page, PageGeometry,
    FIRST_PAGE_NUMBER,
};
use crate::render_split::{BlockSplitter, SplitStrategy};

/// Pagination settings. Lengths are millimeters unless suffixed `_px`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Physical sheet width.
    pub sheet_width_mm: f32,
    /// Physical sheet height.
    pub sheet_height_mm: f32,
    /// Reserved print margin at the top of each page.
    pub safe_top_mm: f32,
    /// Reserved print margin at the bottom of each page.
    pub safe_bottom_mm: f32,
    /// Reserved print margin on each side.
    pub safe_side_mm: f32,
    /// Gap between stacked blocks.
    pub block_gap_px: f32,
    /// Remaining room below which a block that does not fit opens a new page.
    pub same_page_continue_max_mm: f32,
    /// Sub-pixel rounding allowance for fit checks.
    pub fit_fuzz_px: f32,
    /// Minimum paragraph length eligible for word splitting.
    pub min_split_words: usize,
    /// Words kept on each side of a word split.
    pub split_edge_words: usize,
    /// Type scale of the reading-derived print profile.
    pub reading_type_scale: f32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            sheet_width_mm: 210.0,
            sheet_height_mm: 297.0,
            safe_top_mm: 12.5,
            safe_bottom_mm: 12.5,
            safe_side_mm: 14.0,
            block_gap_px: 12.0,
            same_page_continue_max_mm: 80.0,
            fit_fuzz_px: 3.0,
            min_split_words: 40,
            split_edge_words: 10,
            reading_type_scale: 1.15,
        }
    }
}

impl PaginationConfig {
    /// Reject settings that cannot produce a usable page.
    pub fn validate(&self) -> Result<(), RenderError> {
        let positive = [
            ("sheet_width_mm", self.sheet_width_mm),
            ("sheet_height_mm", self.sheet_height_mm),
            ("reading_type_scale", self.reading_type_scale),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(RenderError::config(field, "must be a positive number"));
            }
        }
        let non_negative = [
            ("safe_top_mm", self.safe_top_mm),
            ("safe_bottom_mm", self.safe_bottom_mm),
            ("safe_side_mm", self.safe_side_mm),
            ("block_gap_px", self.block_gap_px),
            ("same_page_continue_max_mm", self.same_page_continue_max_mm),
            ("fit_fuzz_px", self.fit_fuzz_px),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(RenderError::config(field, "must be zero or positive"));
            }
        }
        if self.safe_top_mm + self.safe_bottom_mm >= self.sheet_height_mm {
            return Err(RenderError::config(
                "safe_top_mm",
                "vertical margins leave no content area",
            ));
        }
        if 2.0 * self.safe_side_mm >= self.sheet_width_mm {
            return Err(RenderError::config(
                "safe_side_mm",
                "side margins leave no content area",
            ));
        }
        if self.split_edge_words == 0 {
            return Err(RenderError::config("split_edge_words", "must be at least 1"));
        }
        if self.min_split_words < 2 * self.split_edge_words {
            return Err(RenderError::config(
                "min_split_words",
                "must leave room for both split edges",
            ));
        }
        Ok(())
    }

    fn splitter(&self) -> BlockSplitter {
        BlockSplitter {
            min_split_words: self.min_split_words,
            edge_words: self.split_edge_words,
        }
    }
}

/// How a source block ended up being placed. Later states dominate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementState {
    /// Placed whole on the current page.
    FitsAsIs,
    /// Moved to a fresh page before placement.
    NeedsNewPage,
    /// Divided into a block and one or more continuations.
    NeedsSplit,
    /// Could not be made to fit; left overflowing.
    Unsplittable,
}

/// Placement record for one source block.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BlockPlacement {
    /// Position in the flow.
    pub index: usize,
    /// Source identifier.
    pub id: Option<String>,
    /// Dominant placement state.
    pub state: PlacementState,
    /// Page holding the first piece.
    pub first_page: u32,
    /// Page holding the last piece.
    pub last_page: u32,
}

/// Runtime diagnostics from a pagination pass.
#[derive(Clone, Debug, PartialEq)]
pub enum PaginationDiagnostic {
    /// A new page was opened.
    PageBreak {
        /// Number of the new page.
        page: u32,
        /// Flow index of the block that caused it.
        block: usize,
    },
    /// A block was divided.
    Split {
        /// Flow index of the source block.
        block: usize,
        /// Page that keeps the fitting part.
        page: u32,
        /// Strategy that succeeded.
        strategy: SplitStrategy,
    },
    /// A block could not be made to fit and was left overflowing.
    Unsplittable {
        /// Flow index of the source block.
        block: usize,
        /// Identifier or title of the block.
        label: String,
        /// Page holding the overflowing piece.
        page: u32,
        /// Pixels past the page bottom.
        overflow_px: f32,
    },
    /// Empty pages were removed after placement.
    EmptyPagesPruned {
        /// Number of removed pages.
        count: usize,
    },
}

type DiagnosticCallback = Arc<Mutex<Box<dyn FnMut(PaginationDiagnostic) + Send + 'static>>>;
type DiagnosticSink = Option<DiagnosticCallback>;

/// Result of a pagination pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Pagination {
    /// Generated pages, numbered contiguously from 2.
    pub pages: Vec<Page>,
    /// One record per source block, in flow order.
    pub placements: Vec<BlockPlacement>,
    /// Resolved page geometry.
    pub geometry: PageGeometry,
}

impl Pagination {
    /// Number of generated pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

struct PendingPiece {
    block: FlowBlock,
    retried: bool,
}

/// Block placement engine.
#[derive(Clone)]
pub struct Paginator {
    cfg: PaginationConfig,
    diagnostic_sink: DiagnosticSink,
}

impl fmt::Debug for Paginator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Paginator")
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(PaginationConfig::default())
    }
}

impl Paginator {
    /// Create a paginator.
    pub fn new(cfg: PaginationConfig) -> Self {
        Self {
            cfg,
            diagnostic_sink: None,
        }
    }

    /// Create a paginator after validating `cfg`.
    pub fn try_new(cfg: PaginationConfig) -> Result<Self, RenderError> {
        cfg.validate()?;
        Ok(Self::new(cfg))
    }

    /// Active settings.
    pub fn config(&self) -> PaginationConfig {
        self.cfg
    }

    /// Register or replace the diagnostics sink.
    pub fn set_diagnostic_sink<F>(&mut self, sink: F)
    where
        F: FnMut(PaginationDiagnostic) + Send + 'static,
    {
        self.diagnostic_sink = Some(Arc::new(Mutex::new(Box::new(sink))));
    }

    fn emit_diagnostic(&self, diagnostic: PaginationDiagnostic) {
        let Some(sink) = &self.diagnostic_sink else {
            return;
        };
        if let Ok(mut sink) = sink.lock() {
            sink(diagnostic);
        }
    }

    /// Lay the flow out onto pages.
    ///
    /// Consumes the flow: on return every block lives on exactly one page,
    /// possibly divided into continuations. The pass never fails; blocks that
    /// cannot be made to fit are placed best-effort and reported.
    pub fn paginate<M: BlockMeasurer + ?Sized>(
        &self,
        flow: Vec<FlowBlock>,
        cover: Option<&CoverSheet>,
        measurer: &M,
        type_scale: f32,
    ) -> Pagination {
        let geometry = PageGeometry::from_config(&self.cfg, px_per_mm(measurer, cover));
        let ctx = MeasureContext {
            content_width_px: geometry.content_width_px,
            type_scale,
        };
        let splitter = self.cfg.splitter();
        let mut pages = vec![make_page(FIRST_PAGE_NUMBER, &geometry)];
        let mut placements = Vec::with_capacity(flow.len());

        for (index, block) in flow.into_iter().enumerate() {
            let id = block.id.clone();
            let label = block.label();
            let mut state = PlacementState::FitsAsIs;
            let mut first_page = None;
            let mut work = VecDeque::from([PendingPiece {
                block,
                retried: false,
            }]);

            while let Some(piece) = work.pop_front() {
                let height = measurer.measure_block(&piece.block, &ctx);

                let inner = &current(&mut pages).inner;
                if !inner.is_empty() {
                    let room_px = remaining_px(inner);
                    if room_px < geometry.same_page_continue_px && height > room_px {
                        self.open_page(&mut pages, &geometry, index);
                        state = state.max(PlacementState::NeedsNewPage);
                    }
                }

                let page = current(&mut pages);
                let had_content = !page.inner.is_empty();
                let page_number = page.number;
                page.inner.push(piece.block, height);
                if !overflows(&page.inner, geometry.fuzz_px) {
                    first_page.get_or_insert(page_number);
                    continue;
                }

                let check = FitCheck::for_last(&page.inner, geometry.fuzz_px);
                let split = page.inner.last_mut().and_then(|(source, source_height)| {
                    let outcome = splitter.split(source, check, measurer, &ctx)?;
                    *source_height = outcome.source_height_px;
                    Some(outcome)
                });

                match split {
                    Some(outcome) => {
                        first_page.get_or_insert(page_number);
                        state = state.max(PlacementState::NeedsSplit);
                        log::debug!(
                            "split block {} on page {} via {}",
                            label,
                            page_number,
                            outcome.strategy
                        );
                        self.emit_diagnostic(PaginationDiagnostic::Split {
                            block: index,
                            page: page_number,
                            strategy: outcome.strategy,
                        });
                        if outcome.remainder.has_body() {
                            self.open_page(&mut pages, &geometry, index);
                            work.push_front(PendingPiece {
                                block: outcome.remainder,
                                retried: false,
                            });
                        } else {
                            log::debug!("discarded header-only continuation of {}", label);
                        }
                    }
                    None if had_content && !piece.retried => {
                        // Roll back and retry with a whole page of room.
                        if let Some((block, _)) = page.inner.pop() {
                            self.open_page(&mut pages, &geometry, index);
                            state = state.max(PlacementState::NeedsNewPage);
                            work.push_front(PendingPiece {
                                block,
                                retried: true,
                            });
                        }
                    }
                    None => {
                        first_page.get_or_insert(page_number);
                        state = PlacementState::Unsplittable;
                        let overflow_px = page.inner.last_bottom_px() - page.inner.height_px;
                        log::warn!(
                            "block exceeds one page and cannot be split: {} (page {}, overflow {:.1}px)",
                            label,
                            page_number,
                            overflow_px
                        );
                        self.emit_diagnostic(PaginationDiagnostic::Unsplittable {
                            block: index,
                            label: label.clone(),
                            page: page_number,
                            overflow_px,
                        });
                    }
                }
            }

            let last_page = current(&mut pages).number;
            placements.push(BlockPlacement {
                index,
                id,
                state,
                first_page: first_page.unwrap_or(last_page),
                last_page,
            });
        }

        self.finish(pages, placements, geometry)
    }

    fn open_page(&self, pages: &mut Vec<Page>, geometry: &PageGeometry, block: usize) {
        let number = FIRST_PAGE_NUMBER + pages.len() as u32;
        pages.push(make_page(number, geometry));
        log::debug!("opened page {} for block {}", number, block);
        self.emit_diagnostic(PaginationDiagnostic::PageBreak {
            page: number,
            block,
        });
    }

    fn finish(
        &self,
        pages: Vec<Page>,
        mut placements: Vec<BlockPlacement>,
        geometry: PageGeometry,
    ) -> Pagination {
        let total = pages.len();
        let mut renumber = Vec::with_capacity(total);
        let mut kept = Vec::with_capacity(total);
        for mut page in pages {
            if page.inner.is_empty() {
                renumber.push((page.number, None));
                continue;
            }
            let number = FIRST_PAGE_NUMBER + kept.len() as u32;
            renumber.push((page.number, Some(number)));
            page.number = number;
            kept.push(page);
        }

        let pruned = total - kept.len();
        if pruned > 0 {
            log::debug!("pruned {} empty page(s)", pruned);
            self.emit_diagnostic(PaginationDiagnostic::EmptyPagesPruned { count: pruned });
            let resolve = |old: u32| -> u32 {
                renumber
                    .iter()
                    .filter(|(from, _)| *from <= old)
                    .filter_map(|(_, to)| *to)
                    .last()
                    .unwrap_or(FIRST_PAGE_NUMBER)
            };
            for placement in &mut placements {
                placement.first_page = resolve(placement.first_page);
                placement.last_page = resolve(placement.last_page);
            }
        }

        Pagination {
            pages: kept,
            placements,
            geometry,
        }
    }
}

fn current(pages: &mut [Page]) -> &mut Page {
    let last = pages.len() - 1;
    &mut pages[last]
}

/// Render-crate error.
#[derive(Debug)]
pub enum RenderError {
    /// Document ingestion or preference failure.
    Sheet(SheetError),
    /// Invalid pagination settings.
    Config {
        /// Offending setting.
        field: &'static str,
        /// What is wrong with it.
        message: &'static str,
    },
}

impl RenderError {
    fn config(field: &'static str, message: &'static str) -> Self {
        Self::Config { field, message }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sheet(err) => write!(f, "document error: {}", err),
            Self::Config { field, message } => {
                write!(f, "invalid pagination config: {} {}", field, message)
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sheet(err) => Some(err),
            Self::Config { .. } => None,
        }
    }
}

impl From<SheetError> for RenderError {
    fn from(value: SheetError) -> Self {
        Self::Sheet(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studysheet::BodyNode;

    struct Fixed;

    impl BlockMeasurer for Fixed {
        fn measure_block(&self, block: &FlowBlock, _ctx: &MeasureContext) -> f32 {
            block
                .body
                .iter()
                .map(|node| match node {
                    BodyNode::Other(n) => n.text.len() as f32,
                    _ => 100.0,
                })
                .sum()
        }

        fn cover_height_px(&self, _cover: &CoverSheet) -> Option<f32> {
            Some(1188.0)
        }
    }

    fn sized(height: usize) -> FlowBlock {
        FlowBlock::new().with_node(BodyNode::Other(studysheet::GenericNode {
            tag: "div".into(),
            text: "x".repeat(height),
        }))
    }

    fn run(flow: Vec<FlowBlock>) -> (Pagination, Vec<PaginationDiagnostic>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut paginator = Paginator::default();
        paginator.set_diagnostic_sink(move |d| sink.lock().expect("lock").push(d));
        let out = paginator.paginate(flow, Some(&CoverSheet::default()), &Fixed, 1.0);
        let diagnostics = seen.lock().expect("lock").clone();
        (out, diagnostics)
    }

    #[test]
    fn default_config_is_valid() {
        assert!(PaginationConfig::default().validate().is_ok());
        let bad = PaginationConfig {
            safe_top_mm: 200.0,
            safe_bottom_mm: 100.0,
            ..PaginationConfig::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(RenderError::Config {
                field: "safe_top_mm",
                ..
            })
        ));
        let bad_words = PaginationConfig {
            min_split_words: 5,
            ..PaginationConfig::default()
        };
        assert!(Paginator::try_new(bad_words).is_err());
    }

    #[test]
    fn small_blocks_pack_onto_one_page() {
        let (out, diags) = run(vec![sized(300), sized(300), sized(300)]);
        assert_eq!(out.page_count(), 1);
        assert!(diags.is_empty());
        assert!(out
            .placements
            .iter()
            .all(|p| p.state == PlacementState::FitsAsIs && p.first_page == 2));
    }

    #[test]
    fn small_block_fits_remaining_room_below_threshold() {
        // 1088 inner; after 800 the room is 276 (< 320 threshold).
        let (out, _) = run(vec![sized(800), sized(270)]);
        assert_eq!(out.page_count(), 1);
    }

    #[test]
    fn low_room_opens_new_page_for_larger_block() {
        let (out, diags) = run(vec![sized(800), sized(290)]);
        assert_eq!(out.page_count(), 2);
        assert_eq!(out.placements[1].state, PlacementState::NeedsNewPage);
        assert_eq!(out.placements[1].first_page, 3);
        assert_eq!(diags, vec![PaginationDiagnostic::PageBreak { page: 3, block: 1 }]);
    }

    #[test]
    fn unsplittable_block_retries_on_fresh_page_then_stays() {
        let (out, diags) = run(vec![sized(100), sized(1500), sized(100)]);
        assert_eq!(out.page_count(), 3);
        assert_eq!(out.pages[0].inner.len(), 1);
        assert_eq!(out.placements[1].state, PlacementState::Unsplittable);
        assert_eq!(out.placements[1].first_page, 3);
        assert_eq!(out.placements[2].first_page, 4);
        assert!(diags.iter().any(|d| matches!(
            d,
            PaginationDiagnostic::Unsplittable { block: 1, page: 3, .. }
        )));
    }

    #[test]
    fn empty_flow_prunes_the_initial_page() {
        let (out, diags) = run(Vec::new());
        assert!(out.pages.is_empty());
        assert_eq!(diags, vec![PaginationDiagnostic::EmptyPagesPruned { count: 1 }]);
    }

    #[test]
    fn geometry_uses_cover_scale() {
        let (out, _) = run(vec![sized(10)]);
        assert_eq!(out.geometry.px_per_mm, 4.0);
        assert_eq!(out.geometry.content_height_px, 1088.0);
    }
}
