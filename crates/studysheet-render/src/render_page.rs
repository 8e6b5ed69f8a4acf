//! Page containers and fit geometry.
//!
//! A page's inner region stacks placed blocks top to bottom with a fixed gap.
//! Every fit decision is taken from the bottom edge of the last placed block,
//! so the numbers here are exactly what a renderer would report for the same
//! stack.

use studysheet::{CoverSheet, FlowBlock};

use crate::render_engine::PaginationConfig;
use crate::render_metrics::{BlockMeasurer, A4_HEIGHT_MM, FALLBACK_PX_PER_MM};

/// Number of the first generated page; the cover is page 1.
pub const FIRST_PAGE_NUMBER: u32 = 2;

/// Runtime pixel-per-millimeter scale.
///
/// Derived from the measured cover sheet, whose physical height is exactly one
/// A4 sheet. Falls back to the 96-DPI reference when there is no cover or the
/// measurement is unusable.
pub fn px_per_mm<M: BlockMeasurer + ?Sized>(measurer: &M, cover: Option<&CoverSheet>) -> f32 {
    cover
        .and_then(|cover| measurer.cover_height_px(cover))
        .filter(|height| height.is_finite() && *height > 0.0)
        .map(|height| height / A4_HEIGHT_MM)
        .unwrap_or(FALLBACK_PX_PER_MM)
}

/// Pixel geometry of a generated page, resolved at run time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageGeometry {
    /// Scale used for every millimeter conversion.
    pub px_per_mm: f32,
    /// Safe content-area width.
    pub content_width_px: f32,
    /// Safe content-area height.
    pub content_height_px: f32,
    /// Gap inserted between stacked blocks.
    pub gap_px: f32,
    /// Sub-pixel rounding allowance for fit checks.
    pub fuzz_px: f32,
    /// Start-room threshold below which a tall block opens a new page.
    pub same_page_continue_px: f32,
}

impl PageGeometry {
    /// Resolve millimeter settings through `px_per_mm`.
    pub fn from_config(cfg: &PaginationConfig, px_per_mm: f32) -> Self {
        let content_height_mm = cfg.sheet_height_mm - cfg.safe_top_mm - cfg.safe_bottom_mm;
        let content_width_mm = cfg.sheet_width_mm - 2.0 * cfg.safe_side_mm;
        Self {
            px_per_mm,
            content_width_px: (content_width_mm * px_per_mm).max(1.0),
            content_height_px: (content_height_mm * px_per_mm).max(1.0),
            gap_px: cfg.block_gap_px,
            fuzz_px: cfg.fit_fuzz_px,
            same_page_continue_px: cfg.same_page_continue_max_mm * px_per_mm,
        }
    }
}

/// Inner content region of a page: an ordered stack of placed blocks.
#[derive(Clone, Debug, PartialEq)]
pub struct PageInner {
    /// Safe content-area height.
    pub height_px: f32,
    /// Gap between consecutive blocks.
    pub gap_px: f32,
    /// Placed blocks and fragments in order.
    pub blocks: Vec<FlowBlock>,
    /// Measured height of each placed block.
    pub heights: Vec<f32>,
}

impl PageInner {
    /// Create an empty region.
    pub fn new(height_px: f32, gap_px: f32) -> Self {
        Self {
            height_px,
            gap_px,
            blocks: Vec::new(),
            heights: Vec::new(),
        }
    }

    /// Whether nothing has been placed.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of placed blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Top edge of the block at `idx`.
    pub fn top_of(&self, idx: usize) -> f32 {
        let above: f32 = self.heights.iter().take(idx).sum();
        above + self.gap_px * idx as f32
    }

    /// Bottom edge of the last placed block; zero when empty.
    pub fn last_bottom_px(&self) -> f32 {
        match self.heights.len() {
            0 => 0.0,
            n => self.top_of(n - 1) + self.heights[n - 1],
        }
    }

    /// Append a block with its measured height.
    pub fn push(&mut self, block: FlowBlock, height_px: f32) {
        self.blocks.push(block);
        self.heights.push(height_px);
    }

    /// Remove the last placed block.
    pub fn pop(&mut self) -> Option<(FlowBlock, f32)> {
        let block = self.blocks.pop()?;
        let height = self.heights.pop().unwrap_or(0.0);
        Some((block, height))
    }

    /// Mutable access to the last block and its recorded height.
    pub fn last_mut(&mut self) -> Option<(&mut FlowBlock, &mut f32)> {
        match (self.blocks.last_mut(), self.heights.last_mut()) {
            (Some(block), Some(height)) => Some((block, height)),
            _ => None,
        }
    }
}

/// Generated print page.
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    /// 1-based page number; generated pages start at 2.
    pub number: u32,
    /// Content region.
    pub inner: PageInner,
}

impl Page {
    /// Placed blocks.
    pub fn blocks(&self) -> &[FlowBlock] {
        &self.inner.blocks
    }

    /// Plain text of every placed block.
    pub fn text_content(&self) -> String {
        self.inner
            .blocks
            .iter()
            .map(FlowBlock::text_content)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Create an empty page numbered `number`.
pub fn make_page(number: u32, geometry: &PageGeometry) -> Page {
    Page {
        number,
        inner: PageInner::new(geometry.content_height_px, geometry.gap_px),
    }
}

/// Whether the last placed block ends below the region by more than `fuzz_px`.
pub fn overflows(inner: &PageInner, fuzz_px: f32) -> bool {
    !inner.is_empty() && inner.last_bottom_px() > inner.height_px + fuzz_px
}

/// Room left for the next block, after the gap that will precede it.
///
/// An empty region offers its full height.
pub fn remaining_px(inner: &PageInner) -> f32 {
    if inner.is_empty() {
        return inner.height_px;
    }
    (inner.height_px - inner.last_bottom_px() - inner.gap_px).max(0.0)
}

/// Fit predicate for the last block of a region at a known top offset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitCheck {
    /// Height available below the block's top edge.
    pub room_px: f32,
    /// Rounding allowance.
    pub fuzz_px: f32,
}

impl FitCheck {
    /// Check for the block currently placed last in `inner`.
    pub fn for_last(inner: &PageInner, fuzz_px: f32) -> Self {
        let top = inner.top_of(inner.len().saturating_sub(1));
        Self {
            room_px: inner.height_px - top,
            fuzz_px,
        }
    }

    /// Whether a block of `height_px` ends past the region bottom.
    pub fn overflows(&self, height_px: f32) -> bool {
        height_px > self.room_px + self.fuzz_px
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studysheet::BodyNode;

    struct CoverOnly(Option<f32>);

    impl BlockMeasurer for CoverOnly {
        fn measure_block(&self, _block: &FlowBlock, _ctx: &crate::MeasureContext) -> f32 {
            0.0
        }

        fn cover_height_px(&self, _cover: &CoverSheet) -> Option<f32> {
            self.0
        }
    }

    fn block(text: &str) -> FlowBlock {
        FlowBlock::new().with_node(BodyNode::paragraph(text))
    }

    #[test]
    fn px_per_mm_uses_cover_or_fallback() {
        let cover = CoverSheet::default();
        assert_eq!(px_per_mm(&CoverOnly(Some(1188.0)), Some(&cover)), 4.0);
        assert_eq!(px_per_mm(&CoverOnly(Some(1188.0)), None), FALLBACK_PX_PER_MM);
        assert_eq!(px_per_mm(&CoverOnly(Some(0.0)), Some(&cover)), FALLBACK_PX_PER_MM);
        assert_eq!(px_per_mm(&CoverOnly(None), Some(&cover)), FALLBACK_PX_PER_MM);
    }

    #[test]
    fn geometry_converts_through_runtime_scale() {
        let geometry = PageGeometry::from_config(&PaginationConfig::default(), 4.0);
        assert_eq!(geometry.content_height_px, 1088.0);
        assert_eq!(geometry.content_width_px, 728.0);
        assert_eq!(geometry.same_page_continue_px, 320.0);
        assert_eq!(geometry.gap_px, 12.0);
    }

    #[test]
    fn stack_geometry_and_remaining_room() {
        let mut inner = PageInner::new(500.0, 10.0);
        assert_eq!(remaining_px(&inner), 500.0);
        assert!(!overflows(&inner, 3.0));
        inner.push(block("a"), 200.0);
        inner.push(block("b"), 100.0);
        assert_eq!(inner.top_of(1), 210.0);
        assert_eq!(inner.last_bottom_px(), 310.0);
        assert_eq!(remaining_px(&inner), 180.0);
        inner.push(block("c"), 183.0);
        assert_eq!(inner.last_bottom_px(), 503.0);
        assert!(!overflows(&inner, 3.0));
        assert_eq!(remaining_px(&inner), 0.0);
        if let Some((_, height)) = inner.last_mut() {
            *height = 184.0;
        }
        assert!(overflows(&inner, 3.0));
    }

    #[test]
    fn fit_check_matches_overflow_detector() {
        let mut inner = PageInner::new(500.0, 10.0);
        inner.push(block("a"), 200.0);
        inner.push(block("b"), 400.0);
        let check = FitCheck::for_last(&inner, 3.0);
        assert_eq!(check.room_px, 290.0);
        assert!(check.overflows(400.0));
        assert!(!check.overflows(293.0));
        assert!(check.overflows(293.5));
        assert!(overflows(&inner, 3.0));
    }

    #[test]
    fn make_page_starts_empty() {
        let geometry = PageGeometry::from_config(&PaginationConfig::default(), 4.0);
        let page = make_page(FIRST_PAGE_NUMBER, &geometry);
        assert_eq!(page.number, 2);
        assert!(page.inner.is_empty());
        assert_eq!(page.inner.height_px, 1088.0);
    }
}
