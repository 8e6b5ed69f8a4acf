use std::sync::Arc;

use studysheet::{BlockHeader, BodyNode, CoverSheet, FlowBlock, ListNode};

/// Physical A4 sheet height in millimeters.
pub const A4_HEIGHT_MM: f32 = 297.0;
/// Millimeters per inch.
pub const MM_PER_INCH: f32 = 25.4;
/// CSS reference resolution expressed per millimeter.
pub const FALLBACK_PX_PER_MM: f32 = 96.0 / MM_PER_INCH;

/// Resolved text style used for width measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyle {
    /// Font size in px.
    pub size_px: f32,
    /// Line height multiplier.
    pub line_height: f32,
    /// CSS font weight.
    pub weight: u16,
}

impl TextStyle {
    fn line_px(self) -> f32 {
        self.size_px * self.line_height
    }
}

/// Pluggable glyph-width measurer.
pub trait TextMeasurer: Send + Sync {
    /// Measure rendered text width for the provided style.
    fn measure_text_px(&self, text: &str, style: &TextStyle) -> f32;

    /// Conservative (safe upper-bound) width estimate.
    ///
    /// Default delegates to `measure_text_px`.
    fn conservative_text_px(&self, text: &str, style: &TextStyle) -> f32 {
        self.measure_text_px(text, style)
    }
}

/// Inputs shared by every block measurement in one pagination pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeasureContext {
    /// Usable content width of a page in px.
    pub content_width_px: f32,
    /// Multiplier applied to every typographic size.
    pub type_scale: f32,
}

/// Reports the rendered height of flow blocks.
///
/// This is the only geometry source the pagination engine consults: given a
/// block (or a fragment of one) it returns the vertical space the block
/// occupies, padding and header included.
pub trait BlockMeasurer {
    /// Required height of `block` in px.
    fn measure_block(&self, block: &FlowBlock, ctx: &MeasureContext) -> f32;

    /// Rendered height of the authored cover sheet, when one is laid out.
    fn cover_height_px(&self, cover: &CoverSheet) -> Option<f32>;
}

/// Typographic metrics used by [`FlowMetrics`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MetricsConfig {
    /// Body text size.
    pub body_size_px: f32,
    /// Body line height multiplier.
    pub body_line_height: f32,
    /// Header title size.
    pub title_size_px: f32,
    /// Secondary header line size.
    pub header_line_size_px: f32,
    /// Header line height multiplier.
    pub header_line_height: f32,
    /// Gap between header and body.
    pub header_gap_px: f32,
    /// Total vertical block padding (top + bottom).
    pub block_padding_px: f32,
    /// Horizontal block padding (left + right).
    pub block_inset_px: f32,
    /// Gap between body children.
    pub paragraph_gap_px: f32,
    /// Gap between list items.
    pub list_item_gap_px: f32,
    /// Left indent of list items.
    pub list_indent_px: f32,
    /// Height of images without an explicit height.
    pub default_image_height_px: f32,
    /// Average glyph advance in em when no text measurer is installed.
    pub avg_glyph_em: f32,
    /// Output resolution; sizes the cover sheet and thus the px-per-mm ratio.
    pub px_per_inch: f32,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            body_size_px: 15.0,
            body_line_height: 1.45,
            title_size_px: 18.0,
            header_line_size_px: 12.5,
            header_line_height: 1.3,
            header_gap_px: 10.0,
            block_padding_px: 28.0,
            block_inset_px: 32.0,
            paragraph_gap_px: 8.0,
            list_item_gap_px: 4.0,
            list_indent_px: 22.0,
            default_image_height_px: 180.0,
            avg_glyph_em: 0.5,
            px_per_inch: 96.0,
        }
    }
}

/// Default metrics provider: greedy word wrap over average glyph widths.
#[derive(Clone)]
pub struct FlowMetrics {
    cfg: MetricsConfig,
    text_measurer: Option<Arc<dyn TextMeasurer>>,
}

impl core::fmt::Debug for FlowMetrics {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FlowMetrics")
            .field("cfg", &self.cfg)
            .field("has_text_measurer", &self.text_measurer.is_some())
            .finish()
    }
}

impl Default for FlowMetrics {
    fn default() -> Self {
        Self::new(MetricsConfig::default())
    }
}

impl FlowMetrics {
    /// Create a metrics provider.
    pub fn new(cfg: MetricsConfig) -> Self {
        Self {
            cfg,
            text_measurer: None,
        }
    }

    /// Install a shared text measurer for glyph-accurate width fitting.
    pub fn with_text_measurer(mut self, measurer: Arc<dyn TextMeasurer>) -> Self {
        self.text_measurer = Some(measurer);
        self
    }

    /// Active metrics.
    pub fn config(&self) -> MetricsConfig {
        self.cfg
    }

    fn body_style(&self, scale: f32) -> TextStyle {
        TextStyle {
            size_px: self.cfg.body_size_px * scale,
            line_height: self.cfg.body_line_height,
            weight: 400,
        }
    }

    fn measure_text(&self, text: &str, style: &TextStyle) -> f32 {
        self.text_measurer
            .as_ref()
            .map(|m| m.conservative_text_px(text, style))
            .unwrap_or_else(|| text.chars().count() as f32 * self.cfg.avg_glyph_em * style.size_px)
    }

    /// Number of lines `text` wraps to within `width_px`.
    pub fn line_count(&self, text: &str, style: &TextStyle, width_px: f32) -> usize {
        let width_px = width_px.max(style.size_px);
        if !(width_px.is_finite() && width_px > 0.0) {
            return usize::from(text.split_whitespace().next().is_some());
        }
        // Unusable widths from a text measurer count as one full line.
        let usable = |px: f32| if px.is_finite() { px.max(0.0) } else { width_px };
        let space = usable(self.measure_text(" ", style));
        let mut lines = 0usize;
        let mut line_width = 0.0f32;
        for word in text.split_whitespace() {
            let word_width = usable(self.measure_text(word, style));
            if lines == 0 {
                lines = 1;
                line_width = word_width;
            } else if line_width + space + word_width <= width_px {
                line_width += space + word_width;
            } else {
                lines += 1;
                line_width = word_width;
            }
            // Overlong words wrap onto further lines.
            if line_width > width_px {
                let extra = (line_width / width_px).ceil() - 1.0;
                lines = lines.saturating_add(extra as usize);
                line_width -= extra * width_px;
            }
        }
        lines
    }

    fn text_height(&self, text: &str, style: TextStyle, width_px: f32) -> f32 {
        self.line_count(text, &style, width_px) as f32 * style.line_px()
    }

    fn header_height(&self, header: &BlockHeader, width_px: f32, scale: f32) -> f32 {
        let title_style = TextStyle {
            size_px: self.cfg.title_size_px * scale,
            line_height: self.cfg.header_line_height,
            weight: 700,
        };
        let line_style = TextStyle {
            size_px: self.cfg.header_line_size_px * scale,
            line_height: self.cfg.header_line_height,
            weight: 400,
        };
        let mut height = header
            .title
            .as_deref()
            .map(|title| self.text_height(title, title_style, width_px))
            .unwrap_or(0.0);
        for line in &header.lines {
            height += self.text_height(line, line_style, width_px);
        }
        height
    }

    fn list_height(&self, list: &ListNode, width_px: f32, scale: f32) -> f32 {
        let style = self.body_style(scale);
        let item_width = width_px - self.cfg.list_indent_px * scale;
        let items: f32 = list
            .items
            .iter()
            .map(|item| self.text_height(&item.text, style, item_width).max(style.line_px()))
            .sum();
        let gaps = list.items.len().saturating_sub(1) as f32 * self.cfg.list_item_gap_px * scale;
        items + gaps
    }

    fn node_height(&self, node: &BodyNode, width_px: f32, scale: f32) -> f32 {
        match node {
            BodyNode::Paragraph(p) => self.text_height(&p.text, self.body_style(scale), width_px),
            BodyNode::List(list) => self.list_height(list, width_px, scale),
            BodyNode::Image(img) => img
                .height_px
                .unwrap_or(self.cfg.default_image_height_px * scale),
            BodyNode::Other(node) => self.text_height(&node.text, self.body_style(scale), width_px),
        }
    }
}

impl BlockMeasurer for FlowMetrics {
    fn measure_block(&self, block: &FlowBlock, ctx: &MeasureContext) -> f32 {
        let scale = ctx.type_scale;
        let width = (ctx.content_width_px - self.cfg.block_inset_px).max(1.0);
        let mut height = self.cfg.block_padding_px;
        if let Some(header) = &block.header {
            height += self.header_height(header, width, scale);
            if block.has_body() {
                height += self.cfg.header_gap_px * scale;
            }
        }
        let gaps = block.body.len().saturating_sub(1) as f32 * self.cfg.paragraph_gap_px * scale;
        height += gaps;
        height += block
            .body
            .iter()
            .map(|node| self.node_height(node, width, scale))
            .sum::<f32>();
        height
    }

    /// The cover is one full sheet at the configured output resolution.
    fn cover_height_px(&self, _cover: &CoverSheet) -> Option<f32> {
        let ppi = self.cfg.px_per_inch;
        (ppi.is_finite() && ppi > 0.0).then(|| A4_HEIGHT_MM * ppi / MM_PER_INCH)
    }
}
