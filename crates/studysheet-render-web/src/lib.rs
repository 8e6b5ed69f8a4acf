//! HTML serialization for `studysheet-render` output.
//!
//! Produces a standalone document for either layout: the cover plus the
//! generated A4 sheets in print mode, or the cover plus the continuous
//! `#flow` container in reading mode. A JSON summary of the pagination pass
//! is embedded so tooling can inspect placements without re-running layout.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

use std::borrow::Cow;
use std::fmt::Write as _;

use serde::Serialize;
use studysheet::{
    BlockHeader, BodyNode, CoverSheet, FlowBlock, HeaderKind, SplitMode, StyleProperties,
};
use studysheet_render::{BlockPlacement, ManualView, Page, PlacementState, ViewSession};

/// Element id of the embedded JSON summary.
pub const SHEET_DATA_ID: &str = "sheet-data";
/// Element id of the region holding generated sheets.
pub const PAGED_REGION_ID: &str = "paged";

/// Escape text for HTML element content and quoted attribute values.
pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

/// Machine-readable summary of a rendered view.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SheetSummary {
    /// Active mode wire name.
    pub mode: String,
    /// Prepared print profile, if any.
    pub print_profile: Option<String>,
    /// Readiness flag at serialization time.
    pub ready: bool,
    /// Number of generated pages.
    pub page_count: usize,
    /// Number of blocks left overflowing.
    pub unsplittable: usize,
    /// Placement records of the last pagination pass.
    pub placements: Vec<BlockPlacement>,
}

impl SheetSummary {
    /// Summarize a view.
    pub fn from_view<H, M>(view: &ManualView<H, M>) -> Self
    where
        H: studysheet::ResourceHost,
        M: studysheet_render::BlockMeasurer,
    {
        let session = view.session();
        Self {
            mode: session.mode.as_str().to_string(),
            print_profile: session.print_profile.map(|p| p.as_str().to_string()),
            ready: session.ready.is_ready(),
            page_count: view.pages().len(),
            unsplittable: view
                .placements()
                .iter()
                .filter(|p| p.state == PlacementState::Unsplittable)
                .count(),
            placements: view.placements().to_vec(),
        }
    }
}

/// Serialize a whole view into a standalone HTML document.
pub fn render_view_html<H, M>(view: &ManualView<H, M>) -> Result<String, serde_json::Error>
where
    H: studysheet::ResourceHost,
    M: studysheet_render::BlockMeasurer,
{
    let summary = serde_json::to_string(&SheetSummary::from_view(view))?;
    let mut out = String::with_capacity(16 * 1024);
    out.push_str("<!DOCTYPE html>\n");
    write_root_open(&mut out, view.session(), view.style());
    out.push_str("<head>\n<meta charset=\"utf-8\"/>\n");
    if let Some(title) = view.title() {
        let _ = writeln!(out, "<title>{}</title>", escape_html(title));
    }
    out.push_str("</head>\n<body>\n");
    write_cover(&mut out, view.cover());
    match view.flow() {
        Some(flow) => write_flow(&mut out, flow),
        None => write_paged(&mut out, view.pages()),
    }
    let _ = writeln!(
        out,
        "<script type=\"application/json\" id=\"{}\">{}</script>",
        SHEET_DATA_ID,
        summary.replace("</", "<\\/")
    );
    out.push_str("</body>\n</html>\n");
    Ok(out)
}

fn write_root_open(out: &mut String, session: &ViewSession, style: &StyleProperties) {
    let _ = write!(out, "<html data-mode=\"{}\"", session.mode.as_str());
    if session.print_flag {
        out.push_str(" data-print=\"1\"");
    }
    if let Some(profile) = session.print_profile {
        let _ = write!(out, " data-print-profile=\"{}\"", profile.as_str());
    }
    if session.ready.is_ready() {
        out.push_str(" data-ready=\"1\"");
    }
    let decls: Vec<String> = style
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect();
    if !decls.is_empty() {
        let _ = write!(out, " style=\"{}\"", escape_html(&decls.join("; ")));
    }
    out.push_str(">\n");
}

/// Serialize the authored cover sheet (page 1).
pub fn write_cover(out: &mut String, cover: Option<&CoverSheet>) {
    let Some(cover) = cover else {
        return;
    };
    out.push_str("<section class=\"sheet cover\" data-page=\"1\" aria-label=\"Page 1\">\n");
    if let Some(title) = cover.title.as_deref() {
        let _ = writeln!(out, "<h1 class=\"cover__title\">{}</h1>", escape_html(title));
    }
    for line in &cover.lines {
        let _ = writeln!(out, "<p>{}</p>", escape_html(line));
    }
    out.push_str("</section>\n");
}

/// Serialize the continuous reading-mode container.
pub fn write_flow(out: &mut String, flow: &[FlowBlock]) {
    out.push_str("<div id=\"flow\">\n");
    for block in flow {
        write_block(out, block);
    }
    out.push_str("</div>\n");
}

/// Serialize the output region holding every generated sheet.
pub fn write_paged(out: &mut String, pages: &[Page]) {
    let _ = writeln!(out, "<div id=\"{}\">", PAGED_REGION_ID);
    for page in pages {
        write_page(out, page);
    }
    out.push_str("</div>\n");
}

/// Serialize one generated sheet.
pub fn write_page(out: &mut String, page: &Page) {
    let _ = writeln!(
        out,
        "<section class=\"sheet page\" data-page=\"{0}\" aria-label=\"Page {0}\">",
        page.number
    );
    out.push_str("<div class=\"page__inner\">\n");
    for block in page.blocks() {
        write_block(out, block);
    }
    out.push_str("</div>\n</section>\n");
}

/// Serialize a flow block or continuation fragment.
pub fn write_block(out: &mut String, block: &FlowBlock) {
    out.push_str("<article");
    if let Some(id) = block.id.as_deref() {
        let _ = write!(out, " id=\"{}\"", escape_html(id));
    }
    let mut classes: Vec<&str> = block.classes.iter().map(String::as_str).collect();
    if block.alt_band {
        classes.push("block--alt");
    }
    if !classes.is_empty() {
        let _ = write!(out, " class=\"{}\"", escape_html(&classes.join(" ")));
    }
    if block.split == SplitMode::List {
        out.push_str(" data-split=\"list\"");
    }
    if block.continuation {
        out.push_str(" data-cont=\"1\"");
    }
    out.push_str(">\n");
    if let Some(header) = &block.header {
        write_header(out, header);
    }
    for node in &block.body {
        write_node(out, node);
    }
    out.push_str("</article>\n");
}

fn write_header(out: &mut String, header: &BlockHeader) {
    let (container, title_tag) = match header.kind {
        HeaderKind::BlockHead => ("header", "h2"),
        HeaderKind::KpTop => ("div", "span"),
    };
    let _ = write!(out, "<{} class=\"{}\">", container, header.kind.class_name());
    if let Some(title) = header.title.as_deref() {
        let _ = write!(
            out,
            "<{0} class=\"{1}\">{2}</{0}>",
            title_tag,
            header.kind.title_class(),
            escape_html(title)
        );
    }
    for line in &header.lines {
        let _ = write!(out, "<p>{}</p>", escape_html(line));
    }
    let _ = writeln!(out, "</{}>", container);
}

fn write_node(out: &mut String, node: &BodyNode) {
    match node {
        BodyNode::Paragraph(p) => {
            let _ = writeln!(out, "<p>{}</p>", escape_html(&p.text));
        }
        BodyNode::List(list) => {
            let tag = if list.ordered { "ol" } else { "ul" };
            match list.start {
                Some(start) if list.ordered => {
                    let _ = writeln!(out, "<{} start=\"{}\">", tag, start);
                }
                _ => {
                    let _ = writeln!(out, "<{}>", tag);
                }
            }
            for item in &list.items {
                let _ = writeln!(out, "<li>{}</li>", escape_html(&item.text));
            }
            let _ = writeln!(out, "</{}>", tag);
        }
        BodyNode::Image(img) => {
            let _ = write!(out, "<img src=\"{}\"", escape_html(&img.src));
            if let Some(alt) = img.alt.as_deref() {
                let _ = write!(out, " alt=\"{}\"", escape_html(alt));
            }
            if let Some(height) = img.height_px {
                let _ = write!(out, " height=\"{}\"", height.round() as u32);
            }
            out.push_str("/>\n");
        }
        BodyNode::Other(node) => {
            let tag = text_container_tag(&node.tag);
            let _ = writeln!(out, "<{0}>{1}</{0}>", tag, escape_html(&node.text));
        }
    }
}

/// Flow-content elements that may carry flattened text as their only child.
const TEXT_CONTAINER_TAGS: &[&str] = &[
    "address",
    "aside",
    "blockquote",
    "div",
    "figcaption",
    "figure",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "p",
    "pre",
    "section",
];

/// Output tag for a generic node; anything outside the allow-list becomes `div`.
fn text_container_tag(tag: &str) -> &'static str {
    TEXT_CONTAINER_TAGS
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(tag))
        .unwrap_or("div")
}
