//! Static study-sheet markup ingestion.
//!
//! Reads well-formed (XHTML-style) markup and extracts the cover sheet, the
//! continuous-flow blocks under `#flow` and the root custom properties.
//!
//! # Usage
//!
//! ```rust
//! use studysheet::markup::parse_document;
//!
//! # fn example() -> Result<(), studysheet::SheetError> {
//! let html = br#"<body><div id="flow">
//!   <article class="flow-block" id="intro">
//!     <header class="block__head"><h2 class="block__title">Intro</h2></header>
//!     <p>Hello</p>
//!   </article>
//! </div></body>"#;
//! let doc = parse_document(html)?;
//! assert_eq!(doc.flow.len(), 1);
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::document::{
    BlockHeader, BodyNode, CoverSheet, FlowBlock, GenericNode, HeaderKind, ImageNode, ListItem,
    ListNode, Paragraph, SplitMode, StudyDocument,
};
use crate::error::{ErrorPhase, SheetError};

/// Limits for markup ingestion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkupLimits {
    /// Maximum number of flow blocks.
    pub max_blocks: usize,
    /// Maximum element nesting depth.
    pub max_depth: usize,
    /// Maximum total bytes of captured text.
    pub max_text_bytes: usize,
}

impl Default for MarkupLimits {
    fn default() -> Self {
        Self {
            max_blocks: 4096,
            max_depth: 256,
            max_text_bytes: 8 * 1024 * 1024,
        }
    }
}

impl MarkupLimits {
    /// Preset with smaller bounds for constrained hosts.
    pub fn embedded() -> Self {
        Self {
            max_blocks: 512,
            max_depth: 64,
            max_text_bytes: 1024 * 1024,
        }
    }
}

/// Parse study-sheet markup with default limits.
pub fn parse_document(content: &[u8]) -> Result<StudyDocument, SheetError> {
    parse_document_with_limits(content, MarkupLimits::default())
}

/// Read and parse a markup file with default limits.
pub fn read_document(path: impl AsRef<Path>) -> Result<StudyDocument, SheetError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|err| {
        SheetError::new(ErrorPhase::Markup, "MARKUP_READ", err.to_string())
            .with_path(path.display().to_string())
    })?;
    parse_document(&bytes).map_err(|err| err.with_path(path.display().to_string()))
}

/// Parse study-sheet markup with explicit limits.
pub fn parse_document_with_limits(
    content: &[u8],
    limits: MarkupLimits,
) -> Result<StudyDocument, SheetError> {
    let mut reader = Reader::from_reader(content);
    let mut buf = Vec::with_capacity(256);
    let mut doc = StudyDocument::default();
    let mut st = ParseState::new(limits);

    loop {
        let offset = reader.buffer_position() as usize;
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let el = ElementInfo::from_start(&reader, &e);
                st.open(el, &mut doc).map_err(|err| err.with_offset(offset))?;
            }
            Ok(Event::Empty(e)) => {
                let el = ElementInfo::from_start(&reader, &e);
                st.open(el, &mut doc).map_err(|err| err.with_offset(offset))?;
                st.close(&mut doc);
            }
            Ok(Event::End(_)) => st.close(&mut doc),
            Ok(Event::Text(e)) => {
                let text = reader.decoder().decode(&e).unwrap_or_default();
                st.text(&text).map_err(|err| err.with_offset(offset))?;
            }
            Ok(Event::CData(e)) => {
                let text = reader.decoder().decode(&e).unwrap_or_default();
                st.text(&text).map_err(|err| err.with_offset(offset))?;
            }
            Ok(Event::GeneralRef(e)) => {
                let name = reader.decoder().decode(&e).unwrap_or_default();
                st.text(&resolve_entity(&name))
                    .map_err(|err| err.with_offset(offset))?;
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(SheetError::from(err).with_offset(offset)),
            _ => {}
        }
        buf.clear();
    }

    Ok(doc)
}

fn resolve_entity(name: &str) -> String {
    match name {
        "amp" => "&".into(),
        "lt" => "<".into(),
        "gt" => ">".into(),
        "quot" => "\"".into(),
        "apos" => "'".into(),
        "nbsp" => " ".into(),
        _ => {
            let code = if let Some(hex) = name
                .strip_prefix("#x")
                .or_else(|| name.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok()
            } else {
                None
            };
            match code.and_then(char::from_u32) {
                Some(ch) => ch.to_string(),
                None => format!("&{};", name),
            }
        }
    }
}

/// Attributes of interest for one element.
struct ElementInfo {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    split: Option<String>,
    start: Option<u32>,
    src: Option<String>,
    alt: Option<String>,
    height: Option<f32>,
    style: Option<String>,
}

impl ElementInfo {
    fn from_start(reader: &Reader<&[u8]>, e: &BytesStart<'_>) -> Self {
        let tag = reader
            .decoder()
            .decode(e.local_name().as_ref())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut info = Self {
            tag,
            id: None,
            classes: Vec::new(),
            split: None,
            start: None,
            src: None,
            alt: None,
            height: None,
            style: None,
        };
        for attr in e.attributes().flatten() {
            let raw = reader
                .decoder()
                .decode(attr.value.as_ref())
                .unwrap_or_default();
            let value = quick_xml::escape::unescape(&raw)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| raw.clone().into_owned());
            match attr.key.as_ref() {
                b"id" => info.id = Some(value),
                b"class" => {
                    info.classes = value.split_whitespace().map(str::to_string).collect()
                }
                b"data-split" => info.split = Some(value),
                b"start" => info.start = value.trim().parse().ok(),
                b"src" => info.src = Some(value),
                b"alt" => info.alt = Some(value),
                b"height" => info.height = value.trim().trim_end_matches("px").parse().ok(),
                b"style" => info.style = Some(value),
                _ => {}
            }
        }
        info
    }

    fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    fn is_heading(&self) -> bool {
        matches!(self.tag.as_str(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
    }
}

#[derive(Clone, Debug)]
enum Target {
    DocTitle,
    CoverLine { is_title: bool },
    HeaderLine { is_title: bool },
    Paragraph,
    Other { tag: String },
    ListItem,
}

struct Capture {
    target: Target,
    depth: usize,
    buf: String,
    images: Vec<ImageNode>,
}

struct ParseState {
    limits: MarkupLimits,
    depth: usize,
    text_bytes: usize,
    skip_depth: Option<usize>,
    flow_depth: Option<usize>,
    cover: Option<(CoverSheet, usize)>,
    block: Option<(FlowBlock, usize)>,
    header: Option<(BlockHeader, usize)>,
    list: Option<(ListNode, usize)>,
    capture: Option<Capture>,
}

impl ParseState {
    fn new(limits: MarkupLimits) -> Self {
        Self {
            limits,
            depth: 0,
            text_bytes: 0,
            skip_depth: None,
            flow_depth: None,
            cover: None,
            block: None,
            header: None,
            list: None,
            capture: None,
        }
    }

    fn start_capture(&mut self, target: Target) {
        self.capture = Some(Capture {
            target,
            depth: self.depth,
            buf: String::new(),
            images: Vec::new(),
        });
    }

    fn open(&mut self, el: ElementInfo, doc: &mut StudyDocument) -> Result<(), SheetError> {
        self.depth += 1;
        if self.depth > self.limits.max_depth {
            return Err(SheetError::new(
                ErrorPhase::Markup,
                "MARKUP_DEPTH",
                "element nesting exceeds max_depth",
            )
            .with_limit("max_depth", self.depth, self.limits.max_depth));
        }
        if self.skip_depth.is_some() {
            return Ok(());
        }
        if matches!(el.tag.as_str(), "script" | "style" | "template" | "noscript") {
            self.skip_depth = Some(self.depth);
            return Ok(());
        }
        if matches!(el.tag.as_str(), "html" | "body") {
            if let Some(style) = el.style.as_deref() {
                doc.style.merge_inline(style);
            }
        }

        if let Some(capture) = self.capture.as_mut() {
            match el.tag.as_str() {
                "img" => capture.images.push(image_node(&el)),
                tag if is_inline(tag) => {}
                _ => capture.buf.push(' '),
            }
            return Ok(());
        }

        if el.tag == "title" && doc.title.is_none() && self.block.is_none() {
            self.start_capture(Target::DocTitle);
            return Ok(());
        }

        if let Some((cover, _)) = self.cover.as_ref() {
            if el.is_heading() || matches!(el.tag.as_str(), "p" | "li") {
                let is_title = cover.title.is_none()
                    && (el.tag == "h1" || el.has_class("cover__title"));
                self.start_capture(Target::CoverLine { is_title });
            }
            return Ok(());
        }

        if self.block.is_none() && el.tag == "section" && el.has_class("cover") {
            self.cover = Some((CoverSheet::default(), self.depth));
            return Ok(());
        }

        if el.id.as_deref() == Some("flow") {
            self.flow_depth = Some(self.depth);
            return Ok(());
        }

        let Some((_, block_depth)) = self.block.as_ref() else {
            if self.flow_depth.is_some() && el.has_class("flow-block") {
                return self.open_block(el, doc);
            }
            return Ok(());
        };
        let block_depth = *block_depth;

        if let Some((header, _)) = self.header.as_ref() {
            let title_class = header.kind.title_class();
            if el.has_class(title_class) {
                self.start_capture(Target::HeaderLine { is_title: true });
            } else if el.is_heading()
                || matches!(el.tag.as_str(), "p" | "span" | "div" | "small" | "strong")
            {
                self.start_capture(Target::HeaderLine { is_title: false });
            }
            return Ok(());
        }

        if let Some((_, list_depth)) = self.list.as_ref() {
            if el.tag == "li" && self.depth == list_depth + 1 {
                self.start_capture(Target::ListItem);
            }
            return Ok(());
        }

        if self.depth != block_depth + 1 {
            return Ok(());
        }

        let header_kind = if el.has_class(HeaderKind::BlockHead.class_name()) {
            Some(HeaderKind::BlockHead)
        } else if el.has_class(HeaderKind::KpTop.class_name()) {
            Some(HeaderKind::KpTop)
        } else {
            None
        };
        if let Some(kind) = header_kind {
            let header = BlockHeader {
                kind,
                title: None,
                lines: Vec::new(),
            };
            self.header = Some((header, self.depth));
            return Ok(());
        }

        match el.tag.as_str() {
            "p" => self.start_capture(Target::Paragraph),
            "ul" | "ol" => {
                let list = ListNode {
                    ordered: el.tag == "ol",
                    start: el.start,
                    items: Vec::new(),
                };
                self.list = Some((list, self.depth));
            }
            "img" => {
                if let Some((block, _)) = self.block.as_mut() {
                    block.body.push(BodyNode::Image(image_node(&el)));
                }
            }
            _ => self.start_capture(Target::Other {
                tag: el.tag.clone(),
            }),
        }
        Ok(())
    }

    fn open_block(&mut self, el: ElementInfo, doc: &StudyDocument) -> Result<(), SheetError> {
        let count = doc.flow.len() + 1;
        if count > self.limits.max_blocks {
            return Err(SheetError::new(
                ErrorPhase::Markup,
                "MARKUP_BLOCKS",
                "flow block count exceeds max_blocks",
            )
            .with_limit("max_blocks", count, self.limits.max_blocks));
        }
        let alt_band = el.has_class("block--alt");
        let block = FlowBlock {
            id: el.id,
            classes: el
                .classes
                .into_iter()
                .filter(|c| c != "block--alt")
                .collect(),
            split: el
                .split
                .as_deref()
                .map(SplitMode::from_attr)
                .unwrap_or_default(),
            header: None,
            body: Vec::new(),
            alt_band,
            continuation: false,
        };
        self.block = Some((block, self.depth));
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), SheetError> {
        if self.skip_depth.is_some() {
            return Ok(());
        }
        let Some(capture) = self.capture.as_mut() else {
            return Ok(());
        };
        self.text_bytes += text.len();
        if self.text_bytes > self.limits.max_text_bytes {
            return Err(SheetError::new(
                ErrorPhase::Markup,
                "MARKUP_TEXT_BYTES",
                "captured text exceeds max_text_bytes",
            )
            .with_limit("max_text_bytes", self.text_bytes, self.limits.max_text_bytes));
        }
        capture.buf.push_str(text);
        Ok(())
    }

    fn close(&mut self, doc: &mut StudyDocument) {
        let depth = self.depth;
        self.depth = self.depth.saturating_sub(1);

        if let Some(skip) = self.skip_depth {
            if skip == depth {
                self.skip_depth = None;
            }
            return;
        }

        if self.capture.as_ref().is_some_and(|c| c.depth == depth) {
            if let Some(capture) = self.capture.take() {
                self.finish_capture(capture, doc);
            }
            return;
        }
        if self.capture.is_some() {
            return;
        }

        if self.list.as_ref().is_some_and(|(_, d)| *d == depth) {
            if let (Some((list, _)), Some((block, _))) = (self.list.take(), self.block.as_mut()) {
                block.body.push(BodyNode::List(list));
            }
            return;
        }
        if self.header.as_ref().is_some_and(|(_, d)| *d == depth) {
            if let (Some((header, _)), Some((block, _))) =
                (self.header.take(), self.block.as_mut())
            {
                block.header = Some(header);
            }
            return;
        }
        if self.block.as_ref().is_some_and(|(_, d)| *d == depth) {
            if let Some((block, _)) = self.block.take() {
                doc.flow.push(block);
            }
            return;
        }
        if self.cover.as_ref().is_some_and(|(_, d)| *d == depth) {
            if let Some((cover, _)) = self.cover.take() {
                doc.cover = Some(cover);
            }
            return;
        }
        if self.flow_depth == Some(depth) {
            self.flow_depth = None;
        }
    }

    fn finish_capture(&mut self, capture: Capture, doc: &mut StudyDocument) {
        let text = normalize_whitespace(&capture.buf);
        match capture.target {
            Target::DocTitle => {
                if !text.is_empty() {
                    doc.title = Some(text);
                }
            }
            Target::CoverLine { is_title } => {
                if let Some((cover, _)) = self.cover.as_mut() {
                    if text.is_empty() {
                        return;
                    }
                    if is_title && cover.title.is_none() {
                        cover.title = Some(text);
                    } else {
                        cover.lines.push(text);
                    }
                }
            }
            Target::HeaderLine { is_title } => {
                if let Some((header, _)) = self.header.as_mut() {
                    if text.is_empty() {
                        return;
                    }
                    if is_title && header.title.is_none() {
                        header.title = Some(text);
                    } else {
                        header.lines.push(text);
                    }
                }
            }
            Target::ListItem => {
                if let Some((list, _)) = self.list.as_mut() {
                    list.items.push(ListItem::new(text));
                }
            }
            Target::Paragraph => {
                if let Some((block, _)) = self.block.as_mut() {
                    if !text.is_empty() {
                        block.body.push(BodyNode::Paragraph(Paragraph::new(text)));
                    }
                    block
                        .body
                        .extend(capture.images.into_iter().map(BodyNode::Image));
                }
            }
            Target::Other { tag } => {
                if let Some((block, _)) = self.block.as_mut() {
                    if !text.is_empty() {
                        block.body.push(BodyNode::Other(GenericNode { tag, text }));
                    }
                    block
                        .body
                        .extend(capture.images.into_iter().map(BodyNode::Image));
                }
            }
        }
    }
}

fn image_node(el: &ElementInfo) -> ImageNode {
    ImageNode {
        src: el.src.clone().unwrap_or_default(),
        alt: el.alt.clone(),
        height_px: el.height,
    }
}

fn is_inline(tag: &str) -> bool {
    matches!(
        tag,
        "a" | "abbr" | "b" | "cite" | "code" | "em" | "i" | "mark" | "small" | "span"
            | "strong" | "sub" | "sup" | "u"
    )
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
