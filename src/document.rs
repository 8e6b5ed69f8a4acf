//! Study-sheet document model.
//!
//! A [`StudyDocument`] is the statically rendered input: an authored cover
//! sheet plus an ordered, continuously flowing sequence of [`FlowBlock`]s.
//! The pagination engine treats blocks as read-only except when it clones a
//! block shell to carry continuation content onto a later page.

use std::collections::BTreeMap;

/// Marker appended to a header title on continuation fragments.
pub const CONTINUATION_MARK: &str = "(cont.)";

/// Custom property naming the cover background image.
pub const BG_COVER_PROPERTY: &str = "--bg-cover";
/// Custom property naming the generated-page background image.
pub const BG_PAGE_PROPERTY: &str = "--bg-page";

/// Split policy declared by a block (`data-split`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SplitMode {
    /// No declared policy; generic strategies only.
    #[default]
    None,
    /// List-aware splitting is preferred.
    List,
}

impl SplitMode {
    /// Parse a `data-split` attribute value (case-insensitive).
    pub fn from_attr(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("list") {
            Self::List
        } else {
            Self::None
        }
    }
}

/// Header flavour recognized inside a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderKind {
    /// `.block__head` with a `.block__title`.
    BlockHead,
    /// `.kp__top` with a `.kp__title`.
    KpTop,
}

impl HeaderKind {
    /// Markup class for the header container.
    pub fn class_name(self) -> &'static str {
        match self {
            Self::BlockHead => "block__head",
            Self::KpTop => "kp__top",
        }
    }

    /// Markup class for the title element inside the header.
    pub fn title_class(self) -> &'static str {
        match self {
            Self::BlockHead => "block__title",
            Self::KpTop => "kp__title",
        }
    }
}

/// Header sub-element of a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    /// Header flavour.
    pub kind: HeaderKind,
    /// Title text, when a title element is present.
    pub title: Option<String>,
    /// Remaining header lines (subtitles, kickers).
    pub lines: Vec<String>,
}

impl BlockHeader {
    /// Create a header with a title.
    pub fn titled(kind: HeaderKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: Some(title.into()),
            lines: Vec::new(),
        }
    }

    /// Append the continuation marker to the most relevant title element.
    ///
    /// Marking is idempotent: a title that already carries a continuation
    /// marker is left unchanged. Returns `false` when there was nothing to mark.
    pub fn mark_continuation(&mut self) -> bool {
        let target = match self.title.as_mut() {
            Some(title) => title,
            None => match self.lines.first_mut() {
                Some(line) => line,
                None => return false,
            },
        };
        if !target.contains("(cont.") {
            let marked = format!("{} {}", target, CONTINUATION_MARK);
            *target = marked.trim().to_string();
        }
        true
    }

    /// Plain text of the header.
    pub fn text_content(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(1 + self.lines.len());
        if let Some(title) = self.title.as_deref() {
            parts.push(title);
        }
        parts.extend(self.lines.iter().map(String::as_str));
        parts.join("\n")
    }
}

/// Paragraph body node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Paragraph {
    /// Whitespace-normalized paragraph text.
    pub text: String,
}

impl Paragraph {
    /// Create a paragraph.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Number of whitespace-separated words.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// One list item.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListItem {
    /// Flattened item text.
    pub text: String,
}

impl ListItem {
    /// Create a list item.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Ordered or unordered list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListNode {
    /// `ol` when true, `ul` otherwise.
    pub ordered: bool,
    /// Explicit `start` attribute.
    pub start: Option<u32>,
    /// Items in document order.
    pub items: Vec<ListItem>,
}

impl ListNode {
    /// Effective first ordinal; `start="0"` or a missing value counts from 1.
    pub fn start_index(&self) -> u32 {
        match self.start {
            Some(start) if start > 0 => start,
            _ => 1,
        }
    }

    /// Empty list of the same kind.
    pub fn empty_like(&self) -> Self {
        Self {
            ordered: self.ordered,
            start: self.start,
            items: Vec::new(),
        }
    }
}

/// Image body node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageNode {
    /// Image source reference.
    pub src: String,
    /// Alternative text.
    pub alt: Option<String>,
    /// Declared rendered height, when authored.
    pub height_px: Option<f32>,
}

/// Any other element, kept as flattened text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenericNode {
    /// Element tag name.
    pub tag: String,
    /// Flattened text content.
    pub text: String,
}

/// Immediate body child of a flow block.
#[derive(Clone, Debug, PartialEq)]
pub enum BodyNode {
    /// `p`
    Paragraph(Paragraph),
    /// `ul` / `ol`
    List(ListNode),
    /// `img`
    Image(ImageNode),
    /// Anything else.
    Other(GenericNode),
}

impl BodyNode {
    /// Convenience paragraph constructor.
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::Paragraph(Paragraph::new(text))
    }

    /// Plain text of the node; list items are newline separated.
    pub fn text_content(&self) -> String {
        match self {
            Self::Paragraph(p) => p.text.clone(),
            Self::List(list) => list
                .items
                .iter()
                .map(|item| item.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Image(img) => img.alt.clone().unwrap_or_default(),
            Self::Other(node) => node.text.clone(),
        }
    }
}

/// Content unit placed by the pagination engine.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlowBlock {
    /// Unique element identifier. Never carried by continuation fragments.
    pub id: Option<String>,
    /// Markup classes, excluding banding.
    pub classes: Vec<String>,
    /// Declared split policy.
    pub split: SplitMode,
    /// Optional header sub-element.
    pub header: Option<BlockHeader>,
    /// Body children in document order.
    pub body: Vec<BodyNode>,
    /// Alternating visual band (`block--alt`).
    pub alt_band: bool,
    /// Continuation cue for fragments without a header (`data-cont`).
    pub continuation: bool,
}

impl FlowBlock {
    /// Create an empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the unique identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the split policy.
    pub fn with_split(mut self, split: SplitMode) -> Self {
        self.split = split;
        self
    }

    /// Set a `.block__head` header with the given title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.header = Some(BlockHeader::titled(HeaderKind::BlockHead, title));
        self
    }

    /// Append a body node.
    pub fn with_node(mut self, node: BodyNode) -> Self {
        self.body.push(node);
        self
    }

    /// Number of body (non-header) children.
    pub fn content_len(&self) -> usize {
        self.body.len()
    }

    /// Whether the block carries any body content.
    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }

    /// Shallow continuation clone: same classes and split policy, a copy of the
    /// header marked as continued, no identifier and no body.
    pub fn continuation_shell(&self) -> Self {
        let mut header = self.header.clone();
        let marked = header
            .as_mut()
            .map(BlockHeader::mark_continuation)
            .unwrap_or(false);
        Self {
            id: None,
            classes: self.classes.clone(),
            split: self.split,
            header,
            body: Vec::new(),
            alt_band: self.alt_band,
            continuation: self.continuation || !marked,
        }
    }

    /// Index and mutable reference of the first list in the body.
    pub fn first_list_mut(&mut self) -> Option<(usize, &mut ListNode)> {
        self.body.iter_mut().enumerate().find_map(|(idx, node)| match node {
            BodyNode::List(list) => Some((idx, list)),
            _ => None,
        })
    }

    /// Plain text of the body children, newline separated.
    pub fn body_text(&self) -> String {
        self.body
            .iter()
            .map(BodyNode::text_content)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Plain text of header and body.
    pub fn text_content(&self) -> String {
        match &self.header {
            Some(header) if self.body.is_empty() => header.text_content(),
            Some(header) => format!("{}\n{}", header.text_content(), self.body_text()),
            None => self.body_text(),
        }
    }

    /// Short identifying label for diagnostics.
    pub fn label(&self) -> String {
        if let Some(id) = self.id.as_deref() {
            return id.to_string();
        }
        if let Some(title) = self.header.as_ref().and_then(|h| h.title.as_deref()) {
            return title.to_string();
        }
        self.classes.join(" ")
    }

    /// Image sources referenced by the body.
    pub fn image_sources(&self) -> impl Iterator<Item = &str> {
        self.body.iter().filter_map(|node| match node {
            BodyNode::Image(img) if !img.src.is_empty() => Some(img.src.as_str()),
            _ => None,
        })
    }
}

/// Apply the alternating visual band: every second block is shaded.
pub fn apply_banding(blocks: &mut [FlowBlock]) {
    for (idx, block) in blocks.iter_mut().enumerate() {
        block.alt_band = idx % 2 == 1;
    }
}

/// Authored cover sheet (page 1).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoverSheet {
    /// Cover title.
    pub title: Option<String>,
    /// Remaining cover text lines.
    pub lines: Vec<String>,
}

/// Custom style properties visible on the document root.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StyleProperties {
    props: BTreeMap<String, String>,
}

impl StyleProperties {
    /// Create an empty property map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge custom properties from an inline `style` attribute.
    pub fn merge_inline(&mut self, style: &str) {
        for decl in style.split(';') {
            let Some((name, value)) = decl.split_once(':') else {
                continue;
            };
            let name = name.trim();
            if !name.starts_with("--") {
                continue;
            }
            self.props
                .insert(name.to_string(), value.trim().to_string());
        }
    }

    /// Set a property.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.props.insert(name.into(), value.into());
    }

    /// Get a property value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.props.get(name).map(String::as_str)
    }

    /// Properties in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.props.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Background image references named by `--bg-cover` and `--bg-page`.
    pub fn background_urls(&self) -> Vec<String> {
        [BG_COVER_PROPERTY, BG_PAGE_PROPERTY]
            .iter()
            .filter_map(|name| self.get(name))
            .filter_map(css_url)
            .map(str::to_string)
            .collect()
    }
}

/// Extract the target of a CSS `url(...)` value.
///
/// Accepts single, double or no quotes. Returns `None` for values without a
/// `url(` function or with an empty target.
pub fn css_url(value: &str) -> Option<&str> {
    let lower = value.to_ascii_lowercase();
    let open = lower.find("url(")? + 4;
    let rest = &value[open..];
    let (body, quote) = match rest.chars().next() {
        Some(q @ ('\'' | '"')) => (&rest[1..], Some(q)),
        _ => (rest, None),
    };
    let end = match quote {
        Some(q) => {
            let mut pat = String::with_capacity(2);
            pat.push(q);
            pat.push(')');
            body.find(pat.as_str())?
        }
        None => body.find(')')?,
    };
    let url = &body[..end];
    if url.is_empty() {
        None
    } else {
        Some(url)
    }
}

/// Statically rendered study document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StudyDocument {
    /// Document title.
    pub title: Option<String>,
    /// Authored cover sheet.
    pub cover: Option<CoverSheet>,
    /// Continuous-flow content blocks.
    pub flow: Vec<FlowBlock>,
    /// Root custom properties.
    pub style: StyleProperties,
}

impl StudyDocument {
    /// Image sources referenced anywhere in the flow.
    pub fn image_sources(&self) -> Vec<String> {
        self.flow
            .iter()
            .flat_map(FlowBlock::image_sources)
            .map(str::to_string)
            .collect()
    }
}
