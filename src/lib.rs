//! Study-sheet document model, markup ingestion and rendering-mode control.
//!
//! This crate holds everything the pagination engine consumes but does not
//! compute itself: the [`StudyDocument`] built from static markup, the
//! [`ModeController`] deciding between print and reading layouts, and (with
//! the `async` feature) the resource readiness gate that delays measurement
//! until fonts and images have settled.
//!
//! Page construction lives in the `studysheet-render` crate.

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

pub mod document;
pub mod error;
pub mod markup;
pub mod mode;
#[cfg(feature = "async")]
pub mod readiness;

pub use document::{
    apply_banding, css_url, BlockHeader, BodyNode, CoverSheet, FlowBlock, GenericNode,
    HeaderKind, ImageNode, ListItem, ListNode, Paragraph, SplitMode, StudyDocument,
    StyleProperties, BG_COVER_PROPERTY, BG_PAGE_PROPERTY, CONTINUATION_MARK,
};
pub use error::{ErrorPhase, LimitContext, SheetError};
pub use markup::{parse_document, parse_document_with_limits, read_document, MarkupLimits};
pub use mode::{
    validate_location, FilePreferenceStore, MemoryPreferenceStore, Mode, ModeController,
    Navigator, PreferenceStore, MODE_QUERY_PARAM, MODE_STORAGE_KEY, NARROW_VIEWPORT_MAX_PX,
};
#[cfg(feature = "async")]
pub use readiness::{
    preload_images, settle_frames, wait_for_fonts_and_images, FontFaceSet, FontStatus,
    ImageSlot, ImageState, ReadySignal, ResourceHost, StaticResources,
};
