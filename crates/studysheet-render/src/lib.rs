//! A4 pagination engine and print orchestration for `studysheet`.

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

mod render_engine;
mod render_metrics;
mod render_page;
mod render_print;
mod render_split;

pub use render_engine::{
    BlockPlacement, Pagination, PaginationConfig, PaginationDiagnostic, Paginator,
    PlacementState, RenderError,
};
pub use render_metrics::{
    BlockMeasurer, FlowMetrics, MeasureContext, MetricsConfig, TextMeasurer, TextStyle,
    A4_HEIGHT_MM, FALLBACK_PX_PER_MM, MM_PER_INCH,
};
pub use render_page::{
    make_page, overflows, px_per_mm, remaining_px, FitCheck, Page, PageGeometry, PageInner,
    FIRST_PAGE_NUMBER,
};
pub use render_print::{AfterPrint, ManualView, PrintProfile, ViewSession};
pub use render_split::{BlockSplitter, SplitOutcome, SplitStrategy, TRUNCATION_MARK};
