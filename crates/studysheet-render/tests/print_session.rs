mod common;

use common::{
    body_words, fixture_path, list_block, location, page_blocks, paragraph_block,
    FixedMetrics, RecordingNavigator,
};
use studysheet::{
    read_document, CoverSheet, ErrorPhase, MemoryPreferenceStore, Mode, ModeController,
    StaticResources, StudyDocument,
};
use studysheet_render::{
    AfterPrint, FlowMetrics, ManualView, PaginationConfig, PlacementState, PrintProfile,
    RenderError,
};

fn document() -> StudyDocument {
    let mut doc = StudyDocument {
        title: Some("Week 3".into()),
        cover: Some(CoverSheet {
            title: Some("Joy in Trials".into()),
            lines: vec!["James 1".into()],
        }),
        flow: vec![
            paragraph_block("a", 40),
            list_block("b", "Steps", 10, true),
            paragraph_block("c", 40),
        ],
        ..StudyDocument::default()
    };
    doc.style
        .merge_inline("--bg-cover: url(cover.png); --bg-page: url('page.png')");
    doc
}

fn view() -> ManualView<StaticResources, FixedMetrics> {
    ManualView::new(
        document(),
        StaticResources::new(),
        FixedMetrics,
        PaginationConfig::default(),
    )
}

fn controller(query: &str, width: u32) -> ModeController<MemoryPreferenceStore> {
    ModeController::new(MemoryPreferenceStore::new(), location(query), width)
}

#[tokio::test]
async fn reading_mode_parameter_builds_no_pages() {
    let mut view = view();
    let ready = view.ready_signal();
    let mode = view.boot(&controller("mode=mobile", 1280)).await;

    assert_eq!(mode, Mode::Reading);
    assert!(view.pages().is_empty());
    assert_eq!(view.flow().map(<[_]>::len), Some(3));
    assert!(ready.is_ready());
    // Two frames after resources settle, two more before raising the flag.
    assert_eq!(view.host().frames(), 4);
    let banded: Vec<bool> = view
        .flow()
        .unwrap_or_default()
        .iter()
        .map(|b| b.alt_band)
        .collect();
    assert_eq!(banded, vec![false, true, false]);
}

#[tokio::test]
async fn narrow_viewport_defaults_to_reading() {
    let mut narrow = view();
    assert_eq!(narrow.boot(&controller("", 420)).await, Mode::Reading);
    let mut wide = view();
    assert_eq!(wide.boot(&controller("", 1280)).await, Mode::Print);
    assert_eq!(wide.pages().len(), 2);
    assert!(wide.flow().is_none());
}

#[tokio::test]
async fn print_from_reading_paginates_before_dialog_and_reloads_after() {
    let mut view = view();
    view.boot(&controller("mode=mobile", 1280)).await;

    let mut pages_at_dialog = 0usize;
    view.request_print(|pages| pages_at_dialog = pages.len()).await;
    assert!(pages_at_dialog > 0);
    assert!(view.flow().is_none());

    let session = view.session();
    assert_eq!(session.mode, Mode::Print);
    assert!(session.print_flag);
    assert_eq!(session.print_profile, Some(PrintProfile::Reading));
    assert_eq!(session.previous_mode, Some(Mode::Reading));
    assert!(session.printed_from_reading);

    let mut nav = RecordingNavigator::default();
    assert_eq!(view.after_print(&mut nav), AfterPrint::Reloaded);
    assert_eq!(nav.reloads, 1);
    assert!(nav.assigned.is_empty());
}

#[tokio::test]
async fn print_mode_teardown_restores_flags_without_reload() {
    let mut view = view();
    view.boot(&controller("mode=a4", 420)).await;
    let before = view.pages().to_vec();

    view.before_print().await;
    assert_eq!(view.pages(), before.as_slice());
    assert_eq!(view.session().print_profile, Some(PrintProfile::Print));

    let mut nav = RecordingNavigator::default();
    assert_eq!(view.after_print(&mut nav), AfterPrint::Restored);
    assert_eq!(nav.reloads, 0);
    let session = view.session();
    assert!(!session.print_flag);
    assert_eq!(session.print_profile, None);
    assert_eq!(session.mode, Mode::Print);
}

#[tokio::test]
async fn before_print_keeps_explicitly_prepared_profile() {
    let mut view = view();
    view.boot(&controller("mode=a4", 1280)).await;
    view.prepare_for_print(PrintProfile::Reading).await;
    view.before_print().await;
    assert_eq!(view.session().print_profile, Some(PrintProfile::Reading));
}

#[tokio::test]
async fn repeated_print_preparation_is_a_no_op() {
    let mut view = view();
    view.boot(&controller("mode=mobile", 1280)).await;
    view.prepare_for_print(PrintProfile::Reading).await;
    let first = view.pages().to_vec();
    let placements = view.placements().to_vec();
    view.prepare_for_print(PrintProfile::Print).await;
    view.prepare_for_print(PrintProfile::Reading).await;
    assert_eq!(view.pages(), first.as_slice());
    assert_eq!(view.placements(), placements.as_slice());
    assert!(view.session().printed_from_reading);
}

#[tokio::test]
async fn reading_profile_uses_larger_type_scale() {
    let cfg = PaginationConfig::default();
    let doc = StudyDocument {
        flow: vec![paragraph_block("scaled", 500)],
        ..StudyDocument::default()
    };
    let mut print = ManualView::new(doc.clone(), StaticResources::new(), FixedMetrics, cfg);
    print.prepare_for_print(PrintProfile::Print).await;
    let mut reading = ManualView::new(doc, StaticResources::new(), FixedMetrics, cfg);
    reading.prepare_for_print(PrintProfile::Reading).await;
    assert_eq!(print.pages().len(), 1);
    assert_eq!(reading.pages().len(), 2);
}

#[tokio::test]
async fn fixture_document_paginates_end_to_end() {
    let doc = read_document(fixture_path("manual.xhtml")).expect("fixture parses");
    let source = doc.flow.clone();
    assert_eq!(source.len(), 6);

    let mut view = ManualView::new(
        doc,
        StaticResources::new(),
        FlowMetrics::default(),
        PaginationConfig::default(),
    );
    let mode = view.boot(&controller("", 1280)).await;
    assert_eq!(mode, Mode::Print);
    assert!(view.ready_signal().is_ready());
    assert_eq!(view.title(), Some("Week 3: Joy in Trials"));
    assert_eq!(
        view.style().background_urls(),
        vec!["assets/cover.png".to_string(), "assets/page.png".to_string()]
    );

    let pages = view.pages();
    assert!(pages.len() >= 2);
    for (idx, page) in pages.iter().enumerate() {
        assert_eq!(page.number, 2 + idx as u32);
        assert!(!page.inner.is_empty());
        assert!(page.inner.last_bottom_px() <= page.inner.height_px + 3.0);
    }
    assert!(view
        .placements()
        .iter()
        .all(|p| p.state != PlacementState::Unsplittable));
    assert_eq!(body_words(&source), body_words(page_blocks(pages)));
}

#[test]
fn open_reads_markup_into_an_unpaginated_view() {
    let view = ManualView::open(
        fixture_path("manual.xhtml"),
        StaticResources::new(),
        FixedMetrics,
        PaginationConfig::default(),
    )
    .expect("fixture opens");
    assert_eq!(view.flow().map(<[_]>::len), Some(6));
    assert!(view.pages().is_empty());
}

#[test]
fn open_reports_missing_markup_as_document_error() {
    let err = ManualView::open(
        fixture_path("absent.xhtml"),
        StaticResources::new(),
        FixedMetrics,
        PaginationConfig::default(),
    )
    .expect_err("missing markup");
    let RenderError::Sheet(inner) = &err else {
        panic!("expected document error, got {}", err);
    };
    assert_eq!(inner.phase, ErrorPhase::Markup);
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn open_rejects_invalid_config_before_reading() {
    let cfg = PaginationConfig {
        safe_top_mm: 200.0,
        safe_bottom_mm: 120.0,
        ..PaginationConfig::default()
    };
    let err = ManualView::open(
        fixture_path("absent.xhtml"),
        StaticResources::new(),
        FixedMetrics,
        cfg,
    )
    .expect_err("invalid config");
    assert!(matches!(err, RenderError::Config { field: "safe_top_mm", .. }));
}
