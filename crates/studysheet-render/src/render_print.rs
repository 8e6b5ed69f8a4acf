//! Document view lifecycle: boot, print preparation and print teardown.

use std::path::Path;

use studysheet::{
    apply_banding, preload_images, read_document, settle_frames, wait_for_fonts_and_images,
    CoverSheet, FlowBlock, Mode, ModeController, Navigator, PreferenceStore, ReadySignal,
    ResourceHost, StudyDocument, StyleProperties,
};

use crate::render_engine::{
    BlockPlacement, PaginationConfig, PaginationDiagnostic, Paginator, RenderError,
};
use crate::render_metrics::BlockMeasurer;
use crate::render_page::Page;

/// Rendering intent used for a print run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrintProfile {
    /// Regular A4 type scale.
    Print,
    /// Reading-mode type scale carried onto A4 pages.
    Reading,
}

impl PrintProfile {
    /// Profile matching a view mode.
    pub fn from_mode(mode: Mode) -> Self {
        match mode {
            Mode::Print => Self::Print,
            Mode::Reading => Self::Reading,
        }
    }

    /// Wire name, shared with [`Mode`].
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Print => Mode::Print.as_str(),
            Self::Reading => Mode::Reading.as_str(),
        }
    }

    /// Parse a wire name (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        Mode::parse(value).map(Self::from_mode)
    }

    /// Type scale applied while paginating.
    pub fn type_scale(self, cfg: &PaginationConfig) -> f32 {
        match self {
            Self::Print => 1.0,
            Self::Reading => cfg.reading_type_scale,
        }
    }
}

/// Outcome of print teardown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AfterPrint {
    /// The host was asked to reload; the reading view cannot be rebuilt in place.
    Reloaded,
    /// Print flags were cleared; the paginated view stays.
    Restored,
}

/// Per-document view state.
#[derive(Clone, Debug, Default)]
pub struct ViewSession {
    /// Active view mode.
    pub mode: Mode,
    /// A print run has been prepared.
    pub print_flag: bool,
    /// Profile of the prepared print run.
    pub print_profile: Option<PrintProfile>,
    /// Mode active before print preparation forced print mode.
    pub previous_mode: Option<Mode>,
    /// Print preparation started from the reading view.
    pub printed_from_reading: bool,
    /// Readiness flag for automated print drivers.
    pub ready: ReadySignal,
}

/// A study document bound to a resource host and a metrics provider.
pub struct ManualView<H, M> {
    host: H,
    measurer: M,
    paginator: Paginator,
    title: Option<String>,
    cover: Option<CoverSheet>,
    style: StyleProperties,
    flow: Option<Vec<FlowBlock>>,
    pages: Vec<Page>,
    placements: Vec<BlockPlacement>,
    session: ViewSession,
}

impl<H, M> core::fmt::Debug for ManualView<H, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ManualView")
            .field("pages", &self.pages.len())
            .field("flow", &self.flow.as_ref().map(Vec::len))
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl<H: ResourceHost, M: BlockMeasurer> ManualView<H, M> {
    /// Bind `document` to a host and metrics provider.
    pub fn new(document: StudyDocument, host: H, measurer: M, cfg: PaginationConfig) -> Self {
        Self {
            host,
            measurer,
            paginator: Paginator::new(cfg),
            title: document.title,
            cover: document.cover,
            style: document.style,
            flow: Some(document.flow),
            pages: Vec::new(),
            placements: Vec::new(),
            session: ViewSession::default(),
        }
    }

    /// Read the study markup at `path` and bind it after validating `cfg`.
    pub fn open(
        path: impl AsRef<Path>,
        host: H,
        measurer: M,
        cfg: PaginationConfig,
    ) -> Result<Self, RenderError> {
        cfg.validate()?;
        let document = read_document(path)?;
        Ok(Self::new(document, host, measurer, cfg))
    }

    /// Register or replace the pagination diagnostics sink.
    pub fn set_diagnostic_sink<F>(&mut self, sink: F)
    where
        F: FnMut(PaginationDiagnostic) + Send + 'static,
    {
        self.paginator.set_diagnostic_sink(sink);
    }

    /// Resolve the view mode and build the initial layout.
    ///
    /// The ready flag is raised two frames after pages (or the reading view)
    /// are in place.
    pub async fn boot<S: PreferenceStore>(&mut self, controller: &ModeController<S>) -> Mode {
        let mode = controller.preferred_mode();
        self.session.mode = mode;
        self.band();
        self.wait_for_resources().await;
        match mode {
            Mode::Print => self.paginate(PrintProfile::Print),
            Mode::Reading => log::debug!("reading mode: keeping continuous flow"),
        }
        settle_frames(&self.host).await;
        self.session.ready.set();
        mode
    }

    /// Build the paginated layout for printing.
    ///
    /// Safe to call repeatedly: pages are only built when none exist yet.
    pub async fn prepare_for_print(&mut self, profile: PrintProfile) {
        let current = self.session.mode;
        if current == Mode::Reading {
            self.session.printed_from_reading = true;
        }
        self.session.previous_mode = Some(current);
        self.session.print_flag = true;
        self.session.print_profile = Some(profile);
        self.session.mode = Mode::Print;

        self.band();
        self.wait_for_resources().await;
        if self.pages.is_empty() && self.flow.is_some() {
            self.paginate(profile);
        }

        let backgrounds = self.style.background_urls();
        let loaded = preload_images(&self.host, &backgrounds).await;
        log::debug!("preloaded {}/{} background image(s)", loaded, backgrounds.len());
        let placed: Vec<String> = self
            .pages
            .iter()
            .flat_map(|page| page.inner.blocks.iter())
            .flat_map(FlowBlock::image_sources)
            .map(str::to_string)
            .collect();
        wait_for_fonts_and_images(&self.host, &placed).await;
    }

    /// Platform print-event hook.
    ///
    /// Skipped when an explicit print request already prepared the document.
    pub async fn before_print(&mut self) {
        if self.session.print_flag && self.session.print_profile.is_some() {
            return;
        }
        let profile = PrintProfile::from_mode(self.session.mode);
        self.prepare_for_print(profile).await;
    }

    /// Explicit print action: prepare, settle, then open the print dialog.
    pub async fn request_print<F>(&mut self, open_dialog: F)
    where
        F: FnOnce(&[Page]),
    {
        let profile = PrintProfile::from_mode(self.session.mode);
        self.prepare_for_print(profile).await;
        settle_frames(&self.host).await;
        open_dialog(&self.pages);
    }

    /// Print teardown.
    pub fn after_print<N: Navigator>(&mut self, navigator: &mut N) -> AfterPrint {
        if self.session.printed_from_reading {
            log::debug!("printed from reading mode; reloading");
            navigator.reload();
            return AfterPrint::Reloaded;
        }
        self.session.print_flag = false;
        self.session.print_profile = None;
        self.session.previous_mode = None;
        AfterPrint::Restored
    }

    /// Generated pages; empty in reading mode.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Continuous flow, until pagination consumes it.
    pub fn flow(&self) -> Option<&[FlowBlock]> {
        self.flow.as_deref()
    }

    /// Placement records of the last pagination pass.
    pub fn placements(&self) -> &[BlockPlacement] {
        &self.placements
    }

    /// Document title.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Authored cover sheet.
    pub fn cover(&self) -> Option<&CoverSheet> {
        self.cover.as_ref()
    }

    /// Root custom properties.
    pub fn style(&self) -> &StyleProperties {
        &self.style
    }

    /// Session state.
    pub fn session(&self) -> &ViewSession {
        &self.session
    }

    /// Shared readiness flag.
    pub fn ready_signal(&self) -> ReadySignal {
        self.session.ready.clone()
    }

    /// Resource host.
    pub fn host(&self) -> &H {
        &self.host
    }

    fn band(&mut self) {
        if let Some(flow) = self.flow.as_mut() {
            apply_banding(flow);
        }
    }

    async fn wait_for_resources(&self) {
        let sources: Vec<&str> = self
            .flow
            .iter()
            .flatten()
            .flat_map(FlowBlock::image_sources)
            .collect();
        wait_for_fonts_and_images(&self.host, sources).await;
    }

    fn paginate(&mut self, profile: PrintProfile) {
        let Some(flow) = self.flow.take() else {
            return;
        };
        let scale = profile.type_scale(&self.paginator.config());
        let result = self
            .paginator
            .paginate(flow, self.cover.as_ref(), &self.measurer, scale);
        log::debug!(
            "paginated {} block(s) onto {} page(s) with {} profile",
            result.placements.len(),
            result.pages.len(),
            profile.as_str()
        );
        self.pages = result.pages;
        self.placements = result.placements;
    }
}
