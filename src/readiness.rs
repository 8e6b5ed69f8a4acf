//! Resource readiness gate.
//!
//! Layout measurement is only meaningful once font metrics and image sizes
//! are final. The helpers here suspend until every relevant resource has
//! reached a terminal state and then wait out two frame boundaries so the
//! host has applied any resulting reflow.
//!
//! A failed resource is a terminal state like any other: errors resolve the
//! wait and are never surfaced to the caller.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Number of frame boundaries awaited after resources settle.
pub const SETTLE_FRAMES: usize = 2;

/// Load status of the document's font faces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontStatus {
    /// At least one face is still loading.
    Loading,
    /// All faces finished loading (successfully or not).
    Loaded,
}

/// Observer for the document's font-face set.
#[derive(Clone, Debug)]
pub struct FontFaceSet {
    status: watch::Receiver<FontStatus>,
}

impl FontFaceSet {
    /// Create a pending face set and the sender used to report completion.
    pub fn channel() -> (watch::Sender<FontStatus>, Self) {
        let (tx, rx) = watch::channel(FontStatus::Loading);
        (tx, Self { status: rx })
    }

    /// Face set with nothing pending.
    pub fn loaded() -> Self {
        let (_tx, rx) = watch::channel(FontStatus::Loaded);
        Self { status: rx }
    }

    /// Current status.
    pub fn status(&self) -> FontStatus {
        *self.status.borrow()
    }

    /// Resolve once loading completes. A dropped sender counts as completion.
    pub async fn ready(&self) {
        let mut rx = self.status.clone();
        if rx.wait_for(|status| *status == FontStatus::Loaded).await.is_err() {
            log::debug!("font status sender dropped before completion");
        }
    }
}

/// Load state of one image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageState {
    /// Still fetching or decoding.
    Pending,
    /// Decoded and sized.
    Loaded,
    /// Failed to load. Terminal.
    Errored,
}

impl ImageState {
    /// Whether the state is final.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Observer for a single image element.
#[derive(Clone, Debug)]
pub struct ImageSlot {
    src: String,
    state: watch::Receiver<ImageState>,
}

impl ImageSlot {
    /// Create a pending slot and the sender used to report its outcome.
    pub fn channel(src: impl Into<String>) -> (watch::Sender<ImageState>, Self) {
        let (tx, rx) = watch::channel(ImageState::Pending);
        (
            tx,
            Self {
                src: src.into(),
                state: rx,
            },
        )
    }

    /// Slot for an image that has already loaded.
    pub fn settled(src: impl Into<String>) -> Self {
        let (_tx, rx) = watch::channel(ImageState::Loaded);
        Self {
            src: src.into(),
            state: rx,
        }
    }

    /// Image source.
    pub fn src(&self) -> &str {
        &self.src
    }

    /// Current state.
    pub fn state(&self) -> ImageState {
        *self.state.borrow()
    }

    /// Resolve once the image is loaded or errored and return the final state.
    ///
    /// A sender dropped while still pending is reported as `Errored`.
    pub async fn settle(&self) -> ImageState {
        let mut rx = self.state.clone();
        let outcome = rx
            .wait_for(|state| state.is_terminal())
            .await
            .map(|state| *state);
        let state = match outcome {
            Ok(state) => state,
            Err(_) => match *rx.borrow() {
                ImageState::Pending => ImageState::Errored,
                other => other,
            },
        };
        if state == ImageState::Errored {
            log::debug!("image settled with error: {}", self.src);
        }
        state
    }
}

/// Host environment the gate observes.
pub trait ResourceHost {
    /// Font faces relevant to the document, or `None` when the host has no
    /// font-loading API.
    fn font_faces(&self) -> Option<FontFaceSet>;

    /// Observer for an image element already in the document.
    fn image(&self, src: &str) -> Option<ImageSlot>;

    /// Begin fetching `url` off-document and return its observer.
    fn preload(&self, url: &str) -> ImageSlot {
        self.image(url).unwrap_or_else(|| ImageSlot::settled(url))
    }

    /// Resolve at the next animation-frame boundary.
    fn next_frame(&self) -> impl Future<Output = ()>;
}

/// Await `SETTLE_FRAMES` consecutive frame boundaries.
pub async fn settle_frames<H: ResourceHost>(host: &H) {
    for _ in 0..SETTLE_FRAMES {
        host.next_frame().await;
    }
}

/// Suspend until fonts and the given images have settled, then let the host
/// settle for two frames.
pub async fn wait_for_fonts_and_images<H, I, S>(host: &H, sources: I)
where
    H: ResourceHost,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if let Some(fonts) = host.font_faces() {
        fonts.ready().await;
    }
    let slots: Vec<ImageSlot> = sources
        .into_iter()
        .filter_map(|src| host.image(src.as_ref()))
        .collect();
    let mut errored = 0usize;
    for slot in &slots {
        if slot.settle().await == ImageState::Errored {
            errored += 1;
        }
    }
    log::debug!(
        "resources settled: images={} errored={}",
        slots.len(),
        errored
    );
    settle_frames(host).await;
}

/// Fetch background images ahead of printing and wait until each is terminal.
///
/// Empty entries are skipped. Returns the number of images that loaded.
pub async fn preload_images<H, I, S>(host: &H, urls: I) -> usize
where
    H: ResourceHost,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut loaded = 0usize;
    for url in urls {
        let url = url.as_ref().trim();
        if url.is_empty() {
            continue;
        }
        if host.preload(url).settle().await == ImageState::Loaded {
            loaded += 1;
        }
    }
    loaded
}

/// Shared readiness flag consumed by automated print/export drivers.
#[derive(Clone, Debug, Default)]
pub struct ReadySignal {
    flag: Arc<AtomicBool>,
}

impl ReadySignal {
    /// Create an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the document ready.
    pub fn set(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether the document is ready.
    pub fn is_ready(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Host with every resource already settled and instantaneous frames.
///
/// Used for headless rendering where nothing loads asynchronously. Frame
/// boundaries are counted so callers can observe the settle barrier.
#[derive(Debug, Default)]
pub struct StaticResources {
    frames: AtomicUsize,
}

impl StaticResources {
    /// Create a host with a zero frame count.
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame boundaries awaited so far.
    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::Relaxed)
    }
}

impl ResourceHost for StaticResources {
    fn font_faces(&self) -> Option<FontFaceSet> {
        Some(FontFaceSet::loaded())
    }

    fn image(&self, src: &str) -> Option<ImageSlot> {
        Some(ImageSlot::settled(src))
    }

    fn next_frame(&self) -> impl Future<Output = ()> {
        self.frames.fetch_add(1, Ordering::Relaxed);
        std::future::ready(())
    }
}
