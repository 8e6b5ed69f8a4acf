//! Rendering mode resolution and persistence.
//!
//! The active [`Mode`] comes from, in order: an explicit `mode` request
//! parameter, a persisted preference, and finally a viewport-width heuristic.
//! Switching modes always goes through a full navigation because pagination
//! destructively rebuilds the document tree.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{ErrorPhase, SheetError};

/// Request parameter carrying an explicit mode.
pub const MODE_QUERY_PARAM: &str = "mode";
/// Preference-store key for the persisted mode.
pub const MODE_STORAGE_KEY: &str = "studysheet_mode";
/// Viewports at or below this width default to reading mode.
pub const NARROW_VIEWPORT_MAX_PX: u32 = 700;

/// Rendering intent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Fixed-height A4 pages built by the pagination engine.
    #[default]
    Print,
    /// Continuous-flow reading view; no pages are built.
    Reading,
}

impl Mode {
    /// Wire name used in request parameters and storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Print => "a4",
            Self::Reading => "mobile",
        }
    }

    /// Parse a wire name (case-insensitive). Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("a4") {
            Some(Self::Print)
        } else if value.eq_ignore_ascii_case("mobile") {
            Some(Self::Reading)
        } else {
            None
        }
    }
}

impl core::fmt::Display for Mode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key/value client storage used for persisted preferences.
pub trait PreferenceStore {
    /// Read a stored value.
    fn get(&self, key: &str) -> Result<Option<String>, SheetError>;

    /// Persist a value.
    fn set(&mut self, key: &str, value: &str) -> Result<(), SheetError>;
}

/// In-memory preference store for tests and ephemeral sessions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryPreferenceStore {
    values: BTreeMap<String, String>,
}

impl MemoryPreferenceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, SheetError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SheetError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Preference store persisted as a flat JSON object on disk.
#[derive(Clone, Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    /// Store backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, SheetError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => {
                return Err(SheetError::from(err).with_path(self.path.display().to_string()))
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&bytes)
            .map_err(|err| SheetError::from(err).with_path(self.path.display().to_string()))
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, SheetError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SheetError> {
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let payload = serde_json::to_vec_pretty(&values)?;
        fs::write(&self.path, payload)
            .map_err(|err| SheetError::from(err).with_path(self.path.display().to_string()))
    }
}

/// Host navigation hooks.
pub trait Navigator {
    /// Perform a full navigation to `url`.
    fn assign(&mut self, url: &Url);

    /// Reload the current document from scratch.
    fn reload(&mut self);
}

/// Resolves, persists and switches the active rendering mode.
#[derive(Clone, Debug)]
pub struct ModeController<S> {
    store: S,
    location: Url,
    viewport_width_px: u32,
}

impl<S: PreferenceStore> ModeController<S> {
    /// Create a controller for the given document location and viewport width.
    pub fn new(store: S, location: Url, viewport_width_px: u32) -> Self {
        Self {
            store,
            location,
            viewport_width_px,
        }
    }

    /// Parse `location` and create a controller.
    pub fn from_location(
        store: S,
        location: &str,
        viewport_width_px: u32,
    ) -> Result<Self, SheetError> {
        Ok(Self::new(store, Url::parse(location)?, viewport_width_px))
    }

    /// Current document location.
    pub fn location(&self) -> &Url {
        &self.location
    }

    /// Underlying preference store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve the preferred mode.
    ///
    /// Unrecognized request/stored values fall through to the next source;
    /// storage failures are logged and treated as "no preference".
    pub fn preferred_mode(&self) -> Mode {
        if let Some(mode) = self.requested_mode() {
            return mode;
        }
        match self.store.get(MODE_STORAGE_KEY) {
            Ok(Some(saved)) => {
                if let Some(mode) = Mode::parse(&saved) {
                    return mode;
                }
            }
            Ok(None) => {}
            Err(err) => log::warn!("mode preference unavailable: {}", err),
        }
        if self.viewport_width_px <= NARROW_VIEWPORT_MAX_PX {
            Mode::Reading
        } else {
            Mode::Print
        }
    }

    /// Mode named by the request parameter, if recognized.
    pub fn requested_mode(&self) -> Option<Mode> {
        self.location
            .query_pairs()
            .find(|(key, _)| key == MODE_QUERY_PARAM)
            .and_then(|(_, value)| Mode::parse(&value))
    }

    /// Persist the preferred mode for future visits.
    pub fn set_preferred_mode(&mut self, mode: Mode) {
        if let Err(err) = self.store.set(MODE_STORAGE_KEY, mode.as_str()) {
            log::warn!("failed to persist mode preference: {}", err);
        }
    }

    /// Location equal to the current one with the mode parameter replaced.
    pub fn location_with_mode(&self, mode: Mode) -> Url {
        let retained: Vec<(String, String)> = self
            .location
            .query_pairs()
            .filter(|(key, _)| key != MODE_QUERY_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        let mut url = self.location.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            for (key, value) in &retained {
                pairs.append_pair(key, value);
            }
            pairs.append_pair(MODE_QUERY_PARAM, mode.as_str());
        }
        url
    }

    /// Persist `mode`, then perform a full navigation with the mode encoded
    /// in the request.
    pub fn reload_with_mode<N: Navigator>(&mut self, mode: Mode, navigator: &mut N) {
        self.set_preferred_mode(mode);
        if self.location.cannot_be_a_base() {
            navigator.reload();
            return;
        }
        let target = self.location_with_mode(mode);
        log::debug!("switching to {} mode via {}", mode, target);
        navigator.assign(&target);
        self.location = target;
    }
}

/// Reject obviously unusable locations early.
pub fn validate_location(location: &str) -> Result<Url, SheetError> {
    let url = Url::parse(location)?;
    if url.cannot_be_a_base() {
        return Err(SheetError::new(
            ErrorPhase::Location,
            "LOCATION_OPAQUE",
            format!("location cannot carry request parameters: {}", location),
        ));
    }
    Ok(url)
}
