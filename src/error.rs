//! Error types shared across study-sheet ingestion and mode control.

use core::fmt;

/// Processing phase where an error originated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorPhase {
    /// Reading static document markup.
    Markup,
    /// Reading or writing persisted preferences.
    Preferences,
    /// Resolving document locations.
    Location,
}

impl fmt::Display for ErrorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Markup => "markup",
            Self::Preferences => "preferences",
            Self::Location => "location",
        };
        f.write_str(label)
    }
}

/// Typed actual-vs-limit context for limit violations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LimitContext {
    /// Limit name.
    pub kind: &'static str,
    /// Observed value.
    pub actual: usize,
    /// Configured limit.
    pub limit: usize,
}

/// Structured error for ingestion, storage and location operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetError {
    /// Processing phase where this error originated.
    pub phase: ErrorPhase,
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: Box<str>,
    /// Optional file path context.
    pub path: Option<Box<str>>,
    /// Optional byte offset into the markup input.
    pub offset: Option<usize>,
    /// Optional typed actual-vs-limit context.
    pub limit: Option<LimitContext>,
}

impl SheetError {
    /// Create an error with a stable code and no extra context.
    ///
    /// Host-provided [`PreferenceStore`](crate::PreferenceStore) backends use
    /// this with [`ErrorPhase::Preferences`].
    pub fn new(phase: ErrorPhase, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            phase,
            code,
            message: message.into().into_boxed_str(),
            path: None,
            offset: None,
            limit: None,
        }
    }

    /// Attach a file path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into().into_boxed_str());
        self
    }

    pub(crate) fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub(crate) fn with_limit(mut self, kind: &'static str, actual: usize, limit: usize) -> Self {
        self.limit = Some(LimitContext {
            kind,
            actual,
            limit,
        });
        self
    }
}

impl fmt::Display for SheetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.phase, self.code, self.message)?;
        if let Some(path) = self.path.as_deref() {
            write!(f, " [path={}]", path)?;
        }
        if let Some(offset) = self.offset {
            write!(f, " [offset={}]", offset)?;
        }
        if let Some(limit) = &self.limit {
            write!(
                f,
                " [limit_kind={} actual={} limit={}]",
                limit.kind, limit.actual, limit.limit
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for SheetError {}

impl From<quick_xml::Error> for SheetError {
    fn from(err: quick_xml::Error) -> Self {
        Self::new(ErrorPhase::Markup, "MARKUP_XML", err.to_string())
    }
}

impl From<std::io::Error> for SheetError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorPhase::Preferences, "PREF_IO", err.to_string())
    }
}

impl From<serde_json::Error> for SheetError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorPhase::Preferences, "PREF_JSON", err.to_string())
    }
}

impl From<url::ParseError> for SheetError {
    fn from(err: url::ParseError) -> Self {
        Self::new(ErrorPhase::Location, "LOCATION_URL", err.to_string())
    }
}
