use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the launcher core.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Resolution ──────────────────────────────────────
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    // ── Network ─────────────────────────────────────────
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Every artifact that could not be acquired after the fallback rule ran.
    #[error("{} artifact(s) could not be acquired: {}", .0.len(), AcquisitionFailure::summary(.0))]
    Acquisition(Vec<AcquisitionFailure>),

    // ── Natives ─────────────────────────────────────────
    #[error("Failed to extract natives from {archive:?}: {reason}")]
    Extraction { archive: PathBuf, reason: String },

    // ── Launch ──────────────────────────────────────────
    #[error("Failed to spawn {program:?}: {source}")]
    Launch {
        program: PathBuf,
        source: std::io::Error,
    },

    // ── Parsing ─────────────────────────────────────────
    #[error("Invalid library coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Invalid asset entry {name}: {reason}")]
    InvalidAsset { name: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl LauncherError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LauncherError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures of the inheritance walk. All of them abort the operation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Inheritance cycle detected: {}", .chain.join(" -> "))]
    Cycle { chain: Vec<String> },

    #[error("Version {child} inherits from {parent}, which cannot be loaded")]
    MissingParent { child: String, parent: String },

    #[error("Version {0} is not installed and not listed in the version index")]
    UnknownVersion(String),

    #[error("Version {id} is malformed: {reason}")]
    Malformed { id: String, reason: String },
}

/// A single failed transfer. No retry is performed at this level.
#[derive(Debug, Error)]
#[error("Fetch of {url} failed after {retries} retries: {kind}")]
pub struct FetchError {
    pub url: String,
    pub retries: u32,
    pub kind: FetchErrorKind,
}

#[derive(Debug)]
pub enum FetchErrorKind {
    Status(u16),
    Transport(String),
    ChecksumMismatch { expected: String, actual: String },
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::Status(code) => write!(f, "HTTP {}", code),
            FetchErrorKind::Transport(msg) => write!(f, "{}", msg),
            FetchErrorKind::ChecksumMismatch { expected, actual } => {
                write!(f, "SHA-1 mismatch (expected {}, got {})", expected, actual)
            }
        }
    }
}

impl FetchError {
    pub fn status(url: &str, status: u16) -> Self {
        Self {
            url: url.to_string(),
            retries: 0,
            kind: FetchErrorKind::Status(status),
        }
    }

    pub fn transport(url: &str, message: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            retries: 0,
            kind: FetchErrorKind::Transport(message.into()),
        }
    }
}

/// One unrecoverable acquisition failure, named by the artifact it concerns.
#[derive(Debug)]
pub struct AcquisitionFailure {
    /// Library coordinate, asset name, or version id.
    pub subject: String,
    pub error: LauncherError,
}

impl AcquisitionFailure {
    pub fn new(subject: impl Into<String>, error: LauncherError) -> Self {
        Self {
            subject: subject.into(),
            error,
        }
    }

    fn summary(failures: &[AcquisitionFailure]) -> String {
        failures
            .iter()
            .map(|f| format!("{} ({})", f.subject, f.error))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
