//! Error types reported during discovery.
//!
//! Nothing here propagates through task joins: processors catch failures at
//! the smallest scope and hand them to the configured error handler.
use crate::model::QualifiedName;
use std::io;
use std::path::PathBuf;

/// A recoverable or scan-level failure, delivered to the error handler.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("cannot read directory {location}: {source}")]
    DirectoryRead {
        location: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot open archive {location}: {source}")]
    ArchiveOpen {
        location: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("cannot extract nested archive {location}: {source}")]
    NestedArchiveRead {
        location: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot resolve {name} from {location}: {source}")]
    Resolution {
        name: QualifiedName,
        location: String,
        #[source]
        source: ResolveError,
    },

    #[error("walk error at {path}: {message}")]
    Walk { path: String, message: String },

    #[error("nested archive {location} exceeds the depth limit of {limit}")]
    DepthLimit { location: String, limit: u8 },

    #[error("invalid discovery root: {0}")]
    InvalidRoot(String),

    #[error("namespace {0:?} requested but the search path is empty")]
    EmptySearchPath(String),

    #[error("scan aborted: {0}")]
    Aborted(String),

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to spawn discovery thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("invalid scan options: {0}")]
    Options(#[from] serde_json::Error),

    #[error("cannot read scan options from {path}: {source}")]
    OptionsIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Outcome of a failed resolution attempt.
///
/// `NotFound`, `Link` and `Other` are recoverable: the candidate is skipped
/// and the error reported. `Unsupported` is fatal for the whole scan.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("unit {0} not found")]
    NotFound(QualifiedName),

    #[error("unit {name} failed to link: {reason}")]
    Link { name: QualifiedName, reason: String },

    #[error("unsupported scan target: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ResolveError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}
