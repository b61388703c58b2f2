use std::path::PathBuf;

use thiserror::Error;

/// Failure modes surfaced while resolving package directives.
///
/// Most of these are recovered per package by the resolver: the affected
/// package is dropped from the result and a diagnostic is printed. Only
/// [`ResolveError::InvalidInput`] and cache-root filesystem errors abort a
/// whole resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no version could be resolved for package '{id}'")]
    VersionResolutionFailed { id: String },

    #[error("download failed for {id}@{version}")]
    DownloadFailed {
        id: String,
        version: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("package {id}@{version} failed cache validation after extraction")]
    IntegrityCheckFailed { id: String, version: String },

    #[error("unreadable package manifest: {0}")]
    ManifestUnreadable(String),

    #[error("archive entry '{entry}' would escape the package directory")]
    PathTraversalAttempt { entry: String },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
