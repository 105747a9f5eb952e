use std::path::PathBuf;

/// Stable categories a failed fetch is reported as.
///
/// The raw transport error is discarded; callers compare these by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum BundleError {
    /// The bundle could not be obtained from the repository (network, name
    /// resolution, timeout, bad repository address, generic transfer error).
    #[error("Failed to download bundle")]
    Download,

    /// Writing the bundle to local storage ran out of space.
    #[error("Failed to extract bundle")]
    Extract,
}

/// Errors from the bundle cache.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A classified fetch failure.
    #[error(transparent)]
    Bundle(#[from] BundleError),

    /// A version identifier cannot be used as a cache key.
    #[error("invalid bundle key: {0}")]
    InvalidKey(String),

    /// The cache directory chain could not be created.
    #[error("failed to create cache directory {}: {source}", path.display())]
    CacheDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },

    /// Staging or publishing a fetched bundle failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns the classified fetch failure, if this is one.
    pub fn bundle_error(&self) -> Option<BundleError> {
        match self {
            Self::Bundle(kind) => Some(*kind),
            _ => None,
        }
    }
}
