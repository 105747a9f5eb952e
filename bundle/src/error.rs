/// Errors from bundle references and registry pulls.
#[derive(Debug, thiserror::Error)]
pub enum PullError {
    /// A version identifier is empty or not a single plain path component.
    #[error("invalid bundle key component: {0:?}")]
    InvalidKey(String),

    /// The source reference could not be parsed as `host/name:tag`.
    #[error("invalid reference: {0:?}")]
    InvalidReference(String),

    /// An HTTP request failed (network error or non-2xx status).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The registry demanded authentication the client could not satisfy.
    #[error("registry authentication failed for {0}")]
    Unauthorized(String),

    /// A manifest or token response could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A downloaded blob does not match its content digest.
    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch {
        /// Digest from the manifest.
        expected: String,
        /// Digest computed from the downloaded data.
        actual: String,
    },

    /// A manifest lists a layer media type this client cannot unpack.
    #[error("unsupported layer media type: {0}")]
    UnsupportedMediaType(String),

    /// The manifest lists no layers.
    #[error("manifest for {0} has no layers")]
    EmptyManifest(String),

    /// A filesystem I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
