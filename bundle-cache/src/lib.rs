#![warn(missing_docs)]

//! Local cache-then-fetch downloader for OS/Kubernetes bundles.
//!
//! This crate builds on top of [`bundle`] to provide:
//! - Deterministic cache layout keyed by OS and Kubernetes version
//! - Existence-based cache hits (a present directory is never re-fetched)
//! - Staged fetches that only publish a bundle directory on success
//! - Classification of fetch failures into stable [`BundleError`] values
//!
//! # Example
//!
//! ```no_run
//! use bundle_cache::{BundleDownloader, BundleError};
//!
//! # async fn example() -> Result<(), bundle_cache::Error> {
//! let downloader = BundleDownloader::new(
//!     "projects.registry.example.com/byoh",
//!     bundle_cache::default_download_dir(),
//! )?;
//!
//! match downloader.download("Ubuntu_20.04.3_x64", "1.22").await {
//!     Ok(path) => eprintln!("bundle ready at {}", path.display()),
//!     Err(err) if err.bundle_error() == Some(BundleError::Extract) => {
//!         eprintln!("free some disk space and retry");
//!     }
//!     Err(err) => return Err(err),
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
pub mod classify;
mod error;
mod path;

pub use bundle::fetch::{FetchError, FetchFn, fetch_fn};
pub use bundle::{Fetch, RegistryFetcher};
pub use classify::Classifier;
pub use error::{BundleError, Error};

use std::path::{Path, PathBuf};

use bundle::BundleKey;
use tracing::{debug, info, warn};

use crate::path::PathResolver;

/// Downloads bundles into a local cache, fetching only on a miss.
///
/// `F` is the fetcher used by [`download`](Self::download); any other
/// [`Fetch`] can be supplied per call to
/// [`download_from_repo`](Self::download_from_repo).
#[derive(Debug, Clone)]
pub struct BundleDownloader<F = RegistryFetcher> {
    repo_addr: String,
    resolver: PathResolver,
    classifier: Classifier,
    fetcher: F,
}

impl BundleDownloader<RegistryFetcher> {
    /// Creates a downloader backed by the default OCI registry fetcher.
    ///
    /// The repository address is not validated here; an unusable address
    /// surfaces as [`BundleError::Download`] on the first fetch.
    pub fn new(repo_addr: impl Into<String>, download_path: impl Into<PathBuf>) -> Result<Self, Error> {
        // Client construction only fails if the TLS backend cannot initialize.
        let fetcher = RegistryFetcher::new().map_err(|err| {
            warn!(error = %err, "failed to build registry client");
            Error::Bundle(BundleError::Download)
        })?;
        Ok(Self::with_fetcher(repo_addr, download_path, fetcher))
    }
}

impl<F: Fetch> BundleDownloader<F> {
    /// Creates a downloader with a caller-supplied default fetcher.
    pub fn with_fetcher(
        repo_addr: impl Into<String>,
        download_path: impl Into<PathBuf>,
        fetcher: F,
    ) -> Self {
        Self {
            repo_addr: repo_addr.into(),
            resolver: PathResolver::new(download_path),
            classifier: Classifier::default(),
            fetcher,
        }
    }

    /// Replaces the error classification rules.
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Remote repository address bundles are pulled from.
    pub fn repo_addr(&self) -> &str {
        &self.repo_addr
    }

    /// Root of the local bundle cache.
    pub fn download_path(&self) -> &Path {
        self.resolver.root()
    }

    /// Returns where the bundle for this key lives (or would live) on disk.
    pub fn bundle_dir(&self, os_version: &str, k8s_version: &str) -> Result<PathBuf, Error> {
        Ok(self.resolver.resolve(&key(os_version, k8s_version)?))
    }

    /// Returns `true` if the bundle for this key is already cached.
    pub fn is_cached(&self, os_version: &str, k8s_version: &str) -> Result<bool, Error> {
        Ok(cache::exists(&self.bundle_dir(os_version, k8s_version)?))
    }

    /// Ensures the bundle is cached using the downloader's own fetcher.
    pub async fn download(&self, os_version: &str, k8s_version: &str) -> Result<PathBuf, Error> {
        self.download_from_repo(os_version, k8s_version, &self.fetcher)
            .await
    }

    /// Ensures the bundle is cached, calling `fetch` only on a cache miss.
    ///
    /// Returns the bundle directory. Fetch failures are reported as
    /// [`Error::Bundle`]; the raw error is logged and dropped.
    pub async fn download_from_repo<G: Fetch>(
        &self,
        os_version: &str,
        k8s_version: &str,
        fetch: &G,
    ) -> Result<PathBuf, Error> {
        let key = key(os_version, k8s_version)?;
        let bundle_dir = self.resolver.prepare(&key)?;

        if cache::exists(&bundle_dir) {
            info!(bundle = %key, path = %bundle_dir.display(), "using cached bundle");
            return Ok(bundle_dir);
        }

        let source = bundle::source_ref(&self.repo_addr, &key);
        let staging_parent = bundle_dir.parent().unwrap_or(self.resolver.root());
        let staging = tempfile::Builder::new()
            .prefix(".tmp-bundle-")
            .tempdir_in(staging_parent)?;

        info!(bundle = %key, source = %source, "downloading bundle");
        debug!(staging = %staging.path().display(), "fetching into staging directory");

        if let Err(err) = fetch.fetch(&source, staging.path()).await {
            let kind = self.classifier.classify(err.as_ref());
            debug!(bundle = %key, error = %err, kind = ?kind, "bundle fetch failed");
            return Err(kind.into());
        }

        publish(staging.path(), &bundle_dir)?;
        debug!(path = %bundle_dir.display(), "bundle cached");
        Ok(bundle_dir)
    }
}

fn key(os_version: &str, k8s_version: &str) -> Result<BundleKey, Error> {
    BundleKey::new(os_version, k8s_version).map_err(|err| Error::InvalidKey(err.to_string()))
}

/// Moves a completed staging directory into place.
///
/// If another caller published the same bundle first, its copy is kept.
fn publish(staging: &Path, bundle_dir: &Path) -> Result<(), Error> {
    match std::fs::rename(staging, bundle_dir) {
        Ok(()) => Ok(()),
        Err(_) if cache::exists(bundle_dir) => {
            warn!(path = %bundle_dir.display(), "bundle published concurrently, keeping existing copy");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// Returns the default download directory (`~/.local/share/byoh/bundles`).
pub fn default_download_dir() -> PathBuf {
    data_dir().join("byoh").join("bundles")
}

fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(dir);
    }
    if let Ok(home) = std::env::var("HOME") {
        return Path::new(&home).join(".local/share");
    }
    PathBuf::from("/tmp")
}
