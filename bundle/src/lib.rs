#![warn(missing_docs)]

//! OS/Kubernetes bundle references and OCI registry pull.
//!
//! This crate provides:
//! - [`BundleKey`], the `(os version, Kubernetes version)` pair that names a bundle
//! - Source reference construction against a repository address
//! - The [`Fetch`] capability used to populate a local bundle directory
//! - [`RegistryFetcher`], a default pull over the OCI distribution API
//!
//! # Example
//!
//! ```no_run
//! use bundle::{BundleKey, Fetch, RegistryFetcher};
//!
//! # async fn example() -> Result<(), bundle::FetchError> {
//! let key = BundleKey::new("Ubuntu_20.04.3_x64", "1.22")?;
//! let source = bundle::source_ref("projects.registry.example.com/byoh", &key);
//!
//! let fetcher = RegistryFetcher::new()?;
//! fetcher.fetch(&source, "/tmp/bundle".as_ref()).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod extract;
pub mod fetch;
pub mod reference;
pub mod registry;

pub use error::PullError;
pub use fetch::{Fetch, FetchError, RegistryFetcher};
pub use reference::Reference;

use std::fmt;
use std::path::{Component, Path};

/// Prefix of every bundle repository name in the remote registry.
pub const BUNDLE_PREFIX: &str = "byoh-bundle-";

/// Identifies one cached bundle: an OS version paired with a Kubernetes version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BundleKey {
    os_version: String,
    k8s_version: String,
}

impl BundleKey {
    /// Creates a key, rejecting identifiers that are not a single plain path
    /// component or that contain reference separators (`:` or `@`).
    pub fn new(os_version: &str, k8s_version: &str) -> Result<Self, PullError> {
        validate_component(os_version)?;
        validate_component(k8s_version)?;
        Ok(Self {
            os_version: os_version.to_owned(),
            k8s_version: k8s_version.to_owned(),
        })
    }

    /// Normalized OS version (e.g. `"Ubuntu_20.04.3_x64"`).
    pub fn os_version(&self) -> &str {
        &self.os_version
    }

    /// Kubernetes version (e.g. `"1.22"`).
    pub fn k8s_version(&self) -> &str {
        &self.k8s_version
    }
}

impl fmt::Display for BundleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (k8s {})", self.os_version, self.k8s_version)
    }
}

fn validate_component(value: &str) -> Result<(), PullError> {
    let invalid = || PullError::InvalidKey(value.to_owned());
    // `:` and `@` would be read as tag and digest separators in the source
    // reference.
    if value.is_empty() || value.contains(['/', '\\', '\0', ':', '@']) {
        return Err(invalid());
    }
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid()),
    }
}

/// Returns the registry repository name for a bundle
/// (e.g. `"byoh-bundle-ubuntu_20.04.3_x64_k8s"`).
///
/// OCI repository names must be lowercase, so the OS version is folded.
pub fn bundle_name(key: &BundleKey) -> String {
    format!("{BUNDLE_PREFIX}{}_k8s", key.os_version.to_lowercase())
}

/// Builds the source reference passed to [`Fetch::fetch`]:
/// `{repo_addr}/{bundle_name}:{k8s_version}`.
pub fn source_ref(repo_addr: &str, key: &BundleKey) -> String {
    format!(
        "{}/{}:{}",
        repo_addr.trim_end_matches('/'),
        bundle_name(key),
        key.k8s_version
    )
}
