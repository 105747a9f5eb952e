//! The fetch capability: populate a directory from a source reference.

use std::future::Future;
use std::path::{Path, PathBuf};

use crate::reference::Reference;
use crate::registry::RegistryClient;
use crate::PullError;

/// Raw error returned by a [`Fetch`] implementation.
///
/// Callers only ever inspect its text and source chain.
pub type FetchError = Box<dyn std::error::Error + Send + Sync>;

/// Transfers the bundle named by `source_ref` into the directory `dest`.
///
/// Implementations may take arbitrarily long and are not expected to be
/// interruption-safe; the caller stages `dest` so that a failed transfer is
/// never mistaken for a complete bundle.
pub trait Fetch {
    /// Performs the transfer.
    fn fetch(
        &self,
        source_ref: &str,
        dest: &Path,
    ) -> impl Future<Output = Result<(), FetchError>> + Send;
}

/// A [`Fetch`] backed by a closure, created with [`fetch_fn`].
#[derive(Debug, Clone, Copy)]
pub struct FetchFn<F>(F);

/// Wraps a closure taking `(source_ref, dest)` as a [`Fetch`].
///
/// ```
/// use bundle::fetch::{fetch_fn, FetchError};
///
/// let noop = fetch_fn(|_source, _dest| async { Ok::<(), FetchError>(()) });
/// # let _ = noop;
/// ```
pub fn fetch_fn<F, Fut>(f: F) -> FetchFn<F>
where
    F: Fn(String, PathBuf) -> Fut + Sync,
    Fut: Future<Output = Result<(), FetchError>> + Send,
{
    FetchFn(f)
}

impl<F, Fut> Fetch for FetchFn<F>
where
    F: Fn(String, PathBuf) -> Fut + Sync,
    Fut: Future<Output = Result<(), FetchError>> + Send,
{
    fn fetch(
        &self,
        source_ref: &str,
        dest: &Path,
    ) -> impl Future<Output = Result<(), FetchError>> + Send {
        (self.0)(source_ref.to_owned(), dest.to_path_buf())
    }
}

/// Default fetcher: pulls the reference from an OCI registry and unpacks it.
#[derive(Debug, Clone)]
pub struct RegistryFetcher {
    client: RegistryClient,
}

impl RegistryFetcher {
    /// Creates a fetcher that talks HTTPS to registries.
    pub fn new() -> Result<Self, PullError> {
        Ok(Self {
            client: RegistryClient::new()?,
        })
    }

    /// Switches to plain HTTP (for local or insecure registries).
    pub fn with_plain_http(self, plain_http: bool) -> Self {
        Self {
            client: self.client.with_plain_http(plain_http),
        }
    }
}

impl Fetch for RegistryFetcher {
    async fn fetch(&self, source_ref: &str, dest: &Path) -> Result<(), FetchError> {
        let reference = Reference::parse(source_ref)?;
        self.client.pull(&reference, dest).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn fetch_fn_passes_arguments() {
        let calls = AtomicUsize::new(0);
        let fetcher = fetch_fn(|source: String, dest: PathBuf| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                assert_eq!(source, "host/bundle:1.22");
                assert_eq!(dest, Path::new("/tmp/out"));
                Ok::<(), FetchError>(())
            }
        });

        fetcher
            .fetch("host/bundle:1.22", Path::new("/tmp/out"))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_fn_propagates_errors() {
        let fetcher = fetch_fn(|_: String, _: PathBuf| async {
            Err::<(), FetchError>(FetchError::from("connection refused"))
        });
        let err = fetcher.fetch("host/b:1", Path::new("/tmp")).await.unwrap_err();
        assert_eq!(err.to_string(), "connection refused");
    }

    #[tokio::test]
    async fn registry_fetcher_rejects_bad_reference() {
        let fetcher = RegistryFetcher::new().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let err = fetcher.fetch("a.a:1.22", dir.path()).await.unwrap_err();
        let pull = err.downcast_ref::<PullError>().unwrap();
        assert!(matches!(pull, PullError::InvalidReference(_)));
        // Nothing is written for a reference that never reached the network.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
