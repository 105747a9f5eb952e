use std::path::{Path, PathBuf};

use bundle::BundleKey;

use crate::Error;

/// Maps bundle keys to directories under a cache root.
///
/// Layout: `{root}/{os_version}/{k8s_version}`. Key components are single
/// path segments, so distinct keys never share a directory.
#[derive(Debug, Clone)]
pub(crate) struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the bundle directory for `key` without touching the filesystem.
    pub(crate) fn resolve(&self, key: &BundleKey) -> PathBuf {
        self.root.join(key.os_version()).join(key.k8s_version())
    }

    /// Creates every missing parent of the bundle directory and returns it.
    ///
    /// The bundle directory itself is left absent; its existence is the
    /// cache-hit signal.
    pub(crate) fn prepare(&self, key: &BundleKey) -> Result<PathBuf, Error> {
        let bundle_dir = self.resolve(key);
        let parent = self.root.join(key.os_version());
        std::fs::create_dir_all(&parent).map_err(|source| Error::CacheDir {
            path: parent,
            source,
        })?;
        Ok(bundle_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(os: &str, k8s: &str) -> BundleKey {
        BundleKey::new(os, k8s).unwrap()
    }

    #[test]
    fn resolve_is_deterministic() {
        let a = PathResolver::new("/var/cache/bundles");
        let b = PathResolver::new("/var/cache/bundles");
        let k = key("Ubuntu_20.04.3_x64", "1.22");
        assert_eq!(a.resolve(&k), b.resolve(&k));
        assert_eq!(
            a.resolve(&k),
            Path::new("/var/cache/bundles/Ubuntu_20.04.3_x64/1.22")
        );
    }

    #[test]
    fn resolve_is_injective() {
        let resolver = PathResolver::new("/cache");
        let keys = [
            key("Ubuntu_20.04.3_x64", "1.22"),
            key("Ubuntu_20.04.3_x64", "1.23"),
            key("Ubuntu_22.04_x64", "1.22"),
            key("a_k8s_b", "c"),
            key("a", "b_k8s_c"),
            key("ubuntu_20.04.3_x64", "1.22"),
        ];
        let mut paths: Vec<_> = keys.iter().map(|k| resolver.resolve(k)).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), keys.len());
    }

    #[test]
    fn prepare_creates_missing_chain() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("a").join("b").join("c");
        let resolver = PathResolver::new(&root);
        let k = key("Ubuntu_20.04.3_x64", "1.22");

        let bundle_dir = resolver.prepare(&k).unwrap();
        assert!(root.join("Ubuntu_20.04.3_x64").is_dir());
        assert!(!bundle_dir.exists());

        // Idempotent.
        assert_eq!(resolver.prepare(&k).unwrap(), bundle_dir);
    }

    #[test]
    fn prepare_reports_unwritable_root() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let resolver = PathResolver::new(blocker.join("cache"));
        let err = resolver.prepare(&key("Ubuntu_20.04.3_x64", "1.22")).unwrap_err();
        assert!(matches!(err, Error::CacheDir { .. }));
        assert!(err.bundle_error().is_none());
    }
}
