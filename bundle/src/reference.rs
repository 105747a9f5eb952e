//! Parsing of `host/name:tag` source references.

use std::fmt;

use crate::PullError;

/// A parsed OCI image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Registry host, optionally with a port (e.g. `"localhost:5000"`).
    pub host: String,
    /// Repository path within the registry (e.g. `"byoh/byoh-bundle-ubuntu_k8s"`).
    pub repository: String,
    /// Tag or `algorithm:hex` digest.
    pub tag: String,
}

impl Reference {
    /// Parses `host/repository:tag` or `host/repository@sha256:<hex>`.
    ///
    /// The host is always the first path segment; unlike container runtimes
    /// there is no implicit default registry.
    pub fn parse(reference: &str) -> Result<Self, PullError> {
        let invalid = || PullError::InvalidReference(reference.to_owned());

        let (name, tag) = match reference.split_once('@') {
            Some((name, digest)) => (name, digest),
            None => {
                let slash = reference.rfind('/').ok_or_else(invalid)?;
                let colon = reference[slash..].rfind(':').ok_or_else(invalid)?;
                let split = slash + colon;
                (&reference[..split], &reference[split + 1..])
            }
        };

        let (host, repository) = name.split_once('/').ok_or_else(invalid)?;
        if host.is_empty() || repository.is_empty() || tag.is_empty() {
            return Err(invalid());
        }
        if repository.split('/').any(str::is_empty) {
            return Err(invalid());
        }

        Ok(Self {
            host: host.to_owned(),
            repository: repository.to_owned(),
            tag: tag.to_owned(),
        })
    }

    /// Returns `true` if the tag is a content digest rather than a tag name.
    pub fn is_digest(&self) -> bool {
        self.tag.contains(':')
    }

    /// Base URL of the registry API (no trailing slash).
    pub fn api_base(&self, plain_http: bool) -> String {
        let scheme = if plain_http { "http" } else { "https" };
        format!("{scheme}://{}/v2/{}", self.host, self.repository)
    }

    /// Returns the manifest URL for this reference.
    pub fn manifest_url(&self, plain_http: bool) -> String {
        format!("{}/manifests/{}", self.api_base(plain_http), self.tag)
    }

    /// Returns the blob URL for a layer digest in this repository.
    pub fn blob_url(&self, plain_http: bool, digest: &str) -> String {
        format!("{}/blobs/{digest}", self.api_base(plain_http))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = if self.is_digest() { '@' } else { ':' };
        write!(f, "{}/{}{sep}{}", self.host, self.repository, self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tagged() {
        let r = Reference::parse("registry.example.com/byoh/byoh-bundle-ubuntu_k8s:1.22").unwrap();
        assert_eq!(r.host, "registry.example.com");
        assert_eq!(r.repository, "byoh/byoh-bundle-ubuntu_k8s");
        assert_eq!(r.tag, "1.22");
        assert!(!r.is_digest());
    }

    #[test]
    fn parse_host_with_port() {
        let r = Reference::parse("localhost:5000/bundle:v1.22.3").unwrap();
        assert_eq!(r.host, "localhost:5000");
        assert_eq!(r.repository, "bundle");
        assert_eq!(r.tag, "v1.22.3");
    }

    #[test]
    fn parse_digest() {
        let r = Reference::parse("localhost:5000/bundle@sha256:abcd").unwrap();
        assert_eq!(r.host, "localhost:5000");
        assert_eq!(r.tag, "sha256:abcd");
        assert!(r.is_digest());
        assert_eq!(r.to_string(), "localhost:5000/bundle@sha256:abcd");
    }

    #[test]
    fn parse_malformed() {
        for bad in [
            "",
            "a.a:tag",
            "/bundle:1.22",
            "host/bundle",
            "host/bundle:",
            "host//bundle:1.22",
            "localhost:5000/bundle",
        ] {
            assert!(
                matches!(Reference::parse(bad), Err(PullError::InvalidReference(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn urls() {
        let r = Reference::parse("a.a/byoh-bundle-ubuntu_k8s:1.22").unwrap();
        assert_eq!(
            r.manifest_url(false),
            "https://a.a/v2/byoh-bundle-ubuntu_k8s/manifests/1.22"
        );
        assert_eq!(
            r.blob_url(true, "sha256:00"),
            "http://a.a/v2/byoh-bundle-ubuntu_k8s/blobs/sha256:00"
        );
    }

    #[test]
    fn display_roundtrips_tag_form() {
        let text = "a.a/byoh-bundle-ubuntu_k8s:1.22";
        assert_eq!(Reference::parse(text).unwrap().to_string(), text);
    }
}
