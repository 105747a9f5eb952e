//! OCI distribution API client.
//!
//! Pulls a bundle image from a registry and unpacks its layers in order:
//!
//! 1. `GET /v2/<name>/manifests/<tag>` (OCI or Docker v2 schema 2)
//! 2. `GET /v2/<name>/blobs/<digest>` for each layer, streamed to disk while
//!    hashing
//! 3. unpack each verified layer into the destination directory
//!
//! Anonymous bearer tokens are requested when the registry answers `401` with
//! a `WWW-Authenticate: Bearer ...` challenge.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::PullError;
use crate::extract::{LayerFormat, extract_layer};
use crate::reference::Reference;

/// Media types accepted when requesting a manifest.
const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.manifest.v1+json, \
     application/vnd.docker.distribution.manifest.v2+json";

/// Client for pulling bundle images from an OCI registry.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    plain_http: bool,
}

impl RegistryClient {
    /// Creates a client that talks HTTPS to registries.
    pub fn new() -> Result<Self, PullError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("byoh-bundle/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            plain_http: false,
        })
    }

    /// Switches to plain HTTP (for local or insecure registries).
    pub fn with_plain_http(mut self, plain_http: bool) -> Self {
        self.plain_http = plain_http;
        self
    }

    /// Pulls `reference` and unpacks all of its layers into `dest`.
    pub async fn pull(&self, reference: &Reference, dest: &Path) -> Result<(), PullError> {
        let mut token = None;
        let manifest = self.fetch_manifest(reference, &mut token).await?;

        if manifest.layers.is_empty() {
            return Err(PullError::EmptyManifest(reference.to_string()));
        }

        // Reject unknown layer types before transferring anything.
        let formats = manifest
            .layers
            .iter()
            .map(|layer| LayerFormat::detect(&layer.media_type))
            .collect::<Result<Vec<_>, _>>()?;

        tokio::fs::create_dir_all(dest).await?;

        for (layer, format) in manifest.layers.iter().zip(formats) {
            let blob_path = dest.join(format!(".blob-{}", blob_file_name(&layer.digest)));
            self.fetch_blob(reference, layer, &blob_path, &mut token).await?;

            let target = dest.to_path_buf();
            let blob = blob_path.clone();
            let extracted =
                tokio::task::spawn_blocking(move || extract_layer(&blob, &target, format))
                    .await
                    .map_err(std::io::Error::other)?;
            let removed = tokio::fs::remove_file(&blob_path).await;
            extracted?;
            // A leftover blob would be published with the bundle contents.
            removed?;

            debug!(digest = %layer.digest, "layer unpacked");
        }

        info!(reference = %reference, layers = manifest.layers.len(), "bundle pulled");
        Ok(())
    }

    /// Fetches and parses the image manifest.
    pub(crate) async fn fetch_manifest(
        &self,
        reference: &Reference,
        token: &mut Option<String>,
    ) -> Result<Manifest, PullError> {
        let url = reference.manifest_url(self.plain_http);
        info!(reference = %reference, url = %url, "fetching manifest");

        let response = self
            .send(reference, &url, Some(MANIFEST_ACCEPT), token)
            .await?;
        let manifest: Manifest = serde_json::from_slice(&response.bytes().await?)?;

        debug!(
            schema = manifest.schema_version,
            layers = manifest.layers.len(),
            "manifest loaded"
        );
        Ok(manifest)
    }

    /// Streams a layer blob to `path`, verifying its SHA-256 digest.
    async fn fetch_blob(
        &self,
        reference: &Reference,
        layer: &Descriptor,
        path: &Path,
        token: &mut Option<String>,
    ) -> Result<(), PullError> {
        let url = reference.blob_url(self.plain_http, &layer.digest);
        debug!(digest = %layer.digest, size = layer.size, "fetching blob");

        let response = self.send(reference, &url, None, token).await?;
        let mut file = tokio::fs::File::create(path).await?;
        let mut hasher = Sha256::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        match layer.digest.split_once(':') {
            Some(("sha256", expected)) => {
                let actual = hex::encode(hasher.finalize());
                if actual != expected {
                    return Err(PullError::DigestMismatch {
                        expected: expected.to_owned(),
                        actual,
                    });
                }
            }
            _ => warn!(digest = %layer.digest, "unsupported digest algorithm, skipping verification"),
        }

        Ok(())
    }

    /// Sends a GET, answering one bearer challenge with an anonymous token.
    async fn send(
        &self,
        reference: &Reference,
        url: &str,
        accept: Option<&str>,
        token: &mut Option<String>,
    ) -> Result<Response, PullError> {
        let response = self.get(url, accept, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response.error_for_status()?);
        }

        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .and_then(BearerChallenge::parse)
            .ok_or_else(|| PullError::Unauthorized(reference.to_string()))?;

        let fresh = self.fetch_token(&challenge, reference).await?;
        let response = self.get(url, accept, Some(&fresh)).await?;
        *token = Some(fresh);

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(PullError::Unauthorized(reference.to_string()));
        }
        Ok(response.error_for_status()?)
    }

    async fn get(
        &self,
        url: &str,
        accept: Option<&str>,
        token: Option<&str>,
    ) -> Result<Response, PullError> {
        let mut request = self.http.get(url);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        Ok(request.send().await?)
    }

    async fn fetch_token(
        &self,
        challenge: &BearerChallenge,
        reference: &Reference,
    ) -> Result<String, PullError> {
        let scope = challenge
            .scope
            .clone()
            .unwrap_or_else(|| format!("repository:{}:pull", reference.repository));
        let mut query = vec![("scope", scope.as_str())];
        if let Some(service) = &challenge.service {
            query.push(("service", service.as_str()));
        }

        debug!(realm = %challenge.realm, scope = %scope, "requesting anonymous token");
        let body = self
            .http
            .get(&challenge.realm)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let response: TokenResponse = serde_json::from_slice(&body)?;

        response
            .token
            .or(response.access_token)
            .ok_or_else(|| PullError::Unauthorized(reference.to_string()))
    }
}

/// Turns `sha256:abcd...` into a filesystem-safe name.
fn blob_file_name(digest: &str) -> String {
    digest.replace(':', "-")
}

// ---------------------------------------------------------------------------
// Bearer challenge
// ---------------------------------------------------------------------------

/// Parameters of a `WWW-Authenticate: Bearer` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BearerChallenge {
    realm: String,
    service: Option<String>,
    scope: Option<String>,
}

impl BearerChallenge {
    fn parse(header: &str) -> Option<Self> {
        let (scheme, params) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut values = HashMap::new();
        let mut rest = params.trim();
        while !rest.is_empty() {
            let (key, after) = rest.split_once('=')?;
            let (value, remaining) = match after.strip_prefix('"') {
                Some(quoted) => {
                    let end = quoted.find('"')?;
                    (&quoted[..end], &quoted[end + 1..])
                }
                None => after.split_at(after.find(',').unwrap_or(after.len())),
            };
            values.insert(key.trim().to_ascii_lowercase(), value.to_owned());
            rest = remaining.trim_start_matches([',', ' ']);
        }

        Some(Self {
            realm: values.remove("realm")?,
            service: values.remove("service"),
            scope: values.remove("scope"),
        })
    }
}

// ---------------------------------------------------------------------------
// Manifest JSON types
// ---------------------------------------------------------------------------

/// An OCI image manifest (or Docker v2 schema 2 manifest).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Always `2` for the supported formats.
    pub schema_version: u32,
    /// Manifest media type, when the registry includes it in the body.
    #[serde(default)]
    pub media_type: Option<String>,
    /// Layers in application order.
    #[serde(default)]
    pub layers: Vec<Descriptor>,
}

/// A content descriptor for a single blob.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Layer media type (e.g. `"application/vnd.oci.image.layer.v1.tar+gzip"`).
    pub media_type: String,
    /// Content digest (e.g. `"sha256:..."`).
    pub digest: String,
    /// Blob size in bytes.
    pub size: u64,
    /// Optional annotations such as `org.opencontainers.image.title`.
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
