//! Site adapters: the per-host half of an acquisition.
//!
//! Every supported host shares one acquisition engine
//! ([`crate::acquire::Acquirer`]); what differs between hosts is how an
//! identifier is found, where the manifest lives, and which headers the
//! host expects. [`SiteAdapter`] captures exactly that, with the generic
//! IIIF manifest fetch and flattening as default methods.

use crate::config::AcquireConfig;
use crate::context::TaskContext;
use crate::error::IiifError;
use crate::http::Fetcher;
use crate::pipeline::{flatten, manifest, resolve};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER, USER_AGENT};
use reqwest::Url;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use url::form_urlencoded;

/// Capability interface implemented once per supported host.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// True when this adapter handles `url`.
    fn matches(&self, url: &Url) -> bool;

    /// Headers sent with every request of the run.
    fn request_headers(&self, ctx: &TaskContext, config: &AcquireConfig) -> HeaderMap {
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, USER_AGENT, &config.user_agent);
        insert_header(&mut headers, REFERER, ctx.entry_url());
        headers
    }

    /// Derive the resource identifier. `None` means "not found".
    async fn resolve_identifier(
        &self,
        ctx: &TaskContext,
        fetcher: &dyn Fetcher,
        headers: &HeaderMap,
        cancel: &CancellationToken,
    ) -> Option<String>;

    /// Manifest URL for the context's resolved identifier.
    fn manifest_url(&self, ctx: &TaskContext) -> String;

    async fn fetch_manifest(
        &self,
        ctx: &TaskContext,
        fetcher: &dyn Fetcher,
        headers: &HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<manifest::Manifest, IiifError> {
        manifest::fetch_manifest(&self.manifest_url(ctx), fetcher, headers, cancel).await
    }

    fn flatten(&self, manifest: &manifest::Manifest) -> Vec<String> {
        flatten::flatten(manifest)
    }

    /// Value echoed as `Origin`/`Referer` to the reconstruction tool: the
    /// entry URL, query-escaped.
    fn referer(&self, ctx: &TaskContext) -> String {
        query_escape(ctx.entry_url())
    }
}

/// Escape `s` for use inside a URL query component (`/` → `%2F`, space → `+`).
pub fn query_escape(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

pub(crate) fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(e) => warn!("Dropping header {}: {}", name, e),
    }
}

// ── Smithsonian ──────────────────────────────────────────────────────────

/// Smithsonian Institution collections (`*.si.edu`).
///
/// Accepts both direct manifest URLs
/// (`https://ids.si.edu/ids/manifest/FS-F1904.61_006`) and object pages
/// (`https://www.si.edu/object/…`), whose media viewer carries the id.
#[derive(Debug, Clone, Default)]
pub struct SmithsonianAdapter;

#[async_trait]
impl SiteAdapter for SmithsonianAdapter {
    fn name(&self) -> &'static str {
        "si.edu"
    }

    fn matches(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|h| h == "si.edu" || h.ends_with(".si.edu"))
    }

    fn request_headers(&self, ctx: &TaskContext, config: &AcquireConfig) -> HeaderMap {
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, USER_AGENT, &config.user_agent);
        insert_header(&mut headers, REFERER, ctx.entry_url());
        insert_header(&mut headers, HeaderName::from_static("authority"), "www.si.edu");
        insert_header(&mut headers, HeaderName::from_static("origin"), "https://www.si.edu/");
        headers
    }

    async fn resolve_identifier(
        &self,
        ctx: &TaskContext,
        fetcher: &dyn Fetcher,
        headers: &HeaderMap,
        cancel: &CancellationToken,
    ) -> Option<String> {
        resolve::resolve_identifier(ctx.entry_url(), fetcher, headers, cancel).await
    }

    fn manifest_url(&self, ctx: &TaskContext) -> String {
        format!(
            "{}/ids/manifest/{}",
            ctx.parsed_url().origin().ascii_serialization(),
            ctx.identifier()
        )
    }
}

// ── Direct manifest links ────────────────────────────────────────────────

/// Any host, when the entry URL is itself a IIIF manifest
/// (`…/manifest.json` or `…/manifest`). The identifier is the URL.
#[derive(Debug, Clone, Default)]
pub struct DirectManifestAdapter;

#[async_trait]
impl SiteAdapter for DirectManifestAdapter {
    fn name(&self) -> &'static str {
        "manifest"
    }

    fn matches(&self, url: &Url) -> bool {
        let path = url.path().trim_end_matches('/');
        path.ends_with("manifest.json") || path.ends_with("/manifest")
    }

    async fn resolve_identifier(
        &self,
        ctx: &TaskContext,
        _fetcher: &dyn Fetcher,
        _headers: &HeaderMap,
        _cancel: &CancellationToken,
    ) -> Option<String> {
        Some(ctx.entry_url().to_string())
    }

    fn manifest_url(&self, ctx: &TaskContext) -> String {
        ctx.identifier().to_string()
    }
}

/// Pick the first adapter that handles `url`.
pub fn adapter_for(url: &Url) -> Result<Box<dyn SiteAdapter>, IiifError> {
    let adapters: Vec<Box<dyn SiteAdapter>> =
        vec![Box::new(SmithsonianAdapter), Box::new(DirectManifestAdapter)];
    adapters
        .into_iter()
        .find(|a| a.matches(url))
        .ok_or_else(|| IiifError::UnsupportedSite {
            host: url.host_str().unwrap_or_default().to_string(),
        })
}
