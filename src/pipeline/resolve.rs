//! Identifier resolution: entry URL → canonical resource identifier.
//!
//! Two strategies, tried in order:
//!
//! 1. **Direct**: the URL already names the manifest
//!    (`…/manifest/<token>`). No network call.
//! 2. **Scrape**: the URL is a human-facing object page
//!    (`…/object/…`). The page is fetched and the identifier read from the
//!    `data-idsid` attribute of the media viewer.
//!
//! Both patterns are anchored to fixed literal structure. When the host
//! changes its markup or URL scheme the result is simply `None`; callers
//! treat that as "not found", not as a crash.

use crate::http::{fetch_text, Fetcher};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

static RE_MANIFEST_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"manifest/([A-Za-z0-9._-]+)").unwrap());

static RE_EMBEDDED_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-idsid="([A-Za-z0-9._-]+)""#).unwrap());

/// The token following `manifest/` in the URL, if any.
pub fn extract_manifest_token(url: &str) -> Option<String> {
    RE_MANIFEST_TOKEN
        .captures(url)
        .map(|caps| caps[1].to_string())
}

/// True when the URL has the shape of a human-facing object page.
pub fn is_object_page(url: &str) -> bool {
    url.contains("/object/")
}

/// The identifier embedded in an object page's markup, if any.
///
/// ```html
/// <div data-idsid="FS-F1904.61_006" class="media-metadata">
/// ```
pub fn extract_embedded_id(html: &str) -> Option<String> {
    RE_EMBEDDED_ID.captures(html).map(|caps| caps[1].to_string())
}

/// Resolve the identifier for `url`, fetching the page only when needed.
///
/// Returns `None` when neither strategy applies or the scrape fails.
pub async fn resolve_identifier(
    url: &str,
    fetcher: &dyn Fetcher,
    headers: &HeaderMap,
    cancel: &CancellationToken,
) -> Option<String> {
    if let Some(token) = extract_manifest_token(url) {
        debug!("Identifier {} taken directly from URL", token);
        return Some(token);
    }

    if !is_object_page(url) {
        debug!("URL has neither a manifest token nor an object-page shape: {}", url);
        return None;
    }

    let html = match fetch_text(fetcher, url, headers, cancel).await {
        Ok(html) => html,
        Err(e) => {
            warn!("Could not fetch entry page {}: {}", url, e);
            return None;
        }
    };

    let id = extract_embedded_id(&html);
    match id {
        Some(ref id) => debug!("Identifier {} scraped from entry page", id),
        None => warn!("Entry page {} carries no data-idsid attribute", url),
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct PageFetcher {
        body: Result<String, u16>,
        calls: AtomicUsize,
    }

    impl PageFetcher {
        fn ok(body: &str) -> Self {
            Self {
                body: Ok(body.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn status(code: u16) -> Self {
            Self {
                body: Err(code),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Fetcher for PageFetcher {
        async fn fetch(
            &self,
            _url: &str,
            _headers: &HeaderMap,
            _cancel: &CancellationToken,
        ) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.body {
                Ok(body) => Ok(body.clone().into_bytes()),
                Err(code) => Err(FetchError::Status {
                    status: *code,
                    reason: "Not Found".into(),
                }),
            }
        }
    }

    #[test]
    fn manifest_token_extraction() {
        assert_eq!(
            extract_manifest_token("https://ids.si.edu/ids/manifest/FS-F1904.61_006").as_deref(),
            Some("FS-F1904.61_006")
        );
        assert_eq!(
            extract_manifest_token("https://ids.si.edu/ids/manifest/NMAH-ET2011.0123?x=1")
                .as_deref(),
            Some("NMAH-ET2011.0123")
        );
        assert!(extract_manifest_token("https://www.si.edu/object/abc").is_none());
    }

    #[test]
    fn embedded_id_extraction() {
        let html = r#"<section><div  data-idsid="FS-F1904.61_006" class="media-metadata"></div></section>"#;
        assert_eq!(extract_embedded_id(html).as_deref(), Some("FS-F1904.61_006"));
        assert!(extract_embedded_id("<div class=\"media-metadata\"></div>").is_none());
    }

    #[tokio::test]
    async fn direct_match_issues_no_request() {
        let fetcher = PageFetcher::ok("");
        let id = resolve_identifier(
            "https://ids.si.edu/ids/manifest/FS-F1904.61_006",
            &fetcher,
            &HeaderMap::new(),
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(id.as_deref(), Some("FS-F1904.61_006"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn object_page_is_scraped() {
        let fetcher = PageFetcher::ok(r#"<div data-idsid="FS-F1904.61_006"></div>"#);
        let id = resolve_identifier(
            "https://www.si.edu/object/fsg_F1904.61",
            &fetcher,
            &HeaderMap::new(),
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(id.as_deref(), Some("FS-F1904.61_006"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn object_page_fetch_failure_yields_none() {
        let fetcher = PageFetcher::status(404);
        let id = resolve_identifier(
            "https://www.si.edu/object/fsg_F1904.61",
            &fetcher,
            &HeaderMap::new(),
            &CancellationToken::new(),
        )
        .await;
        assert!(id.is_none());
    }

    #[tokio::test]
    async fn unrelated_url_yields_none_without_request() {
        let fetcher = PageFetcher::ok(r#"<div data-idsid="X"></div>"#);
        let id = resolve_identifier(
            "https://www.si.edu/exhibitions",
            &fetcher,
            &HeaderMap::new(),
            &CancellationToken::new(),
        )
        .await;
        assert!(id.is_none());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }
}
