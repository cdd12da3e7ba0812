//! Acquisition entry points and the shared page engine.
//!
//! [`acquire`] runs the whole flow for one entry URL:
//!
//! ```text
//! session gate ─▶ resolve id ─▶ fetch manifest ─▶ flatten ─▶ Acquirer::run
//! (optional)      (adapter)     (adapter)         (adapter)   (per page)
//! ```
//!
//! Failures before the page loop are fatal and leave nothing on disk.
//! Failures inside the loop are recorded per page and never stop the run:
//! a document with one broken page still yields every other page.
//!
//! Pages are processed strictly one at a time in manifest order. Output
//! names depend only on position, and pages whose image already exists are
//! not reconstructed again, so an interrupted run can simply be repeated.

use crate::adapter::{adapter_for, SiteAdapter};
use crate::config::{AcquireConfig, MAX_RETRIES};
use crate::context::{PartialCanvases, PartialVolumes, TaskContext, Volume};
use crate::error::{FetchError, IiifError, PageError, NOT_FOUND_MESSAGE};
use crate::fsutil::{ensure_directory, file_exists, volume_dir};
use crate::http::{Fetcher, HttpFetcher};
use crate::output::{AcquireOutput, AcquireStats, PageResult, PageStatus};
use crate::pipeline::descriptor::{descriptor_path, image_path, normalize, persist, sequence_tag};
use crate::pipeline::reconstruct::{header_args, DezoomifyReconstructor, ReconstructError, Reconstructor};
use crate::session::{SessionGate, SessionOutcome};
use reqwest::header::HeaderMap;
use reqwest::Url;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Acquire every selected page of the document behind `url`.
///
/// # Returns
/// `Ok(AcquireOutput)` once the page loop has run, even if some pages
/// failed (check `output.stats.failed_pages`). `output.message` is empty,
/// except for a manifest without any sequence, which yields zero pages and
/// [`NOT_FOUND_MESSAGE`].
///
/// # Errors
/// Only for failures before the page loop:
/// - URL not http(s), or no adapter for the host
/// - identifier could not be resolved, manifest unavailable or undecodable
///   (all reported as [`crate::error::NOT_FOUND_MESSAGE`] by
///   [`IiifError::summary_message`])
/// - session artifact never appeared (`require_session` only)
pub async fn acquire(url: impl AsRef<str>, config: &AcquireConfig) -> Result<AcquireOutput, IiifError> {
    acquire_with_cancel(url, config, &CancellationToken::new()).await
}

/// [`acquire`] with a caller-owned cancellation token.
///
/// Cancellation is observed by the session gate, every HTTP request, retry
/// back-off, and the reconstruction subprocess (which is killed).
pub async fn acquire_with_cancel(
    url: impl AsRef<str>,
    config: &AcquireConfig,
    cancel: &CancellationToken,
) -> Result<AcquireOutput, IiifError> {
    let url = url.as_ref();
    let parsed = Url::parse(url).map_err(|_| IiifError::InvalidInput {
        input: url.to_string(),
    })?;
    let adapter = adapter_for(&parsed)?;
    debug!("Using adapter '{}' for {}", adapter.name(), url);
    acquire_with_adapter(adapter.as_ref(), url, config, cancel).await
}

/// [`acquire`] with an explicit site adapter, bypassing host matching.
pub async fn acquire_with_adapter(
    adapter: &dyn SiteAdapter,
    url: &str,
    config: &AcquireConfig,
    cancel: &CancellationToken,
) -> Result<AcquireOutput, IiifError> {
    info!("Get {}", url);
    let ctx = TaskContext::new(
        url,
        volume_dir(&config.save_root, config.volume_id.as_deref()),
    )?
    .with_volume_id(config.volume_id.clone());

    let gate = SessionGate::from_config(config);
    if config.require_session {
        ensure_session(&gate, None, cancel).await?;
    }

    let fetcher = resolve_fetcher(config, &ctx)?;
    let headers = adapter.request_headers(&ctx, config);

    // ── Step 1: Resolve identifier ───────────────────────────────────────
    let id = adapter
        .resolve_identifier(&ctx, fetcher.as_ref(), &headers, cancel)
        .await
        .filter(|id| !id.is_empty());
    if cancel.is_cancelled() {
        return Err(IiifError::Cancelled);
    }
    let Some(id) = id else {
        return Err(IiifError::IdentifierNotFound {
            url: url.to_string(),
        });
    };
    ctx.set_identifier(id)?;
    debug!("Resolved identifier {}", ctx.identifier());

    // ── Step 2: Fetch manifest ───────────────────────────────────────────
    let manifest = match adapter
        .fetch_manifest(&ctx, fetcher.as_ref(), &headers, cancel)
        .await
    {
        Err(IiifError::ManifestFetch { source, .. }) if matches!(source, FetchError::Cancelled { .. }) => {
            return Err(IiifError::Cancelled)
        }
        Err(IiifError::ManifestFetch { source, url: manifest_url })
            if config.require_session && source.is_auth_rejection() =>
        {
            warn!("Manifest {} rejected the session: {}", manifest_url, source);
            ensure_session(&gate, Some(manifest_url.as_str()), cancel).await?;
            adapter
                .fetch_manifest(&ctx, fetcher.as_ref(), &headers, cancel)
                .await?
        }
        other => other?,
    };

    // ── Step 3: Flatten ──────────────────────────────────────────────────
    let message = if manifest.sequences.is_empty() {
        warn!("Manifest for {} has no sequences", ctx.identifier());
        NOT_FOUND_MESSAGE.to_string()
    } else {
        String::new()
    };
    let endpoints = adapter.flatten(&manifest);
    info!(" {} images", endpoints.len());

    // ── Step 4: Page loop ────────────────────────────────────────────────
    let acquirer = Acquirer::new(
        config,
        fetcher,
        resolve_reconstructor(config),
        headers,
        adapter.referer(&ctx),
    );
    let (pages, stats) = acquirer.run(&ctx, &endpoints, cancel).await?;

    Ok(AcquireOutput {
        message,
        identifier: ctx.identifier().to_string(),
        save_path: ctx.save_path().to_path_buf(),
        pages,
        stats,
    })
}

/// Synchronous wrapper around [`acquire`].
///
/// Creates a temporary tokio runtime internally.
pub fn acquire_sync(url: impl AsRef<str>, config: &AcquireConfig) -> Result<AcquireOutput, IiifError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| IiifError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(acquire(url, config))
}

/// Acquire each volume of a multi-volume document into
/// `<directory>/vol.<n>`.
///
/// A failed volume does not stop the others; cancellation does.
pub async fn acquire_volumes(
    group: &PartialVolumes,
    config: &AcquireConfig,
    cancel: &CancellationToken,
) -> Vec<(Volume, Result<AcquireOutput, IiifError>)> {
    let mut results = Vec::new();
    for volume in group.numbered() {
        let mut volume_config = config.clone();
        volume_config.save_root = group.directory.clone();
        volume_config.volume_id = Some(volume.seq.to_string());

        info!("Volume {} of '{}'", volume.seq, group.title);
        let result = acquire_with_cancel(&volume.url, &volume_config, cancel).await;
        let cancelled = matches!(result, Err(IiifError::Cancelled));
        if let Err(ref e) = result {
            warn!("Volume {} failed: {}", volume.seq, e);
        }
        results.push((volume, result));
        if cancelled {
            break;
        }
    }
    results
}

// ── Engine ───────────────────────────────────────────────────────────────

/// The shared page engine every site adapter feeds.
pub struct Acquirer<'a> {
    config: &'a AcquireConfig,
    fetcher: Arc<dyn Fetcher>,
    reconstructor: Arc<dyn Reconstructor>,
    headers: HeaderMap,
    reconstruct_args: Vec<String>,
}

impl<'a> Acquirer<'a> {
    /// `referer` is echoed to the reconstruction tool as `Origin` and `Referer`.
    pub fn new(
        config: &'a AcquireConfig,
        fetcher: Arc<dyn Fetcher>,
        reconstructor: Arc<dyn Reconstructor>,
        headers: HeaderMap,
        referer: String,
    ) -> Self {
        Self {
            config,
            fetcher,
            reconstructor,
            headers,
            reconstruct_args: header_args(&referer),
        }
    }

    /// Walk `endpoints` in order into `ctx.save_path()`.
    ///
    /// Returns one [`PageResult`] per selected page. The only error is
    /// [`IiifError::Cancelled`] (or failing to create the save directory).
    pub async fn run(
        &self,
        ctx: &TaskContext,
        endpoints: &[String],
        cancel: &CancellationToken,
    ) -> Result<(Vec<PageResult>, AcquireStats), IiifError> {
        let start = Instant::now();
        let total = endpoints.len();
        let selected: Vec<usize> = (0..total)
            .filter(|&i| !endpoints[i].is_empty() && self.config.pages.includes(i, total))
            .collect();

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_acquire_start(total, selected.len());
        }

        let mut pages = Vec::with_capacity(selected.len());
        if !selected.is_empty() {
            let dir = ensure_directory(ctx.save_path(), None)?;
            for index in selected {
                if cancel.is_cancelled() {
                    return Err(IiifError::Cancelled);
                }
                let page = self.acquire_page(&dir, index, &endpoints[index], total, cancel).await?;
                pages.push(page);
            }
        }

        let stats = AcquireStats::from_pages(total, &pages, start.elapsed().as_millis() as u64);
        info!(
            "Done: {} reconstructed, {} already present, {} failed of {} selected",
            stats.reconstructed_pages, stats.already_present_pages, stats.failed_pages, stats.selected_pages
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_acquire_complete(&stats);
        }
        Ok((pages, stats))
    }

    /// Run each pre-flattened part into its own directory, sharing `ctx`'s session.
    pub async fn run_parts(
        &self,
        ctx: &TaskContext,
        parts: &[PartialCanvases],
        cancel: &CancellationToken,
    ) -> Result<Vec<(Vec<PageResult>, AcquireStats)>, IiifError> {
        let mut results = Vec::with_capacity(parts.len());
        for part in parts {
            let part_ctx = TaskContext::new(ctx.entry_url(), &part.directory)?
                .with_title(part.title.clone())
                .with_session(ctx.session());
            info!("Part '{}': {} images", part.title, part.canvases.len());
            results.push(self.run(&part_ctx, &part.canvases, cancel).await?);
        }
        Ok(results)
    }

    async fn acquire_page(
        &self,
        dir: &Path,
        index: usize,
        endpoint: &str,
        total: usize,
        cancel: &CancellationToken,
    ) -> Result<PageResult, IiifError> {
        let start = Instant::now();
        let page_num = index + 1;
        let seq = sequence_tag(index);
        let info_path = descriptor_path(dir, &seq);
        let dest = image_path(dir, &seq, &self.config.file_ext);

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_page_start(page_num, total);
        }

        let finish = |status: PageStatus| {
            if let Some(ref cb) = self.config.progress_callback {
                match &status {
                    PageStatus::Reconstructed => cb.on_page_complete(page_num, total),
                    PageStatus::AlreadyPresent => cb.on_page_skipped(page_num, total),
                    PageStatus::Failed(e) => cb.on_page_error(page_num, total, e.to_string()),
                }
            }
            PageResult {
                page_num,
                endpoint: endpoint.to_string(),
                output_path: dest.clone(),
                status,
                duration_ms: start.elapsed().as_millis() as u64,
            }
        };

        // ── Descriptor ───────────────────────────────────────────────────
        let bytes = match self.fetch_descriptor(endpoint, page_num, cancel).await {
            Ok(bytes) => bytes,
            Err((FetchError::Cancelled { .. }, _)) => return Err(IiifError::Cancelled),
            Err((e, retries)) => {
                warn!("Page {}: {} ({})", page_num, e, endpoint);
                return Ok(finish(PageStatus::Failed(PageError::DescriptorFetch {
                    page: page_num,
                    retries,
                    detail: e.to_string(),
                })));
            }
        };

        let body = normalize(&String::from_utf8_lossy(&bytes));
        if let Err(e) = persist(&info_path, &body).await {
            warn!("Page {}: cannot write {}: {}", page_num, info_path.display(), e);
            return Ok(finish(PageStatus::Failed(PageError::DescriptorWrite {
                page: page_num,
                detail: e.to_string(),
            })));
        }

        if file_exists(&dest) {
            debug!("Page {}: {} already present", page_num, dest.display());
            return Ok(finish(PageStatus::AlreadyPresent));
        }

        // ── Reconstruction ───────────────────────────────────────────────
        info!("Get {}  {}", seq, endpoint);
        match self
            .reconstructor
            .reconstruct(&info_path, &dest, &self.reconstruct_args, cancel)
            .await
        {
            Ok(()) => {
                if let Err(e) = tokio::fs::remove_file(&info_path).await {
                    warn!("Page {}: could not remove {}: {}", page_num, info_path.display(), e);
                }
                Ok(finish(PageStatus::Reconstructed))
            }
            Err(ReconstructError::Cancelled) => Err(IiifError::Cancelled),
            Err(e) => {
                warn!("Page {}: {}", page_num, e);
                Ok(finish(PageStatus::Failed(PageError::Reconstruction {
                    page: page_num,
                    detail: e.to_string(),
                })))
            }
        }
    }

    /// Fetch with capped exponential back-off. Client errors (4xx) are not retried.
    ///
    /// On failure returns the last error and the number of retries made.
    async fn fetch_descriptor(
        &self,
        endpoint: &str,
        page_num: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, (FetchError, u32)> {
        let max_retries = self.config.max_retries.min(MAX_RETRIES);
        let mut attempt = 0u32;
        loop {
            match self.fetcher.fetch(endpoint, &self.headers, cancel).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if !is_retryable(&e) || attempt >= max_retries => {
                    return Err((e, attempt))
                }
                Err(e) => {
                    attempt += 1;
                    let backoff = self.config.retry_delay_ms(attempt);
                    warn!(
                        "Page {}: retry {}/{} after {}ms: {}",
                        page_num, attempt, max_retries, backoff, e
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return Err((FetchError::Cancelled { url: endpoint.to_string() }, attempt))
                        }
                        _ = sleep(Duration::from_millis(backoff)) => {}
                    }
                }
            }
        }
    }
}

fn is_retryable(e: &FetchError) -> bool {
    match e {
        FetchError::Transport { .. } | FetchError::Timeout { .. } => true,
        FetchError::Status { status, .. } => *status == 429 || *status >= 500,
        FetchError::Cancelled { .. } => false,
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn ensure_session(
    gate: &SessionGate,
    url: Option<&str>,
    cancel: &CancellationToken,
) -> Result<(), IiifError> {
    let outcome = match url {
        Some(url) => gate.wait_with_message(url, cancel).await?,
        None => gate.wait(cancel).await?,
    };
    match outcome {
        SessionOutcome::Ready { .. } => Ok(()),
        SessionOutcome::TimedOut { iterations } => Err(IiifError::SessionTimeout {
            path: gate.artifact().to_path_buf(),
            iterations,
        }),
    }
}

/// Configured fetcher, or a reqwest client over the run's cookie jar.
fn resolve_fetcher(config: &AcquireConfig, ctx: &TaskContext) -> Result<Arc<dyn Fetcher>, IiifError> {
    if let Some(ref fetcher) = config.fetcher {
        return Ok(Arc::clone(fetcher));
    }
    let fetcher = HttpFetcher::new(ctx.session(), config).map_err(|e| IiifError::Internal(e.to_string()))?;
    Ok(Arc::new(fetcher))
}

fn resolve_reconstructor(config: &AcquireConfig) -> Arc<dyn Reconstructor> {
    match config.reconstructor {
        Some(ref r) => Arc::clone(r),
        None => Arc::new(DezoomifyReconstructor::new(
            &config.dezoomify_path,
            config.dezoomify_args.clone(),
        )),
    }
}
