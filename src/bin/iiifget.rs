//! CLI binary for iiifget.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AcquireConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use iiifget::{
    acquire_volumes, acquire_with_cancel, AcquireConfig, AcquireOutput, AcquireProgressCallback,
    AcquireStats, CancellationToken, PageSelection, PartialVolumes, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while waiting for the session
/// artifact, then a page bar with one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    /// Seconds already waited for the session artifact.
    waited: Mutex<u64>,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Resolving manifest…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            waited: Mutex::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Acquiring");
        self.bar.reset_eta();
    }

    fn elapsed(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_millis() as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}

impl AcquireProgressCallback for CliProgressCallback {
    fn on_session_required(&self, instructions: &str, url: Option<&str>) {
        self.bar.set_prefix("Session");
        self.bar.println(format!("{} {}", cyan("◆"), bold(instructions)));
        if let Some(url) = url {
            self.bar.println(format!("  {}", url));
        }
    }

    fn on_session_tick(&self, remaining_secs: u64, interval_secs: u64) {
        let waited = match self.waited.lock() {
            Ok(mut w) => {
                *w += 1;
                *w
            }
            Err(_) => 0,
        };
        self.bar.set_message(format!(
            "please wait.... [00:{:02} of appr. Max {} sec]  {}",
            remaining_secs,
            interval_secs,
            dim(&format!("{waited}s waited"))
        ));
    }

    fn on_session_ready(&self) {
        self.bar.println(format!("  {} session ready", green("✓")));
        self.bar.set_prefix("Preparing");
        self.bar.set_message("Resolving manifest…");
    }

    fn on_acquire_start(&self, total_pages: usize, selected_pages: usize) {
        self.activate_bar(selected_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Acquiring {selected_pages} of {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize) {
        let secs = self.elapsed(page_num);
        self.bar.println(format!(
            "  {} Page {:>4}/{:<4}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_skipped(&self, page_num: usize, total: usize) {
        self.elapsed(page_num);
        self.bar.println(format!(
            "  {} Page {:>4}/{:<4}  {}",
            dim("·"),
            page_num,
            total,
            dim("already present"),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: String) {
        let secs = self.elapsed(page_num);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error
        };
        self.bar.println(format!(
            "  {} Page {:>4}/{:<4}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_acquire_complete(&self, stats: &AcquireStats) {
        self.bar.finish_and_clear();
        let done = stats.reconstructed_pages + stats.already_present_pages;
        if stats.failed_pages == 0 {
            eprintln!(
                "{} {} pages saved  {}",
                green("✔"),
                bold(&done.to_string()),
                dim(&format!("({} already present)", stats.already_present_pages))
            );
        } else {
            eprintln!(
                "{} {}/{} pages saved  ({} failed)",
                if done == 0 { red("✘") } else { cyan("⚠") },
                bold(&done.to_string()),
                stats.selected_pages,
                red(&stats.failed_pages.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Direct manifest link
  iiifget https://ids.si.edu/ids/manifest/FS-F1904.61_006

  # Object page; the manifest id is read from the page
  iiifget https://www.si.edu/object/fsg_F1904.61

  # Pages 3 to the end, PNG output into ./books/vol.2
  iiifget --pages 3- --ext .png -o books --volume 2 <url>

  # Several URLs as the volumes of one document (books/vol.1, books/vol.2, …)
  iiifget --volumes -o books <url1> <url2> <url3>

  # Hosts that need a browser session
  iiifget --require-session --cookie-file cookie.txt <url>

SESSION:
  With --require-session the tool waits until the cookie file exists and is
  non-empty, polling every --poll-interval seconds. Export the cookies of a
  browser session that has opened the document into that file. If the host
  later rejects the session, the stale file is removed and the wait repeats.

REQUIREMENTS:
  dezoomify-rs must be on PATH (or pass --dezoomify /path/to/dezoomify-rs).

ENVIRONMENT VARIABLES:
  Every option has an IIIFGET_* counterpart, e.g. IIIFGET_OUTPUT_DIR,
  IIIFGET_PAGES, IIIFGET_COOKIE_FILE. RUST_LOG overrides the log filter.
"#;

/// Download the page images of IIIF-published documents.
#[derive(Parser, Debug)]
#[command(
    name = "iiifget",
    version,
    about = "Download the page images of IIIF-published documents",
    long_about = "Resolve a document URL to its IIIF manifest and save every page as one \
stitched image, named by position (0001.jpg, 0002.jpg, …). Re-running skips pages already \
on disk.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Document URL(s): manifest links or object pages.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Treat the inputs as the volumes of one document (vol.1, vol.2, …).
    #[arg(long, env = "IIIFGET_VOLUMES")]
    volumes: bool,

    /// Directory pages are saved under.
    #[arg(short, long = "output-dir", env = "IIIFGET_OUTPUT_DIR", default_value = "downloads")]
    output_dir: PathBuf,

    /// Save into <output-dir>/vol.<VOLUME>.
    #[arg(long, env = "IIIFGET_VOLUME")]
    volume: Option<String>,

    /// Image file extension.
    #[arg(long, env = "IIIFGET_EXT", default_value = ".jpg")]
    ext: String,

    /// Page selection: all, 5, 3-15, 3-, or 1,3,5,7.
    #[arg(long, env = "IIIFGET_PAGES", default_value = "all")]
    pages: String,

    /// User-Agent sent with every request.
    #[arg(long, env = "IIIFGET_USER_AGENT")]
    user_agent: Option<String>,

    /// Browser-exported session cookie file.
    #[arg(long, env = "IIIFGET_COOKIE_FILE", default_value = "cookie.txt")]
    cookie_file: PathBuf,

    /// Wait for the cookie file before starting.
    #[arg(long, env = "IIIFGET_REQUIRE_SESSION")]
    require_session: bool,

    /// Seconds between cookie-file checks (1–60).
    #[arg(long, env = "IIIFGET_POLL_INTERVAL", default_value_t = 1,
          value_parser = clap::value_parser!(u64).range(1..=60))]
    poll_interval: u64,

    /// Give up waiting for the session after this many checks.
    #[arg(long, env = "IIIFGET_MAX_POLLS", default_value_t = 3600 * 8)]
    max_polls: u32,

    /// HTTP request timeout in seconds.
    #[arg(long, env = "IIIFGET_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Retries per page descriptor on transient failure (0–10).
    #[arg(long, env = "IIIFGET_MAX_RETRIES", default_value_t = 2,
          value_parser = clap::value_parser!(u32).range(0..=10))]
    max_retries: u32,

    /// Path to the dezoomify-rs executable.
    #[arg(long, env = "IIIFGET_DEZOOMIFY", default_value = "dezoomify-rs")]
    dezoomify: PathBuf,

    /// Extra argument passed to dezoomify-rs (repeatable).
    #[arg(long = "dezoomify-arg", allow_hyphen_values = true)]
    dezoomify_args: Vec<String>,

    /// Output structured JSON (AcquireOutput) on stdout.
    #[arg(long, env = "IIIFGET_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "IIIFGET_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "IIIFGET_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "IIIFGET_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Cancellation ─────────────────────────────────────────────────────
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n{} interrupted, stopping…", cyan("⚠"));
                cancel.cancel();
            }
        });
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn AcquireProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run acquisition ──────────────────────────────────────────────────
    let mut outputs = Vec::new();
    let mut failures = 0usize;

    if cli.volumes {
        let group = PartialVolumes {
            directory: cli.output_dir.clone(),
            title: cli.output_dir.display().to_string(),
            volumes: cli.inputs.clone(),
        };
        for (volume, result) in acquire_volumes(&group, &config, &cancel).await {
            match result {
                Ok(output) => outputs.push(output),
                Err(e) => {
                    failures += 1;
                    eprintln!("{} vol.{}: {}", red("✘"), volume.seq, e.summary_message());
                }
            }
        }
    } else {
        for input in &cli.inputs {
            match acquire_with_cancel(input, &config, &cancel).await {
                Ok(output) => outputs.push(output),
                Err(e) if e.is_not_found() => {
                    failures += 1;
                    eprintln!("{} {}  {}", red("✘"), e.summary_message(), dim(input));
                }
                Err(e) => return Err(e).with_context(|| format!("Acquisition of {input} failed")),
            }
            if cancel.is_cancelled() {
                break;
            }
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&outputs).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet && !show_progress {
        for output in &outputs {
            print_summary(output);
        }
    }

    if failures > 0 || outputs.iter().any(|o| o.stats.failed_pages > 0) {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(output: &AcquireOutput) {
    let s = &output.stats;
    eprintln!(
        "{}  {} reconstructed, {} already present, {} failed of {} pages  {}ms  →  {}",
        if s.failed_pages == 0 { green("✔") } else { cyan("⚠") },
        s.reconstructed_pages,
        s.already_present_pages,
        s.failed_pages,
        s.selected_pages,
        s.duration_ms,
        bold(&output.save_path.display().to_string()),
    );
}

/// Map CLI args to `AcquireConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AcquireConfig> {
    let pages = parse_pages(&cli.pages)?;

    let mut builder = AcquireConfig::builder()
        .save_root(&cli.output_dir)
        .file_ext(&cli.ext)
        .cookie_file(&cli.cookie_file)
        .require_session(cli.require_session)
        .poll_interval_secs(cli.poll_interval)
        .max_poll_iterations(cli.max_polls)
        .pages(pages)
        .download_timeout_secs(cli.download_timeout)
        .max_retries(cli.max_retries)
        .dezoomify_path(&cli.dezoomify)
        .dezoomify_args(cli.dezoomify_args.clone());

    if let Some(ref volume) = cli.volume {
        builder = builder.volume_id(volume);
    }
    if let Some(ref ua) = cli.user_agent {
        builder = builder.user_agent(ua);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15" or open-ended "3-"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if end.trim().is_empty() {
            return Ok(PageSelection::Range(start, 0));
        }
        let end: usize = end.trim().parse().context("Invalid end page in range")?;
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }
        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .context(format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }
        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_syntax() {
        assert_eq!(parse_pages("all").unwrap(), PageSelection::All);
        assert_eq!(parse_pages(" 5 ").unwrap(), PageSelection::Single(5));
        assert_eq!(parse_pages("3-15").unwrap(), PageSelection::Range(3, 15));
        assert_eq!(parse_pages("3-").unwrap(), PageSelection::Range(3, 0));
        assert_eq!(parse_pages("1,3,5").unwrap(), PageSelection::Set(vec![1, 3, 5]));
    }

    #[test]
    fn bad_page_syntax() {
        assert!(parse_pages("0").is_err());
        assert!(parse_pages("9-3").is_err());
        assert!(parse_pages("1,x").is_err());
        assert!(parse_pages("-4").is_err());
    }

    #[test]
    fn cli_defaults_build_a_valid_config() {
        let cli = Cli::parse_from(["iiifget", "https://ids.si.edu/ids/manifest/A"]);
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.file_ext, ".jpg");
        assert_eq!(config.max_poll_iterations, 28800);
        assert!(!config.require_session);
    }

    #[test]
    fn retry_count_is_bounded() {
        let parsed = Cli::try_parse_from(["iiifget", "--max-retries", "70", "https://ids.si.edu/ids/manifest/A"]);
        assert!(parsed.is_err());
    }
}
