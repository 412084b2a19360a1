//! CLI binary for orderform.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GenerationConfig` / `SupabaseConfig` and prints results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use orderform::{
    generate, generate_to_file, inspect_artifact, validate_record_id, GenerationConfig,
    GenerationProgressCallback, ProgressCallback, SourceRecord, SupabaseConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
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

/// Terminal progress callback: one bar over the image fetches, plus a log
/// line per image. Fetches finish out of order; the bar only counts.
struct CliProgressCallback {
    bar: ProgressBar,
    failed: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Loading record…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            failed: AtomicUsize::new(0),
        })
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_generation_start(&self, image_count: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} images  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_length(image_count as u64);
        self.bar.set_prefix("Fetching");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Building order form with {image_count} image(s)…"))
        ));
    }

    fn on_image_fetched(&self, index: usize, total: usize, bytes: usize) {
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {}",
            green("✓"),
            index + 1,
            total,
            dim(&format!("{:>8} bytes", bytes)),
        ));
        self.bar.inc(1);
    }

    fn on_image_failed(&self, index: usize, total: usize, error: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_assembled(&self, page_count: usize, bytes: usize) {
        self.bar.set_prefix("Publishing");
        self.bar
            .set_message(format!("{page_count} page(s), {bytes} bytes"));
    }

    fn on_published(&self, _url: &str) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Generate and publish the order form for a stored record
  orderform 8f14e45f-ceea-467f-a0e6-b1a1f0f0a1a1

  # Build from a stored record but write locally instead of publishing
  orderform 8f14e45f -o order-form.pdf

  # Build from a JSON record file (no store access)
  orderform --record-file enquiry.json -o order-form.pdf

  # Check the structure of an existing artifact
  orderform --inspect order-form.pdf

  # Machine-readable result
  orderform --json 8f14e45f

ENVIRONMENT VARIABLES:
  SUPABASE_URL                Project URL
  SUPABASE_SERVICE_ROLE_KEY   Service-role key
  ORDERFORM_TABLE             Record table (default: enquiries)
  ORDERFORM_BUCKET            Artifact bucket (default: enquiry-pdfs)
  ORDERFORM_CONCURRENCY       Parallel image fetches (default: 4)
  ORDERFORM_FETCH_TIMEOUT     Per-image timeout in seconds (default: 30)
  RUST_LOG                    Overrides the log filter
"#;

/// Generate order-form PDFs from enquiry records.
#[derive(Parser, Debug)]
#[command(
    name = "orderform",
    version,
    about = "Generate order-form PDFs from enquiry records and publish them",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Identifier of the record to generate for.
    #[arg(conflicts_with_all = ["record_file", "inspect"])]
    record_id: Option<String>,

    /// Read the record from a JSON file instead of the record store.
    #[arg(long, requires = "output", conflicts_with = "inspect")]
    record_file: Option<PathBuf>,

    /// Write the PDF to this file instead of publishing it.
    #[arg(short, long, env = "ORDERFORM_OUTPUT")]
    output: Option<PathBuf>,

    /// Validate an existing PDF artifact and print its structure.
    #[arg(long, value_name = "PDF")]
    inspect: Option<PathBuf>,

    /// Output a JSON result instead of a summary line.
    #[arg(long, env = "ORDERFORM_JSON")]
    json: bool,

    /// Number of concurrent image fetches.
    #[arg(short, long, env = "ORDERFORM_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Per-image fetch timeout in seconds.
    #[arg(long, env = "ORDERFORM_FETCH_TIMEOUT", default_value_t = 30)]
    fetch_timeout: u64,

    /// Supabase project URL.
    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: Option<String>,

    /// Supabase service-role key.
    #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY", hide_env_values = true)]
    service_key: Option<String>,

    /// Table holding the records.
    #[arg(long, env = "ORDERFORM_TABLE", default_value = "enquiries")]
    table: String,

    /// Storage bucket for published artifacts.
    #[arg(long, env = "ORDERFORM_BUCKET", default_value = "enquiry-pdfs")]
    bucket: String,

    /// Disable progress bar.
    #[arg(long, env = "ORDERFORM_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ORDERFORM_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ORDERFORM_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.inspect.is_none();
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

    // ── Inspect mode ─────────────────────────────────────────────────────
    if let Some(ref path) = cli.inspect {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let summary = inspect_artifact(&bytes).context("Artifact failed inspection")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
            );
        } else {
            println!("File:         {}", path.display());
            println!("PDF Version:  {}", summary.version);
            println!("Size:         {} bytes", summary.bytes);
            println!("Objects:      {}", summary.object_count);
            println!("Pages:        {}", summary.page_count);
            println!("Images:       {}", summary.image_count);
            println!("xref offset:  {}", summary.xref_offset);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn GenerationProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb.clone())?;

    // ── Local output ─────────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let record = load_record(&cli).await?;
        let built = generate_to_file(&record, output_path, &config)
            .await
            .context("Generation failed")?;
        if let Some(cb) = progress_cb {
            cb.on_published(&output_path.display().to_string());
        }

        if cli.json {
            let value = json!({
                "record_id": record.id,
                "path": output_path,
                "page_count": built.page_count,
                "bytes": built.bytes.len(),
                "skipped": built.skipped,
                "stats": built.stats,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&value).context("Failed to serialise output")?
            );
        } else if !cli.quiet {
            eprintln!(
                "{}  {} page(s)  {} bytes  {}ms  →  {}",
                if built.skipped.is_empty() { green("✔") } else { cyan("⚠") },
                built.page_count,
                built.bytes.len(),
                built.stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
            report_skipped(built.skipped.iter().map(|e| e.to_string()));
        }
        return Ok(());
    }

    // ── Publish ──────────────────────────────────────────────────────────
    let Some(ref record_id) = cli.record_id else {
        bail!("A record id is required when publishing (or pass --output)");
    };
    let backend = supabase_config(&cli)?
        .backend()
        .context("Failed to set up Supabase backend")?;
    let output = generate(record_id, &backend, &config)
        .await
        .context("Generation failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
    } else {
        println!("{}", output.url);
        if !cli.quiet {
            eprintln!(
                "{}  {} page(s)  {} bytes  {}ms",
                if output.is_complete() { green("✔") } else { cyan("⚠") },
                output.page_count,
                output.bytes,
                output.stats.total_duration_ms,
            );
            report_skipped(output.skipped.iter().map(|e| e.to_string()));
            if !output.record_updated {
                eprintln!(
                    "   {} record '{}' was not updated with the artifact URL",
                    red("!"),
                    output.record_id
                );
            }
        }
    }

    Ok(())
}

fn report_skipped(errors: impl Iterator<Item = String>) {
    for e in errors {
        eprintln!("   {} {}", dim("skipped:"), e);
    }
}

/// Map CLI args to `GenerationConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GenerationConfig> {
    let mut builder = GenerationConfig::builder()
        .fetch_concurrency(cli.concurrency)
        .fetch_timeout_secs(cli.fetch_timeout);
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

fn supabase_config(cli: &Cli) -> Result<SupabaseConfig> {
    let (Some(url), Some(key)) = (cli.supabase_url.as_deref(), cli.service_key.as_deref()) else {
        bail!("Supabase is not configured: set SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY");
    };
    let mut config = SupabaseConfig::new(url, key);
    config.table = cli.table.clone();
    config.bucket = cli.bucket.clone();
    config.timeout_secs = cli.fetch_timeout;
    Ok(config)
}

/// The record for local output: from `--record-file`, else from the store.
async fn load_record(cli: &Cli) -> Result<SourceRecord> {
    if let Some(ref path) = cli.record_file {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read record file {}", path.display()))?;
        return serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse record file {}", path.display()));
    }

    let Some(ref record_id) = cli.record_id else {
        bail!("Pass a record id or --record-file");
    };
    validate_record_id(record_id)?;
    let backend = supabase_config(cli)?
        .backend()
        .context("Failed to set up Supabase backend")?;
    backend
        .records
        .get(record_id)
        .await
        .with_context(|| format!("Failed to read record '{record_id}'"))?
        .with_context(|| format!("Record '{record_id}' not found"))
}
