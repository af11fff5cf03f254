//! CLI binary for ebd-toolchain.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ToolchainConfig`, draws progress and prints the run summary.

use anyhow::{Context, Result};
use clap::Parser;
use ebd_toolchain::config::{DEFAULT_KROKI_HOST, DEFAULT_KROKI_PORT};
use ebd_toolchain::{
    convert, inspect, ConversionProgressCallback, OutputFormat, ProgressCallback, RunReport,
    ToolchainConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
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

/// One bar over all trees of all documents, plus a log line per tree.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} trees  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Reading");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_document_start(&self, document: &str, total_trees: usize) {
        // documents arrive one after another; the bar spans all of them
        self.bar.inc_length(total_trees as u64);
        self.bar.set_prefix("Converting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{document}: {total_trees} decision trees"))
        ));
    }

    fn on_tree_start(&self, ebd_key: &str, _index: usize, _total: usize) {
        self.bar.set_message(ebd_key.to_string());
        self.bar.inc(1);
    }

    fn on_tree_complete(&self, ebd_key: &str, artifacts: usize) {
        self.bar.println(format!(
            "  {} {:<8}  {}",
            green("✓"),
            ebd_key,
            dim(&format!("{artifacts} files"))
        ));
    }

    fn on_tree_skipped(&self, ebd_key: &str, reason: &str) {
        self.bar.println(format!(
            "  {} {:<8}  {}",
            dim("–"),
            ebd_key,
            dim(&truncate(reason, 70))
        ));
    }

    fn on_tree_error(&self, ebd_key: &str, error: &str) {
        self.bar.println(format!(
            "  {} {:<8}  {}",
            red("✗"),
            ebd_key,
            red(&truncate(error.lines().next().unwrap_or(error), 90))
        ));
    }

    fn on_run_complete(&self, _total_trees: usize, _failed: usize) {
        self.bar.finish_and_clear();
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let head: String = s.chars().take(max_chars - 1).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # All formats for one document
  scrape-and-graph -i FV2504_EBD.docx -o output -t json -t dot -t puml -t svg

  # JSON and SVG for every .docx in a directory, Kroki on another host
  KROKI_HOST=kroki.internal KROKI_PORT=8125 scrape-and-graph -i ebd/ -t json -t svg

  # Only list the EBD keys of a document
  scrape-and-graph -i FV2504_EBD.docx --list-only

  # Machine-readable run report
  scrape-and-graph -i FV2504_EBD.docx -t json --json > report.json

EXPORT TYPES:
  json  (structured-data)       the extracted table
  dot   (graph-description)     Graphviz source
  puml  (diagram-description)   PlantUML activity diagram
  svg   (vector-image)          rendered by Kroki from the DOT source

ENVIRONMENT VARIABLES:
  KROKI_HOST   Kroki host (default: localhost)
  KROKI_PORT   Kroki port (default: 8000)
  RUST_LOG     Override the log filter

SETUP:
  SVG output needs a running Kroki instance:
    docker run -d -p 8000:8000 yuzutech/kroki
"#;

/// Extract EBD decision trees from .docx files and render them.
#[derive(Parser, Debug)]
#[command(
    name = "scrape-and-graph",
    version,
    about = "Extract EBD decision trees from .docx files and render them as JSON, DOT, PlantUML and SVG",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// A .docx file or a directory of .docx files.
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory (created if missing).
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Export type; repeat for several: json, dot, puml, svg.
    #[arg(
        short = 't',
        long = "export-type",
        value_parser = parse_format,
        required_unless_present = "list_only"
    )]
    export_types: Vec<OutputFormat>,

    /// Kroki host.
    #[arg(long, env = "KROKI_HOST", default_value = DEFAULT_KROKI_HOST)]
    kroki_host: String,

    /// Kroki port.
    #[arg(long, env = "KROKI_PORT", default_value_t = DEFAULT_KROKI_PORT)]
    kroki_port: u16,

    /// List the EBD keys of the input, convert nothing.
    #[arg(long)]
    list_only: bool,

    /// Print the run report (or key list) as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    s.parse::<OutputFormat>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list_only;
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

    // ── List-only mode ───────────────────────────────────────────────────
    if cli.list_only {
        let inventory = inspect(&cli.input)
            .await
            .context("Failed to read input")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&inventory).context("Failed to serialise key list")?
            );
        } else {
            for doc in &inventory {
                println!("{}", bold(&doc.document));
                if let Some(ref e) = doc.error {
                    println!("  {}", red(e));
                }
                for key in &doc.keys {
                    println!(
                        "  {:<8} {:<40} {}",
                        key.key,
                        truncate(&key.title, 40),
                        dim(&key.kapitel.sub_chapter())
                    );
                }
            }
        }
        let failed = inventory.iter().any(|d| d.error.is_some());
        return Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS });
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let mut builder = ToolchainConfig::builder()
        .formats(cli.export_types.iter().copied())
        .kroki_host(cli.kroki_host.clone())
        .kroki_port(cli.kroki_port);
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    // ── Run conversion ───────────────────────────────────────────────────
    let report = convert(&cli.input, &cli.output, &config)
        .await
        .with_context(|| format!("Conversion of {} failed", cli.input.display()))?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    }
    if !cli.quiet {
        print_summary(&report, &cli.output);
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Final summary on stderr, failures grouped by error kind.
fn print_summary(report: &RunReport, output: &Path) {
    let failed = report.failed_trees();
    let converted = report
        .trees
        .saturating_sub(failed)
        .saturating_sub(report.skipped.len());

    eprintln!(
        "{}  {}/{} trees  {} files  {}ms  →  {}",
        if failed == 0 { green("✔") } else { cyan("⚠") },
        converted,
        report.trees,
        report.artifacts.len(),
        report.duration_ms,
        bold(&output.display().to_string()),
    );
    if !report.skipped.is_empty() {
        eprintln!(
            "   {}",
            dim(&format!("{} skipped (no table)", report.skipped.len()))
        );
    }
    if failed > 0 {
        eprintln!("   {} failed:", red(&failed.to_string()));
        for (kind, keys) in report.errors_by_kind() {
            eprintln!("     {}: {}", bold(kind), keys.join(", "));
        }
    }
}
