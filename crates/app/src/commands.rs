use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use slipscan_core::SlipConfig;
use slipscan_ocr::{default_backend, OcrBackend, ProcessedSlip, SlipPipeline};
use slipscan_storage::{read_ledger, Ledger, LedgerEntry, LedgerRow};

// ── Arguments ─────────────────────────────────────────────────────────────────

#[derive(Args)]
pub struct ProcessArgs {
    /// Slip images (PNG, JPEG, …)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Intake folder (defaults to the configured one)
    #[arg(short, long)]
    dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct ListArgs {
    /// Print rows as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

// ── Output ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SlipReport<'a> {
    filename: &'a str,
    stored_path: &'a Path,
    amount: Option<String>,
    date: Option<String>,
    needs_review: bool,
    extracted_text: &'a str,
}

impl<'a> From<&'a ProcessedSlip> for SlipReport<'a> {
    fn from(slip: &'a ProcessedSlip) -> Self {
        Self {
            filename: &slip.filename,
            stored_path: &slip.stored_path,
            amount: slip.result.amount.map(|a| a.to_string()),
            date: slip.result.date.as_ref().map(|d| d.to_string()),
            needs_review: slip.result.needs_review(),
            extracted_text: &slip.result.raw_text,
        }
    }
}

#[derive(Debug, Serialize)]
struct RowReport<'a> {
    index: usize,
    filename: &'a str,
    amount: Option<String>,
    date: Option<String>,
    extracted_text: &'a str,
}

impl<'a> From<&'a LedgerEntry> for RowReport<'a> {
    fn from(entry: &'a LedgerEntry) -> Self {
        Self {
            index: entry.index,
            filename: &entry.row.filename,
            amount: entry.row.amount.map(|a| a.to_string()),
            date: entry.row.date.as_ref().map(|d| d.to_string()),
            extracted_text: &entry.row.raw_text,
        }
    }
}

fn render_slip(report: &SlipReport<'_>) -> String {
    let mut out = String::new();
    out.push_str(&format!("Filename: {}\n", report.filename));
    out.push_str(&format!("Amount:   {}\n", report.amount.as_deref().unwrap_or("-")));
    out.push_str(&format!("Date:     {}\n", report.date.as_deref().unwrap_or("-")));
    if report.needs_review {
        out.push_str("(check against the extracted text)\n");
    }
    out.push_str("Extracted text:\n");
    for line in report.extracted_text.lines() {
        out.push_str(&format!("  {line}\n"));
    }
    out
}

fn render_row(report: &RowReport<'_>) -> String {
    let first_line = report.extracted_text.lines().next().unwrap_or("");
    format!(
        "{:>4}  {:<28}  {:>10}  {:<16}  {}",
        report.index,
        report.filename,
        report.amount.as_deref().unwrap_or(""),
        report.date.as_deref().unwrap_or(""),
        first_line,
    )
}

fn ledger_row(slip: &ProcessedSlip) -> LedgerRow {
    LedgerRow::new(
        slip.filename.clone(),
        slip.result.amount,
        slip.result.date.clone(),
        slip.result.raw_text.clone(),
    )
}

fn load_config(path: Option<&Path>) -> Result<SlipConfig> {
    SlipConfig::load(path).context("load configuration")
}

// ── process ───────────────────────────────────────────────────────────────────

pub async fn process(args: ProcessArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let pipeline = SlipPipeline::new(default_backend(&config.ocr), &config);
    let mut ledger = Ledger::open(&config.storage.ledger_path)
        .with_context(|| format!("open ledger {}", config.storage.ledger_path.display()))?;

    let mut reports = Vec::new();
    let mut failed = 0usize;
    for path in &args.files {
        match pipeline.process_file(path).await {
            Ok(slip) => {
                ledger.append(&ledger_row(&slip)).context("append to ledger")?;
                reports.push(slip);
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "slip not processed");
                eprintln!("{}: {e}", path.display());
                failed += 1;
            }
        }
    }

    let views: Vec<SlipReport<'_>> = reports.iter().map(SlipReport::from).collect();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&views)?);
    } else {
        for view in &views {
            println!("{}", render_slip(view));
        }
    }

    if failed > 0 {
        bail!("{failed} of {} slips could not be processed", args.files.len());
    }
    Ok(())
}

// ── watch ─────────────────────────────────────────────────────────────────────

/// Single consumer: owns the ledger, so appends never interleave.
async fn intake_loop<R: OcrBackend + 'static>(
    pipeline: SlipPipeline<R>,
    mut ledger: Ledger,
    mut rx: mpsc::Receiver<PathBuf>,
) {
    while let Some(path) = rx.recv().await {
        info!("Processing slip: {}", path.display());
        match pipeline.process_file(&path).await {
            Ok(slip) => match ledger.append(&ledger_row(&slip)) {
                Ok(()) => info!("Slip recorded: {}", slip.filename),
                Err(e) => warn!("Ledger append failed for {}: {e}", slip.filename),
            },
            Err(e) => warn!("Slip pipeline error for {}: {e}", path.display()),
        }
    }
}

pub async fn watch(args: WatchArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let intake_dir = args.dir.unwrap_or_else(|| config.storage.intake_dir.clone());
    std::fs::create_dir_all(&intake_dir)
        .with_context(|| format!("create intake folder {}", intake_dir.display()))?;

    let pipeline = SlipPipeline::new(default_backend(&config.ocr), &config);
    let ledger = Ledger::open(&config.storage.ledger_path)
        .with_context(|| format!("open ledger {}", config.storage.ledger_path.display()))?;

    // The channel bridges the notify watcher thread and the async processor.
    let (tx, rx) = mpsc::channel::<PathBuf>(64);
    let worker = tokio::spawn(intake_loop(pipeline, ledger, rx));

    // The watcher must be kept alive for as long as we watch.
    let watcher = slipscan_ocr::spawn_intake_watcher(&intake_dir, tx)
        .context("start intake folder watcher")?;
    info!("Watching intake folder: {}", intake_dir.display());
    println!("Watching {} (Ctrl-C to stop)", intake_dir.display());

    tokio::signal::ctrl_c().await.context("wait for Ctrl-C")?;

    // Dropping the watcher drops the sender, which lets the worker drain and exit.
    drop(watcher);
    worker.await.context("intake worker panicked")?;
    Ok(())
}

// ── list ──────────────────────────────────────────────────────────────────────

pub fn list(args: ListArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let path = &config.storage.ledger_path;
    let entries = read_ledger(path).with_context(|| format!("read ledger {}", path.display()))?;

    let views: Vec<RowReport<'_>> = entries.iter().map(RowReport::from).collect();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    if views.is_empty() {
        println!("No slips recorded in {}", path.display());
        return Ok(());
    }
    println!("{:>4}  {:<28}  {:>10}  {:<16}  Extracted text", "#", "Filename", "Amount", "Date");
    for view in &views {
        println!("{}", render_row(view));
    }
    Ok(())
}

// ── config ────────────────────────────────────────────────────────────────────

pub fn config(args: ConfigArgs, config_path: Option<&Path>) -> Result<()> {
    match args.action {
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(p) => p.to_path_buf(),
                None => SlipConfig::default_path()?,
            };
            if path.exists() && !force {
                println!("Config already exists: {}", path.display());
                return Ok(());
            }
            SlipConfig::for_user()?.save(&path)?;
            println!("Wrote {}", path.display());
        }
        ConfigAction::Show => {
            print!("{}", load_config(config_path)?.to_toml()?);
        }
    }
    Ok(())
}
