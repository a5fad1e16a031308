//! stitch-tables - Merge tables that continue across PDF pages
//!
//! Reads a JSON document batch (page sizes, per-page table fragments,
//! vector drawings and optional paragraph blocks) produced by a table
//! extractor and writes the merged logical tables, continuation hints and
//! chain diagnostics as JSON.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use pagestitch_core::merge::{DocumentBatch, MergeOutcome, MergeSettings};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// What to write to the output.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum Report {
    /// Tables, hints and diagnostics (default)
    #[default]
    Full,
    /// Merged and single tables only
    Tables,
    /// Continuation hints only
    Hints,
    /// Chains and scored candidates only
    Chains,
}

/// Merge table fragments that continue across page breaks.
#[derive(Parser, Debug)]
#[command(name = "stitch-tables")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Document batch JSON, "-" for stdin
    #[arg(default_value = "-")]
    input: String,

    /// Output file name, "-" for stdout
    #[arg(short = 'o', long = "outfile", default_value = "-")]
    outfile: String,

    /// JSON file with merge settings; missing keys keep their defaults
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Override the merge acceptance threshold
    #[arg(short = 't', long)]
    threshold: Option<f64>,

    /// Join cells split by a page break
    #[arg(long = "cell-merge", action = ArgAction::SetTrue)]
    cell_merge: bool,

    /// Treat pages without drawings as having open table borders
    #[arg(long = "assume-open", action = ArgAction::SetTrue)]
    assume_open: bool,

    /// Part of the result to write
    #[arg(short = 'r', long, value_enum, default_value_t = Report::Full)]
    report: Report,

    /// Pretty-print the JSON output
    #[arg(long, action = ArgAction::SetTrue)]
    pretty: bool,

    /// Use debug logging level
    #[arg(short = 'd', long, action = ArgAction::SetTrue)]
    debug: bool,
}

fn init_logging(debug: bool) {
    let default = if debug {
        "pagestitch_core=debug,stitch_tables=debug"
    } else {
        "pagestitch_core=warn,stitch_tables=info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .without_time()
        .init();
}

fn load_settings(args: &Args) -> Result<MergeSettings> {
    let mut settings = match &args.config {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open config '{}'", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("failed to parse config '{}'", path.display()))?
        }
        None => MergeSettings::default(),
    };
    if let Some(threshold) = args.threshold {
        settings = settings.with_threshold(threshold);
    }
    settings.enable_cell_merge |= args.cell_merge;
    settings.assume_open_without_drawings |= args.assume_open;
    settings.validate().context("invalid merge settings")?;
    Ok(settings)
}

fn read_batch(input: &str) -> Result<DocumentBatch> {
    if input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return DocumentBatch::from_json(&buf).context("failed to parse document batch from stdin");
    }
    let path = Path::new(input);
    let file =
        File::open(path).with_context(|| format!("failed to open '{}'", path.display()))?;
    DocumentBatch::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse document batch '{}'", path.display()))
}

fn write_report<W: Write>(out: W, outcome: &MergeOutcome, report: Report, pretty: bool) -> Result<()> {
    let value = match report {
        Report::Full => serde_json::to_value(outcome)?,
        Report::Tables => serde_json::to_value(&outcome.tables)?,
        Report::Hints => serde_json::to_value(&outcome.hints)?,
        Report::Chains => serde_json::to_value(&outcome.diagnostics)?,
    };
    if pretty {
        serde_json::to_writer_pretty(out, &value)?;
    } else {
        serde_json::to_writer(out, &value)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let settings = load_settings(&args)?;
    let batch = read_batch(&args.input)?;
    let outcome = batch.merge(&settings).context("merge failed")?;
    info!(
        fragments = batch.fragments.len(),
        tables = outcome.tables.len(),
        merged = outcome.merged_tables().count(),
        hints = outcome.hints.len(),
        "done"
    );

    let mut output: Box<dyn Write> = if args.outfile == "-" {
        Box::new(BufWriter::new(io::stdout()))
    } else {
        let file = File::create(&args.outfile)
            .with_context(|| format!("failed to create output file '{}'", args.outfile))?;
        Box::new(BufWriter::new(file))
    };
    write_report(&mut output, &outcome, args.report, args.pretty)?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}
