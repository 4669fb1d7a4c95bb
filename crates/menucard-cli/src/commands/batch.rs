//! Batch processing command for multiple menu photos.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, error, warn};

use menucard_core::MenuReport;

use super::process::{OutputFormat, TuningArgs, load_reader, read_to};

const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "webp", "tiff", "tif", "bmp"];

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern matching menu photos
    #[arg(required = true)]
    input: String,

    /// Output directory (default: next to each photo)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Also write an annotated preview per photo
    #[arg(long)]
    annotated: bool,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,

    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    #[command(flatten)]
    tuning: TuningArgs,
}

/// Summary row for a single photo.
#[derive(Debug, Serialize)]
struct SummaryRow {
    filename: String,
    status: &'static str,
    item_count: usize,
    priced_count: usize,
    processing_time_ms: u64,
    error: String,
}

impl SummaryRow {
    fn new(path: &Path, result: &Result<MenuReport, String>) -> Self {
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        match result {
            Ok(report) => Self {
                filename,
                status: "success",
                item_count: report.item_count,
                priced_count: report.priced_count,
                processing_time_ms: report.processing_time_ms,
                error: String::new(),
            },
            Err(e) => Self {
                filename,
                status: "failed",
                item_count: 0,
                priced_count: 0,
                processing_time_ms: 0,
                error: e.clone(),
            },
        }
    }
}

pub fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = super::config::load_config(config_path)?;
    args.tuning.apply(&mut config)?;

    let files = matching_images(&args.input)?;
    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    // Models are loaded once and reused for every photo
    let reader = load_reader(args.model_dir.as_deref(), config)?;

    let overall_pb = ProgressBar::new(files.len() as u64);
    if let Ok(bar_style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
    {
        overall_pb.set_style(bar_style.progress_chars("=>-"));
    }

    let mut results: Vec<(PathBuf, Result<MenuReport, String>)> = Vec::with_capacity(files.len());

    for path in files {
        let output = output_path(&path, args.output_dir.as_deref(), args.format.extension(), "");
        let annotated = args
            .annotated
            .then(|| output_path(&path, args.output_dir.as_deref(), "jpg", "_bboxes"));

        let result = read_to(&reader, &path, annotated.as_deref(), &output, args.format)
            .map_err(|e| e.to_string());

        match &result {
            Ok(report) => debug!("{}: {} priced items", path.display(), report.priced_count),
            Err(e) if args.continue_on_error => warn!("Failed to process {}: {}", path.display(), e),
            Err(e) => {
                error!("Failed to process {}: {}", path.display(), e);
                overall_pb.abandon();
                anyhow::bail!("Processing failed for {}: {}", path.display(), e);
            }
        }

        results.push((path, result));
        overall_pb.inc(1);
    }

    overall_pb.finish_with_message("Complete");

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let failed: Vec<_> = results.iter().filter(|(_, r)| r.is_err()).collect();

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(results.len() - failed.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for (path, result) in &failed {
            if let Err(e) = result {
                println!("  - {}: {}", path.display(), e);
            }
        }
    }

    Ok(())
}

/// Expand a glob pattern to image files, sorted for stable output.
fn matching_images(pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = glob(pattern)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .collect();
    files.sort();
    Ok(files)
}

/// `<dir>/<stem><suffix>.<ext>`, with `dir` defaulting to the photo's directory.
fn output_path(input: &Path, output_dir: Option<&Path>, ext: &str, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("menu");
    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(format!("{stem}{suffix}.{ext}"))
}

fn write_summary(path: &Path, results: &[(PathBuf, Result<MenuReport, String>)]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for (file, result) in results {
        wtr.serialize(SummaryRow::new(file, result))?;
    }
    wtr.flush()?;
    Ok(())
}
