//! Process command - read a single menu photo.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Args, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use menucard_core::menu::DEFAULT_OVERLAP_THRESHOLD;
use menucard_core::{AssociationStrategy, MenuConfig, MenuReport, NativeReader, create_reader_from_dir};

use super::models::{missing_required, resolve_model_dir};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Menu photo (PNG, JPEG, ...)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file for the extracted menu [default: menu_text_output.<format>]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Annotated preview with every detected box
    #[arg(short, long, default_value = "output_with_bboxes.jpg")]
    annotated: PathBuf,

    /// Do not write the annotated preview
    #[arg(long)]
    no_annotated: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    #[command(flatten)]
    tuning: TuningArgs,
}

/// Pipeline overrides shared by `process` and `batch`.
#[derive(Args, Clone, Default)]
pub struct TuningArgs {
    /// How components are matched to item boxes
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// IoU threshold for the overlap strategy (implies --strategy overlap)
    #[arg(long)]
    iou_threshold: Option<f32>,

    /// Recognize items concurrently
    #[arg(long)]
    parallel: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Component must lie entirely inside the item box
    Containment,
    /// Component/item IoU must reach the threshold
    Overlap,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One "index: title description -> price€" line per item
    Text,
    /// Full report as JSON
    Json,
    /// One CSV row per item
    Csv,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

impl ProcessArgs {
    /// The `-o` path, or `menu_text_output` with the format's extension.
    fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("menu_text_output.{}", self.format.extension())))
    }
}

impl TuningArgs {
    /// Apply the overrides to a loaded configuration.
    pub fn apply(&self, config: &mut MenuConfig) -> anyhow::Result<()> {
        if let Some(threshold) = self.iou_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                anyhow::bail!("--iou-threshold must be between 0 and 1, got {}", threshold);
            }
        }

        let strategy = match (self.strategy, self.iou_threshold) {
            (Some(StrategyArg::Containment), Some(_)) => {
                anyhow::bail!("--iou-threshold only applies to the overlap strategy")
            }
            (Some(StrategyArg::Containment), None) => Some(AssociationStrategy::Containment),
            (Some(StrategyArg::Overlap), threshold) | (None, threshold @ Some(_)) => {
                Some(AssociationStrategy::Overlap {
                    threshold: threshold.unwrap_or(DEFAULT_OVERLAP_THRESHOLD),
                })
            }
            (None, None) => None,
        };

        if let Some(strategy) = strategy {
            debug!("Association strategy: {:?}", strategy);
            config.association.strategy = strategy;
        }
        if self.parallel {
            config.extraction.parallel = true;
        }
        Ok(())
    }
}

pub fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = super::config::load_config(config_path)?;
    args.tuning.apply(&mut config)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let pb = spinner();
    pb.set_message("Loading models...");
    let reader = load_reader(args.model_dir.as_deref(), config)?;

    info!("Processing file: {}", args.input.display());
    pb.set_message("Reading menu...");

    let output = args.output_path();
    let annotated = (!args.no_annotated).then_some(args.annotated.as_path());
    let report = read_to(&reader, &args.input, annotated, &output, args.format)?;

    pb.finish_and_clear();

    println!(
        "{} {} priced items written to {}",
        style("✓").green(),
        report.priced_count,
        output.display()
    );
    if let Some(path) = annotated {
        if path.exists() {
            println!("{} Annotated image: {}", style("ℹ").blue(), path.display());
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());
    Ok(())
}

/// Resolve the model directory and load every model once.
pub fn load_reader(model_dir: Option<&Path>, config: MenuConfig) -> anyhow::Result<NativeReader> {
    let model_dir = resolve_model_dir(model_dir, &config);

    let missing = missing_required(&model_dir, &config);
    if !missing.is_empty() {
        anyhow::bail!(
            "Required models not found in {}: {}.\n\n\
             Run 'menucard models status -m {}' for details.",
            model_dir.display(),
            missing.join(", "),
            model_dir.display()
        );
    }

    create_reader_from_dir(&model_dir, config)
        .map_err(|e| anyhow::anyhow!("Failed to load models: {}", e))
}

/// Read one page and write it to `output` in the requested format.
///
/// Text goes through the reader's atomic report writer.
pub fn read_to(
    reader: &NativeReader,
    input: &Path,
    annotated: Option<&Path>,
    output: &Path,
    format: OutputFormat,
) -> anyhow::Result<MenuReport> {
    let report = match format {
        OutputFormat::Text => reader.process(input, annotated, output)?,
        OutputFormat::Json => {
            let report = reader.read(input, annotated)?;
            fs::write(output, to_json(&report)?)?;
            report
        }
        OutputFormat::Csv => {
            let report = reader.read(input, annotated)?;
            fs::write(output, to_csv(&report)?)?;
            report
        }
    };
    Ok(report)
}

/// Full report as pretty-printed JSON.
pub fn to_json(report: &MenuReport) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// One CSV row per record, with a header.
pub fn to_csv(report: &MenuReport) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in &report.records {
        wtr.serialize(record)?;
    }
    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
