//! CLI application for reading menu card photos.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use commands::{batch, config, models, process};

/// Menu card reader - extract dishes, descriptions and prices from photos
#[derive(Parser)]
#[command(name = "menucard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a single menu photo
    Process(process::ProcessArgs),

    /// Read every menu photo matching a glob pattern
    Batch(batch::BatchArgs),

    /// Inspect model files
    Models(models::ModelsArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // RUST_LOG overrides the -v level
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Process(args) => process::run(args, cli.config.as_deref()),
        Commands::Batch(args) => batch::run(args, cli.config.as_deref()),
        Commands::Models(args) => models::run(args, cli.config.as_deref()),
        Commands::Config(args) => config::run(args),
    }
}
