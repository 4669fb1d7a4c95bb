//! Models command - inspect the model directory.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;

use menucard_core::MenuConfig;

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// Check which model files are present
    Status(StatusArgs),
}

#[derive(Args)]
struct StatusArgs {
    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,
}

pub fn run(args: ModelsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = super::config::load_config(config_path)?;
    match args.command {
        ModelsCommand::Status(status_args) => check_status(status_args, &config),
    }
}

/// Per-user model directory, used when the configured one does not exist.
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("menucard")
        .join("models")
}

/// Pick the model directory: the explicit flag, then the configured
/// directory, then the per-user data directory.
pub fn resolve_model_dir(explicit: Option<&Path>, config: &MenuConfig) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    let configured = &config.models.model_dir;
    if configured.exists() {
        return configured.clone();
    }
    let fallback = default_model_dir();
    if fallback.exists() {
        fallback
    } else {
        configured.clone()
    }
}

/// Required model files that are not in `model_dir`.
pub fn missing_required(model_dir: &Path, config: &MenuConfig) -> Vec<String> {
    config
        .models
        .files()
        .into_iter()
        .filter(|(name, required)| *required && !model_dir.join(name).exists())
        .map(|(name, _)| name.to_string())
        .collect()
}

fn check_status(args: StatusArgs, config: &MenuConfig) -> anyhow::Result<()> {
    let model_dir = resolve_model_dir(args.model_dir.as_deref(), config);

    println!("{}", style("Model Status").bold());
    println!("Directory: {}", style(model_dir.display()).cyan());
    println!();

    let mut ready = true;
    let mut total_size: u64 = 0;

    for (name, required) in config.models.files() {
        let path = model_dir.join(name);
        let kind = if required { "required" } else { "optional" };

        let (status, size_str) = if path.exists() {
            let size = fs::metadata(&path)?.len();
            total_size += size;
            (style("✓").green(), format_size(size))
        } else if required {
            ready = false;
            (style("✗").red(), "missing".to_string())
        } else {
            (style("-").dim(), "missing".to_string())
        };

        println!("    {} {:<25} {:<9} {:>10}", status, name, kind, size_str);
    }

    println!();
    if ready {
        println!(
            "{} Ready ({} total)",
            style("✓").green(),
            format_size(total_size)
        );
    } else {
        println!(
            "{} Required models are missing. Place them in {} or pass -m <dir>.",
            style("⚠").yellow(),
            model_dir.display()
        );
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1_000_000_000 {
        format!("{:.1}GB", bytes as f64 / 1_000_000_000.0)
    } else if bytes >= 1_000_000 {
        format!("{:.1}MB", bytes as f64 / 1_000_000.0)
    } else if bytes >= 1_000 {
        format!("{:.1}KB", bytes as f64 / 1_000.0)
    } else {
        format!("{}B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(1_500), "1.5KB");
        assert_eq!(format_size(12_300_000), "12.3MB");
    }

    #[test]
    fn test_missing_required_ignores_optional() {
        let dir = tempfile::tempdir().unwrap();
        let config = MenuConfig::default();
        assert_eq!(
            missing_required(dir.path(), &config),
            vec!["menu_items.onnx".to_string(), "latin_rec.onnx".to_string()]
        );

        fs::write(dir.path().join("menu_items.onnx"), b"x").unwrap();
        assert_eq!(missing_required(dir.path(), &config), vec!["latin_rec.onnx".to_string()]);
    }

    #[test]
    fn test_explicit_model_dir_wins() {
        let config = MenuConfig::default();
        let dir = resolve_model_dir(Some(Path::new("/opt/menus")), &config);
        assert_eq!(dir, PathBuf::from("/opt/menus"));
    }
}
