//! ZView 命令行程序
//!
//! 导入DXF并输出摘要，以及查看、重置、导入/导出应用设置。

mod app_settings;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use app_settings::{default_settings_path, open_store, AppSettings};
use zview_core::settings::{Locale, LoadReport, Settings};
use zview_file::dxf_io;
use zview_file::Document;

#[derive(Parser)]
#[command(name = "zview")]
#[command(about = "DXF import and settings management (headless)")]
#[command(version)]
struct Cli {
    /// Settings file (.json, or .sqlite/.db for SQLite)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a DXF file and print a summary
    Import {
        file: PathBuf,

        /// Override the length scaling factor
        #[arg(long)]
        scaling: Option<f64>,

        /// Merge the shapes of each layer into one compound
        #[arg(long)]
        group_layers: bool,

        /// Skip texts and dimensions
        #[arg(long)]
        no_annotations: bool,
    },

    /// Inspect or transfer settings
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print every setting with its current value
    List,

    /// Restore default values
    Reset {
        /// Only reset this group
        #[arg(long)]
        group: Option<String>,
    },

    /// Write settings to another file
    Export {
        path: PathBuf,

        /// Setting identifiers to leave out
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// Read settings from another file and make them current
    Import {
        path: PathBuf,

        /// Setting identifiers to leave untouched
        #[arg(long)]
        exclude: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_max_level(level).finish(),
    )?;

    let settings_path = cli.settings.clone().unwrap_or_else(default_settings_path);
    let mut app = AppSettings::new()?;
    load_settings(&mut app.settings, &settings_path)?;
    let language = app.settings[app.language].value().clone();
    app.settings.set_locale(Locale::from_language_code(&language));

    match cli.command {
        Commands::Import {
            file,
            scaling,
            group_layers,
            no_annotations,
        } => {
            // 命令行覆盖只作用于本次导入，不写回设置
            let mut options = app.dxf_options();
            if let Some(scaling) = scaling {
                if !(scaling > 0.0) {
                    bail!("scaling must be positive, got {}", scaling);
                }
                options.scaling = scaling;
            }
            options.group_layers |= group_layers;
            options.import_annotations &= !no_annotations;

            let document = dxf_io::import(&file, &options)
                .with_context(|| format!("importing {}", file.display()))?;
            print_summary(&document);

            app.add_recent_file(&file)?;
            save_settings(&app.settings, &settings_path)?;
        }

        Commands::Settings(SettingsCommand::List) => {
            for index in app.settings.settings() {
                let key = app.settings.setting_key(index).unwrap_or_default();
                let value = app.settings.format_value(index).unwrap_or_default();
                println!("{} = {}", key, value);
            }
        }

        Commands::Settings(SettingsCommand::Reset { group }) => {
            match group {
                Some(identifier) => {
                    let Some(index) = app.settings.find_group(&identifier) else {
                        bail!("no settings group '{}'", identifier);
                    };
                    app.settings.reset_group(index)?;
                }
                None => app.settings.reset_all(),
            }
            save_settings(&app.settings, &settings_path)?;
        }

        Commands::Settings(SettingsCommand::Export { path, exclude }) => {
            let mut store = open_store(&path)?;
            app.settings
                .save_as(store.as_mut(), |p| exclude.iter().any(|id| id == p.name()))?;
            info!("Settings exported to {}", path.display());
        }

        Commands::Settings(SettingsCommand::Import { path, exclude }) => {
            if !path.exists() {
                bail!("{} does not exist", path.display());
            }
            let store = open_store(&path)?;
            let report = app
                .settings
                .load_from(store.as_ref(), |p| exclude.iter().any(|id| id == p.name()))?;
            report_failures(&report);
            println!(
                "{} settings imported, {} missing, {} excluded",
                report.loaded.len(),
                report.missing.len(),
                report.excluded.len()
            );
            save_settings(&app.settings, &settings_path)?;
        }
    }

    Ok(())
}

fn load_settings(settings: &mut Settings, path: &Path) -> Result<()> {
    if !path.exists() {
        info!("No settings at {}, using defaults", path.display());
        return Ok(());
    }
    let store = open_store(path)?;
    let report = settings
        .load(store.as_ref())
        .with_context(|| format!("loading settings from {}", path.display()))?;
    report_failures(&report);
    Ok(())
}

fn save_settings(settings: &Settings, path: &Path) -> Result<()> {
    let mut store = open_store(path)?;
    settings
        .save(store.as_mut())
        .with_context(|| format!("saving settings to {}", path.display()))?;
    Ok(())
}

fn report_failures(report: &LoadReport) {
    for failure in &report.failures {
        warn!("Setting '{}' kept its value: {}", failure.key, failure.error);
    }
}

fn print_summary(document: &Document) {
    println!("{}", document.metadata.title);

    let mut per_layer: BTreeMap<&str, usize> = BTreeMap::new();
    for entity in document.all_entities() {
        *per_layer.entry(entity.layer.as_str()).or_default() += 1;
    }
    for layer in document.layers.all_layers() {
        let count = per_layer.get(layer.name.as_str()).copied().unwrap_or(0);
        println!(
            "  layer {:<24} {:>6} shapes  {}{}",
            layer.name,
            count,
            layer.color,
            if layer.visible { "" } else { "  (off)" }
        );
    }

    println!(
        "{} shapes, {} annotations",
        document.entity_count(),
        document.annotations().len()
    );
    if let Some(bounds) = document.bounds() {
        println!(
            "bounds: ({:.3}, {:.3}, {:.3}) - ({:.3}, {:.3}, {:.3})",
            bounds.min.x, bounds.min.y, bounds.min.z, bounds.max.x, bounds.max.y, bounds.max.z
        );
    }
}
