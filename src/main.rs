mod cache;
mod cleaning;
mod cli;
mod dashboard;
mod error;
mod filter;
mod output;
mod readers;
mod resolver;
mod stats;
mod types;

use std::path::Path;

use clap::Parser;
use cli::{Cli, Commands, OutputFormat};
use error::Error;
use resolver::{ColumnResolver, FieldCatalog};
use tracing::info;
use tracing_subscriber::EnvFilter;
use types::Result;

/// Logs go to stderr so report output on stdout stays machine-readable
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_catalog(fields: Option<&Path>) -> Result<FieldCatalog> {
    match fields {
        Some(path) => {
            info!(path = %path.display(), "loading field catalog");
            FieldCatalog::from_json_file(path)
        }
        None => Ok(FieldCatalog::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Some(Commands::Report {
            input,
            out,
            regions,
            age_groups,
            spending_mode,
            bins,
            max_words,
            fields,
            format,
            no_hash,
            keep_header_whitespace,
        }) => {
            if bins == 0 {
                return Err(Error::InvalidInput("--bins must be at least 1".to_string()));
            }

            let options = types::DashboardOptions {
                strip_headers: !keep_header_whitespace,
                hash_file: !no_hash,
                spending_mode,
                histogram_bins: bins,
                max_words,
            };
            let catalog = load_catalog(fields.as_deref())?;

            let mut cache = cache::DatasetCache::new(options.clone());
            let loaded = cache.get_or_load(&input)?;
            let mut resolver = ColumnResolver::new(loaded.dataset.headers().clone(), catalog);
            let selection = dashboard::Selection {
                regions: regions.into_iter().collect(),
                age_groups: age_groups.into_iter().collect(),
            };

            let view = dashboard::build_view(&loaded, &mut resolver, &selection, &options);

            match (format, out) {
                (OutputFormat::Json, Some(out_path)) => {
                    output::write_json_file(&view, &out_path)?;
                    eprintln!("Dashboard written to: {}", out_path.display());
                }
                (OutputFormat::Json, None) => output::write_json_stdout(&view)?,
                (OutputFormat::Text, Some(out_path)) => {
                    std::fs::write(&out_path, output::render_text(&view))?;
                    eprintln!("Dashboard written to: {}", out_path.display());
                }
                (OutputFormat::Text, None) => output::write_stdout(&output::render_text(&view))?,
            }
        }
        Some(Commands::Columns { input, fields }) => {
            let catalog = load_catalog(fields.as_deref())?;
            let options = types::DashboardOptions {
                hash_file: false,
                ..types::DashboardOptions::default()
            };
            let loaded = cache::load_dataset(&input, &options)?;
            let mut resolver = ColumnResolver::new(loaded.dataset.headers().clone(), catalog);
            let resolutions = resolver.resolve_all();
            output::write_stdout(&output::render_resolutions(
                resolver.headers(),
                &resolutions,
            ))?;
        }
        Some(Commands::Gui { input, fields }) => {
            let catalog = load_catalog(fields.as_deref())?;
            run_gui(input, catalog)?;
        }
        None => {
            run_gui(None, FieldCatalog::default())?;
        }
    }

    Ok(())
}

fn run_gui(input: Option<std::path::PathBuf>, catalog: FieldCatalog) -> Result<()> {
    use crate::cli::GuiApp;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 800.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "Survey Dashboard",
        options,
        Box::new(move |_cc| Box::new(GuiApp::new(input, catalog))),
    )
    .map_err(|e| Error::InvalidInput(format!("GUI error: {}", e)))?;

    Ok(())
}
