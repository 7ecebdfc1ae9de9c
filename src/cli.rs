use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{DatasetCache, LoadedDataset};
use crate::dashboard::{self, DashboardView, Panel, Selection};
use crate::output::format_rating;
use crate::resolver::{ColumnResolver, FieldCatalog};
use crate::types::{
    DashboardOptions, SpendingMode, DASHBOARD_TITLE, DEFAULT_HISTOGRAM_BINS, DEFAULT_MAX_WORDS,
};

/// Filterable dashboard over gamer and digital-fashion survey responses
#[derive(Parser, Debug)]
#[command(name = "survey-dash")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize the survey for a filter selection
    Report {
        /// Survey export (CSV or TSV)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (stdout if not specified)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Keep only these regions (repeatable)
        #[arg(long = "region")]
        regions: Vec<String>,

        /// Keep only these age groups (repeatable)
        #[arg(long = "age")]
        age_groups: Vec<String>,

        /// How spending answers become amounts
        #[arg(long, value_enum, default_value_t = SpendingMode::DigitConcat)]
        spending_mode: SpendingMode,

        /// Spending histogram bins
        #[arg(long, default_value_t = DEFAULT_HISTOGRAM_BINS)]
        bins: usize,

        /// Words kept in the word cloud
        #[arg(long, default_value_t = DEFAULT_MAX_WORDS)]
        max_words: usize,

        /// JSON file overriding the column lookup rules
        #[arg(long)]
        fields: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Skip the SHA-256 fingerprint of the input file
        #[arg(long, default_value_t = false)]
        no_hash: bool,

        /// Keep header names exactly as written (no whitespace trimming)
        #[arg(long, default_value_t = false)]
        keep_header_whitespace: bool,
    },

    /// List the file's columns and which one each survey question resolves to
    Columns {
        /// Survey export (CSV or TSV)
        #[arg(short, long)]
        input: PathBuf,

        /// JSON file overriding the column lookup rules
        #[arg(long)]
        fields: Option<PathBuf>,
    },

    /// Launch the GUI
    Gui {
        /// Survey export to open at startup
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// JSON file overriding the column lookup rules
        #[arg(long)]
        fields: Option<PathBuf>,
    },
}

/// GUI Application state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GuiState {
    #[default]
    Ready,
    Loading,
    Showing,
    Error(String),
}

/// GUI Application
pub struct GuiApp {
    state: GuiState,
    path: Option<PathBuf>,
    force_reload: bool,
    cache: DatasetCache,
    loaded: Option<Arc<LoadedDataset>>,
    resolver: Option<ColumnResolver>,
    catalog: FieldCatalog,
    selection: Selection,
    options: DashboardOptions,
    view: Option<DashboardView>,
}

impl Default for GuiApp {
    fn default() -> Self {
        Self::new(None, FieldCatalog::default())
    }
}

impl GuiApp {
    pub fn new(path: Option<PathBuf>, catalog: FieldCatalog) -> Self {
        let options = DashboardOptions::default();
        let state = if path.is_some() {
            GuiState::Loading
        } else {
            GuiState::Ready
        };
        Self {
            state,
            path,
            force_reload: false,
            cache: DatasetCache::new(options.clone()),
            loaded: None,
            resolver: None,
            catalog,
            selection: Selection::default(),
            options,
            view: None,
        }
    }

    fn open(&mut self, path: PathBuf) {
        self.path = Some(path);
        self.selection.clear();
        self.state = GuiState::Loading;
    }

    fn load(&mut self) {
        let Some(path) = self.path.clone() else {
            self.state = GuiState::Ready;
            return;
        };

        let result = if self.force_reload {
            self.cache.reload(&path)
        } else {
            self.cache.get_or_load(&path)
        };
        self.force_reload = false;

        match result {
            Ok(loaded) => {
                let stale = self
                    .loaded
                    .as_ref()
                    .map_or(true, |previous| !Arc::ptr_eq(previous, &loaded));
                if stale {
                    self.resolver = Some(ColumnResolver::new(
                        loaded.dataset.headers().clone(),
                        self.catalog.clone(),
                    ));
                }
                self.loaded = Some(loaded);
                self.rebuild();
                self.state = GuiState::Showing;
            }
            Err(e) => {
                self.state = GuiState::Error(e.to_string());
            }
        }
    }

    /// Recompute every panel for the current selection
    fn rebuild(&mut self) {
        if let (Some(loaded), Some(resolver)) = (&self.loaded, &mut self.resolver) {
            self.view = Some(dashboard::build_view(
                loaded,
                resolver,
                &self.selection,
                &self.options,
            ));
        }
    }

    /// Load the same file again after a failure
    fn retry(&mut self) {
        if self.path.is_some() {
            self.state = GuiState::Loading;
        } else {
            self.reset();
        }
    }

    fn reset(&mut self) {
        self.state = GuiState::Ready;
        self.path = None;
        self.loaded = None;
        self.resolver = None;
        self.view = None;
        self.selection.clear();
        self.cache.invalidate();
    }
}

impl eframe::App for GuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Handle dropped files
        let dropped = ctx.input(|i| i.raw.dropped_files.first().and_then(|f| f.path.clone()));
        if let Some(path) = dropped {
            self.open(path);
        }

        if self.state == GuiState::Loading {
            self.load();
        }

        if self.state == GuiState::Showing {
            self.show_filter_panel(ctx);
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(DASHBOARD_TITLE);
            ui.label("Explore how gamers interact with digital fashion and cultural identity.");
            ui.add_space(10.0);

            match &self.state {
                GuiState::Ready => {
                    self.show_ready_state(ui);
                }
                GuiState::Loading => {
                    ui.spinner();
                    ui.label("Loading survey...");
                }
                GuiState::Showing => {
                    self.show_dashboard(ui);
                }
                GuiState::Error(msg) => {
                    let msg = msg.clone();
                    self.show_error_state(ui, msg);
                }
            }
        });
    }
}

impl GuiApp {
    fn show_ready_state(&mut self, ui: &mut egui::Ui) {
        // Drag and drop zone
        let drop_zone = egui::Frame::none()
            .fill(egui::Color32::from_gray(40))
            .stroke(egui::Stroke::new(2.0, egui::Color32::from_gray(100)))
            .rounding(10.0)
            .inner_margin(40.0);

        drop_zone.show(ui, |ui| {
            ui.vertical_centered(|ui| {
                ui.label("Drag and drop a survey export here");
                ui.label("(CSV, TSV)");
                ui.add_space(20.0);
                if ui.button("Browse...").clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("Survey exports", &["csv", "tsv", "tab", "txt"])
                        .pick_file()
                    {
                        self.open(path);
                    }
                }
            });
        });

        ui.add_space(20.0);

        ui.collapsing("Options", |ui| {
            show_options(ui, &mut self.options);
        });
    }

    fn show_filter_panel(&mut self, ctx: &egui::Context) {
        let Some(view) = self.view.clone() else {
            return;
        };
        let mut changed = false;

        egui::SidePanel::left("filters").show(ctx, |ui| {
            ui.heading("Filters");
            ui.add_space(10.0);

            for control in &view.filters {
                ui.label(egui::RichText::new(&control.label).strong());
                if control.header.is_none() {
                    ui.colored_label(egui::Color32::YELLOW, "Column not found");
                    ui.add_space(10.0);
                    continue;
                }

                egui::ScrollArea::vertical()
                    .id_source(control.label.as_str())
                    .max_height(200.0)
                    .show(ui, |ui| {
                        for option in &control.options {
                            let Some(selected) = self.selection.for_field_mut(control.field)
                            else {
                                continue;
                            };
                            let mut checked = selected.contains(option);
                            if ui.checkbox(&mut checked, option).changed() {
                                if checked {
                                    selected.insert(option.clone());
                                } else {
                                    selected.remove(option);
                                }
                                changed = true;
                            }
                        }
                    });
                ui.add_space(10.0);
            }

            let filtering = !view.active_filters.is_pass_through();
            if ui
                .add_enabled(filtering, egui::Button::new("Clear filters"))
                .clicked()
            {
                self.selection.clear();
                changed = true;
            }

            ui.separator();
            ui.heading("Options");
            if show_options(ui, &mut self.options) {
                changed = true;
            }
        });

        if changed {
            self.rebuild();
        }
    }

    fn show_dashboard(&mut self, ui: &mut egui::Ui) {
        let mut should_reload = false;
        let mut should_reset = false;

        ui.horizontal(|ui| {
            if ui.button("Reload file").clicked() {
                should_reload = true;
            }
            if ui.button("Open another file").clicked() {
                should_reset = true;
            }
        });

        if should_reload {
            self.force_reload = true;
            self.state = GuiState::Loading;
            return;
        }
        if should_reset {
            self.reset();
            return;
        }

        let Some(view) = &self.view else {
            return;
        };

        ui.label(format!(
            "{}: {} of {} responses",
            view.source.file_name, view.filtered_rows, view.source.total_rows
        ));
        ui.add_space(10.0);

        egui::ScrollArea::vertical().show(ui, |ui| {
            show_spending(ui, &view.spending);
            ui.separator();

            for breakdown in &view.breakdowns {
                if let Some(panel) = breakdown.ready() {
                    ui.heading(&panel.label);
                    let max = panel.counts.iter().map(|c| c.count).max().unwrap_or(0);
                    for c in &panel.counts {
                        bar_row(ui, &c.category, c.count, max);
                    }
                    ui.separator();
                }
            }

            ui.heading("Agreement Analysis");
            for rating in &view.ratings {
                match rating {
                    Panel::Ready(panel) => {
                        let mean = panel
                            .mean
                            .map(|m| format!("Average Rating: {:.2}", m))
                            .unwrap_or_else(|| "no data".to_string());
                        ui.label(egui::RichText::new(format!("{} - {}", panel.header, mean)).strong());
                        let max = panel.counts.iter().map(|c| c.count).max().unwrap_or(0);
                        for c in &panel.counts {
                            bar_row(ui, &format_rating(c.rating), c.count, max);
                        }
                    }
                    Panel::Unavailable { notice } => {
                        ui.colored_label(egui::Color32::YELLOW, notice);
                    }
                }
                ui.add_space(10.0);
            }
            ui.separator();

            ui.heading("Word Cloud");
            match &view.word_cloud {
                Panel::Ready(cloud) => {
                    ui.horizontal_wrapped(|ui| {
                        for w in &cloud.words {
                            let size = 12.0 + 24.0 * w.weight as f32;
                            ui.label(egui::RichText::new(&w.word).size(size));
                        }
                    });
                }
                Panel::Unavailable { notice } => {
                    ui.colored_label(egui::Color32::YELLOW, notice);
                }
            }

            if !view.diagnostics.is_empty() {
                ui.separator();
                ui.collapsing(format!("Notices ({})", view.diagnostics.len()), |ui| {
                    for d in &view.diagnostics {
                        ui.colored_label(
                            egui::Color32::YELLOW,
                            format!("{}: {}", d.field.label(), d.message),
                        );
                    }
                });
            }
        });
    }

    fn show_error_state(&mut self, ui: &mut egui::Ui, msg: String) {
        ui.colored_label(egui::Color32::RED, format!("Error: {}", msg));
        ui.add_space(20.0);
        ui.horizontal(|ui| {
            if ui.button("Try again").clicked() {
                self.retry();
            }
            if ui.button("Open another file").clicked() {
                self.reset();
            }
        });
    }
}

/// Spending mode and bin count controls; true when either changed
fn show_options(ui: &mut egui::Ui, options: &mut DashboardOptions) -> bool {
    let mut changed = false;
    ui.horizontal(|ui| {
        ui.label("Spending:");
        changed |= ui
            .radio_value(
                &mut options.spending_mode,
                SpendingMode::DigitConcat,
                "Concatenate digits",
            )
            .changed();
        changed |= ui
            .radio_value(
                &mut options.spending_mode,
                SpendingMode::RangeMidpoint,
                "Range midpoint",
            )
            .changed();
    });
    ui.horizontal(|ui| {
        ui.label("Histogram bins:");
        changed |= ui
            .add(egui::Slider::new(&mut options.histogram_bins, 1..=50))
            .changed();
    });
    changed
}

fn show_spending(ui: &mut egui::Ui, panel: &Panel<dashboard::SpendingPanel>) {
    ui.heading("Monthly Spending on Digital Cosmetics");
    match panel {
        Panel::Ready(spending) => {
            if let Some(mean) = spending.mean {
                ui.label(format!(
                    "Mean {:.2} over {} responses",
                    mean, spending.responses
                ));
            }
            let max = spending.bins.iter().map(|b| b.count).max().unwrap_or(0);
            for b in &spending.bins {
                bar_row(ui, &format!("{:.0} - {:.0}", b.lower, b.upper), b.count, max);
            }
        }
        Panel::Unavailable { notice } => {
            ui.colored_label(egui::Color32::YELLOW, notice);
        }
    }
}

fn bar_row(ui: &mut egui::Ui, label: &str, count: u64, max: u64) {
    let fraction = if max == 0 {
        0.0
    } else {
        count as f32 / max as f32
    };
    ui.horizontal(|ui| {
        ui.add_sized([120.0, 18.0], egui::Label::new(label));
        ui.add(
            egui::ProgressBar::new(fraction)
                .desired_width(300.0)
                .text(count.to_string()),
        );
    });
}
