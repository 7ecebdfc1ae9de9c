use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use crate::dashboard::{DashboardView, Panel, RatingPanel};
use crate::resolver::{Resolution, SemanticField};
use crate::types::{HeaderSet, Result};

const BAR_WIDTH: usize = 40;

/// Write the view to a JSON file
pub fn write_json_file(view: &DashboardView, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(writer, view)?;
    Ok(())
}

/// Serialize the view to a JSON string
pub fn to_json_string(view: &DashboardView) -> Result<String> {
    Ok(serde_json::to_string_pretty(view)?)
}

/// Write the view as JSON to stdout
pub fn write_json_stdout(view: &DashboardView) -> Result<()> {
    write_stdout(&to_json_string(view)?)
}

pub fn write_stdout(text: &str) -> Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", text)?;
    Ok(())
}

fn bar(count: u64, max: u64) -> String {
    let len = if max == 0 {
        0
    } else {
        ((count as f64 / max as f64) * BAR_WIDTH as f64).round() as usize
    };
    "#".repeat(len)
}

/// Format a rating without a trailing ".0" for whole numbers
pub fn format_rating(rating: f64) -> String {
    if rating.fract() == 0.0 {
        format!("{:.0}", rating)
    } else {
        format!("{}", rating)
    }
}

fn render_rating(out: &mut String, rating: &RatingPanel) {
    match rating.mean {
        Some(mean) => {
            let _ = writeln!(out, "{} - Average Rating: {:.2}", rating.header, mean);
        }
        None => {
            let _ = writeln!(out, "{} - no data", rating.header);
        }
    }
    let max = rating.counts.iter().map(|c| c.count).max().unwrap_or(0);
    for c in &rating.counts {
        let _ = writeln!(
            out,
            "  {:>5} | {} {}",
            format_rating(c.rating),
            bar(c.count, max),
            c.count
        );
    }
}

/// Plain-text rendering of the dashboard for terminals
pub fn render_text(view: &DashboardView) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", view.title);
    let _ = writeln!(
        out,
        "{} ({} of {} responses shown)",
        view.source.file_name, view.filtered_rows, view.source.total_rows
    );
    let _ = writeln!(out);

    if view.active_filters.is_pass_through() {
        let _ = writeln!(out, "Filters (none active)");
    } else {
        let _ = writeln!(out, "Filters");
    }
    for control in &view.filters {
        match &control.header {
            Some(_) if control.selected.is_empty() => {
                let _ = writeln!(
                    out,
                    "  {}: all ({} options)",
                    control.label,
                    control.options.len()
                );
            }
            Some(_) => {
                let _ = writeln!(out, "  {}: {}", control.label, control.selected.join(", "));
            }
            None => {
                let _ = writeln!(out, "  {}: unavailable", control.label);
            }
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Monthly Spending on Digital Cosmetics");
    match &view.spending {
        Panel::Ready(spending) => {
            if let Some(mean) = spending.mean {
                let _ = writeln!(out, "  mean {:.2} over {} responses", mean, spending.responses);
            }
            let max = spending.bins.iter().map(|b| b.count).max().unwrap_or(0);
            for b in &spending.bins {
                let _ = writeln!(
                    out,
                    "  {:>10.1} - {:<10.1} | {} {}",
                    b.lower,
                    b.upper,
                    bar(b.count, max),
                    b.count
                );
            }
        }
        Panel::Unavailable { notice } => {
            let _ = writeln!(out, "  {}", notice);
        }
    }
    let _ = writeln!(out);

    for breakdown in &view.breakdowns {
        if let Some(panel) = breakdown.ready() {
            let _ = writeln!(out, "{}", panel.label);
            let max = panel.counts.iter().map(|c| c.count).max().unwrap_or(0);
            for c in &panel.counts {
                let _ = writeln!(out, "  {:<20} | {} {}", c.category, bar(c.count, max), c.count);
            }
            let _ = writeln!(out);
        }
    }

    let _ = writeln!(out, "Agreement Analysis");
    for rating in &view.ratings {
        match rating {
            Panel::Ready(panel) => render_rating(&mut out, panel),
            Panel::Unavailable { notice } => {
                let _ = writeln!(out, "  {}", notice);
            }
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Word Cloud");
    match &view.word_cloud {
        Panel::Ready(cloud) => {
            let words: Vec<String> = cloud
                .words
                .iter()
                .take(30)
                .map(|w| format!("{}({})", w.word, w.count))
                .collect();
            let _ = writeln!(out, "  {}", words.join(" "));
        }
        Panel::Unavailable { notice } => {
            let _ = writeln!(out, "  {}", notice);
        }
    }

    if !view.diagnostics.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Notices");
        for d in &view.diagnostics {
            let _ = writeln!(out, "  [{}] {}", d.field.label(), d.message);
        }
    }

    out
}

/// List the header set and what each semantic field resolved to
pub fn render_resolutions(
    headers: &HeaderSet,
    resolutions: &[(SemanticField, Resolution)],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Columns ({})", headers.len());
    for (i, header) in headers.iter().enumerate() {
        let _ = writeln!(out, "  {:>3}. {}", i + 1, header);
    }
    let _ = writeln!(out);
    let resolved = resolutions.iter().filter(|(_, r)| r.is_resolved()).count();
    let _ = writeln!(out, "Fields ({} of {} resolved)", resolved, resolutions.len());
    for (field, resolution) in resolutions {
        let target = resolution.header().unwrap_or("UNRESOLVED");
        let kind = format!("{:?}", field.kind()).to_lowercase();
        let _ = writeln!(out, "  {:<40} {:<12} -> {}", field.label(), kind, target);
    }
    out
}
