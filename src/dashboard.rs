use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::LoadedDataset;
use crate::cleaning::{
    coerce_rating, has_decimal_digit, is_unparseable_rating, normalize_spending_with,
};
use crate::filter::{apply_filters, distinct_values, FilterSet};
use crate::resolver::{ColumnResolver, Resolution, SemanticField};
use crate::stats::{
    category_counts, histogram, rating_counts, word_frequencies, CategoryCount, HistogramBin,
    RatingCount, WelfordStats, WordCount,
};
use crate::types::{DashboardOptions, Dataset, FileFormat, SpendingMode, DASHBOARD_TITLE};

/// Values the user picked in the filter controls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub regions: BTreeSet<String>,
    pub age_groups: BTreeSet<String>,
}

impl Selection {
    pub fn for_field(&self, field: SemanticField) -> Option<&BTreeSet<String>> {
        match field {
            SemanticField::Region => Some(&self.regions),
            SemanticField::AgeGroup => Some(&self.age_groups),
            _ => None,
        }
    }

    pub fn for_field_mut(&mut self, field: SemanticField) -> Option<&mut BTreeSet<String>> {
        match field {
            SemanticField::Region => Some(&mut self.regions),
            SemanticField::AgeGroup => Some(&mut self.age_groups),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.regions.clear();
        self.age_groups.clear();
    }
}

/// Kind of non-fatal problem met while building the view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// No column matches the field
    ResolutionFailure,
    /// Some cells could not be read and were replaced by a sentinel
    ParseFailure,
    /// Nothing to show for the current filters
    EmptyInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub field: SemanticField,
    pub message: String,
}

/// A chart that is either ready to draw or replaced by a notice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Panel<T> {
    Ready(T),
    Unavailable { notice: String },
}

impl<T> Panel<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Panel::Ready(data) => Some(data),
            Panel::Unavailable { .. } => None,
        }
    }
}

/// A multi-select control and its current state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterControl {
    pub field: SemanticField,
    pub label: String,
    /// Resolved column, `None` when the control is unavailable
    pub header: Option<String>,
    pub options: Vec<String>,
    pub selected: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendingPanel {
    pub header: String,
    pub mode: SpendingMode,
    pub responses: usize,
    /// Non-missing answers without any number, counted as 0
    pub unparsed: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub bins: Vec<HistogramBin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPanel {
    pub field: SemanticField,
    pub label: String,
    pub header: String,
    pub counts: Vec<CategoryCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingPanel {
    pub field: SemanticField,
    pub label: String,
    pub header: String,
    /// Mean over parsed ratings; `None` renders as "no data"
    pub mean: Option<f64>,
    pub responses: usize,
    pub missing: usize,
    pub unparseable: usize,
    pub counts: Vec<RatingCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordCloudPanel {
    pub header: String,
    pub responses: usize,
    pub words: Vec<WordCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub file_name: String,
    pub format: FileFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
    pub loaded_at: String,
    pub total_rows: usize,
}

/// Everything the dashboard shows for one filter selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub title: String,
    pub source: SourceInfo,
    pub filtered_rows: usize,
    pub filters: Vec<FilterControl>,
    /// Allowed values per resolved header, as applied to the dataset
    #[serde(default)]
    pub active_filters: FilterSet,
    pub spending: Panel<SpendingPanel>,
    pub breakdowns: Vec<Panel<CategoryPanel>>,
    pub ratings: Vec<Panel<RatingPanel>>,
    pub word_cloud: Panel<WordCloudPanel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
    pub options: DashboardOptions,
}

#[derive(Default)]
struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    fn push(&mut self, kind: DiagnosticKind, field: SemanticField, message: String) {
        warn!(?kind, ?field, "{}", message);
        self.0.push(Diagnostic {
            kind,
            field,
            message,
        });
    }

    /// Record a resolution failure and return the notice for the skipped panel
    fn unresolved<T>(&mut self, field: SemanticField) -> Panel<T> {
        let notice = format!("No column found for \"{}\"", field.label());
        self.push(DiagnosticKind::ResolutionFailure, field, notice.clone());
        Panel::Unavailable { notice }
    }

    fn empty<T>(&mut self, field: SemanticField, notice: String) -> Panel<T> {
        self.push(DiagnosticKind::EmptyInput, field, notice.clone());
        Panel::Unavailable { notice }
    }
}

/// Run the whole pipeline for one interaction: resolve, filter, clean, summarize
///
/// Never fails; problems with individual fields become diagnostics and
/// unavailable panels.
pub fn build_view(
    loaded: &LoadedDataset,
    resolver: &mut ColumnResolver,
    selection: &Selection,
    options: &DashboardOptions,
) -> DashboardView {
    let dataset = &loaded.dataset;
    let mut diagnostics = Diagnostics::default();

    let mut filters = FilterSet::new();
    let mut controls = Vec::new();
    for field in SemanticField::FILTERS {
        let header = match resolver.resolve(field) {
            Resolution::Resolved(header) => {
                let picked = selection.for_field(field).into_iter().flatten().cloned();
                filters = filters.merge(&FilterSet::new().with(&header, picked));
                Some(header)
            }
            Resolution::Unresolved => {
                diagnostics.push(
                    DiagnosticKind::ResolutionFailure,
                    field,
                    format!("No column found for \"{}\"; filter disabled", field.label()),
                );
                None
            }
        };

        let (choices, selected) = match header.as_deref() {
            Some(h) => (
                distinct_values(dataset, h),
                filters
                    .allowed(h)
                    .map(|allowed| allowed.iter().cloned().collect())
                    .unwrap_or_default(),
            ),
            None => (Vec::new(), Vec::new()),
        };
        controls.push(FilterControl {
            field,
            label: field.label().to_string(),
            header,
            options: choices,
            selected,
        });
    }

    let filtered = apply_filters(dataset, &filters);
    debug!(
        rows = filtered.len(),
        pass_through = filters.is_pass_through(),
        "filters applied"
    );
    if filtered.is_empty() && !dataset.is_empty() {
        warn!("no responses match the current filters");
    }

    let spending = spending_panel(&filtered, resolver, options, &mut diagnostics);

    let breakdowns = SemanticField::FILTERS
        .iter()
        .map(|&field| category_panel(&filtered, resolver, field, &mut diagnostics))
        .collect();

    let ratings = SemanticField::RATINGS
        .iter()
        .map(|&field| rating_panel(&filtered, resolver, field, &mut diagnostics))
        .collect();

    let word_cloud = word_cloud_panel(&filtered, resolver, options, &mut diagnostics);

    DashboardView {
        title: DASHBOARD_TITLE.to_string(),
        source: SourceInfo {
            file_name: loaded.file_name.clone(),
            format: loaded.format,
            file_hash: loaded.file_hash.clone(),
            loaded_at: loaded.loaded_at.to_rfc3339(),
            total_rows: dataset.len(),
        },
        filtered_rows: filtered.len(),
        filters: controls,
        active_filters: filters,
        spending,
        breakdowns,
        ratings,
        word_cloud,
        diagnostics: diagnostics.0,
        options: options.clone(),
    }
}

fn spending_panel(
    filtered: &Dataset,
    resolver: &mut ColumnResolver,
    options: &DashboardOptions,
    diagnostics: &mut Diagnostics,
) -> Panel<SpendingPanel> {
    let field = SemanticField::MonthlySpend;
    let Resolution::Resolved(header) = resolver.resolve(field) else {
        return diagnostics.unresolved(field);
    };
    let Some(column) = filtered.column(&header) else {
        return diagnostics.unresolved(field);
    };

    let mut values: Vec<f64> = Vec::new();
    let mut unparsed = 0;
    for cell in column {
        let amount = normalize_spending_with(cell, options.spending_mode);
        if amount == 0 && cell.as_text().is_some_and(|t| !has_decimal_digit(t)) {
            unparsed += 1;
        }
        values.push(amount as f64);
    }

    if values.is_empty() {
        return diagnostics.empty(
            field,
            "No spending responses match the current filters".to_string(),
        );
    }
    if unparsed > 0 {
        diagnostics.push(
            DiagnosticKind::ParseFailure,
            field,
            format!("{} spending answers contained no amount and were counted as 0", unparsed),
        );
    }

    let stats: WelfordStats = values.iter().copied().collect();
    Panel::Ready(SpendingPanel {
        header,
        mode: options.spending_mode,
        responses: stats.count() as usize,
        unparsed,
        mean: stats.mean(),
        min: stats.min(),
        max: stats.max(),
        bins: histogram(&values, options.histogram_bins),
    })
}

fn category_panel(
    filtered: &Dataset,
    resolver: &mut ColumnResolver,
    field: SemanticField,
    diagnostics: &mut Diagnostics,
) -> Panel<CategoryPanel> {
    // resolution failures are already reported by the filter controls
    let Resolution::Resolved(header) = resolver.resolve(field) else {
        return Panel::Unavailable {
            notice: format!("No column found for \"{}\"", field.label()),
        };
    };
    let Some(column) = filtered.column(&header) else {
        return diagnostics.unresolved(field);
    };

    let texts: Vec<String> = column
        .filter_map(|cell| cell.as_text().map(str::to_string))
        .collect();
    if texts.is_empty() {
        return diagnostics.empty(
            field,
            format!("No \"{}\" answers match the current filters", field.label()),
        );
    }

    Panel::Ready(CategoryPanel {
        field,
        label: field.label().to_string(),
        header,
        counts: category_counts(texts.iter().map(|t| t.as_str())),
    })
}

fn rating_panel(
    filtered: &Dataset,
    resolver: &mut ColumnResolver,
    field: SemanticField,
    diagnostics: &mut Diagnostics,
) -> Panel<RatingPanel> {
    let Resolution::Resolved(header) = resolver.resolve(field) else {
        return diagnostics.unresolved(field);
    };
    let Some(column) = filtered.column(&header) else {
        return diagnostics.unresolved(field);
    };

    let mut ratings: Vec<f64> = Vec::new();
    let mut missing = 0;
    let mut unparseable = 0;
    for cell in column {
        match coerce_rating(cell) {
            Some(rating) => ratings.push(rating),
            None if is_unparseable_rating(cell) => unparseable += 1,
            None => missing += 1,
        }
    }

    if unparseable > 0 {
        diagnostics.push(
            DiagnosticKind::ParseFailure,
            field,
            format!("{} answers were not numeric ratings and were skipped", unparseable),
        );
    }
    if ratings.is_empty() {
        diagnostics.push(
            DiagnosticKind::EmptyInput,
            field,
            format!("No numeric ratings for \"{}\"", field.label()),
        );
    }

    let stats: WelfordStats = ratings.iter().copied().collect();
    Panel::Ready(RatingPanel {
        field,
        label: field.label().to_string(),
        header,
        mean: stats.mean(),
        responses: stats.count() as usize,
        missing,
        unparseable,
        counts: rating_counts(&ratings),
    })
}

fn word_cloud_panel(
    filtered: &Dataset,
    resolver: &mut ColumnResolver,
    options: &DashboardOptions,
    diagnostics: &mut Diagnostics,
) -> Panel<WordCloudPanel> {
    let field = SemanticField::OpenFeedback;
    let Resolution::Resolved(header) = resolver.resolve(field) else {
        return diagnostics.unresolved(field);
    };
    let Some(column) = filtered.column(&header) else {
        return diagnostics.unresolved(field);
    };

    let texts: Vec<String> = column
        .filter_map(|cell| cell.as_text().map(str::to_string))
        .filter(|t| !t.trim().is_empty())
        .collect();
    let words = word_frequencies(texts.iter().map(|t| t.as_str()), options.max_words);

    if words.is_empty() {
        return diagnostics.empty(
            field,
            "No free-text responses to build a word cloud from".to_string(),
        );
    }

    Panel::Ready(WordCloudPanel {
        header,
        responses: texts.len(),
        words,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{FieldCatalog, FieldSpec};
    use chrono::Local;

    const AVATAR: &str =
        "\u{201c}Customizing my avatar\u{2019}s outfit helps me present my true self.\u{201d}";

    fn loaded(dataset: Dataset) -> LoadedDataset {
        LoadedDataset {
            dataset,
            file_name: "survey.csv".to_string(),
            format: crate::types::FileFormat::Csv,
            file_hash: None,
            loaded_at: Local::now(),
        }
    }

    fn survey() -> LoadedDataset {
        loaded(Dataset::from_text_rows(
            &[
                "Region:",
                "What is your age group?",
                "Approximate spent per month on digital cosmetics:",
                AVATAR,
                "Any other thoughts on digital fashion and cultural identity?",
            ],
            &[
                vec!["EU", "18-24", "$10", "4", "Skins feel like identity"],
                vec!["US", "25-34", "nothing", "abc", ""],
                vec!["EU", "25-34", "20-30", "5", "identity and culture"],
                vec!["APAC", "18-24", "", "", "NA"],
            ],
        ))
    }

    fn view(loaded: &LoadedDataset, selection: &Selection) -> DashboardView {
        let mut resolver =
            ColumnResolver::new(loaded.dataset.headers().clone(), FieldCatalog::default());
        build_view(loaded, &mut resolver, selection, &DashboardOptions::default())
    }

    #[test]
    fn test_unfiltered_view() {
        let survey = survey();
        let v = view(&survey, &Selection::default());

        assert_eq!(v.source.total_rows, 4);
        assert_eq!(v.filtered_rows, 4);
        assert_eq!(v.filters[0].options, vec!["EU", "US", "APAC"]);
        assert_eq!(v.filters[1].options, vec!["18-24", "25-34"]);

        let spending = v.spending.ready().unwrap();
        assert_eq!(spending.responses, 4);
        assert_eq!(spending.unparsed, 1);
        assert_eq!(spending.max, Some(2030.0));
        assert_eq!(spending.bins.len(), 10);
    }

    #[test]
    fn test_region_filter_narrows_every_panel() {
        let survey = survey();
        let selection = Selection {
            regions: ["EU".to_string()].into_iter().collect(),
            ..Selection::default()
        };
        let v = view(&survey, &selection);

        assert_eq!(v.filtered_rows, 2);
        // options still come from the full dataset
        assert_eq!(v.filters[0].options.len(), 3);
        assert_eq!(v.filters[0].selected, vec!["EU"]);

        let avatar = v.ratings[0].ready().unwrap();
        assert_eq!(avatar.mean, Some(4.5));
        assert_eq!(avatar.responses, 2);

        let regions = v.breakdowns[0].ready().unwrap();
        assert_eq!(regions.counts.len(), 1);
        assert_eq!(regions.counts[0].count, 2);
    }

    #[test]
    fn test_rating_parse_failures_are_diagnostics() {
        let survey = survey();
        let v = view(&survey, &Selection::default());

        let avatar = v.ratings[0].ready().unwrap();
        assert_eq!(avatar.responses, 2);
        assert_eq!(avatar.unparseable, 1);
        assert_eq!(avatar.missing, 1);
        assert!(v.diagnostics.iter().any(|d| d.kind == DiagnosticKind::ParseFailure
            && d.field == SemanticField::AvatarSelfExpression));
    }

    #[test]
    fn test_all_missing_ratings_have_no_mean() {
        let survey = survey();
        let selection = Selection {
            regions: ["APAC".to_string()].into_iter().collect(),
            ..Selection::default()
        };
        let v = view(&survey, &selection);

        let avatar = v.ratings[0].ready().unwrap();
        assert_eq!(avatar.mean, None);
        assert!(avatar.counts.is_empty());
        assert!(v.diagnostics.iter().any(|d| d.kind == DiagnosticKind::EmptyInput
            && d.field == SemanticField::AvatarSelfExpression));
    }

    #[test]
    fn test_unresolved_fields_degrade_one_panel_each() {
        let survey = survey();
        let v = view(&survey, &Selection::default());

        // two of the three statements are absent from this export
        assert!(matches!(v.ratings[1], Panel::Unavailable { .. }));
        assert!(matches!(v.ratings[2], Panel::Unavailable { .. }));
        let unresolved: Vec<SemanticField> = v
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::ResolutionFailure)
            .map(|d| d.field)
            .collect();
        assert_eq!(
            unresolved,
            vec![SemanticField::IdentityExperimentation, SemanticField::CulturalCredit]
        );
        assert!(v.spending.ready().is_some());
    }

    #[test]
    fn test_word_cloud() {
        let survey = survey();
        let v = view(&survey, &Selection::default());

        let cloud = v.word_cloud.ready().unwrap();
        assert_eq!(cloud.responses, 2);
        assert_eq!(cloud.words[0].word, "identity");
        assert_eq!(cloud.words[0].count, 2);
    }

    #[test]
    fn test_empty_word_cloud_is_reported() {
        let survey = survey();
        let selection = Selection {
            regions: ["US".to_string()].into_iter().collect(),
            ..Selection::default()
        };
        let v = view(&survey, &selection);

        assert!(matches!(v.word_cloud, Panel::Unavailable { .. }));
        assert!(v.diagnostics.iter().any(|d| d.kind == DiagnosticKind::EmptyInput
            && d.field == SemanticField::OpenFeedback));
    }

    #[test]
    fn test_missing_filter_column_disables_control() {
        let data = loaded(Dataset::from_text_rows(&["Spend"], &[vec!["$5"]]));
        let mut resolver =
            ColumnResolver::new(data.dataset.headers().clone(), FieldCatalog::default());
        let selection = Selection {
            regions: ["EU".to_string()].into_iter().collect(),
            ..Selection::default()
        };
        let v = build_view(&data, &mut resolver, &selection, &DashboardOptions::default());

        assert!(v.filters[0].header.is_none());
        assert!(v.filters[0].options.is_empty());
        // the selection cannot apply, so nothing is filtered out
        assert_eq!(v.filtered_rows, 1);
        assert!(matches!(v.spending, Panel::Unavailable { .. }));
    }

    #[test]
    fn test_end_to_end_with_custom_catalog() {
        let data = loaded(Dataset::from_text_rows(
            &["Region:", "Spend"],
            &[vec!["EU", "$10"], vec!["US", "abc"]],
        ));
        let mut catalog = FieldCatalog::default();
        catalog.set(
            SemanticField::MonthlySpend,
            FieldSpec {
                candidates: vec!["Spend".to_string()],
                fallback: String::new(),
            },
        );

        for (region, expected) in [("EU", 10.0), ("US", 0.0)] {
            let mut resolver = ColumnResolver::new(data.dataset.headers().clone(), catalog.clone());
            let selection = Selection {
                regions: [region.to_string()].into_iter().collect(),
                ..Selection::default()
            };
            let v = build_view(&data, &mut resolver, &selection, &DashboardOptions::default());

            assert_eq!(v.filtered_rows, 1);
            let spending = v.spending.ready().unwrap();
            assert_eq!(spending.mean, Some(expected));
        }
    }

    #[test]
    fn test_range_midpoint_mode_in_view() {
        let survey = survey();
        let mut resolver =
            ColumnResolver::new(survey.dataset.headers().clone(), FieldCatalog::default());
        let options = DashboardOptions {
            spending_mode: SpendingMode::RangeMidpoint,
            ..DashboardOptions::default()
        };
        let v = build_view(&survey, &mut resolver, &Selection::default(), &options);
        assert_eq!(v.spending.ready().unwrap().max, Some(25.0));
    }

    #[test]
    fn test_active_filters_combine_both_controls() {
        let survey = survey();
        let unfiltered = view(&survey, &Selection::default());
        assert!(unfiltered.active_filters.is_pass_through());

        let selection = Selection {
            regions: ["EU".to_string(), "US".to_string()].into_iter().collect(),
            age_groups: ["25-34".to_string()].into_iter().collect(),
        };
        let v = view(&survey, &selection);

        assert!(!v.active_filters.is_pass_through());
        assert_eq!(v.active_filters.allowed("Region:").unwrap().len(), 2);
        assert_eq!(v.active_filters.allowed("What is your age group?").unwrap().len(), 1);
        assert_eq!(v.filtered_rows, 2);
    }

    #[test]
    fn test_non_ascii_digits_are_not_unparsed() {
        let data = loaded(Dataset::from_text_rows(
            &["Approximate spent per month on digital cosmetics:"],
            &[vec!["\u{FF12}\u{FF15}"], vec!["\u{0661}\u{0660} dollars"], vec!["nothing"]],
        ));
        let v = view(&data, &Selection::default());

        let spending = v.spending.ready().unwrap();
        assert_eq!(spending.unparsed, 1);
        assert_eq!(spending.max, Some(25.0));
        assert_eq!(spending.min, Some(0.0));
    }
}
