//! Column resolution over survey headers that drift between exports
//!
//! A semantic field (a survey question) is looked up in two phases: a
//! prioritized list of exact header labels, then a case-insensitive substring
//! scan. Quote and whitespace variants are never normalized here; a variant is
//! tolerated only when it is listed as its own candidate.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{HeaderSet, Result};

/// Outcome of resolving a semantic field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", content = "header", rename_all = "snake_case")]
pub enum Resolution {
    Resolved(String),
    Unresolved,
}

impl Resolution {
    pub fn header(&self) -> Option<&str> {
        match self {
            Resolution::Resolved(h) => Some(h.as_str()),
            Resolution::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

/// Find the header for a field: first exact candidate present wins, then the
/// first header (in header order) containing `fallback_substring` ignoring case
///
/// An empty fallback disables the substring phase.
pub fn resolve<S: AsRef<str>>(
    headers: &HeaderSet,
    candidates: &[S],
    fallback_substring: &str,
) -> Resolution {
    if let Some(exact) = candidates
        .iter()
        .map(|c| c.as_ref())
        .find(|c| headers.contains(c))
    {
        return Resolution::Resolved(exact.to_string());
    }

    if fallback_substring.is_empty() {
        return Resolution::Unresolved;
    }

    let needle = fallback_substring.to_lowercase();
    headers
        .iter()
        .find(|h| h.to_lowercase().contains(&needle))
        .map(|h| Resolution::Resolved(h.to_string()))
        .unwrap_or(Resolution::Unresolved)
}

/// How the dashboard uses a field's cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Categorical,
    Spending,
    Rating,
    FreeText,
}

/// Logical survey questions the dashboard knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticField {
    Region,
    AgeGroup,
    MonthlySpend,
    AvatarSelfExpression,
    IdentityExperimentation,
    CulturalCredit,
    OpenFeedback,
}

impl SemanticField {
    pub const ALL: [SemanticField; 7] = [
        SemanticField::Region,
        SemanticField::AgeGroup,
        SemanticField::MonthlySpend,
        SemanticField::AvatarSelfExpression,
        SemanticField::IdentityExperimentation,
        SemanticField::CulturalCredit,
        SemanticField::OpenFeedback,
    ];

    /// Fields offered as filter controls
    pub const FILTERS: [SemanticField; 2] = [SemanticField::Region, SemanticField::AgeGroup];

    /// Agreement statements rated on a Likert scale
    pub const RATINGS: [SemanticField; 3] = [
        SemanticField::AvatarSelfExpression,
        SemanticField::IdentityExperimentation,
        SemanticField::CulturalCredit,
    ];

    pub fn kind(&self) -> FieldKind {
        match self {
            SemanticField::Region | SemanticField::AgeGroup => FieldKind::Categorical,
            SemanticField::MonthlySpend => FieldKind::Spending,
            SemanticField::AvatarSelfExpression
            | SemanticField::IdentityExperimentation
            | SemanticField::CulturalCredit => FieldKind::Rating,
            SemanticField::OpenFeedback => FieldKind::FreeText,
        }
    }

    /// Short name used in diagnostics and panel titles
    pub fn label(&self) -> &'static str {
        match self {
            SemanticField::Region => "Region",
            SemanticField::AgeGroup => "Age group",
            SemanticField::MonthlySpend => "Monthly spending on digital cosmetics",
            SemanticField::AvatarSelfExpression => "Avatar outfit as true self",
            SemanticField::IdentityExperimentation => "Experimenting with identities",
            SemanticField::CulturalCredit => "Cultural motifs without credit",
            SemanticField::OpenFeedback => "Open feedback",
        }
    }
}

/// Where to look for one field's column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Exact header labels, highest priority first
    pub candidates: Vec<String>,
    /// Case-insensitive substring tried when no candidate matches
    #[serde(default)]
    pub fallback: String,
}

impl FieldSpec {
    fn new(candidates: &[&str], fallback: &str) -> Self {
        Self {
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
            fallback: fallback.to_string(),
        }
    }
}

/// Lookup rules for every semantic field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCatalog {
    fields: BTreeMap<SemanticField, FieldSpec>,
}

impl Default for FieldCatalog {
    fn default() -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(
            SemanticField::Region,
            FieldSpec::new(&["Region:", "Region"], "region"),
        );
        fields.insert(
            SemanticField::AgeGroup,
            FieldSpec::new(
                &["What is your age group?", "Age group:", "Age Group"],
                "age group",
            ),
        );
        fields.insert(
            SemanticField::MonthlySpend,
            FieldSpec::new(
                &[
                    "Approximate spent per month on digital cosmetics:",
                    "Approximate spent per month on digital cosmetics",
                    "Approximate spend per month on digital cosmetics:",
                ],
                "per month on digital cosmetics",
            ),
        );
        fields.insert(
            SemanticField::AvatarSelfExpression,
            FieldSpec::new(
                &[
                    "\u{201c}Customizing my avatar\u{2019}s outfit helps me present my true self.\u{201d}",
                    "\"Customizing my avatar's outfit helps me present my true self.\"",
                    "Customizing my avatar\u{2019}s outfit helps me present my true self.",
                    "Customizing my avatar's outfit helps me present my true self.",
                ],
                "present my true self",
            ),
        );
        fields.insert(
            SemanticField::IdentityExperimentation,
            FieldSpec::new(
                &[
                    "\u{201c}Digital fashion lets me experiment with identities I couldn\u{2019}t explore in the real world.\u{201d}",
                    "\"Digital fashion lets me experiment with identities I couldn't explore in the real world.\"",
                    "Digital fashion lets me experiment with identities I couldn\u{2019}t explore in the real world.",
                    "Digital fashion lets me experiment with identities I couldn't explore in the real world.",
                ],
                "experiment with identities",
            ),
        );
        fields.insert(
            SemanticField::CulturalCredit,
            FieldSpec::new(
                &[
                    "\u{201c}I\u{2019}m concerned that many digital outfits borrow cultural motifs without credit.\u{201d}",
                    "\"I'm concerned that many digital outfits borrow cultural motifs without credit.\"",
                    "I\u{2019}m concerned that many digital outfits borrow cultural motifs without credit.",
                    "I'm concerned that many digital outfits borrow cultural motifs without credit.",
                ],
                "cultural motifs",
            ),
        );
        fields.insert(
            SemanticField::OpenFeedback,
            FieldSpec::new(
                &[
                    "Any other thoughts on digital fashion and cultural identity?",
                    "Any other thoughts on digital fashion and cultural identity",
                    "Additional comments:",
                ],
                "thoughts",
            ),
        );
        Self { fields }
    }
}

impl FieldCatalog {
    pub fn spec(&self, field: SemanticField) -> Option<&FieldSpec> {
        self.fields.get(&field)
    }

    /// Replace the rules for one field
    pub fn set(&mut self, field: SemanticField, spec: FieldSpec) {
        self.fields.insert(field, spec);
    }

    /// Built-in catalog with the fields named in a JSON file replaced
    ///
    /// The file maps field keys (`region`, `monthly_spend`, ...) to
    /// `{"candidates": [...], "fallback": "..."}`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let overrides: BTreeMap<SemanticField, FieldSpec> = serde_json::from_str(content)?;
        let mut catalog = Self::default();
        for (field, spec) in overrides {
            debug!(?field, "field rules overridden");
            catalog.set(field, spec);
        }
        Ok(catalog)
    }
}

/// Resolves semantic fields against one header set, caching each answer
#[derive(Debug, Clone)]
pub struct ColumnResolver {
    headers: HeaderSet,
    catalog: FieldCatalog,
    cache: HashMap<SemanticField, Resolution>,
}

impl ColumnResolver {
    pub fn new(headers: HeaderSet, catalog: FieldCatalog) -> Self {
        Self {
            headers,
            catalog,
            cache: HashMap::new(),
        }
    }

    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    /// Resolve a field, computing it on first access
    pub fn resolve(&mut self, field: SemanticField) -> Resolution {
        if let Some(cached) = self.cache.get(&field) {
            return cached.clone();
        }

        let resolution = match self.catalog.spec(field) {
            Some(spec) => resolve(&self.headers, spec.candidates.as_slice(), &spec.fallback),
            None => Resolution::Unresolved,
        };

        match &resolution {
            Resolution::Resolved(header) => debug!(?field, header = %header, "field resolved"),
            Resolution::Unresolved => warn!(?field, "no column matches field"),
        }

        self.cache.insert(field, resolution.clone());
        resolution
    }

    /// Resolutions of every known field, in catalog order
    pub fn resolve_all(&mut self) -> Vec<(SemanticField, Resolution)> {
        SemanticField::ALL
            .iter()
            .map(|&field| (field, self.resolve(field)))
            .collect()
    }

    #[cfg(test)]
    fn cached(&self, field: SemanticField) -> bool {
        self.cache.contains_key(&field)
    }
}
