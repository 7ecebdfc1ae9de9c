use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::Dataset;

/// Categorical filters keyed by resolved header
///
/// A header with an empty allowed set does not filter anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    fields: BTreeMap<String, BTreeSet<String>>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow the given values for a header, adding to any already allowed
    pub fn allow<I, V>(&mut self, header: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.fields
            .entry(header.to_string())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Builder form of [`FilterSet::allow`]
    pub fn with<I, V>(mut self, header: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.allow(header, values);
        self
    }

    pub fn allowed(&self, header: &str) -> Option<&BTreeSet<String>> {
        self.fields.get(header)
    }

    /// True when no header restricts anything
    pub fn is_pass_through(&self) -> bool {
        self.fields.values().all(|allowed| allowed.is_empty())
    }

    /// Combine two filter sets; allowed values of a header present in both are unioned
    pub fn merge(&self, other: &FilterSet) -> FilterSet {
        let mut merged = self.clone();
        for (header, values) in &other.fields {
            merged.allow(header, values.iter().cloned());
        }
        merged
    }
}

/// Keep the records whose value is allowed for every filtered header, in original order
///
/// Missing cells never match a non-empty allowed set. A filter on a header the
/// dataset does not have is ignored.
pub fn apply_filters(dataset: &Dataset, filters: &FilterSet) -> Dataset {
    let active: Vec<(usize, &BTreeSet<String>)> = filters
        .fields
        .iter()
        .filter(|(_, allowed)| !allowed.is_empty())
        .filter_map(|(header, allowed)| match dataset.headers().position(header) {
            Some(index) => Some((index, allowed)),
            None => {
                warn!(header = %header, "filter names a column missing from the dataset; ignored");
                None
            }
        })
        .collect();

    dataset.retain_records(|record| {
        active.iter().all(|(index, allowed)| {
            record
                .get(*index)
                .as_text()
                .is_some_and(|value| allowed.contains(value))
        })
    })
}

/// Distinct non-missing values of a column in first-appearance order
pub fn distinct_values(dataset: &Dataset, header: &str) -> Vec<String> {
    let Some(column) = dataset.column(header) else {
        return Vec::new();
    };

    let mut seen: HashSet<&str> = HashSet::new();
    let mut values = Vec::new();
    for cell in column {
        if let Some(text) = cell.as_text() {
            if seen.insert(text) {
                values.push(text.to_string());
            }
        }
    }
    values
}
