//! Tag compliance, tag filtering and cost estimates over fetched datasets

use crate::dataset::TAGS_COLUMN;
use crate::{Dataset, Row, Settings};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Datasets keyed by service name, in request order
pub type ServiceData = IndexMap<String, Dataset>;

/// Tag key/value pairs a row must carry to pass a filter
pub type TagFilters = BTreeMap<String, String>;

/// Format the required tags present in `tags` as `Key:Value, ...`
///
/// Returns an empty string when none of the required tags are set.
#[must_use]
pub fn format_required_tags(tags: &BTreeMap<String, String>, required: &[String]) -> String {
    required
        .iter()
        .filter_map(|key| tags.get(key).map(|value| format!("{key}:{value}")))
        .collect::<Vec<_>>()
        .join(", ")
}

fn row_tags(row: &Row) -> Option<&BTreeMap<String, String>> {
    row.get(TAGS_COLUMN).and_then(|cell| cell.as_tags())
}

/// Whether a row carries every required tag
#[must_use]
pub fn has_required_tags(row: &Row, required: &[String]) -> bool {
    row_tags(row).is_some_and(|tags| required.iter().all(|key| tags.contains_key(key)))
}

/// Whether a row matches every filter
#[must_use]
pub fn matches_filters(row: &Row, filters: &TagFilters) -> bool {
    if filters.is_empty() {
        return true;
    }
    row_tags(row).is_some_and(|tags| {
        filters
            .iter()
            .all(|(key, value)| tags.get(key).is_some_and(|v| v == value))
    })
}

/// Keep only the rows that match every filter
#[must_use]
pub fn filter_by_tags(dataset: &Dataset, filters: &TagFilters) -> Dataset {
    dataset
        .iter()
        .filter(|row| matches_filters(row, filters))
        .cloned()
        .collect()
}

/// Every distinct value of a tag key across all services
#[must_use]
pub fn tag_values_for_key(data: &ServiceData, key: &str) -> BTreeSet<String> {
    data.values()
        .flat_map(Dataset::iter)
        .filter_map(|row| row_tags(row).and_then(|tags| tags.get(key).cloned()))
        .collect()
}

/// Row count per service after applying the filters
#[must_use]
pub fn filtered_counts(data: &ServiceData, filters: &TagFilters) -> IndexMap<String, usize> {
    data.iter()
        .map(|(service, dataset)| {
            let count = dataset
                .iter()
                .filter(|row| matches_filters(row, filters))
                .count();
            (service.clone(), count)
        })
        .collect()
}

/// Required-tag coverage of one dataset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TagCompliance {
    /// Rows carrying every required tag
    pub compliant: usize,
    /// Rows missing at least one required tag
    pub missing: usize,
}

impl TagCompliance {
    /// Measure a dataset
    #[must_use]
    pub fn of(dataset: &Dataset, required: &[String]) -> Self {
        let compliant = dataset
            .iter()
            .filter(|row| has_required_tags(row, required))
            .count();
        Self {
            compliant,
            missing: dataset.len() - compliant,
        }
    }

    /// Total rows measured
    #[must_use]
    pub const fn total(&self) -> usize {
        self.compliant + self.missing
    }

    /// Percentage of compliant rows, zero for an empty dataset
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.compliant as f64 / self.total() as f64 * 100.0
        }
    }

    /// Combine two measurements
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            compliant: self.compliant + other.compliant,
            missing: self.missing + other.missing,
        }
    }
}

/// Indices of rows missing a required tag
#[must_use]
pub fn missing_tag_rows(dataset: &Dataset, required: &[String]) -> Vec<usize> {
    dataset
        .iter()
        .enumerate()
        .filter(|(_, row)| !has_required_tags(row, required))
        .map(|(idx, _)| idx)
        .collect()
}

/// Rough monthly cost of one service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostEstimate {
    /// Service name
    pub service: String,
    /// Number of resources counted
    pub count: usize,
    /// Monthly cost per resource in USD
    pub unit_cost: f64,
    /// `count * unit_cost`
    pub monthly_cost: f64,
}

/// Cost estimate per service from resource counts
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn estimate_costs(counts: &IndexMap<String, usize>, settings: &Settings) -> Vec<CostEstimate> {
    counts
        .iter()
        .map(|(service, count)| {
            let unit_cost = settings.unit_cost(service);
            CostEstimate {
                service: service.clone(),
                count: *count,
                unit_cost,
                monthly_cost: unit_cost * *count as f64,
            }
        })
        .collect()
}

/// Sum of the monthly costs
#[must_use]
pub fn total_cost(estimates: &[CostEstimate]) -> f64 {
    estimates.iter().map(|e| e.monthly_cost).sum()
}
