//! Tabular inventory data shared by providers, the cache and the frontend

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Column holding the raw tag map of a resource
pub const TAGS_COLUMN: &str = "Tags";

/// Column holding the formatted required tags of a resource
pub const REQUIRED_TAGS_COLUMN: &str = "Required Tags";

/// A single value in a row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// Missing value
    Null,
    /// Boolean flag
    Bool(bool),
    /// Whole number (sizes, counts)
    Integer(i64),
    /// Fractional number
    Float(f64),
    /// Free text
    Text(String),
    /// Raw tag key/value pairs
    Tags(BTreeMap<String, String>),
}

impl Cell {
    /// Borrow the text payload, if any
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the tag map, if any
    #[must_use]
    pub const fn as_tags(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::Tags(tags) => Some(tags),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("N/A"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
            Self::Tags(tags) => {
                let joined: Vec<String> = tags.iter().map(|(k, v)| format!("{k}:{v}")).collect();
                f.write_str(&joined.join(", "))
            }
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Option<String>> for Cell {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Null, Self::Text)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<BTreeMap<String, String>> for Cell {
    fn from(value: BTreeMap<String, String>) -> Self {
        Self::Tags(value)
    }
}

/// One resource: column name to value, in column order
pub type Row = IndexMap<String, Cell>;

/// An ordered list of uniformly shaped rows
///
/// Serialized as a bare JSON array so cache files stay readable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset(Vec<Row>);

impl Dataset {
    /// Create an empty dataset
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the dataset has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the rows
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.0
    }

    /// Iterate over the rows
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.0.iter()
    }

    /// Append a row
    pub fn push(&mut self, row: Row) {
        self.0.push(row);
    }

    /// Column names of the first row
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        self.0
            .first()
            .map(|row| row.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

impl From<Vec<Row>> for Dataset {
    fn from(rows: Vec<Row>) -> Self {
        Self(rows)
    }
}

impl FromIterator<Row> for Dataset {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Dataset {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> Row {
        let mut tags = BTreeMap::new();
        tags.insert("CostProject".to_string(), "alpha".to_string());

        let mut row = Row::new();
        row.insert("Instance ID".to_string(), Cell::from("i-123"));
        row.insert("Public IP".to_string(), Cell::Null);
        row.insert("Memory".to_string(), Cell::from(128_i64));
        row.insert("Multi-AZ".to_string(), Cell::from(false));
        row.insert(TAGS_COLUMN.to_string(), Cell::from(tags));
        row
    }

    #[test]
    fn test_dataset_serializes_as_array() {
        let dataset = Dataset::from(vec![sample_row()]);
        let json = serde_json::to_value(&dataset).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["Instance ID"], "i-123");
        assert_eq!(json[0]["Tags"]["CostProject"], "alpha");
    }

    #[test]
    fn test_cells_keep_their_kind_through_json() {
        let dataset = Dataset::from(vec![sample_row()]);
        let json = serde_json::to_string(&dataset).unwrap();
        let back: Dataset = serde_json::from_str(&json).unwrap();
        let row = &back.rows()[0];
        assert_eq!(row["Public IP"], Cell::Null);
        assert_eq!(row["Memory"], Cell::Integer(128));
        assert_eq!(row["Multi-AZ"], Cell::Bool(false));
        assert!(row[TAGS_COLUMN].as_tags().is_some());
    }

    #[test]
    fn test_columns_preserve_insertion_order() {
        let dataset = Dataset::from(vec![sample_row()]);
        assert_eq!(
            dataset.columns(),
            vec!["Instance ID", "Public IP", "Memory", "Multi-AZ", "Tags"]
        );
        assert!(Dataset::new().columns().is_empty());
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Null.to_string(), "N/A");
        assert_eq!(Cell::from("x").to_string(), "x");
        let mut tags = BTreeMap::new();
        tags.insert("a".to_string(), "1".to_string());
        tags.insert("b".to_string(), "2".to_string());
        assert_eq!(Cell::Tags(tags).to_string(), "a:1, b:2");
    }
}
