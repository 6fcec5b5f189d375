//! Row builders shared by the service queries

use resviz_core::dataset::{REQUIRED_TAGS_COLUMN, TAGS_COLUMN};
use resviz_core::inventory::format_required_tags;
use resviz_core::{Cell, Row};
use std::collections::BTreeMap;

/// Grantee URI that makes a bucket readable by anyone
pub const ALL_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AllUsers";

/// Region S3 reports as an empty location constraint
pub const LEGACY_S3_REGION: &str = "us-east-1";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column names per service, excluding the trailing tag columns
pub mod columns {
    /// EC2 instance columns
    pub const EC2: [&str; 8] = [
        "Instance ID",
        "Name",
        "State",
        "Instance Type",
        "Availability Zone",
        "Public IP",
        "Private IP",
        "Launch Time",
    ];

    /// RDS instance columns
    pub const RDS: [&str; 9] = [
        "DB Identifier",
        "Engine",
        "DB Instance Class",
        "Status",
        "Availability Zone",
        "Multi-AZ",
        "Storage Type",
        "Allocated Storage",
        "Created Time",
    ];

    /// S3 bucket columns
    pub const S3: [&str; 4] = ["Bucket Name", "Region", "Created Date", "Public Access"];

    /// Lambda function columns
    pub const LAMBDA: [&str; 9] = [
        "Function Name",
        "Runtime",
        "Handler",
        "Code Size",
        "Memory",
        "Timeout",
        "Last Modified",
        "State",
        "Role",
    ];
}

/// Build a row from column/value pairs, appending the tag columns
#[must_use]
pub fn build_row<const N: usize>(
    columns: [&str; N],
    values: [Cell; N],
    tags: BTreeMap<String, String>,
    required: &[String],
) -> Row {
    let mut row: Row = columns
        .iter()
        .map(|c| (*c).to_string())
        .zip(values)
        .collect();
    row.insert(
        REQUIRED_TAGS_COLUMN.to_string(),
        Cell::from(format_required_tags(&tags, required)),
    );
    row.insert(TAGS_COLUMN.to_string(), Cell::from(tags));
    row
}

/// Optional text, `Null` when absent
#[must_use]
pub fn text(value: Option<&str>) -> Cell {
    value.map_or(Cell::Null, Cell::from)
}

/// Collect tag pairs, skipping tags without a key
#[must_use]
pub fn tag_map<'a>(
    pairs: impl IntoIterator<Item = (Option<&'a str>, Option<&'a str>)>,
) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .filter_map(|(key, value)| {
            key.map(|k| (k.to_string(), value.unwrap_or_default().to_string()))
        })
        .collect()
}

/// Format epoch seconds as `YYYY-MM-DD HH:MM:SS` in UTC
#[must_use]
pub fn timestamp(secs: i64, nanos: u32) -> Cell {
    chrono::DateTime::from_timestamp(secs, nanos)
        .map_or(Cell::Null, |t| Cell::from(t.format(TIME_FORMAT).to_string()))
}

/// Region of a bucket from its location constraint
#[must_use]
pub fn bucket_region(constraint: Option<&str>) -> String {
    match constraint {
        Some(region) if !region.is_empty() => region.to_string(),
        _ => LEGACY_S3_REGION.to_string(),
    }
}

/// `Public` when any grantee is the all-users group
#[must_use]
pub fn public_access<'a>(grantee_uris: impl IntoIterator<Item = &'a str>) -> &'static str {
    if grantee_uris.into_iter().any(|uri| uri == ALL_USERS_URI) {
        "Public"
    } else {
        "Private"
    }
}

/// Last path segment of a role ARN
#[must_use]
pub fn role_name(arn: Option<&str>) -> Cell {
    arn.map_or(Cell::Null, |arn| {
        Cell::from(arn.rsplit('/').next().unwrap_or(arn))
    })
}

/// Bytes as `{n:.2} MB`
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn megabytes(bytes: i64) -> Cell {
    Cell::from(format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0)))
}

/// Number with a unit suffix, `Null` when absent
#[must_use]
pub fn with_unit(value: Option<i32>, unit: &str) -> Cell {
    value.map_or(Cell::Null, |v| Cell::from(format!("{v} {unit}")))
}
