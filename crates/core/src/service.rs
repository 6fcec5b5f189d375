//! Service identifiers and the (region, profile) scope every fetch runs in

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel used in file names and keys when no credential profile is set.
///
/// `None` and `Some("default")` are deliberately the same key.
pub const DEFAULT_PROFILE: &str = "default";

/// Replace path separators so `value` can be embedded in a single file name
#[must_use]
pub fn file_name_part(value: &str) -> String {
    value
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '-' } else { c })
        .collect()
}

/// A category of cloud resource fetched independently of the others
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServiceKind {
    /// Compute instances
    #[serde(rename = "EC2")]
    Ec2,
    /// Managed relational databases
    #[serde(rename = "RDS")]
    Rds,
    /// Object storage buckets
    #[serde(rename = "S3")]
    S3,
    /// Serverless functions
    #[serde(rename = "Lambda")]
    Lambda,
}

impl ServiceKind {
    /// Every supported service, in display order
    pub const ALL: [Self; 4] = [Self::Ec2, Self::Rds, Self::S3, Self::Lambda];

    /// Names accepted on the command line and used in cache keys
    pub const NAMES: [&'static str; 4] = ["EC2", "RDS", "S3", "Lambda"];

    /// Canonical name of the service
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ec2 => "EC2",
            Self::Rds => "RDS",
            Self::S3 => "S3",
            Self::Lambda => "Lambda",
        }
    }

    /// Human-readable description shown in the dashboard
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Ec2 => "Elastic Compute Cloud instances",
            Self::Rds => "Relational Database Service instances",
            Self::S3 => "Simple Storage Service buckets",
            Self::Lambda => "Lambda functions",
        }
    }

    /// Owned names of every supported service
    #[must_use]
    pub fn all_names() -> Vec<String> {
        Self::NAMES.iter().map(|s| (*s).to_string()).collect()
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ServiceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                Error::validation(format!(
                    "Unknown service '{s}', expected one of: {}",
                    Self::NAMES.join(", ")
                ))
            })
    }
}

/// The (region, profile) pair a fetch, cache entry or status record belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Provider region, e.g. `us-east-1`
    pub region: String,
    /// Credential profile; absent in managed environments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

impl Scope {
    /// Create a new scope
    #[must_use]
    pub fn new(region: impl Into<String>, profile: Option<String>) -> Self {
        Self {
            region: region.into(),
            profile: profile.filter(|p| !p.trim().is_empty()),
        }
    }

    /// Profile name as used in keys, falling back to [`DEFAULT_PROFILE`]
    #[must_use]
    pub fn profile_key(&self) -> &str {
        self.profile.as_deref().unwrap_or(DEFAULT_PROFILE)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.profile_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_parse_is_case_insensitive() {
        assert_eq!("ec2".parse::<ServiceKind>().unwrap(), ServiceKind::Ec2);
        assert_eq!("LAMBDA".parse::<ServiceKind>().unwrap(), ServiceKind::Lambda);
        assert!("DynamoDB".parse::<ServiceKind>().is_err());
    }

    #[test]
    fn test_names_match_kinds() {
        for (kind, name) in ServiceKind::ALL.iter().zip(ServiceKind::NAMES) {
            assert_eq!(kind.name(), name);
        }
    }

    #[test]
    fn test_service_serializes_as_name() {
        let json = serde_json::to_string(&ServiceKind::Rds).unwrap();
        assert_eq!(json, "\"RDS\"");
    }

    #[test]
    fn test_scope_profile_key_uses_sentinel() {
        let scope = Scope::new("us-east-1", None);
        assert_eq!(scope.profile_key(), "default");

        let blank = Scope::new("us-east-1", Some("  ".to_string()));
        assert_eq!(blank.profile, None);

        let named = Scope::new("us-east-1", Some("sandbox".to_string()));
        assert_eq!(named.profile_key(), "sandbox");
        assert_eq!(named.to_string(), "us-east-1/sandbox");
    }
}
