//! AWS inventory provider for resviz
//!
//! Implements [`resviz_core::InventoryProvider`] over the AWS SDK.
//! Supported services:
//! - EC2 instances that are not terminated
//! - RDS database instances
//! - S3 buckets with location and public access
//! - Lambda functions
//!
//! Each service is queried page by page and capped at
//! [`resviz_core::ApiLimits::max_results`] rows.

pub mod client;
pub mod inventory;
pub mod rows;

// Re-export main types for convenience
pub use client::validate_credentials;
pub use inventory::AwsInventory;
