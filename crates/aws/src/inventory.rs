//! [`InventoryProvider`] implementation over the AWS SDK

use crate::client::{ConfigCache, map_sdk_error};
use crate::rows::{self, columns};
use async_trait::async_trait;
use aws_sdk_ec2::types::Filter;
use futures::stream::{self, StreamExt};
use resviz_core::{ApiLimits, Cell, Dataset, InventoryProvider, ProviderError, Scope, ServiceKind, Settings};
use tracing::{debug, instrument, warn};

/// Instance states worth listing; terminated instances are skipped
const LIVE_INSTANCE_STATES: [&str; 5] = ["pending", "running", "shutting-down", "stopping", "stopped"];

/// Buckets inspected at once when collecting per-bucket details
const BUCKET_DETAIL_CONCURRENCY: usize = 8;

/// Queries EC2, RDS, S3 and Lambda
#[derive(Debug, Default)]
pub struct AwsInventory {
    configs: ConfigCache,
    limits: ApiLimits,
    required_tags: Vec<String>,
}

impl AwsInventory {
    /// Create a provider with explicit limits and required tag keys
    #[must_use]
    pub fn new(limits: ApiLimits, required_tags: Vec<String>) -> Self {
        Self {
            configs: ConfigCache::default(),
            limits,
            required_tags,
        }
    }

    /// Create a provider from loaded settings
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.api.clone(), settings.required_tags.clone())
    }

    fn full(&self, dataset: &Dataset) -> bool {
        dataset.len() >= self.limits.max_results
    }

    #[instrument(skip(self), fields(scope = %scope))]
    async fn ec2(&self, scope: &Scope) -> Result<Dataset, ProviderError> {
        let service = ServiceKind::Ec2.name();
        let client = aws_sdk_ec2::Client::new(&self.configs.get(scope).await);
        let filter = Filter::builder()
            .name("instance-state-name")
            .set_values(Some(LIVE_INSTANCE_STATES.iter().map(|s| (*s).to_string()).collect()))
            .build();

        let mut pages = client
            .describe_instances()
            .filters(filter)
            .max_results(self.limits.page_size(ServiceKind::Ec2))
            .into_paginator()
            .send();

        let mut dataset = Dataset::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| map_sdk_error(service, &e))?;
            for instance in page.reservations().iter().flat_map(|r| r.instances()) {
                let tags = rows::tag_map(instance.tags().iter().map(|t| (t.key(), t.value())));
                let name = tags.get("Name").map_or(Cell::Null, |n| Cell::from(n.as_str()));
                let values = [
                    rows::text(instance.instance_id()),
                    name,
                    rows::text(
                        instance
                            .state()
                            .and_then(|s| s.name())
                            .map(|n| n.as_str()),
                    ),
                    rows::text(instance.instance_type().map(|t| t.as_str())),
                    rows::text(instance.placement().and_then(|p| p.availability_zone())),
                    rows::text(instance.public_ip_address()),
                    rows::text(instance.private_ip_address()),
                    instance
                        .launch_time()
                        .map_or(Cell::Null, |t| rows::timestamp(t.secs(), t.subsec_nanos())),
                ];
                dataset.push(rows::build_row(columns::EC2, values, tags, &self.required_tags));
                if self.full(&dataset) {
                    return Ok(dataset);
                }
            }
        }
        Ok(dataset)
    }

    #[instrument(skip(self), fields(scope = %scope))]
    async fn rds(&self, scope: &Scope) -> Result<Dataset, ProviderError> {
        let service = ServiceKind::Rds.name();
        let client = aws_sdk_rds::Client::new(&self.configs.get(scope).await);
        let mut pages = client
            .describe_db_instances()
            .max_records(self.limits.page_size(ServiceKind::Rds))
            .into_paginator()
            .send();

        let mut dataset = Dataset::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| map_sdk_error(service, &e))?;
            for db in page.db_instances() {
                let tags = rows::tag_map(db.tag_list().iter().map(|t| (t.key(), t.value())));
                let engine = match (db.engine(), db.engine_version()) {
                    (Some(engine), Some(version)) => Cell::from(format!("{engine} {version}")),
                    (engine, _) => rows::text(engine),
                };
                let values = [
                    rows::text(db.db_instance_identifier()),
                    engine,
                    rows::text(db.db_instance_class()),
                    rows::text(db.db_instance_status()),
                    rows::text(db.availability_zone()),
                    db.multi_az().map_or(Cell::Null, Cell::from),
                    rows::text(db.storage_type()),
                    rows::with_unit(db.allocated_storage(), "GB"),
                    db.instance_create_time()
                        .map_or(Cell::Null, |t| rows::timestamp(t.secs(), t.subsec_nanos())),
                ];
                dataset.push(rows::build_row(columns::RDS, values, tags, &self.required_tags));
                if self.full(&dataset) {
                    return Ok(dataset);
                }
            }
        }
        Ok(dataset)
    }

    #[instrument(skip(self), fields(scope = %scope))]
    async fn s3(&self, scope: &Scope) -> Result<Dataset, ProviderError> {
        let service = ServiceKind::S3.name();
        let client = aws_sdk_s3::Client::new(&self.configs.get(scope).await);
        let output = client
            .list_buckets()
            .send()
            .await
            .map_err(|e| map_sdk_error(service, &e))?;

        let buckets: Vec<_> = output
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(|name| (name.to_string(), b.creation_date().copied())))
            .take(self.limits.max_results)
            .collect();
        debug!(count = buckets.len(), "Listing bucket details");

        let required = &self.required_tags;
        let rows: Vec<_> = stream::iter(buckets)
            .map(|(name, created)| {
                let client = client.clone();
                async move {
                    let region = match client.get_bucket_location().bucket(&name).send().await {
                        Ok(out) => rows::bucket_region(out.location_constraint().map(|c| c.as_str())),
                        Err(e) => {
                            debug!(bucket = %name, error = %e, "Bucket location unavailable");
                            "Unknown".to_string()
                        }
                    };
                    let access = match client.get_bucket_acl().bucket(&name).send().await {
                        Ok(out) => rows::public_access(
                            out.grants()
                                .iter()
                                .filter_map(|g| g.grantee().and_then(|g| g.uri())),
                        ),
                        Err(e) => {
                            debug!(bucket = %name, error = %e, "Bucket ACL unavailable");
                            "Unknown"
                        }
                    };
                    // Buckets without tags answer with an error
                    let tags = match client.get_bucket_tagging().bucket(&name).send().await {
                        Ok(out) => rows::tag_map(
                            out.tag_set().iter().map(|t| (Some(t.key()), Some(t.value()))),
                        ),
                        Err(_) => std::collections::BTreeMap::new(),
                    };

                    let values = [
                        Cell::from(name),
                        Cell::from(region),
                        created.map_or(Cell::Null, |t| rows::timestamp(t.secs(), t.subsec_nanos())),
                        Cell::from(access),
                    ];
                    rows::build_row(columns::S3, values, tags, required)
                }
            })
            .buffered(BUCKET_DETAIL_CONCURRENCY)
            .collect()
            .await;

        Ok(Dataset::from(rows))
    }

    #[instrument(skip(self), fields(scope = %scope))]
    async fn lambda(&self, scope: &Scope) -> Result<Dataset, ProviderError> {
        let service = ServiceKind::Lambda.name();
        let client = aws_sdk_lambda::Client::new(&self.configs.get(scope).await);
        let mut pages = client
            .list_functions()
            .max_items(self.limits.page_size(ServiceKind::Lambda))
            .into_paginator()
            .send();

        let mut dataset = Dataset::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| map_sdk_error(service, &e))?;
            for function in page.functions() {
                let tags = match function.function_arn() {
                    Some(arn) => match client.list_tags().resource(arn).send().await {
                        Ok(out) => out
                            .tags()
                            .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                            .unwrap_or_default(),
                        Err(e) => {
                            warn!(function = arn, error = %e, "Failed to list function tags");
                            std::collections::BTreeMap::new()
                        }
                    },
                    None => std::collections::BTreeMap::new(),
                };
                let values = [
                    rows::text(function.function_name()),
                    rows::text(function.runtime().map(|r| r.as_str())),
                    rows::text(function.handler()),
                    rows::megabytes(function.code_size()),
                    rows::with_unit(function.memory_size(), "MB"),
                    rows::with_unit(function.timeout(), "seconds"),
                    rows::text(function.last_modified()),
                    rows::text(function.state().map(|s| s.as_str())),
                    rows::role_name(function.role()),
                ];
                dataset.push(rows::build_row(columns::LAMBDA, values, tags, &self.required_tags));
                if self.full(&dataset) {
                    return Ok(dataset);
                }
            }
        }
        Ok(dataset)
    }
}

#[async_trait]
impl InventoryProvider for AwsInventory {
    async fn query(&self, service: &str, scope: &Scope) -> Result<Dataset, ProviderError> {
        let kind: ServiceKind = service
            .parse()
            .map_err(|_| ProviderError::unsupported(service))?;
        let dataset = match kind {
            ServiceKind::Ec2 => self.ec2(scope).await?,
            ServiceKind::Rds => self.rds(scope).await?,
            ServiceKind::S3 => self.s3(scope).await?,
            ServiceKind::Lambda => self.lambda(scope).await?,
        };
        debug!(service = kind.name(), scope = %scope, rows = dataset.len(), "Query finished");
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_service_is_unsupported() {
        let provider = AwsInventory::default();
        let err = provider
            .query("DynamoDB", &Scope::new("us-east-1", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported { .. }));
    }

    #[test]
    fn test_from_settings_carries_limits_and_tags() {
        let settings = Settings::default();
        let provider = AwsInventory::from_settings(&settings);
        assert_eq!(provider.limits.max_results, 1000);
        assert_eq!(provider.required_tags, vec!["CostProject".to_string()]);
    }
}
