//! Cache-first, semaphore-bounded fan-out over provider queries

use crate::{FetchError, Result};
use indexmap::IndexMap;
use resviz_cache::{CacheKey, CacheStore};
use resviz_core::{Dataset, InventoryProvider, ProviderError, Scope, ServiceData, ServiceKind, Settings};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Provider queries allowed in flight when nothing else is configured
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

const DEFAULT_TTL: Duration = Duration::from_secs(86_400);

/// Fetches inventory for one (region, profile) scope
///
/// Cheap to clone; every spawned task holds its own handle.
#[derive(Clone)]
pub struct Fetcher {
    cache: Arc<CacheStore>,
    provider: Arc<dyn InventoryProvider>,
    scope: Scope,
    ttl: Duration,
    max_concurrency: usize,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("cache", &self.cache.dir())
            .field("scope", &self.scope)
            .field("ttl", &self.ttl)
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

impl Fetcher {
    /// Create a fetcher with the default TTL and concurrency limit
    #[must_use]
    pub fn new(cache: Arc<CacheStore>, provider: Arc<dyn InventoryProvider>, scope: Scope) -> Self {
        Self {
            cache,
            provider,
            scope,
            ttl: DEFAULT_TTL,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Create a fetcher using the TTL and concurrency limit from settings
    #[must_use]
    pub fn from_settings(
        cache: Arc<CacheStore>,
        provider: Arc<dyn InventoryProvider>,
        scope: Scope,
        settings: &Settings,
    ) -> Self {
        Self::new(cache, provider, scope)
            .with_ttl(settings.cache_ttl())
            .with_max_concurrency(settings.max_concurrency)
    }

    /// Override the cache TTL
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Override the concurrency limit; zero is treated as one
    #[must_use]
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit.max(1);
        self
    }

    /// Scope this fetcher works in
    #[must_use]
    pub const fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Fetch one service, serving the cache when it holds a live entry
    ///
    /// Unsupported services yield an empty dataset. Empty results are
    /// never cached so they are retried on the next run.
    pub async fn fetch_one(&self, service: &str) -> Result<Dataset> {
        let key = CacheKey::for_scope(service, &self.scope);
        if let Some(cached) = self.cache.load(&key, self.ttl).await {
            info!(service, scope = %self.scope, rows = cached.len(), "Using cached data");
            return Ok(cached);
        }

        debug!(service, scope = %self.scope, "Querying provider");
        let dataset = match self.provider.query(service, &self.scope).await {
            Ok(dataset) => dataset,
            Err(ProviderError::Unsupported { .. }) => {
                warn!(service, "Unsupported service, returning no rows");
                return Ok(Dataset::new());
            }
            Err(e) => return Err(e.into()),
        };

        if dataset.is_empty() {
            debug!(service, scope = %self.scope, "Provider returned no rows, not caching");
        } else if !self.cache.store(&key, &dataset).await {
            warn!(service, scope = %self.scope, "Fetched data could not be cached");
        }
        Ok(dataset)
    }

    /// Fetch every requested service with bounded concurrency
    ///
    /// The returned map holds every requested service in request order.
    /// The first failure aborts the remaining fetches and is returned;
    /// services that finished before it keep their cache entries.
    pub async fn fetch_all(&self, services: &[String]) -> Result<ServiceData> {
        let mut results: ServiceData = IndexMap::with_capacity(services.len());
        for service in services {
            results.entry(service.clone()).or_default();
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut join_set = JoinSet::new();

        for service in results.keys().cloned() {
            let fetcher = self.clone();
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| FetchError::task(format!("semaphore closed: {e}")))?;
                let outcome = fetcher.fetch_one(&service).await;
                match &outcome {
                    Ok(dataset) => info!(service = %service, rows = dataset.len(), "Fetched service"),
                    Err(e) => error!(service = %service, error = %e, "Failed to fetch service"),
                }
                outcome.map(|dataset| (service, dataset))
            });
        }

        // Collect results with fail-fast behavior
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok((service, dataset))) => {
                    results.insert(service, dataset);
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Aborting remaining fetches");
                    join_set.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    join_set.abort_all();
                    return Err(FetchError::task(e.to_string()));
                }
            }
        }

        Ok(results)
    }

    /// Remove the cache entries of every supported service in this scope
    ///
    /// Clears all known services, not only the ones a run asks for, so a
    /// scope never holds a mix of old and new entries.
    pub async fn clear_cache(&self) -> usize {
        let mut removed = 0;
        for service in ServiceKind::NAMES {
            let key = CacheKey::for_scope(service, &self.scope);
            match self.cache.remove(&key).await {
                Ok(count) => removed += count,
                Err(e) => warn!(service, error = %e, "Failed to clear cache entry"),
            }
        }
        info!(scope = %self.scope, removed, "Cleared cached services");
        removed
    }
}
