// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Queryables Cache
//!
//! Time-boxed snapshot of the allowed queryable field names.
//!
//! # Why This Works
//!
//! - Snapshot = `Arc<HashSet>` swapped wholesale on refresh
//! - Readers clone the `Arc` and never wait on a refresh in progress
//! - Only one refresh runs at a time; losers of the race serve the prior snapshot
//! - A failed refresh keeps the last good snapshot and is retried on next access

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::SchemaIntrospector;
use crate::error::CompileError;
use crate::mapping::{strip_properties_prefix, FieldMappingTable};
use crate::metrics;

#[derive(Debug, Clone, Default)]
struct Snapshot {
    fields: Arc<HashSet<String>>,
    refreshed_at: Option<Instant>,
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct QueryablesCacheStats {
    /// Successful refreshes
    pub refreshes: u64,
    /// Failed refreshes (snapshot kept)
    pub failures: u64,
    /// Reads served a stale snapshot because a refresh was in flight
    pub stale_reads: u64,
    /// Fields in the current snapshot
    pub field_count: usize,
    /// Age of the current snapshot, `None` if never loaded
    pub age: Option<Duration>,
}

/// Queryables cache backed by live schema introspection.
pub struct QueryablesCache {
    introspector: Arc<dyn SchemaIntrospector>,
    mapping: Arc<FieldMappingTable>,
    snapshot: RwLock<Snapshot>,
    /// Scopes refresh only; reads never touch it
    refresh_lock: Mutex<()>,
    ttl: Duration,
    enabled: bool,
    refreshes: AtomicU64,
    failures: AtomicU64,
    stale_reads: AtomicU64,
}

impl QueryablesCache {
    /// Create a new cache. Nothing is loaded until first access or [`warm`](Self::warm).
    pub fn new(
        introspector: Arc<dyn SchemaIntrospector>,
        mapping: Arc<FieldMappingTable>,
        ttl: Duration,
        enabled: bool,
    ) -> Self {
        Self {
            introspector,
            mapping,
            snapshot: RwLock::new(Snapshot::default()),
            refresh_lock: Mutex::new(()),
            ttl,
            enabled,
            refreshes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            stale_reads: AtomicU64::new(0),
        }
    }

    /// Whether validation is switched on.
    #[must_use]
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// All allowed field names.
    ///
    /// Empty when disabled. A cold cache waits for the first load; a stale
    /// cache triggers at most one refresh and otherwise serves the prior set.
    pub async fn get_all(&self) -> Arc<HashSet<String>> {
        if !self.enabled {
            return Arc::default();
        }

        let current = self.snapshot.read().clone();
        match current.refreshed_at {
            Some(at) if at.elapsed() < self.ttl => current.fields,
            Some(_) => match self.refresh_lock.try_lock() {
                Ok(_guard) => {
                    if self.is_stale() {
                        self.refresh_locked().await;
                    }
                    self.current_fields()
                }
                Err(_) => {
                    self.stale_reads.fetch_add(1, Ordering::Relaxed);
                    debug!("Queryables refresh in flight, serving prior snapshot");
                    current.fields
                }
            },
            None => {
                let _guard = self.refresh_lock.lock().await;
                if self.snapshot.read().refreshed_at.is_none() {
                    self.refresh_locked().await;
                }
                self.current_fields()
            }
        }
    }

    /// Check every field against the allowed set, reporting all offenders at once.
    ///
    /// A leading `properties.` is ignored. No-op when disabled.
    pub async fn validate<I, S>(&self, fields: I) -> Result<(), CompileError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !self.enabled {
            return Ok(());
        }

        let allowed = self.get_all().await;
        let invalid: Vec<String> = fields
            .into_iter()
            .filter(|f| !allowed.contains(strip_properties_prefix(f.as_ref())))
            .map(|f| f.as_ref().to_string())
            .collect();

        if invalid.is_empty() {
            Ok(())
        } else {
            metrics::record_validation_rejections(invalid.len());
            Err(CompileError::invalid_fields(invalid))
        }
    }

    /// Force a load now, waiting for any refresh already in flight.
    pub async fn warm(&self) {
        if !self.enabled {
            return;
        }
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await;
    }

    /// Mark the snapshot stale so the next access refreshes it.
    pub fn invalidate(&self) {
        let mut snapshot = self.snapshot.write();
        if snapshot.refreshed_at.is_some() {
            snapshot.refreshed_at = Instant::now().checked_sub(self.ttl);
            if snapshot.refreshed_at.is_none() {
                // Process younger than ttl; keep the set, force a cold load
                snapshot.refreshed_at = None;
            }
        }
    }

    /// Drop the snapshot and the dynamic mapping entries it fed.
    pub fn clear(&self) {
        *self.snapshot.write() = Snapshot::default();
        self.mapping.clear_dynamic();
        metrics::set_queryables_fields(0);
    }

    /// Get cache statistics
    pub fn stats(&self) -> QueryablesCacheStats {
        let snapshot = self.snapshot.read();
        QueryablesCacheStats {
            refreshes: self.refreshes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            stale_reads: self.stale_reads.load(Ordering::Relaxed),
            field_count: snapshot.fields.len(),
            age: snapshot.refreshed_at.map(|at| at.elapsed()),
        }
    }

    fn current_fields(&self) -> Arc<HashSet<String>> {
        self.snapshot.read().fields.clone()
    }

    fn is_stale(&self) -> bool {
        match self.snapshot.read().refreshed_at {
            Some(at) => at.elapsed() >= self.ttl,
            None => true,
        }
    }

    /// Caller must hold `refresh_lock`.
    async fn refresh_locked(&self) {
        let start = Instant::now();
        match self.introspector.queryables_mapping().await {
            Ok(mapping) => {
                let fields: HashSet<String> = mapping.keys().cloned().collect();
                let count = fields.len();
                self.mapping.replace_dynamic(mapping);
                *self.snapshot.write() = Snapshot {
                    fields: Arc::new(fields),
                    refreshed_at: Some(Instant::now()),
                };
                self.refreshes.fetch_add(1, Ordering::Relaxed);
                metrics::record_queryables_refresh(true, start.elapsed());
                metrics::set_queryables_fields(count);
                info!(
                    fields = count,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Queryables cache refreshed"
                );
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                metrics::record_queryables_refresh(false, start.elapsed());
                warn!(
                    error = %e,
                    kept_fields = self.snapshot.read().fields.len(),
                    "Queryables refresh failed, keeping last snapshot"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queryables::IntrospectionError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    struct MockIntrospector {
        fields: parking_lot::Mutex<Vec<&'static str>>,
        calls: AtomicUsize,
        fail: AtomicBool,
        delay: Duration,
    }

    impl MockIntrospector {
        fn new(fields: Vec<&'static str>) -> Self {
            Self {
                fields: parking_lot::Mutex::new(fields),
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                delay: Duration::ZERO,
            }
        }

        fn slow(fields: Vec<&'static str>, delay: Duration) -> Self {
            Self { delay, ..Self::new(fields) }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SchemaIntrospector for MockIntrospector {
        async fn queryables_mapping(&self) -> Result<HashMap<String, String>, IntrospectionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(IntrospectionError::Unavailable("connection refused".into()));
            }
            Ok(self
                .fields
                .lock()
                .iter()
                .map(|f| (f.to_string(), format!("properties.{}", f)))
                .collect())
        }
    }

    fn cache_with(mock: Arc<MockIntrospector>, ttl: Duration, enabled: bool) -> QueryablesCache {
        QueryablesCache::new(mock, Arc::new(FieldMappingTable::new()), ttl, enabled)
    }

    #[tokio::test]
    async fn test_disabled_never_calls_introspection() {
        let mock = Arc::new(MockIntrospector::new(vec!["id"]));
        let cache = cache_with(mock.clone(), Duration::from_secs(60), false);

        assert!(cache.get_all().await.is_empty());
        assert!(cache.validate(["anything", "at_all"]).await.is_ok());
        cache.warm().await;

        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_validate_reports_unknown_field() {
        let mock = Arc::new(MockIntrospector::new(vec!["id", "datetime"]));
        let cache = cache_with(mock, Duration::from_secs(60), true);

        let err = cache.validate(["unknown_field"]).await.unwrap_err();
        assert!(err.to_string().contains("unknown_field"));
    }

    #[tokio::test]
    async fn test_validate_lists_all_offenders_and_strips_prefix() {
        let mock = Arc::new(MockIntrospector::new(vec!["id", "datetime", "eo:cloud_cover"]));
        let cache = cache_with(mock, Duration::from_secs(60), true);

        assert!(cache
            .validate(["id", "properties.datetime", "properties.eo:cloud_cover"])
            .await
            .is_ok());

        let err = cache.validate(["id", "zzz", "aaa"]).await.unwrap_err();
        assert_eq!(
            err,
            CompileError::InvalidField {
                fields: vec!["aaa".into(), "zzz".into()]
            }
        );
    }

    #[tokio::test]
    async fn test_fresh_cache_served_without_refresh() {
        let mock = Arc::new(MockIntrospector::new(vec!["id"]));
        let cache = cache_with(mock.clone(), Duration::from_secs(60), true);

        cache.get_all().await;
        cache.get_all().await;
        cache.validate(["id"]).await.unwrap();

        assert_eq!(mock.calls(), 1);
        assert_eq!(cache.stats().refreshes, 1);
    }

    #[tokio::test]
    async fn test_refresh_replaces_set_wholesale() {
        let mock = Arc::new(MockIntrospector::new(vec!["id", "old_field"]));
        let cache = cache_with(mock.clone(), Duration::ZERO, true);

        assert!(cache.get_all().await.contains("old_field"));

        *mock.fields.lock() = vec!["id", "new_field"];
        let fields = cache.get_all().await;
        assert!(fields.contains("new_field"));
        assert!(!fields.contains("old_field"));
    }

    #[tokio::test]
    async fn test_refresh_feeds_mapping_table() {
        let mock = Arc::new(MockIntrospector::new(vec!["platform"]));
        let mapping = Arc::new(FieldMappingTable::new());
        let cache = QueryablesCache::new(mock, mapping.clone(), Duration::from_secs(60), true);

        cache.warm().await;
        assert_eq!(mapping.resolve("platform"), "properties.platform");

        cache.clear();
        assert_eq!(mapping.resolve("platform"), "platform");
        assert_eq!(cache.stats().field_count, 0);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_last_snapshot() {
        let mock = Arc::new(MockIntrospector::new(vec!["id", "datetime"]));
        let cache = cache_with(mock.clone(), Duration::ZERO, true);

        cache.warm().await;
        mock.fail.store(true, Ordering::SeqCst);

        let fields = cache.get_all().await;
        assert!(fields.contains("datetime"));
        assert!(cache.validate(["datetime"]).await.is_ok());
        assert!(cache.stats().failures >= 1);
    }

    #[tokio::test]
    async fn test_cold_failure_serves_empty_set() {
        let mock = Arc::new(MockIntrospector::new(vec!["id"]));
        mock.fail.store(true, Ordering::SeqCst);
        let cache = cache_with(mock.clone(), Duration::from_secs(60), true);

        assert!(cache.get_all().await.is_empty());
        assert!(cache.validate(["id"]).await.is_err());

        // Retried on next access once the backend recovers
        mock.fail.store(false, Ordering::SeqCst);
        assert!(cache.validate(["id"]).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_stale_reads_collapse_to_one_refresh() {
        let mock = Arc::new(MockIntrospector::slow(vec!["id"], Duration::from_millis(50)));
        let cache = Arc::new(cache_with(mock.clone(), Duration::from_millis(1), true));

        cache.warm().await;
        assert_eq!(mock.calls(), 1);
        tokio::time::sleep(Duration::from_millis(5)).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.get_all().await }));
        }
        for handle in handles {
            // Everyone sees a populated set: either prior or refreshed
            assert!(handle.await.unwrap().contains("id"));
        }

        assert_eq!(mock.calls(), 2);
        assert!(cache.stats().stale_reads >= 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let mock = Arc::new(MockIntrospector::new(vec!["id"]));
        let cache = cache_with(mock.clone(), Duration::from_secs(60), true);

        cache.get_all().await;
        cache.invalidate();
        cache.get_all().await;

        assert_eq!(mock.calls(), 2);
    }
}
