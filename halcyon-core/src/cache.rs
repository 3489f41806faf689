//! Compute-once cache for resolved producible declarations.
//!
//! Declarations are static configuration, so a resolution result never goes
//! stale while its [`Registry`](crate::resolver::Registry) is unchanged.
//! Each key owns a [`OnceCell`]: concurrent first lookups of the same
//! operation resolve it exactly once, and later lookups only take the map's
//! read lock.

use crate::declaration::OperationSignature;
use crate::resolver::ProducibleDeclaration;
use crate::Result;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ============================================================================
// Cache Key
// ============================================================================

/// Identity of one operation on one resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OperationKey {
    resource: String,
    signature: OperationSignature,
}

impl OperationKey {
    #[inline]
    pub fn new(resource: impl Into<String>, signature: OperationSignature) -> Self {
        Self {
            resource: resource.into(),
            signature,
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn signature(&self) -> &OperationSignature {
        &self.signature
    }
}

// ============================================================================
// Producible Cache
// ============================================================================

type Slot = Arc<OnceCell<Result<ProducibleDeclaration>>>;

/// Write-once/read-many resolution cache.
///
/// Failed resolutions are cached as well; a broken declaration table stays
/// broken until the registry changes.
#[derive(Debug, Default)]
pub struct ProducibleCache {
    entries: RwLock<HashMap<OperationKey, Slot>>,
    stats: ProducibleCacheStats,
}

impl ProducibleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached result for `key`, resolving it with `resolve` on
    /// first access.
    pub fn get_or_resolve<F>(&self, key: &OperationKey, resolve: F) -> Result<ProducibleDeclaration>
    where
        F: FnOnce() -> Result<ProducibleDeclaration>,
    {
        let slot = self.slot(key);

        let mut resolved_here = false;
        let result = slot.get_or_init(|| {
            resolved_here = true;
            resolve()
        });

        if resolved_here {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
        }

        result.clone()
    }

    /// Peek at a populated entry without resolving anything.
    pub fn get(&self, key: &OperationKey) -> Option<Result<ProducibleDeclaration>> {
        self.entries.read().get(key).and_then(|slot| slot.get().cloned())
    }

    fn slot(&self, key: &OperationKey) -> Slot {
        if let Some(slot) = self.entries.read().get(key) {
            return Arc::clone(slot);
        }

        let mut entries = self.entries.write();
        Arc::clone(entries.entry(key.clone()).or_default())
    }

    /// Drop the entry for one key.
    pub fn remove(&self, key: &OperationKey) {
        self.entries.write().remove(key);
    }

    /// Drop every entry. Statistics are kept.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn stats(&self) -> &ProducibleCacheStats {
        &self.stats
    }

    /// Number of keys with a slot, populated or in progress.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache statistics.
#[derive(Debug, Default)]
pub struct ProducibleCacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ProducibleCacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of lookups that ran the resolver.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolutionSource;
    use crate::{Error, MediaType};
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn key() -> OperationKey {
        OperationKey::new("Orders", OperationSignature::new("list"))
    }

    fn declaration() -> ProducibleDeclaration {
        ProducibleDeclaration::new(
            "Orders",
            OperationSignature::new("list"),
            vec![MediaType::json()],
            ResolutionSource::Resource,
        )
    }

    #[test]
    fn test_resolves_once() {
        let cache = ProducibleCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let result = cache.get_or_resolve(&key(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(declaration())
            });
            assert_eq!(result.unwrap().media_types(), [MediaType::json()]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().misses(), 1);
        assert_eq!(cache.stats().hits(), 2);
        assert!((cache.stats().hit_ratio() - 2.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_errors_are_cached() {
        let cache = ProducibleCache::new();
        let err = Error::UnknownResource("Orders".into());

        let first = cache.get_or_resolve(&key(), || Err(err.clone()));
        let second = cache.get_or_resolve(&key(), || Ok(declaration()));

        assert_eq!(first, Err(err.clone()));
        assert_eq!(second, Err(err));
    }

    #[test]
    fn test_clear_forces_resolution() {
        let cache = ProducibleCache::new();
        assert!(cache.get(&key()).is_none());

        cache.get_or_resolve(&key(), || Ok(declaration())).unwrap();
        assert!(cache.get(&key()).is_some());

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(&key()).is_none());
    }

    #[test]
    fn test_concurrent_first_access_resolves_once() {
        let cache = Arc::new(ProducibleCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    cache
                        .get_or_resolve(&key(), || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok(declaration())
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), declaration());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
