//! The process-wide realm → adapter cache.
//!
//! One [`RealmAdapterCache`] is created at process start and shared by
//! every worker. It is the only mutable shared structure in the crate, and
//! all mutation is append-only: adapters are inserted once and served for
//! the process lifetime. There is no expiration and no invalidation API.
//!
//! DESIGN NOTE: memory never shrinks. This is an intentional trade-off for
//! bounded realm cardinality and long process lifetimes — a deployment
//! expecting unbounded tenant cardinality needs an eviction layer above
//! this cache.

use std::sync::Arc;

use dashmap::DashMap;

use crate::adapter::{AdapterFactory, RealmAdapter};

/// Concurrent, lazily populated mapping from realm identifier to its
/// configured [`RealmAdapter`].
///
/// Misses construct the adapter under the map's shard lock
/// (`entry().or_insert_with`), so concurrent misses for the same realm
/// build it once; the finished adapter is published as an `Arc` after
/// construction completes, so readers never observe a partially built
/// adapter. Correctness does not depend on exactly-once construction —
/// [`AdapterFactory::build`] is idempotent — but single-flight avoids the
/// redundant work.
pub struct RealmAdapterCache {
    adapters: DashMap<String, Arc<RealmAdapter>>,
    factory: AdapterFactory,
}

impl std::fmt::Debug for RealmAdapterCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealmAdapterCache")
            .field("realms", &self.adapters.len())
            .field("factory", &self.factory)
            .finish()
    }
}

impl RealmAdapterCache {
    /// Create an empty cache over the given factory.
    pub fn new(factory: AdapterFactory) -> Self {
        Self {
            adapters: DashMap::new(),
            factory,
        }
    }

    /// The adapter for `realm`, constructing and storing it on first use.
    pub fn get_or_create(&self, realm: &str) -> Arc<RealmAdapter> {
        if let Some(adapter) = self.adapters.get(realm) {
            return Arc::clone(&adapter);
        }
        let entry = self
            .adapters
            .entry(realm.to_owned())
            .or_insert_with(|| {
                tracing::debug!(realm, "constructing adapter");
                Arc::new(self.factory.build(realm))
            });
        Arc::clone(&entry)
    }

    /// The cached adapter for `realm`, without constructing one.
    pub fn get(&self, realm: &str) -> Option<Arc<RealmAdapter>> {
        self.adapters.get(realm).map(|a| Arc::clone(&a))
    }

    /// Number of realms with a cached adapter.
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether no adapter has been constructed yet.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// The factory this cache constructs adapters with.
    pub fn factory(&self) -> &AdapterFactory {
        &self.factory
    }
}
