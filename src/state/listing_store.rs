use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::types::{compare_ids, Hero};

/// Outcome of [`ListingStore::replace_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaceSummary {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
    pub unchanged: usize,
}

// ---------------------------------------------------------------------------
// ListingStore
// ---------------------------------------------------------------------------

type ListingMap = DashMap<String, Hero>;

/// Latest listings fetched from the indexer, keyed by hero id.
///
/// This is the fetching side's cache only. The query engine gets an owned
/// [`ListingStore::snapshot`] per request and never sees the map.
///
/// A refresh builds a complete new map and publishes it with one pointer
/// swap, so readers see either the previous set or the next one.
pub struct ListingStore {
    /// hero_id → Hero, replaced wholesale on every refresh
    current: RwLock<Arc<ListingMap>>,
    /// Nanosecond UTC epoch of the last successful replace (0 = never).
    refreshed_at_ns: AtomicU64,
}

impl ListingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Swap in a freshly fetched listing set.
    pub fn replace_all(&self, heroes: Vec<Hero>, now_ns: u64) -> ReplaceSummary {
        let previous = self.published();
        let fresh: ListingMap = DashMap::with_capacity(heroes.len());
        let mut summary = ReplaceSummary::default();

        for hero in heroes {
            match previous.get(&hero.id) {
                None => summary.added += 1,
                Some(old) if *old == hero => summary.unchanged += 1,
                Some(_) => summary.updated += 1,
            }
            fresh.insert(hero.id.clone(), hero);
        }
        summary.removed = previous.iter().filter(|e| !fresh.contains_key(e.key())).count();

        *self.current.write() = Arc::new(fresh);
        self.refreshed_at_ns.store(now_ns, Ordering::Relaxed);
        summary
    }

    pub fn get(&self, hero_id: &str) -> Option<Hero> {
        self.published().get(hero_id).map(|h| h.clone())
    }

    pub fn len(&self) -> usize {
        self.published().len()
    }

    pub fn is_empty(&self) -> bool {
        self.published().is_empty()
    }

    pub fn refreshed_at_ns(&self) -> u64 {
        self.refreshed_at_ns.load(Ordering::Relaxed)
    }

    /// All listings ordered by numeric id, so the engine always sees the same
    /// input order for the same data.
    pub fn snapshot(&self) -> Vec<Hero> {
        let listings = self.published();
        let mut heroes: Vec<Hero> = listings.iter().map(|e| e.value().clone()).collect();
        heroes.sort_by(|a, b| compare_ids(&a.id, &b.id));
        heroes
    }

    /// The currently published map. The read lock is held only for the clone.
    fn published(&self) -> Arc<ListingMap> {
        Arc::clone(&self.current.read())
    }
}

impl Default for ListingStore {
    fn default() -> Self {
        Self {
            current: RwLock::new(Arc::new(DashMap::new())),
            refreshed_at_ns: AtomicU64::new(0),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
