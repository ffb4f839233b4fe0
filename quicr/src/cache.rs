//! Per-track object cache: ordered groups of ordered objects with
//! time-bounded retention, backing fetches and late joiners.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::coding::Location;
use crate::track::ObjectHeaders;
use crate::transport::TickService;

/// One cached object: headers plus payload bytes.
#[derive(Clone, Debug)]
pub struct CacheObject {
    pub headers: ObjectHeaders,
    pub payload: Bytes,
}

#[derive(Clone, Copy, Debug)]
pub struct CacheConfig {
    /// Groups older than this are evicted, milliseconds.
    pub retention_ttl_ms: u64,

    /// At most this many groups are retained.
    pub max_groups: usize,

    /// Eviction runs at most this often, piggybacked on inserts.
    pub sweep_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            retention_ttl_ms: 50_000,
            max_groups: 256,
            sweep_interval_ms: 1_000,
        }
    }
}

#[derive(Debug)]
struct Group {
    created_at: u64,
    objects: BTreeMap<u64, CacheObject>,
}

#[derive(Debug)]
struct CacheInner {
    groups: BTreeMap<u64, Group>,
    last_sweep: u64,
}

/// The cache for one track alias.
///
/// All queries return owned snapshots; the maps are never exposed while the
/// lock is held, so readers cannot observe (or block) a mutation mid-walk.
#[derive(Clone)]
#[derive(Debug)]
pub struct Cache {
    inner: Arc<Mutex<CacheInner>>,
    config: CacheConfig,
    tick: Arc<TickService>,
}

impl Cache {
    pub fn new(config: CacheConfig, tick: Arc<TickService>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                groups: BTreeMap::new(),
                last_sweep: 0,
            })),
            config,
            tick,
        }
    }

    /// Insert an object, creating its group if needed. A duplicate
    /// (group, object) replaces the previous entry.
    pub fn insert(&self, headers: ObjectHeaders, payload: Bytes) {
        let now = self.tick.milliseconds();
        let mut inner = self.inner.lock().unwrap();

        let group = inner
            .groups
            .entry(headers.group_id)
            .or_insert_with(|| Group {
                created_at: now,
                objects: BTreeMap::new(),
            });

        group
            .objects
            .insert(headers.object_id, CacheObject { headers, payload });

        if now.saturating_sub(inner.last_sweep) >= self.config.sweep_interval_ms {
            self.sweep(&mut inner, now);
        }
    }

    /// All objects of one group, ascending object id. Empty if unknown.
    pub fn group(&self, group_id: u64) -> Vec<CacheObject> {
        let inner = self.inner.lock().unwrap();
        match inner.groups.get(&group_id) {
            Some(group) => group.objects.values().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Objects within [start, end], groups ascending, objects ascending
    /// within each group.
    pub fn range(&self, start: Location, end: Location) -> Vec<CacheObject> {
        let inner = self.inner.lock().unwrap();

        let mut out = Vec::new();
        for (&group_id, group) in inner.groups.range(start.group_id..=end.group_id) {
            for (&object_id, object) in &group.objects {
                let location = Location::new(group_id, object_id);
                if location >= start && location <= end {
                    out.push(object.clone());
                }
            }
        }
        out
    }

    /// The first cached object at or after `from`, if any.
    pub fn next_after(&self, from: Location) -> Option<CacheObject> {
        let inner = self.inner.lock().unwrap();

        for (&group_id, group) in inner.groups.range(from.group_id..) {
            let min_object = match group_id == from.group_id {
                true => from.object_id,
                false => 0,
            };
            if let Some((_, object)) = group.objects.range(min_object..).next() {
                return Some(object.clone());
            }
        }
        None
    }

    /// The greatest (group, object) currently cached.
    pub fn latest(&self) -> Option<Location> {
        let inner = self.inner.lock().unwrap();

        let (&group_id, group) = inner.groups.iter().next_back()?;
        let (&object_id, _) = group.objects.iter().next_back()?;
        Some(Location::new(group_id, object_id))
    }

    pub fn group_count(&self) -> usize {
        self.inner.lock().unwrap().groups.len()
    }

    /// Evict expired groups now; used by the background sweeper.
    pub fn purge_expired(&self) {
        let now = self.tick.milliseconds();
        let mut inner = self.inner.lock().unwrap();
        self.sweep(&mut inner, now);
    }

    fn sweep(&self, inner: &mut CacheInner, now: u64) {
        inner.last_sweep = now;

        inner
            .groups
            .retain(|_, group| now.saturating_sub(group.created_at) < self.config.retention_ttl_ms);

        while inner.groups.len() > self.config.max_groups {
            inner.groups.pop_first();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn object(group_id: u64, object_id: u64, payload: &'static [u8]) -> (ObjectHeaders, Bytes) {
        (
            ObjectHeaders {
                group_id,
                object_id,
                payload_length: payload.len() as u64,
                ..Default::default()
            },
            Bytes::from_static(payload),
        )
    }

    fn populated() -> Cache {
        let cache = Cache::new(CacheConfig::default(), TickService::new());
        for group_id in [5u64, 6, 7] {
            for object_id in 0u64..4 {
                let (headers, payload) = object(group_id, object_id, b"x");
                cache.insert(headers, payload);
            }
        }
        cache
    }

    #[tokio::test(start_paused = true)]
    async fn range_query() {
        let cache = populated();

        let objects = cache.range(Location::new(6, 1), Location::new(7, 2));
        let locations: Vec<_> = objects.iter().map(|o| o.headers.location()).collect();
        assert_eq!(
            locations,
            vec![
                Location::new(6, 1),
                Location::new(6, 2),
                Location::new(6, 3),
                Location::new(7, 0),
                Location::new(7, 1),
                Location::new(7, 2),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn point_and_latest() {
        let cache = populated();

        assert_eq!(cache.group(6).len(), 4);
        assert!(cache.group(9).is_empty());
        assert_eq!(cache.latest(), Some(Location::new(7, 3)));

        assert_eq!(
            cache
                .next_after(Location::new(6, 3))
                .map(|o| o.headers.location()),
            Some(Location::new(6, 3))
        );
        assert_eq!(
            cache
                .next_after(Location::new(6, 4))
                .map(|o| o.headers.location()),
            Some(Location::new(7, 0))
        );
        assert!(cache.next_after(Location::new(8, 0)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_eviction() {
        let cache = Cache::new(
            CacheConfig {
                retention_ttl_ms: 1_000,
                ..Default::default()
            },
            TickService::new(),
        );

        let (headers, payload) = object(1, 0, b"old");
        cache.insert(headers, payload);

        tokio::time::advance(Duration::from_millis(1_500)).await;
        cache.purge_expired();

        assert_eq!(cache.group_count(), 0);
        assert_eq!(cache.latest(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn max_groups_eviction() {
        let cache = Cache::new(
            CacheConfig {
                max_groups: 2,
                sweep_interval_ms: 0,
                ..Default::default()
            },
            TickService::new(),
        );

        for group_id in 0u64..5 {
            let (headers, payload) = object(group_id, 0, b"x");
            cache.insert(headers, payload);
        }

        // Only the newest two groups survive.
        assert_eq!(cache.group_count(), 2);
        assert!(cache.group(2).is_empty());
        assert_eq!(cache.latest(), Some(Location::new(4, 0)));
    }
}
