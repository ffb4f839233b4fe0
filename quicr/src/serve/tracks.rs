use std::collections::{hash_map, HashMap};
use std::sync::{Arc, Mutex};

use crate::cache::CacheConfig;
use crate::coding::TrackNamespace;
use crate::transport::TickService;

use super::{ServeError, Track, TrackProducer};

/// The tracks of one namespace, keyed by name. Cloneable; the relay keeps
/// one per announce and routes subscribes through it.
#[derive(Clone)]
pub struct Tracks {
    pub namespace: TrackNamespace,

    lookup: Arc<Mutex<HashMap<Vec<u8>, TrackProducer>>>,
    cache_config: CacheConfig,
    tick: Arc<TickService>,
}

impl Tracks {
    pub fn new(namespace: TrackNamespace, cache_config: CacheConfig, tick: Arc<TickService>) -> Self {
        Self {
            namespace,
            lookup: Default::default(),
            cache_config,
            tick,
        }
    }

    /// Create a producer for a new track name.
    pub fn create(&self, name: &[u8]) -> Result<TrackProducer, ServeError> {
        let mut lookup = self.lookup.lock().unwrap();

        match lookup.entry(name.to_vec()) {
            hash_map::Entry::Occupied(_) => Err(ServeError::Duplicate),
            hash_map::Entry::Vacant(entry) => {
                let producer = Track::new(self.namespace.clone(), name.to_vec())
                    .produce(self.cache_config, self.tick.clone());
                entry.insert(producer.clone());
                Ok(producer)
            }
        }
    }

    pub fn get(&self, name: &[u8]) -> Option<TrackProducer> {
        self.lookup.lock().unwrap().get(name).cloned()
    }

    /// The existing producer, or a fresh one if the name is new. The bool is
    /// true when the track was created by this call.
    pub fn get_or_create(&self, name: &[u8]) -> (TrackProducer, bool) {
        let mut lookup = self.lookup.lock().unwrap();

        match lookup.entry(name.to_vec()) {
            hash_map::Entry::Occupied(entry) => (entry.get().clone(), false),
            hash_map::Entry::Vacant(entry) => {
                let producer = Track::new(self.namespace.clone(), name.to_vec())
                    .produce(self.cache_config, self.tick.clone());
                entry.insert(producer.clone());
                (producer, true)
            }
        }
    }

    /// A snapshot of every live producer, for sweeping and introspection.
    pub fn producers(&self) -> Vec<TrackProducer> {
        self.lookup.lock().unwrap().values().cloned().collect()
    }

    pub fn remove(&self, name: &[u8]) -> Option<TrackProducer> {
        self.lookup.lock().unwrap().remove(name)
    }

    /// Close every track and empty the collection.
    pub fn clear(&self, err: ServeError) {
        let mut lookup = self.lookup.lock().unwrap();
        for (_, producer) in lookup.drain() {
            producer.close(err.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn create_and_route() {
        let tracks = Tracks::new(
            TrackNamespace::from_utf8_path("conf/1"),
            CacheConfig::default(),
            TickService::new(),
        );

        let producer = tracks.create(b"video").unwrap();
        assert_eq!(producer.name, b"video");
        assert!(matches!(
            tracks.create(b"video").unwrap_err(),
            ServeError::Duplicate
        ));

        assert!(tracks.get(b"video").is_some());
        assert!(tracks.get(b"audio").is_none());

        let (_, created) = tracks.get_or_create(b"audio");
        assert!(created);
        let (_, created) = tracks.get_or_create(b"audio");
        assert!(!created);

        assert!(tracks.remove(b"video").is_some());
        assert!(tracks.get(b"video").is_none());
    }
}
