use std::ops::Deref;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::cache::{Cache, CacheConfig, CacheObject};
use crate::coding::{Location, TrackNamespace};
use crate::metrics::PublishTrackMetrics;
use crate::track::{FullTrackName, ObjectHeaders, TrackHash};
use crate::transport::TickService;
use crate::watch::{Queue, State};

use super::ServeError;

/// Static information about a track.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub namespace: TrackNamespace,
    pub name: Vec<u8>,
}

impl Track {
    pub fn new(namespace: TrackNamespace, name: Vec<u8>) -> Self {
        Self { namespace, name }
    }

    pub fn full_name(&self) -> FullTrackName {
        FullTrackName::new(self.namespace.clone(), self.name.clone())
    }

    pub fn hash(&self) -> TrackHash {
        TrackHash::new(&self.full_name())
    }

    /// Create the producer side, backed by a fresh cache.
    pub fn produce(self, config: CacheConfig, tick: Arc<TickService>) -> TrackProducer {
        TrackProducer {
            shared: Arc::new(ProducerShared {
                info: Arc::new(self),
                cache: Cache::new(config, tick),
                consumers: Mutex::new(Vec::new()),
                closed: State::new(Ok(())),
                metrics: Mutex::new(PublishTrackMetrics::default()),
            }),
        }
    }
}

/// Per-consumer buffer depth. A consumer that falls further behind than
/// this sheds its oldest undelivered objects; the cache still holds them
/// for an explicit fetch.
pub const CONSUMER_BUFFER_DEPTH: usize = 1024;

/// Which objects a consumer wants, resolved against the cache at subscribe
/// time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SubscribeFilter {
    /// Objects after the current latest; no replay.
    LatestObject,
    /// The current group from its start, then everything after.
    LatestGroup,
    /// Everything at or after the location.
    AbsoluteStart(Location),
    /// A bounded range: start location through the given final group.
    AbsoluteRange(Location, u64),
}

impl SubscribeFilter {
    /// Resolve to (start, end_group) given the track's largest location.
    fn resolve(&self, latest: Option<Location>) -> (Location, Option<u64>) {
        match *self {
            Self::LatestObject => {
                let start = match latest {
                    Some(latest) => Location::new(latest.group_id, latest.object_id + 1),
                    None => Location::new(0, 0),
                };
                (start, None)
            }
            Self::LatestGroup => {
                let start = match latest {
                    Some(latest) => Location::new(latest.group_id, 0),
                    None => Location::new(0, 0),
                };
                (start, None)
            }
            Self::AbsoluteStart(start) => (start, None),
            Self::AbsoluteRange(start, end_group) => (start, Some(end_group)),
        }
    }
}

#[derive(Debug)]
struct ConsumerEntry {
    queue: Queue<CacheObject>,
    start: Location,
    end_group: Option<u64>,
}

impl ConsumerEntry {
    /// Push the object if the filter admits it. False when the consumer is
    /// gone or its range is complete.
    fn offer(&mut self, object: &CacheObject) -> bool {
        let location = object.headers.location();

        if let Some(end_group) = self.end_group {
            if location.group_id > end_group {
                return false;
            }
        }

        if location < self.start {
            return true; // not admitted, but the consumer stays
        }

        self.queue.push(object.clone()).is_ok()
    }
}

#[derive(Debug)]
struct ProducerShared {
    info: Arc<Track>,
    cache: Cache,
    consumers: Mutex<Vec<ConsumerEntry>>,
    closed: State<Result<(), ServeError>>,
    metrics: Mutex<PublishTrackMetrics>,
}

impl Drop for ProducerShared {
    fn drop(&mut self) {
        if let Some(mut closed) = self.closed.lock_mut() {
            if closed.is_ok() {
                *closed = Err(ServeError::Done);
            }
        }
        // Consumer queues close as the entries drop.
    }
}

/// The write side of a track: inserts objects into the cache and fans them
/// out. Cheap to clone; the track closes when the last clone drops.
#[derive(Clone, Debug)]
pub struct TrackProducer {
    shared: Arc<ProducerShared>,
}

impl TrackProducer {
    /// Cache the object and deliver it to every consumer whose filter
    /// admits it.
    pub fn insert(&self, headers: ObjectHeaders, payload: Bytes) {
        let object = CacheObject { headers, payload };

        let mut consumers = self.shared.consumers.lock().unwrap();
        self.shared
            .cache
            .insert(object.headers.clone(), object.payload.clone());
        consumers.retain_mut(|consumer| consumer.offer(&object));

        let mut metrics = self.shared.metrics.lock().unwrap();
        metrics.objects_published += 1;
        metrics.bytes_published += object.payload.len() as u64;
        if consumers.is_empty() {
            // Cached for late joiners, but nobody received it.
            metrics.objects_dropped_not_ok += 1;
        }
    }

    pub fn metrics(&self) -> PublishTrackMetrics {
        *self.shared.metrics.lock().unwrap()
    }

    /// Attach a consumer. Backfill from the cache and live delivery are
    /// atomic, so each admitted object is seen exactly once.
    pub fn subscribe(&self, filter: SubscribeFilter) -> TrackConsumer {
        let mut consumers = self.shared.consumers.lock().unwrap();

        let latest = self.shared.cache.latest();
        let (start, end_group) = filter.resolve(latest);

        let (mut tx, rx) = Queue::bounded(CONSUMER_BUFFER_DEPTH).split();

        let backfill_end = match end_group {
            Some(end_group) => Location::new(end_group, u64::MAX),
            None => Location::new(u64::MAX, u64::MAX),
        };
        for object in self.shared.cache.range(start, backfill_end) {
            tx.push(object).ok();
        }

        // A fully cached range never gets live pushes; skip registration so
        // the consumer sees FIN right after the backfill.
        let complete = match end_group {
            Some(end_group) => latest.is_some_and(|l| l.group_id > end_group),
            None => false,
        };
        if !complete {
            consumers.push(ConsumerEntry {
                queue: tx,
                start,
                end_group,
            });
        }

        TrackConsumer {
            queue: rx,
            closed: self.shared.closed.clone(),
            info: self.shared.info.clone(),
        }
    }

    pub fn latest(&self) -> Option<Location> {
        self.shared.cache.latest()
    }

    pub fn cache(&self) -> &Cache {
        &self.shared.cache
    }

    /// Live consumers, after pruning ones that went away.
    pub fn consumer_count(&self) -> usize {
        let mut consumers = self.shared.consumers.lock().unwrap();
        consumers.retain(|consumer| consumer.queue.is_open());
        consumers.len()
    }

    /// Close every consumer with the error.
    pub fn close(&self, err: ServeError) {
        if let Some(mut closed) = self.shared.closed.lock_mut() {
            if closed.is_ok() {
                *closed = Err(err);
            }
        }
        self.shared.consumers.lock().unwrap().clear();
    }
}

impl Deref for TrackProducer {
    type Target = Track;

    fn deref(&self) -> &Track {
        &self.shared.info
    }
}

/// The read side of one subscription to a track.
pub struct TrackConsumer {
    queue: Queue<CacheObject>,
    closed: State<Result<(), ServeError>>,
    pub info: Arc<Track>,
}

impl TrackConsumer {
    /// The next admitted object. Ok(None) is a clean end of the
    /// subscription; Err carries the close reason.
    pub async fn next_object(&mut self) -> Result<Option<CacheObject>, ServeError> {
        if let Some(object) = self.queue.pop().await {
            return Ok(Some(object));
        }

        match self.closed.lock().clone() {
            Ok(()) | Err(ServeError::Done) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Objects shed because this consumer fell behind its buffer depth.
    pub fn lagged(&self) -> u64 {
        self.queue.lagged()
    }
}

impl Deref for TrackConsumer {
    type Target = Track;

    fn deref(&self) -> &Track {
        &self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ObjectStatus;

    fn track() -> TrackProducer {
        Track::new(TrackNamespace::from_utf8_path("conf/1"), b"video".to_vec())
            .produce(CacheConfig::default(), TickService::new())
    }

    fn headers(group_id: u64, object_id: u64) -> ObjectHeaders {
        ObjectHeaders {
            group_id,
            object_id,
            priority: 127,
            payload_length: 1,
            status: ObjectStatus::Available,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn object_received() {
        let producer = track();
        let mut consumer = producer.subscribe(SubscribeFilter::LatestGroup);

        producer.insert(headers(0x1000, 0), Bytes::from_static(b"hello"));

        let object = consumer.next_object().await.unwrap().unwrap();
        assert_eq!(object.headers.group_id, 0x1000);
        assert_eq!(object.headers.object_id, 0);
        assert_eq!(object.payload.as_ref(), b"hello");
    }

    #[tokio::test(start_paused = true)]
    async fn fan_out_exactly_once() {
        let producer = track();
        let mut one = producer.subscribe(SubscribeFilter::LatestGroup);
        let mut two = producer.subscribe(SubscribeFilter::LatestGroup);

        producer.insert(headers(7, 0), Bytes::from_static(b"P"));
        drop(producer);

        for consumer in [&mut one, &mut two] {
            let object = consumer.next_object().await.unwrap().unwrap();
            assert_eq!(object.headers.location(), Location::new(7, 0));
            assert_eq!(object.payload.as_ref(), b"P");
            assert!(consumer.next_object().await.unwrap().is_none());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn latest_group_replays_current_group() {
        let producer = track();

        producer.insert(headers(4, 0), Bytes::from_static(b"a"));
        producer.insert(headers(5, 0), Bytes::from_static(b"b"));
        producer.insert(headers(5, 1), Bytes::from_static(b"c"));

        // Joins at the start of group 5; group 4 is not replayed.
        let mut consumer = producer.subscribe(SubscribeFilter::LatestGroup);
        producer.insert(headers(5, 2), Bytes::from_static(b"d"));

        let mut locations = Vec::new();
        for _ in 0..3 {
            let object = consumer.next_object().await.unwrap().unwrap();
            locations.push(object.headers.location());
        }
        assert_eq!(
            locations,
            vec![
                Location::new(5, 0),
                Location::new(5, 1),
                Location::new(5, 2)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn latest_object_skips_replay() {
        let producer = track();

        producer.insert(headers(5, 0), Bytes::from_static(b"old"));

        let mut consumer = producer.subscribe(SubscribeFilter::LatestObject);
        producer.insert(headers(5, 1), Bytes::from_static(b"new"));
        drop(producer);

        let object = consumer.next_object().await.unwrap().unwrap();
        assert_eq!(object.headers.location(), Location::new(5, 1));
        assert!(consumer.next_object().await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn absolute_range_ends() {
        let producer = track();

        for group in 5..8u64 {
            for object in 0..4u64 {
                producer.insert(headers(group, object), Bytes::from_static(b"x"));
            }
        }

        let mut consumer = producer.subscribe(SubscribeFilter::AbsoluteRange(
            Location::new(6, 1),
            6,
        ));

        let mut locations = Vec::new();
        while let Some(object) = consumer.next_object().await.unwrap() {
            locations.push(object.headers.location());
        }
        assert_eq!(
            locations,
            vec![
                Location::new(6, 1),
                Location::new(6, 2),
                Location::new(6, 3)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_consumer_lags() {
        let producer = track();
        let mut consumer = producer.subscribe(SubscribeFilter::LatestObject);

        for object_id in 0..(CONSUMER_BUFFER_DEPTH as u64 + 8) {
            producer.insert(headers(0, object_id), Bytes::from_static(b"x"));
        }

        // The oldest undelivered objects were shed to stay within depth.
        assert_eq!(consumer.lagged(), 8);
        let first = consumer.next_object().await.unwrap().unwrap();
        assert_eq!(first.headers.object_id, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn close_with_error() {
        let producer = track();
        let mut consumer = producer.subscribe(SubscribeFilter::LatestObject);

        producer.close(ServeError::NotAuthorized);

        assert_eq!(
            consumer.next_object().await.unwrap_err(),
            ServeError::NotAuthorized
        );
    }

    #[tokio::test(start_paused = true)]
    async fn consumer_count() {
        let producer = track();
        assert_eq!(producer.consumer_count(), 0);

        let one = producer.subscribe(SubscribeFilter::LatestObject);
        let two = producer.subscribe(SubscribeFilter::LatestObject);
        assert_eq!(producer.consumer_count(), 2);

        drop(one);
        drop(two);
        assert_eq!(producer.consumer_count(), 0);
    }
}
