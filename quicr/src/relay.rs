//! Relay: accept connections, cache announced tracks, and fan each
//! upstream subscription out to every downstream subscriber.
//!
//! All routing state lives in per-relay and per-connection structs; there
//! are no process-wide globals. Duplicate downstream subscribers aggregate
//! behind one upstream subscription, which is torn down when the last of
//! them goes away.

use std::collections::{hash_map, HashMap};
use std::sync::{Arc, Mutex};

use futures::{stream::FuturesUnordered, StreamExt};

use crate::cache::CacheConfig;
use crate::coding::TrackNamespace;
use crate::serve::{ServeError, TrackProducer, Tracks};
use crate::session::{
    Announced, FetchRequested, Publisher, Session, SessionError, Subscribe, SubscribeOptions,
    SubscribeUpdateInfo, Subscribed, Subscriber,
};
use crate::track::TrackHash;
use crate::transport::TickService;

#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Retention for every relayed track's cache.
    pub cache: CacheConfig,

    /// Our ENDPOINT_ID in setup messages.
    pub endpoint_id: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            endpoint_id: "relay".to_string(),
        }
    }
}

struct UpstreamTrack {
    // Dropping the handle unsubscribes upstream.
    handle: Subscribe,
    producer: TrackProducer,
    subscribers: usize,
}

struct Local {
    tracks: Tracks,
    /// The announcing connection's subscriber half, for upstream subscribes.
    upstream: Subscriber,
    subscriptions: HashMap<Vec<u8>, UpstreamTrack>,
}

/// Announced namespaces across every connection of this relay.
#[derive(Clone, Default)]
pub struct Locals {
    lookup: Arc<Mutex<HashMap<u64, Local>>>,
}

impl Locals {
    /// Register an announced namespace; the returned guard unregisters it.
    pub fn register(
        &self,
        tracks: Tracks,
        upstream: Subscriber,
    ) -> Result<Registration, ServeError> {
        let ns_hash = TrackHash::namespace_hash(&tracks.namespace);

        match self.lookup.lock().unwrap().entry(ns_hash) {
            hash_map::Entry::Occupied(_) => return Err(ServeError::Duplicate),
            hash_map::Entry::Vacant(entry) => entry.insert(Local {
                tracks,
                upstream,
                subscriptions: HashMap::new(),
            }),
        };

        Ok(Registration {
            locals: self.clone(),
            ns_hash,
        })
    }

    /// A downstream subscriber wants a track: attach to the aggregated
    /// upstream subscription, creating it for the first subscriber.
    pub fn subscribe(
        &self,
        namespace: &TrackNamespace,
        name: &[u8],
        options: SubscribeOptions,
    ) -> Result<(TrackProducer, SubscriberGuard), ServeError> {
        let ns_hash = TrackHash::namespace_hash(namespace);
        let mut lookup = self.lookup.lock().unwrap();
        let local = lookup.get_mut(&ns_hash).ok_or(ServeError::NotFound)?;

        let track = match local.subscriptions.entry(name.to_vec()) {
            hash_map::Entry::Occupied(entry) => entry.into_mut(),
            hash_map::Entry::Vacant(entry) => {
                let (producer, _) = local.tracks.get_or_create(name);
                let handle = local
                    .upstream
                    .subscribe(producer.clone(), options)
                    .map_err(ServeError::from)?;

                entry.insert(UpstreamTrack {
                    handle,
                    producer,
                    subscribers: 0,
                })
            }
        };

        track.subscribers += 1;
        log::debug!(
            "relay subscription: namespace_hash={:#x} subscribers={}",
            ns_hash,
            track.subscribers
        );

        Ok((
            track.producer.clone(),
            SubscriberGuard {
                locals: self.clone(),
                ns_hash,
                name: name.to_vec(),
            },
        ))
    }

    /// Evict expired cache groups across every registered track.
    pub fn sweep(&self) {
        let tracks: Vec<Tracks> = self
            .lookup
            .lock()
            .unwrap()
            .values()
            .map(|local| local.tracks.clone())
            .collect();

        for tracks in tracks {
            for producer in tracks.producers() {
                producer.cache().purge_expired();
            }
        }
    }

    /// Resolve a namespace for fetch serving.
    pub fn route(&self, namespace: &TrackNamespace) -> Option<Tracks> {
        let ns_hash = TrackHash::namespace_hash(namespace);
        self.lookup
            .lock()
            .unwrap()
            .get(&ns_hash)
            .map(|local| local.tracks.clone())
    }

    /// Forward a downstream SubscribeUpdate to the aggregated upstream
    /// subscription; the handle dampens bursts.
    fn update(&self, ns_hash: u64, name: &[u8], update: SubscribeUpdateInfo) {
        let mut lookup = self.lookup.lock().unwrap();
        if let Some(track) = lookup
            .get_mut(&ns_hash)
            .and_then(|local| local.subscriptions.get_mut(name))
        {
            track.handle.update(update);
        }
    }

    fn detach(&self, ns_hash: u64, name: &[u8]) {
        let mut lookup = self.lookup.lock().unwrap();
        let Some(local) = lookup.get_mut(&ns_hash) else {
            return;
        };
        let Some(track) = local.subscriptions.get_mut(name) else {
            return;
        };

        track.subscribers -= 1;
        if track.subscribers == 0 {
            // The last subscriber left: drop the upstream subscription.
            local.subscriptions.remove(name);
            local.tracks.remove(name);
            log::debug!("relay unsubscribed upstream: namespace_hash={:#x}", ns_hash);
        }
    }
}

/// Keeps an announced namespace routable; unregisters on drop.
pub struct Registration {
    locals: Locals,
    ns_hash: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(local) = self.locals.lookup.lock().unwrap().remove(&self.ns_hash) {
            local.tracks.clear(ServeError::Done);
        }
    }
}

/// One downstream subscriber's stake in an upstream subscription.
pub struct SubscriberGuard {
    locals: Locals,
    ns_hash: u64,
    name: Vec<u8>,
}

impl SubscriberGuard {
    pub fn update(&self, update: SubscribeUpdateInfo) {
        self.locals.update(self.ns_hash, &self.name, update);
    }
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        self.locals.detach(self.ns_hash, &self.name);
    }
}

/// A relay instance: shared routing plus per-connection serving.
#[derive(Clone)]
pub struct Relay {
    locals: Locals,
    config: RelayConfig,
    tick: Arc<TickService>,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            locals: Locals::default(),
            config,
            tick: TickService::new(),
        }
    }

    pub fn locals(&self) -> Locals {
        self.locals.clone()
    }

    /// Accept and drive one connection until it dies.
    pub async fn serve(&self, session: web_transport::Session) -> Result<(), SessionError> {
        let (session, publisher, subscriber) =
            Session::accept(session, &self.config.endpoint_id).await?;

        let conn = RelayConnection {
            locals: self.locals.clone(),
            cache: self.config.cache,
            tick: self.tick.clone(),
            publisher,
            subscriber,
        };

        tokio::select! {
            res = session.run() => res,
            res = conn.run() => res,
        }
    }

    /// Run the background cache sweeper at the configured cadence.
    pub async fn run_sweeper(&self) {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(
            self.config.cache.sweep_interval_ms.max(1),
        ));

        loop {
            interval.tick().await;
            self.locals.sweep();
        }
    }
}

struct RelayConnection {
    locals: Locals,
    cache: CacheConfig,
    tick: Arc<TickService>,
    publisher: Publisher,
    subscriber: Subscriber,
}

impl RelayConnection {
    async fn run(mut self) -> Result<(), SessionError> {
        let mut tasks = FuturesUnordered::<futures::future::BoxFuture<'static, ()>>::new();
        let mut fetch_publisher = self.publisher.clone();
        let mut announce_done = false;
        let mut subscribe_done = false;
        let mut fetch_done = false;

        loop {
            tokio::select! {
                announced = self.subscriber.announced(), if !announce_done => {
                    match announced {
                        Some(announced) => tasks.push(Box::pin(Self::serve_announced(
                            self.locals.clone(),
                            self.subscriber.clone(),
                            self.cache,
                            self.tick.clone(),
                            announced,
                        ))),
                        None => announce_done = true,
                    }
                },
                subscribed = self.publisher.subscribed(), if !subscribe_done => {
                    match subscribed {
                        Some(subscribed) => tasks.push(Box::pin(Self::serve_subscribed(
                            self.locals.clone(),
                            subscribed,
                        ))),
                        None => subscribe_done = true,
                    }
                },
                fetch = fetch_publisher.fetch_requested(), if !fetch_done => {
                    match fetch {
                        Some(fetch) => {
                            tasks.push(Box::pin(Self::serve_fetch(self.locals.clone(), fetch)))
                        }
                        None => fetch_done = true,
                    }
                },
                _ = tasks.next(), if !tasks.is_empty() => {},
                else => return Ok(()),
            }
        }
    }

    /// Accept an announce and keep its namespace routable until the
    /// publisher goes away.
    async fn serve_announced(
        locals: Locals,
        upstream: Subscriber,
        cache: CacheConfig,
        tick: Arc<TickService>,
        mut announced: Announced,
    ) {
        let namespace = announced.info.namespace.clone();
        let tracks = Tracks::new(namespace.clone(), cache, tick);

        let registration = match locals.register(tracks, upstream) {
            Ok(registration) => registration,
            Err(err) => {
                log::warn!(
                    "rejecting duplicate announce: namespace={}",
                    namespace.to_utf8_path()
                );
                announced.close(err).ok();
                return;
            }
        };

        if let Err(err) = announced.ok() {
            log::warn!("failed to accept announce: {}", err);
            return;
        }

        log::info!("announced: namespace={}", namespace.to_utf8_path());

        announced.closed().await.ok();
        drop(registration);

        log::info!("unannounced: namespace={}", namespace.to_utf8_path());
    }

    /// Serve one downstream subscription from the aggregated upstream.
    async fn serve_subscribed(locals: Locals, subscribed: Subscribed) {
        let namespace = subscribed.msg.track_namespace.clone();
        let name = subscribed.msg.track_name.clone();

        // Aggregate: the first subscriber creates the upstream leg.
        let upstream = locals.subscribe(
            &namespace,
            &name,
            SubscribeOptions {
                priority: subscribed.msg.subscriber_priority,
                ..Default::default()
            },
        );

        let (producer, guard) = match upstream {
            Ok(attached) => attached,
            Err(err) => {
                subscribed.reject(err).ok();
                return;
            }
        };

        // Forward downstream SubscribeUpdates upstream (dampened there).
        let mut updates = subscribed.update_watch();
        let forward = async {
            while let Some(update) = updates.next().await {
                guard.update(update);
            }
        };

        let id = subscribed.msg.id;
        let serve = async {
            if let Err(err) = subscribed.serve(producer).await {
                log::warn!("failed serving relay subscribe: id={} error={}", id, err);
            }
        };

        tokio::join!(serve, forward);
    }

    /// Serve a standalone fetch from the relay cache.
    async fn serve_fetch(locals: Locals, fetch: FetchRequested) {
        let Some(standalone) = fetch.msg.standalone.clone() else {
            fetch.error(ServeError::InvalidRange).ok();
            return;
        };
        let (start, end) = (standalone.start_location, standalone.end_location);

        let producer = locals
            .route(&standalone.track_namespace)
            .and_then(|tracks| tracks.get(&standalone.track_name));

        let Some(producer) = producer else {
            fetch.error(ServeError::NotFound).ok();
            return;
        };

        let objects = producer.cache().range(start, end);
        let id = fetch.msg.id;
        if let Err(err) = fetch.serve(objects, false).await {
            log::warn!("failed serving relay fetch: id={} error={}", id, err);
        }
    }
}
