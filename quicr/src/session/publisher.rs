use std::collections::{hash_map, HashMap};
use std::sync::{Arc, Mutex};

use futures::{stream::FuturesUnordered, StreamExt};

use crate::coding::{Location, TrackNamespace};
use crate::message::{self, fetch_error_code, Message};
use crate::serve::{ServeError, Tracks};
use crate::track::TrackHash;
use crate::transport::Transport;
use crate::watch::Queue;

use super::{
    Announce, AnnounceRecv, FetchRequested, FetchRequestedRecv, RequestIds, SessionError,
    Subscribed, SubscribedRecv, TrackStatusRequested,
};

/// The publishing half of a session: announces namespaces, serves
/// subscriptions, fetches and track status requests from the peer.
#[derive(Clone)]
pub struct Publisher {
    webtransport: web_transport::Session,
    transport: Transport,

    /// Outbound announces, by namespace hash, plus the request id index.
    announces: Arc<Mutex<HashMap<u64, AnnounceRecv>>>,
    announce_requests: Arc<Mutex<HashMap<u64, u64>>>,
    announced_tracks: Arc<Mutex<HashMap<u64, Tracks>>>,

    /// Subscriptions from the peer, by request id, plus the alias index.
    subscribed: Arc<Mutex<HashMap<u64, SubscribedRecv>>>,
    subscribed_aliases: Arc<Mutex<HashMap<u64, u64>>>,

    /// In-flight fetches we are serving, by request id.
    fetches: Arc<Mutex<HashMap<u64, FetchRequestedRecv>>>,

    /// Namespace prefixes the peer subscribed to announces for.
    announce_interests: Arc<Mutex<Vec<TrackNamespace>>>,

    /// Subscribes that match no announce; a relay routes these itself.
    unknown_subscribes: Queue<Subscribed>,
    /// Same for fetches.
    unknown_fetches: Queue<FetchRequested>,

    outgoing: Queue<Message>,
    requests: Arc<RequestIds>,
}

impl Publisher {
    pub(super) fn new(
        outgoing: Queue<Message>,
        webtransport: web_transport::Session,
        transport: Transport,
        requests: Arc<RequestIds>,
    ) -> Self {
        Self {
            webtransport,
            transport,
            announces: Default::default(),
            announce_requests: Default::default(),
            announced_tracks: Default::default(),
            subscribed: Default::default(),
            subscribed_aliases: Default::default(),
            fetches: Default::default(),
            announce_interests: Default::default(),
            unknown_subscribes: Default::default(),
            unknown_fetches: Default::default(),
            outgoing,
            requests,
        }
    }

    pub(super) fn transport(&self) -> &Transport {
        &self.transport
    }

    pub(super) async fn open_uni(&mut self) -> Result<web_transport::SendStream, SessionError> {
        Ok(self.webtransport.open_uni().await?)
    }

    /// Announce a namespace and serve its tracks until the announce is
    /// cancelled or all handles drop.
    pub async fn announce(&mut self, tracks: Tracks) -> Result<(), SessionError> {
        let ns_hash = TrackHash::namespace_hash(&tracks.namespace);
        let request_id = match self.requests.next() {
            Ok(id) => id,
            Err(err) => {
                self.outgoing
                    .push(Message::RequestsBlocked(message::RequestsBlocked {
                        max_request_id: self.requests.max(),
                    }))
                    .ok();
                return Err(err);
            }
        };

        let announce = {
            let mut announces = self.announces.lock().unwrap();
            let entry = match announces.entry(ns_hash) {
                hash_map::Entry::Occupied(_) => return Err(ServeError::Duplicate.into()),
                hash_map::Entry::Vacant(entry) => entry,
            };

            let (send, recv) = Announce::new(self.clone(), request_id, tracks.namespace.clone());
            entry.insert(recv);
            send
        };
        self.announce_requests
            .lock()
            .unwrap()
            .insert(request_id, ns_hash);
        self.announced_tracks
            .lock()
            .unwrap()
            .insert(ns_hash, tracks.clone());

        let res = self.announce_inner(&announce, &tracks).await;

        self.announce_requests.lock().unwrap().remove(&request_id);
        self.announced_tracks.lock().unwrap().remove(&ns_hash);
        self.announces.lock().unwrap().remove(&ns_hash);

        res
    }

    async fn announce_inner(
        &mut self,
        announce: &Announce,
        tracks: &Tracks,
    ) -> Result<(), SessionError> {
        let mut subscribe_tasks = FuturesUnordered::new();
        let mut status_done = false;
        let mut subscribe_done = false;

        loop {
            tokio::select! {
                res = announce.subscribed(), if !subscribe_done => {
                    match res? {
                        Some(subscribed) => {
                            let tracks = tracks.clone();
                            subscribe_tasks.push(async move {
                                let id = subscribed.msg.id;
                                if let Err(err) = Self::serve_subscribe(subscribed, tracks).await {
                                    log::warn!("failed serving subscribe: id={} error={}", id, err);
                                }
                            });
                        }
                        None => subscribe_done = true,
                    }
                },
                res = announce.track_status_requested(), if !status_done => {
                    match res? {
                        Some(request) => Self::serve_track_status(request, tracks)?,
                        None => status_done = true,
                    }
                },
                Some(res) = subscribe_tasks.next() => res,
                else => return Ok(()),
            }
        }
    }

    async fn serve_subscribe(subscribed: Subscribed, tracks: Tracks) -> Result<(), SessionError> {
        match tracks.get(&subscribed.msg.track_name) {
            Some(producer) => subscribed.serve(producer).await,
            None => subscribed.reject(ServeError::NotFound),
        }
    }

    fn serve_track_status(
        request: TrackStatusRequested,
        tracks: &Tracks,
    ) -> Result<(), SessionError> {
        match tracks.get(&request.msg.track_name) {
            Some(producer) => {
                let alias = producer.hash().fullname;
                request.respond_ok(alias, producer.latest())?;
            }
            None => request.respond_error(ServeError::NotFound)?,
        }
        Ok(())
    }

    /// Subscriptions that did not match any announce (relay routing).
    pub async fn subscribed(&mut self) -> Option<Subscribed> {
        self.unknown_subscribes.pop().await
    }

    /// Fetches that did not match any announce (relay routing).
    pub async fn fetch_requested(&mut self) -> Option<FetchRequested> {
        self.unknown_fetches.pop().await
    }

    /// True if the peer asked for announces under this namespace.
    pub fn announce_interest(&self, namespace: &TrackNamespace) -> bool {
        self.announce_interests
            .lock()
            .unwrap()
            .iter()
            .any(|prefix| prefix.is_prefix_of(namespace))
    }

    /// Ask the peer to move to another endpoint and drain.
    pub fn go_away(&mut self, uri: &str) {
        self.outgoing
            .push(Message::GoAway(message::GoAway {
                new_session_uri: uri.into(),
            }))
            .ok();
    }

    pub(super) fn send_message<T: Into<message::Publisher> + Into<Message>>(&mut self, msg: T) {
        let msg: message::Publisher = msg.into();

        // Remove our entry on terminal messages.
        match &msg {
            message::Publisher::SubscribeDone(msg) => self.drop_subscribed_by_id(msg.id),
            message::Publisher::SubscribeError(msg) => self.drop_subscribed_by_id(msg.id),
            message::Publisher::Unannounce(msg) => {
                self.drop_announce(&msg.track_namespace);
            }
            _ => (),
        };

        self.outgoing.push(msg.into()).ok();
    }

    pub(super) fn drop_subscribed(&mut self, id: u64, track_alias: u64) {
        self.subscribed.lock().unwrap().remove(&id);
        let mut aliases = self.subscribed_aliases.lock().unwrap();
        if aliases.get(&track_alias) == Some(&id) {
            aliases.remove(&track_alias);
        }
    }

    fn drop_subscribed_by_id(&mut self, id: u64) {
        self.subscribed.lock().unwrap().remove(&id);
        self.subscribed_aliases
            .lock()
            .unwrap()
            .retain(|_, entry| *entry != id);
    }

    fn drop_announce(&mut self, namespace: &TrackNamespace) {
        let ns_hash = TrackHash::namespace_hash(namespace);
        self.announces.lock().unwrap().remove(&ns_hash);
        self.announced_tracks.lock().unwrap().remove(&ns_hash);
    }

    pub(super) fn drop_fetch_requested(&mut self, id: u64) {
        self.fetches.lock().unwrap().remove(&id);
    }

    /// Fold each subscription's data context window into its metrics.
    pub(super) fn sample_metrics(&self, now_us: u64, transport: &Transport) {
        let subscribed = self.subscribed.lock().unwrap();
        for recv in subscribed.values() {
            let Some(ctx) = recv.ctx() else { continue };
            let Some(snapshot) = transport.metrics(ctx) else {
                continue;
            };

            let metrics = recv.metrics();
            let mut metrics = metrics.lock().unwrap();
            metrics.last_sample_time = now_us;
            metrics.quic = snapshot;
        }
    }

    pub(super) fn recv_message(&mut self, msg: message::Subscriber) -> Result<(), SessionError> {
        match msg {
            message::Subscriber::Subscribe(msg) => self.recv_subscribe(msg),
            message::Subscriber::SubscribeUpdate(msg) => self.recv_subscribe_update(msg),
            message::Subscriber::Unsubscribe(msg) => self.recv_unsubscribe(msg),
            message::Subscriber::AnnounceOk(msg) => self.recv_announce_ok(msg),
            message::Subscriber::AnnounceError(msg) => self.recv_announce_error(msg),
            message::Subscriber::AnnounceCancel(msg) => self.recv_announce_cancel(msg),
            message::Subscriber::TrackStatusRequest(msg) => self.recv_track_status_request(msg),
            message::Subscriber::Fetch(msg) => self.recv_fetch(msg),
            message::Subscriber::FetchCancel(msg) => self.recv_fetch_cancel(msg),
            message::Subscriber::SubscribeAnnounces(msg) => self.recv_subscribe_announces(msg),
            message::Subscriber::UnsubscribeAnnounces(msg) => {
                self.recv_unsubscribe_announces(msg)
            }
            message::Subscriber::NewGroupRequest(msg) => self.recv_new_group_request(msg),
        }
    }

    fn recv_subscribe(&mut self, msg: message::Subscribe) -> Result<(), SessionError> {
        self.requests.check_peer(msg.id)?;

        let namespace = msg.track_namespace.clone();
        let track_alias = msg.track_alias;

        // Duplicate aliases within a connection are fatal.
        {
            let mut aliases = self.subscribed_aliases.lock().unwrap();
            match aliases.entry(track_alias) {
                hash_map::Entry::Occupied(_) => {
                    return Err(SessionError::DuplicateTrackAlias(track_alias))
                }
                hash_map::Entry::Vacant(entry) => entry.insert(msg.id),
            };
        }

        let subscribe = {
            let mut subscribed = self.subscribed.lock().unwrap();
            let entry = match subscribed.entry(msg.id) {
                hash_map::Entry::Occupied(_) => {
                    return Err(SessionError::DuplicateRequestId(msg.id))
                }
                hash_map::Entry::Vacant(entry) => entry,
            };

            let (send, recv) = Subscribed::new(self.clone(), msg);
            entry.insert(recv);
            send
        };

        // Route to the matching announce, or hand it to the application.
        let ns_hash = TrackHash::namespace_hash(&namespace);
        if let Some(announce) = self.announces.lock().unwrap().get_mut(&ns_hash) {
            return announce.recv_subscribe(subscribe).map_err(Into::into);
        }

        if let Err(subscribe) = self.unknown_subscribes.push(subscribe) {
            subscribe.reject(ServeError::NotFound)?;
        }

        Ok(())
    }

    fn recv_subscribe_update(&mut self, msg: message::SubscribeUpdate) -> Result<(), SessionError> {
        if let Some(subscribed) = self.subscribed.lock().unwrap().get_mut(&msg.id) {
            subscribed.recv_update(&msg)?;
        }

        Ok(())
    }

    fn recv_unsubscribe(&mut self, msg: message::Unsubscribe) -> Result<(), SessionError> {
        match self.subscribed.lock().unwrap().get_mut(&msg.id) {
            Some(subscribed) => subscribed.recv_unsubscribe()?,
            // Raced with our SubscribeDone; first to arrive won.
            None => log::debug!("unsubscribe for unknown subscription: id={}", msg.id),
        }

        Ok(())
    }

    fn recv_new_group_request(
        &mut self,
        msg: message::NewGroupRequest,
    ) -> Result<(), SessionError> {
        if let Some(subscribed) = self.subscribed.lock().unwrap().get_mut(&msg.id) {
            subscribed.recv_new_group()?;
        }

        Ok(())
    }

    fn recv_announce_ok(&mut self, msg: message::AnnounceOk) -> Result<(), SessionError> {
        let ns_hash = self.announce_requests.lock().unwrap().get(&msg.id).copied();
        if let Some(ns_hash) = ns_hash {
            if let Some(announce) = self.announces.lock().unwrap().get_mut(&ns_hash) {
                announce.recv_ok()?;
            }
        }

        Ok(())
    }

    fn recv_announce_error(&mut self, msg: message::AnnounceError) -> Result<(), SessionError> {
        let ns_hash = self.announce_requests.lock().unwrap().remove(&msg.id);
        if let Some(ns_hash) = ns_hash {
            if let Some(announce) = self.announces.lock().unwrap().remove(&ns_hash) {
                announce.recv_error(ServeError::Closed(msg.error_code))?;
            }
        }

        Ok(())
    }

    fn recv_announce_cancel(&mut self, msg: message::AnnounceCancel) -> Result<(), SessionError> {
        let ns_hash = TrackHash::namespace_hash(&msg.track_namespace);
        if let Some(announce) = self.announces.lock().unwrap().remove(&ns_hash) {
            announce.recv_error(ServeError::Cancel)?;
        }

        Ok(())
    }

    fn recv_track_status_request(
        &mut self,
        msg: message::TrackStatusRequest,
    ) -> Result<(), SessionError> {
        self.requests.check_peer(msg.id)?;

        let ns_hash = TrackHash::namespace_hash(&msg.track_namespace);
        let request = TrackStatusRequested::new(self.clone(), msg);

        if let Some(announce) = self.announces.lock().unwrap().get_mut(&ns_hash) {
            return announce.recv_track_status_requested(request).map_err(Into::into);
        }

        request.respond_error(ServeError::NotFound)?;
        Ok(())
    }

    fn recv_fetch(&mut self, msg: message::Fetch) -> Result<(), SessionError> {
        self.requests.check_peer(msg.id)?;

        let (request, recv) = FetchRequested::new(self.clone(), msg);
        self.fetches.lock().unwrap().insert(request.msg.id, recv);

        match request.msg.fetch_type {
            message::FetchType::Standalone => self.route_standalone_fetch(request),
            message::FetchType::RelativeJoining | message::FetchType::AbsoluteJoining => {
                self.serve_joining_fetch(request)
            }
        }
    }

    fn route_standalone_fetch(&mut self, request: FetchRequested) -> Result<(), SessionError> {
        let standalone = match &request.msg.standalone {
            Some(standalone) => standalone.clone(),
            None => return request.error(ServeError::InvalidRange),
        };

        let ns_hash = TrackHash::namespace_hash(&standalone.track_namespace);
        let producer = self
            .announced_tracks
            .lock()
            .unwrap()
            .get(&ns_hash)
            .and_then(|tracks| tracks.get(&standalone.track_name));

        match producer {
            Some(producer) => {
                let objects = producer
                    .cache()
                    .range(standalone.start_location, standalone.end_location);
                tokio::spawn(async move {
                    let id = request.msg.id;
                    if let Err(err) = request.serve(objects, false).await {
                        log::warn!("failed serving fetch: id={} error={}", id, err);
                    }
                });
                Ok(())
            }
            None => {
                // Let the application (relay) route it, if it's listening.
                if let Err(request) = self.unknown_fetches.push(request) {
                    request.error(ServeError::NotFound)?;
                }
                Ok(())
            }
        }
    }

    fn serve_joining_fetch(&mut self, request: FetchRequested) -> Result<(), SessionError> {
        let joining = match &request.msg.joining {
            Some(joining) => joining.clone(),
            None => return request.error(ServeError::InvalidRange),
        };

        let producer = self
            .subscribed
            .lock()
            .unwrap()
            .get(&joining.joining_request_id)
            .and_then(|subscribed| subscribed.producer());

        let Some(producer) = producer else {
            return request.error(ServeError::Closed(fetch_error_code::UNKNOWN_REQUEST_ID));
        };

        let Some(largest) = producer.latest() else {
            return request.error(ServeError::NoObjects);
        };

        let start_group = match request.msg.fetch_type {
            message::FetchType::RelativeJoining => {
                largest.group_id.saturating_sub(joining.joining_start)
            }
            _ => joining.joining_start,
        };

        let objects = producer
            .cache()
            .range(Location::new(start_group, 0), largest);
        tokio::spawn(async move {
            let id = request.msg.id;
            if let Err(err) = request.serve(objects, false).await {
                log::warn!("failed serving joining fetch: id={} error={}", id, err);
            }
        });

        Ok(())
    }

    fn recv_fetch_cancel(&mut self, msg: message::FetchCancel) -> Result<(), SessionError> {
        if let Some(fetch) = self.fetches.lock().unwrap().get_mut(&msg.id) {
            fetch.recv_cancel();
        }

        Ok(())
    }

    fn recv_subscribe_announces(
        &mut self,
        msg: message::SubscribeAnnounces,
    ) -> Result<(), SessionError> {
        self.requests.check_peer(msg.id)?;

        self.announce_interests
            .lock()
            .unwrap()
            .push(msg.track_namespace_prefix);

        // Authorization is a hook; without one every prefix is accepted.
        self.outgoing
            .push(Message::SubscribeAnnouncesOk(
                message::SubscribeAnnouncesOk { id: msg.id },
            ))
            .ok();

        Ok(())
    }

    fn recv_unsubscribe_announces(
        &mut self,
        msg: message::UnsubscribeAnnounces,
    ) -> Result<(), SessionError> {
        self.announce_interests
            .lock()
            .unwrap()
            .retain(|prefix| *prefix != msg.track_namespace_prefix);

        Ok(())
    }
}
