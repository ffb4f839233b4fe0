use std::collections::{hash_map, HashMap};
use std::io;
use std::sync::{Arc, Mutex};

use crate::cache::CacheObject;
use crate::coding::{Decode, TrackNamespace};
use crate::data;
use crate::message::{self, subscribe_error_code, Message};
use crate::metrics::ConnectionMetrics;
use crate::serve::{ServeError, TrackProducer};
use crate::track::{ObjectHeaders, TrackHash};
use crate::watch::{Queue, State};

use super::{
    track_status_pair, Announced, AnnouncedRecv, Fetch, FetchOptions, FetchRange, FetchRecv,
    Reader, RequestIds, SessionError, Subscribe, SubscribeOptions, SubscribeRecv, TrackStatus,
    TrackStatusRecv,
};

/// Objects processed per stream wake-up before yielding, so a bursty stream
/// cannot starve its siblings.
pub const READ_LOOP_MAX_PER_STREAM: usize = 60;

pub(super) struct AnnouncesInterestState {
    pub ok: bool,
    pub closed: Result<(), ServeError>,
}

impl Default for AnnouncesInterestState {
    fn default() -> Self {
        Self {
            ok: false,
            closed: Ok(()),
        }
    }
}

/// An open SubscribeAnnounces dialog: announces under the prefix arrive via
/// [Subscriber::announced]. Unsubscribes from the prefix on drop.
#[must_use = "unsubscribe announces on drop"]
pub struct AnnouncesInterest {
    state: State<AnnouncesInterestState>,
    subscriber: Subscriber,

    pub prefix: TrackNamespace,
    pub request_id: u64,
}

impl AnnouncesInterest {
    /// Wait until the peer accepts the prefix.
    pub async fn ok(&self) -> Result<(), ServeError> {
        loop {
            {
                let state = self.state.lock();
                if state.ok {
                    return Ok(());
                }
                state.closed.clone()?;

                match state.modified() {
                    Some(notified) => notified,
                    None => return Err(ServeError::Done),
                }
            }
            .await;
        }
    }
}

impl Drop for AnnouncesInterest {
    fn drop(&mut self) {
        let mut subscriber = self.subscriber.clone();
        subscriber.send_message(message::UnsubscribeAnnounces {
            track_namespace_prefix: self.prefix.clone(),
        });
        subscriber
            .announce_interests
            .lock()
            .unwrap()
            .remove(&self.request_id);
    }
}

pub(super) struct AnnouncesInterestRecv {
    pub state: State<AnnouncesInterestState>,
}

/// The subscribing half of a session: issues subscribes and fetches, routes
/// inbound announces, objects and replies.
#[derive(Clone)]
pub struct Subscriber {
    /// Inbound announces, by namespace hash.
    announced: Arc<Mutex<HashMap<u64, AnnouncedRecv>>>,
    announced_queue: Queue<Announced>,

    /// Outbound subscriptions, by request id, plus the alias index.
    subscribes: Arc<Mutex<HashMap<u64, SubscribeRecv>>>,
    subscribe_aliases: Arc<Mutex<HashMap<u64, u64>>>,

    /// Outbound fetches, by request id.
    fetches: Arc<Mutex<HashMap<u64, FetchRecv>>>,

    /// Outbound track status dialogs, by request id.
    track_statuses: Arc<Mutex<HashMap<u64, TrackStatusRecv>>>,

    /// Outbound SubscribeAnnounces dialogs, by request id.
    announce_interests: Arc<Mutex<HashMap<u64, AnnouncesInterestRecv>>>,

    outgoing: Queue<Message>,
    requests: Arc<RequestIds>,
    metrics: Arc<Mutex<ConnectionMetrics>>,
}

impl Subscriber {
    pub(super) fn new(
        outgoing: Queue<Message>,
        requests: Arc<RequestIds>,
        metrics: Arc<Mutex<ConnectionMetrics>>,
    ) -> Self {
        Self {
            announced: Default::default(),
            announced_queue: Default::default(),
            subscribes: Default::default(),
            subscribe_aliases: Default::default(),
            fetches: Default::default(),
            track_statuses: Default::default(),
            announce_interests: Default::default(),
            outgoing,
            requests,
            metrics,
        }
    }

    /// Claim a request id, telling the peer when we are blocked on its
    /// MaxRequestId window.
    fn next_request(&mut self) -> Result<u64, SessionError> {
        match self.requests.next() {
            Ok(id) => Ok(id),
            Err(err) => {
                self.outgoing
                    .push(Message::RequestsBlocked(message::RequestsBlocked {
                        max_request_id: self.requests.max(),
                    }))
                    .ok();
                Err(err)
            }
        }
    }

    /// The next namespace the peer announced, if any.
    pub async fn announced(&mut self) -> Option<Announced> {
        self.announced_queue.pop().await
    }

    /// Subscribe to a track; received objects flow into the producer.
    pub fn subscribe(
        &mut self,
        producer: TrackProducer,
        options: SubscribeOptions,
    ) -> Result<Subscribe, SessionError> {
        let request_id = self.next_request()?;
        let (send, recv) = Subscribe::new(self.clone(), request_id, producer, &options);

        self.subscribe_aliases
            .lock()
            .unwrap()
            .insert(send.track_alias(), request_id);
        self.subscribes.lock().unwrap().insert(request_id, recv);

        Ok(send)
    }

    /// Fetch a standalone range of a named track.
    pub fn fetch(
        &mut self,
        namespace: TrackNamespace,
        name: Vec<u8>,
        range: FetchRange,
        options: FetchOptions,
    ) -> Result<Fetch, SessionError> {
        let request_id = self.next_request()?;
        let (send, recv) = Fetch::new(
            self.clone(),
            request_id,
            range,
            &options,
            Some((namespace, name)),
        );

        self.fetches.lock().unwrap().insert(request_id, recv);
        Ok(send)
    }

    /// Fetch groups joined to one of our live subscriptions.
    pub fn joining_fetch(
        &mut self,
        range: FetchRange,
        options: FetchOptions,
    ) -> Result<Fetch, SessionError> {
        let request_id = self.next_request()?;
        let (send, recv) = Fetch::new(self.clone(), request_id, range, &options, None);

        self.fetches.lock().unwrap().insert(request_id, recv);
        Ok(send)
    }

    /// Query a track's status without subscribing.
    pub fn track_status(
        &mut self,
        namespace: TrackNamespace,
        name: Vec<u8>,
    ) -> Result<TrackStatus, SessionError> {
        let request_id = self.next_request()?;
        let (send, recv) = track_status_pair(self, request_id, namespace, name);

        self.track_statuses.lock().unwrap().insert(request_id, recv);
        Ok(send)
    }

    /// Ask to be told about announces under a namespace prefix.
    pub fn subscribe_announces(
        &mut self,
        prefix: TrackNamespace,
    ) -> Result<AnnouncesInterest, SessionError> {
        let request_id = self.next_request()?;

        self.send_message(message::SubscribeAnnounces {
            id: request_id,
            track_namespace_prefix: prefix.clone(),
            params: Default::default(),
        });

        let (send, recv) = State::default().split();
        self.announce_interests
            .lock()
            .unwrap()
            .insert(request_id, AnnouncesInterestRecv { state: recv });

        Ok(AnnouncesInterest {
            state: send,
            subscriber: self.clone(),
            prefix,
            request_id,
        })
    }

    /// Ask the peer to move to another endpoint and drain.
    pub fn go_away(&mut self, uri: &str) {
        self.outgoing
            .push(Message::GoAway(message::GoAway {
                new_session_uri: uri.into(),
            }))
            .ok();
    }

    pub(super) fn send_message<M: Into<message::Subscriber> + Into<Message>>(&mut self, msg: M) {
        let msg: Message = msg.into();
        self.outgoing.push(msg).ok();
    }

    pub(super) fn drop_subscribe(&mut self, id: u64) {
        if let Some(subscribe) = self.subscribes.lock().unwrap().remove(&id) {
            let alias = subscribe.track_alias();
            let mut aliases = self.subscribe_aliases.lock().unwrap();
            if aliases.get(&alias) == Some(&id) {
                aliases.remove(&alias);
            }
        }
    }

    pub(super) fn drop_fetch(&mut self, id: u64) {
        self.fetches.lock().unwrap().remove(&id);
    }

    pub(super) fn sample_metrics(&self, now_us: u64) {
        let subscribes = self.subscribes.lock().unwrap();
        for recv in subscribes.values() {
            let metrics = recv.metrics();
            metrics.lock().unwrap().last_sample_time = now_us;
        }
    }

    pub(super) fn recv_message(&mut self, msg: message::Publisher) -> Result<(), SessionError> {
        match msg {
            message::Publisher::Announce(msg) => self.recv_announce(msg),
            message::Publisher::Unannounce(msg) => self.recv_unannounce(msg),
            message::Publisher::SubscribeOk(msg) => self.recv_subscribe_ok(msg),
            message::Publisher::SubscribeError(msg) => self.recv_subscribe_error(msg),
            message::Publisher::SubscribeDone(msg) => self.recv_subscribe_done(msg),
            message::Publisher::TrackStatusOk(msg) => self.recv_track_status_ok(msg),
            message::Publisher::TrackStatusError(msg) => self.recv_track_status_error(msg),
            message::Publisher::FetchOk(msg) => self.recv_fetch_ok(msg),
            message::Publisher::FetchError(msg) => self.recv_fetch_error(msg),
            message::Publisher::SubscribeAnnouncesOk(msg) => self.recv_subscribe_announces_ok(msg),
            message::Publisher::SubscribeAnnouncesError(msg) => {
                self.recv_subscribe_announces_error(msg)
            }
        }
    }

    fn recv_announce(&mut self, msg: message::Announce) -> Result<(), SessionError> {
        self.requests.check_peer(msg.id)?;

        let ns_hash = TrackHash::namespace_hash(&msg.track_namespace);
        let mut announced = self.announced.lock().unwrap();

        let entry = match announced.entry(ns_hash) {
            hash_map::Entry::Occupied(_) => {
                return Err(SessionError::ProtocolViolation("duplicate announce"))
            }
            hash_map::Entry::Vacant(entry) => entry,
        };

        let (send, recv) = Announced::new(self.clone(), msg.id, msg.track_namespace);
        if let Err(send) = self.announced_queue.push(send) {
            send.close(ServeError::Cancel)?;
            return Ok(());
        }
        entry.insert(recv);

        Ok(())
    }

    fn recv_unannounce(&mut self, msg: message::Unannounce) -> Result<(), SessionError> {
        let ns_hash = TrackHash::namespace_hash(&msg.track_namespace);
        if let Some(announced) = self.announced.lock().unwrap().remove(&ns_hash) {
            announced.recv_unannounce()?;
        }

        Ok(())
    }

    fn recv_subscribe_ok(&mut self, msg: message::SubscribeOk) -> Result<(), SessionError> {
        if let Some(subscribe) = self.subscribes.lock().unwrap().get_mut(&msg.id) {
            self.subscribe_aliases
                .lock()
                .unwrap()
                .insert(msg.track_alias, msg.id);
            subscribe.recv_ok(&msg)?;
        }

        Ok(())
    }

    fn recv_subscribe_error(&mut self, msg: message::SubscribeError) -> Result<(), SessionError> {
        let subscribe = self.subscribes.lock().unwrap().remove(&msg.id);
        let Some(mut subscribe) = subscribe else {
            return Ok(());
        };

        {
            let mut aliases = self.subscribe_aliases.lock().unwrap();
            aliases.retain(|_, id| *id != msg.id);
        }

        // RetryTrackAlias re-issues the subscribe with the corrected alias
        // under a fresh request id; ids are never reused.
        let retrying = msg.error_code == subscribe_error_code::RETRY_TRACK_ALIAS;
        let retry_id = match retrying {
            true => self.requests.next()?,
            false => 0,
        };

        if let Some(retry) = subscribe.recv_error(&msg, retry_id)? {
            self.subscribe_aliases
                .lock()
                .unwrap()
                .insert(retry.track_alias, retry_id);
            self.subscribes.lock().unwrap().insert(retry_id, subscribe);
            self.send_message(retry);
        }

        Ok(())
    }

    fn recv_subscribe_done(&mut self, msg: message::SubscribeDone) -> Result<(), SessionError> {
        let subscribe = self.subscribes.lock().unwrap().remove(&msg.id);
        match subscribe {
            Some(mut subscribe) => {
                let alias = subscribe.track_alias();
                let mut aliases = self.subscribe_aliases.lock().unwrap();
                if aliases.get(&alias) == Some(&msg.id) {
                    aliases.remove(&alias);
                }
                drop(aliases);

                let err = match msg.status_code {
                    0 => ServeError::Done,
                    code => ServeError::Closed(code),
                };
                subscribe.close(err)?;
            }
            // Raced with our Unsubscribe; first to arrive won.
            None => log::debug!("subscribe done for unknown subscription: id={}", msg.id),
        }

        Ok(())
    }

    fn recv_track_status_ok(&mut self, msg: message::TrackStatusOk) -> Result<(), SessionError> {
        if let Some(status) = self.track_statuses.lock().unwrap().get_mut(&msg.id) {
            status.recv_ok(&msg)?;
        }

        Ok(())
    }

    fn recv_track_status_error(
        &mut self,
        msg: message::TrackStatusError,
    ) -> Result<(), SessionError> {
        if let Some(mut status) = self.track_statuses.lock().unwrap().remove(&msg.id) {
            status.recv_error(ServeError::Closed(msg.error_code))?;
        }

        Ok(())
    }

    fn recv_fetch_ok(&mut self, msg: message::FetchOk) -> Result<(), SessionError> {
        if let Some(fetch) = self.fetches.lock().unwrap().get_mut(&msg.id) {
            fetch.recv_ok(&msg)?;
        }

        Ok(())
    }

    fn recv_fetch_error(&mut self, msg: message::FetchError) -> Result<(), SessionError> {
        if let Some(mut fetch) = self.fetches.lock().unwrap().remove(&msg.id) {
            fetch.recv_error(ServeError::Closed(msg.error_code))?;
        }

        Ok(())
    }

    fn recv_subscribe_announces_ok(
        &mut self,
        msg: message::SubscribeAnnouncesOk,
    ) -> Result<(), SessionError> {
        if let Some(interest) = self.announce_interests.lock().unwrap().get_mut(&msg.id) {
            if let Some(mut state) = interest.state.lock_mut() {
                state.ok = true;
            }
        }

        Ok(())
    }

    fn recv_subscribe_announces_error(
        &mut self,
        msg: message::SubscribeAnnouncesError,
    ) -> Result<(), SessionError> {
        if let Some(interest) = self.announce_interests.lock().unwrap().remove(&msg.id) {
            if let Some(mut state) = interest.state.lock_mut() {
                state.closed = Err(ServeError::Closed(msg.error_code));
            }
        }

        Ok(())
    }

    fn subscribe_by_alias(&self, track_alias: u64) -> Option<u64> {
        self.subscribe_aliases
            .lock()
            .unwrap()
            .get(&track_alias)
            .copied()
    }

    /// Handle a new unidirectional data stream.
    pub(super) async fn recv_stream(
        mut self,
        stream: web_transport::RecvStream,
    ) -> Result<(), SessionError> {
        let mut reader = Reader::new(stream);

        let header: data::StreamHeader = match reader.decode().await {
            Ok(header) => header,
            Err(err) => {
                let mut metrics = self.metrics.lock().unwrap();
                match err {
                    SessionError::Decode(data_err) => {
                        metrics.rx_stream_invalid_type += 1;
                        return Err(data_err.into());
                    }
                    err => return Err(err),
                }
            }
        };

        let res = match header {
            data::StreamHeader::Subgroup(header) => self.recv_subgroup(header, reader).await,
            data::StreamHeader::Fetch(header) => self.recv_fetch_stream(header, reader).await,
        };

        if res.is_err() {
            // Object-plane decode failures drop this stream only; the
            // connection survives.
            self.metrics.lock().unwrap().rx_stream_buffer_error += 1;
        }

        res
    }

    async fn recv_subgroup(
        &mut self,
        header: data::SubgroupHeader,
        mut reader: Reader,
    ) -> Result<(), SessionError> {
        let request_id = match self.subscribe_by_alias(header.track_alias) {
            Some(request_id) => request_id,
            None => {
                self.metrics.lock().unwrap().rx_stream_unknown_track_alias += 1;
                return Err(ServeError::NotFound.into());
            }
        };

        log::debug!(
            "receiving subgroup: alias={} group={} subgroup={:?}",
            header.track_alias,
            header.group_id,
            header.subgroup_id
        );

        // The subgroup id may be implicit: zero, or the first object id.
        let mut subgroup_id = match header.header_type.has_subgroup_id() {
            true => header.subgroup_id,
            false if header.header_type.subgroup_is_first_object_id() => None,
            false => Some(0),
        };

        let header_type = header.header_type;
        let mut last_object_id: Option<u64> = None;
        let mut since_yield = 0;

        while !reader.done().await? {
            let object = reader
                .decode_object(|buf| data::SubgroupObject::decode_tail(header_type, buf))
                .await?;

            // Object ids are strictly increasing within a subgroup stream.
            if last_object_id.is_some() && Some(object.object_id) <= last_object_id {
                return Err(SessionError::ProtocolViolation(
                    "object id not increasing within subgroup",
                ));
            }
            last_object_id = Some(object.object_id);

            let subgroup = *subgroup_id.get_or_insert(object.object_id);

            let headers = ObjectHeaders {
                group_id: header.group_id,
                subgroup_id: Some(subgroup),
                object_id: object.object_id,
                priority: header.publisher_priority,
                payload_length: object.payload.len() as u64,
                status: object.status.unwrap_or_default(),
                extensions: object.extension_headers,
                ttl: None,
            };

            if let Some(subscribe) = self.subscribes.lock().unwrap().get_mut(&request_id) {
                subscribe.recv_object(headers, object.payload);
            }

            // Don't starve sibling streams on a burst.
            since_yield += 1;
            if since_yield >= READ_LOOP_MAX_PER_STREAM {
                since_yield = 0;
                tokio::task::yield_now().await;
            }
        }

        Ok(())
    }

    async fn recv_fetch_stream(
        &mut self,
        header: data::FetchHeader,
        mut reader: Reader,
    ) -> Result<(), SessionError> {
        let request_id = header.request_id;
        log::debug!("receiving fetch stream: id={}", request_id);

        let mut since_yield = 0;
        while !reader.done().await? {
            let object: data::FetchObject = reader.decode().await?;

            let headers = ObjectHeaders {
                group_id: object.group_id,
                subgroup_id: Some(object.subgroup_id),
                object_id: object.object_id,
                priority: object.publisher_priority,
                payload_length: object.payload.len() as u64,
                status: object.status.unwrap_or_default(),
                extensions: match object.extension_headers.is_empty() {
                    true => None,
                    false => Some(object.extension_headers),
                },
                ttl: None,
            };

            if let Some(fetch) = self.fetches.lock().unwrap().get_mut(&request_id) {
                fetch.recv_object(CacheObject {
                    headers,
                    payload: object.payload,
                });
            }

            since_yield += 1;
            if since_yield >= READ_LOOP_MAX_PER_STREAM {
                since_yield = 0;
                tokio::task::yield_now().await;
            }
        }

        // FIN ends the fetch.
        if let Some(fetch) = self.fetches.lock().unwrap().get_mut(&request_id) {
            fetch.recv_fin();
        }

        Ok(())
    }

    /// Handle a received datagram.
    pub(super) fn recv_datagram(&mut self, datagram: bytes::Bytes) -> Result<(), SessionError> {
        let mut cursor = io::Cursor::new(datagram);
        let datagram = match data::Datagram::decode(&mut cursor) {
            Ok(datagram) => datagram,
            Err(err) => {
                let mut metrics = self.metrics.lock().unwrap();
                match err {
                    crate::coding::DecodeError::InvalidDatagramType => {
                        metrics.rx_dgram_invalid_type += 1
                    }
                    _ => metrics.rx_dgram_decode_failed += 1,
                }
                return Ok(());
            }
        };

        let request_id = match self.subscribe_by_alias(datagram.track_alias) {
            Some(request_id) => request_id,
            None => {
                self.metrics.lock().unwrap().rx_dgram_unknown_track_alias += 1;
                return Ok(());
            }
        };

        let payload = datagram.payload.unwrap_or_default();
        let headers = ObjectHeaders {
            group_id: datagram.group_id,
            subgroup_id: None,
            object_id: datagram.object_id,
            priority: datagram.publisher_priority,
            payload_length: payload.len() as u64,
            status: datagram.status.unwrap_or_default(),
            extensions: datagram.extension_headers,
            ttl: None,
        };

        if let Some(subscribe) = self.subscribes.lock().unwrap().get_mut(&request_id) {
            subscribe.recv_object(headers, payload);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::coding::Encode;
    use crate::message::GroupOrder;
    use crate::serve::{SubscribeFilter, Track};
    use crate::session::SubscribeStatus;
    use crate::transport::TickService;
    use bytes::BytesMut;

    fn subscriber() -> (Subscriber, Queue<Message>) {
        let (tx, rx) = Queue::default().split();
        let requests = Arc::new(RequestIds::new(true));
        let subscriber = Subscriber::new(tx, requests, Default::default());
        (subscriber, rx)
    }

    fn producer() -> TrackProducer {
        Track::new(
            TrackNamespace::from_utf8_path("conf.example.com/conf/1"),
            b"alice/video".to_vec(),
        )
        .produce(CacheConfig::default(), TickService::new())
    }

    async fn pop_subscribe(outgoing: &mut Queue<Message>) -> message::Subscribe {
        match outgoing.pop().await.unwrap() {
            Message::Subscribe(msg) => msg,
            other => panic!("expected Subscribe, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retry_track_alias() {
        let (mut subscriber, mut outgoing) = subscriber();
        let producer = producer();
        let required_alias = producer.hash().fullname;

        // Propose a bogus alias.
        let subscribe = subscriber
            .subscribe(
                producer.clone(),
                SubscribeOptions {
                    track_alias: Some(42),
                    ..Default::default()
                },
            )
            .unwrap();

        let msg = pop_subscribe(&mut outgoing).await;
        assert_eq!(msg.id, 0);
        assert_eq!(msg.track_alias, 42);

        // The publisher demands the hash-derived alias.
        subscriber
            .recv_message(message::Publisher::SubscribeError(
                message::SubscribeError {
                    id: 0,
                    error_code: subscribe_error_code::RETRY_TRACK_ALIAS,
                    reason: crate::coding::ReasonPhrase("retry".to_string()),
                    track_alias: required_alias,
                },
            ))
            .unwrap();

        // A corrected Subscribe goes out under a fresh request id.
        let retry = pop_subscribe(&mut outgoing).await;
        assert_eq!(retry.id, 2);
        assert_eq!(retry.track_alias, required_alias);
        assert_eq!(subscribe.status(), SubscribeStatus::Retrying);

        // Second attempt is accepted.
        subscriber
            .recv_message(message::Publisher::SubscribeOk(message::SubscribeOk {
                id: 2,
                track_alias: required_alias,
                expires: 0,
                group_order: GroupOrder::Ascending,
                content_exists: false,
                largest_location: None,
                params: Default::default(),
            }))
            .unwrap();

        subscribe.ok().await.unwrap();
        assert_eq!(subscribe.status(), SubscribeStatus::Ok);
        assert_eq!(subscribe.track_alias(), required_alias);
        assert_eq!(subscribe.request_id(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn datagram_routed_to_track() {
        let (mut subscriber, mut outgoing) = subscriber();
        let producer = producer();
        let mut consumer = producer.subscribe(SubscribeFilter::LatestGroup);

        let subscribe = subscriber
            .subscribe(producer.clone(), SubscribeOptions::default())
            .unwrap();
        let msg = pop_subscribe(&mut outgoing).await;

        let mut buf = BytesMut::new();
        data::Datagram {
            datagram_type: data::DatagramType::NoEndOfGroupNoExtensions,
            track_alias: msg.track_alias,
            group_id: 0x1000,
            object_id: 0,
            publisher_priority: 10,
            extension_headers: None,
            status: None,
            payload: Some(bytes::Bytes::from_static(b"hello")),
        }
        .encode(&mut buf)
        .unwrap();

        subscriber.recv_datagram(buf.freeze()).unwrap();

        let object = consumer.next_object().await.unwrap().unwrap();
        assert_eq!(object.headers.group_id, 0x1000);
        assert_eq!(object.headers.object_id, 0);
        assert_eq!(object.headers.subgroup_id, None);
        assert_eq!(object.payload.as_ref(), b"hello");

        let metrics = subscribe.metrics();
        assert_eq!(metrics.objects_received, 1);
        assert_eq!(metrics.bytes_received, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_alias_counted() {
        let (mut subscriber, _outgoing) = subscriber();

        let mut buf = BytesMut::new();
        data::Datagram {
            datagram_type: data::DatagramType::NoEndOfGroupNoExtensions,
            track_alias: 999,
            group_id: 1,
            object_id: 0,
            publisher_priority: 10,
            extension_headers: None,
            status: None,
            payload: Some(bytes::Bytes::from_static(b"x")),
        }
        .encode(&mut buf)
        .unwrap();

        subscriber.recv_datagram(buf.freeze()).unwrap();
        assert_eq!(
            subscriber.metrics.lock().unwrap().rx_dgram_unknown_track_alias,
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn subscribe_update_damping() {
        use crate::coding::Location;
        use crate::session::{SubscribeUpdateInfo, SUBSCRIBE_UPDATE_INTERVAL};

        let (mut subscriber, mut outgoing) = subscriber();
        let producer = producer();
        let mut subscribe = subscriber
            .subscribe(producer, SubscribeOptions::default())
            .unwrap();
        let _ = pop_subscribe(&mut outgoing).await;

        let update = |group| SubscribeUpdateInfo {
            start_location: Location::new(group, 0),
            end_group: 0,
            priority: 64,
            forward: true,
        };

        // A burst of three updates.
        subscribe.update(update(1));
        subscribe.update(update(2));
        subscribe.update(update(3));

        // The first goes out immediately.
        match outgoing.pop().await.unwrap() {
            Message::SubscribeUpdate(msg) => assert_eq!(msg.start_location.group_id, 1),
            other => panic!("expected SubscribeUpdate, got {:?}", other),
        }

        // The rest coalesce into the newest once the window reopens.
        tokio::time::advance(SUBSCRIBE_UPDATE_INTERVAL).await;
        match outgoing.pop().await.unwrap() {
            Message::SubscribeUpdate(msg) => assert_eq!(msg.start_location.group_id, 3),
            other => panic!("expected SubscribeUpdate, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_on_drop() {
        let (mut subscriber, mut outgoing) = subscriber();
        let producer = producer();

        let subscribe = subscriber
            .subscribe(producer, SubscribeOptions::default())
            .unwrap();
        let msg = pop_subscribe(&mut outgoing).await;

        drop(subscribe);

        match outgoing.pop().await.unwrap() {
            Message::Unsubscribe(unsub) => assert_eq!(unsub.id, msg.id),
            other => panic!("expected Unsubscribe, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn subscribe_done_closes_track() {
        let (mut subscriber, mut outgoing) = subscriber();
        let producer = producer();
        let mut consumer = producer.subscribe(SubscribeFilter::LatestObject);

        let subscribe = subscriber
            .subscribe(producer.clone(), SubscribeOptions::default())
            .unwrap();
        let msg = pop_subscribe(&mut outgoing).await;

        subscriber
            .recv_message(message::Publisher::SubscribeDone(message::SubscribeDone {
                id: msg.id,
                status_code: 0,
                stream_count: 0,
                reason: crate::coding::ReasonPhrase("done".to_string()),
            }))
            .unwrap();

        // The track ends cleanly for every consumer.
        assert!(consumer.next_object().await.unwrap().is_none());
        subscribe.closed().await.unwrap_err();
    }
}
