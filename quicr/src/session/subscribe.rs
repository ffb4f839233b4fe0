use std::ops;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::coding::Location;
use crate::message::{self, subscribe_error_code, FilterType, GroupOrder};
use crate::metrics::SubscribeTrackMetrics;
use crate::serve::{ServeError, SubscribeFilter, Track, TrackProducer};
use crate::setup::ParameterType;
use crate::track::TrackHash;
use crate::watch::State;

use super::Subscriber;

/// Knobs for a new subscription.
#[derive(Clone, Debug)]
pub struct SubscribeOptions {
    pub filter: SubscribeFilter,

    /// Subscriber priority, where **smaller** values are sent first.
    pub priority: u8,

    pub group_order: GroupOrder,

    /// Objects older than this are dropped instead of delivered.
    pub delivery_timeout: Option<Duration>,

    /// Track alias to propose; defaults to the fullname hash.
    pub track_alias: Option<u64>,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            filter: SubscribeFilter::LatestGroup,
            priority: 127,
            group_order: GroupOrder::Publisher,
            delivery_timeout: None,
            track_alias: None,
        }
    }
}

/// A narrowing or re-prioritization of a live subscription.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubscribeUpdateInfo {
    pub start_location: Location,
    pub end_group: u64,
    pub priority: u8,
    pub forward: bool,
}

/// Subscription handler status, watchable by the application.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubscribeStatus {
    PendingResponse,
    /// Rejected with RetryTrackAlias; a corrected Subscribe is in flight.
    Retrying,
    Ok,
    Closed,
}

pub(super) struct SubscribeState {
    pub request_id: u64,
    pub track_alias: u64,
    pub status: SubscribeStatus,
    pub largest: Option<Location>,
    pub closed: Result<(), ServeError>,

    // SubscribeUpdate damping.
    pub pending_update: Option<SubscribeUpdateInfo>,
    pub last_update_at: Option<tokio::time::Instant>,
    pub flush_scheduled: bool,
}

impl SubscribeState {
    fn new(request_id: u64, track_alias: u64) -> Self {
        Self {
            request_id,
            track_alias,
            status: SubscribeStatus::PendingResponse,
            largest: None,
            closed: Ok(()),
            pending_update: None,
            last_update_at: None,
            flush_scheduled: false,
        }
    }
}

/// Minimum spacing between SubscribeUpdate emissions.
pub const SUBSCRIBE_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

/// An outbound subscription, held by the application (or the relay, for its
/// upstream leg). Unsubscribes on drop.
#[must_use = "unsubscribe on drop"]
pub struct Subscribe {
    state: State<SubscribeState>,
    subscriber: Subscriber,
    metrics: Arc<Mutex<SubscribeTrackMetrics>>,

    pub info: Arc<Track>,
}

impl Subscribe {
    pub(super) fn new(
        mut subscriber: Subscriber,
        request_id: u64,
        producer: TrackProducer,
        options: &SubscribeOptions,
    ) -> (Subscribe, SubscribeRecv) {
        let track = Track::new(producer.namespace.clone(), producer.name.clone());
        let hash = TrackHash::new(&track.full_name());
        let track_alias = options.track_alias.unwrap_or(hash.fullname);

        let msg = subscribe_message(request_id, track_alias, &track, options);
        subscriber.send_message(msg.clone());

        let (send, recv) = State::new(SubscribeState::new(request_id, track_alias)).split();
        let metrics = Arc::new(Mutex::new(SubscribeTrackMetrics::default()));

        let send = Subscribe {
            state: send,
            subscriber,
            metrics: metrics.clone(),
            info: Arc::new(track),
        };

        let recv = SubscribeRecv {
            state: recv,
            producer,
            msg,
            metrics,
            retried: false,
        };

        (send, recv)
    }

    pub fn status(&self) -> SubscribeStatus {
        self.state.lock().status
    }

    pub fn request_id(&self) -> u64 {
        self.state.lock().request_id
    }

    pub fn track_alias(&self) -> u64 {
        self.state.lock().track_alias
    }

    /// The largest location the publisher reported in SubscribeOk.
    pub fn largest(&self) -> Option<Location> {
        self.state.lock().largest
    }

    pub fn metrics(&self) -> SubscribeTrackMetrics {
        *self.metrics.lock().unwrap()
    }

    /// Wait until the subscription is accepted.
    pub async fn ok(&self) -> Result<(), ServeError> {
        loop {
            {
                let state = self.state.lock();
                if state.status == SubscribeStatus::Ok {
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

    /// Wait until the subscription ends, returning the close reason.
    pub async fn closed(&self) -> Result<(), ServeError> {
        loop {
            {
                let state = self.state.lock();
                state.closed.clone()?;

                match state.modified() {
                    Some(notified) => notified,
                    None => return Ok(()),
                }
            }
            .await;
        }
    }

    /// Ask the publisher to start a fresh group so we get a clean stream
    /// boundary.
    pub fn request_new_group(&mut self) {
        let (id, alias) = {
            let state = self.state.lock();
            (state.request_id, state.track_alias)
        };
        self.subscriber.send_message(message::NewGroupRequest {
            id,
            track_alias: alias,
        });
    }

    /// Send a SubscribeUpdate, dampened to at most one per
    /// [SUBSCRIBE_UPDATE_INTERVAL]. Bursts are coalesced: the newest update
    /// wins and is flushed when the window reopens.
    pub fn update(&mut self, update: SubscribeUpdateInfo) {
        let now = tokio::time::Instant::now();

        let send_now = {
            let Some(mut state) = self.state.lock_mut() else {
                return;
            };

            let elapsed = state
                .last_update_at
                .map_or(SUBSCRIBE_UPDATE_INTERVAL, |at| now.duration_since(at));

            if elapsed >= SUBSCRIBE_UPDATE_INTERVAL {
                state.last_update_at = Some(now);
                state.pending_update = None;
                true
            } else {
                state.pending_update = Some(update);
                if !state.flush_scheduled {
                    state.flush_scheduled = true;
                    let delay = SUBSCRIBE_UPDATE_INTERVAL - elapsed;
                    let state = self.state.clone();
                    let subscriber = self.subscriber.clone();
                    tokio::spawn(Self::flush_update(state, subscriber, delay));
                }
                false
            }
        };

        if send_now {
            let id = self.state.lock().request_id;
            self.subscriber.send_message(update_message(id, &update));
        }
    }

    async fn flush_update(
        state: State<SubscribeState>,
        mut subscriber: Subscriber,
        delay: Duration,
    ) {
        tokio::time::sleep(delay).await;

        let flush = {
            let Some(mut state) = state.lock_mut() else {
                return;
            };
            state.flush_scheduled = false;
            match state.pending_update.take() {
                Some(update) => {
                    state.last_update_at = Some(tokio::time::Instant::now());
                    Some((state.request_id, update))
                }
                None => None,
            }
        };

        if let Some((id, update)) = flush {
            subscriber.send_message(update_message(id, &update));
        }
    }
}

impl Drop for Subscribe {
    fn drop(&mut self) {
        let (id, live) = {
            let state = self.state.lock();
            (state.request_id, state.closed.is_ok())
        };

        if live {
            self.subscriber.send_message(message::Unsubscribe { id });
        }
        self.subscriber.drop_subscribe(id);
    }
}

impl ops::Deref for Subscribe {
    type Target = Track;

    fn deref(&self) -> &Track {
        &self.info
    }
}

fn subscribe_message(
    request_id: u64,
    track_alias: u64,
    track: &Track,
    options: &SubscribeOptions,
) -> message::Subscribe {
    let (filter_type, start_location, end_group) = match options.filter {
        SubscribeFilter::LatestObject => (FilterType::LatestObject, None, None),
        SubscribeFilter::LatestGroup => (FilterType::LatestGroup, None, None),
        SubscribeFilter::AbsoluteStart(start) => (FilterType::AbsoluteStart, Some(start), None),
        SubscribeFilter::AbsoluteRange(start, end) => {
            (FilterType::AbsoluteRange, Some(start), Some(end))
        }
    };

    let mut params = crate::coding::KeyValuePairs::new();
    if let Some(timeout) = options.delivery_timeout {
        params.set_intvalue(
            ParameterType::DeliveryTimeout.into(),
            timeout.as_millis() as u64,
        );
    }

    message::Subscribe {
        id: request_id,
        track_alias,
        track_namespace: track.namespace.clone(),
        track_name: track.name.clone(),
        subscriber_priority: options.priority,
        group_order: options.group_order,
        filter_type,
        start_location,
        end_group,
        params,
    }
}

fn update_message(id: u64, update: &SubscribeUpdateInfo) -> message::SubscribeUpdate {
    message::SubscribeUpdate {
        id,
        start_location: update.start_location,
        end_group: update.end_group,
        subscriber_priority: update.priority,
        forward: update.forward,
        params: Default::default(),
    }
}

/// The registry half: routes replies and inbound objects to the
/// subscription.
pub(super) struct SubscribeRecv {
    state: State<SubscribeState>,
    producer: TrackProducer,
    msg: message::Subscribe,
    metrics: Arc<Mutex<SubscribeTrackMetrics>>,
    retried: bool,
}

impl SubscribeRecv {
    pub fn track_alias(&self) -> u64 {
        self.state.lock().track_alias
    }

    pub fn metrics(&self) -> Arc<Mutex<SubscribeTrackMetrics>> {
        self.metrics.clone()
    }

    pub fn recv_ok(&mut self, msg: &message::SubscribeOk) -> Result<(), ServeError> {
        let mut state = self.state.lock_mut().ok_or(ServeError::Cancel)?;
        if state.status == SubscribeStatus::Ok {
            return Err(ServeError::Duplicate);
        }

        state.status = SubscribeStatus::Ok;
        state.track_alias = msg.track_alias;
        state.largest = msg.largest_location;

        Ok(())
    }

    /// Handle a SubscribeError. Returns the corrected Subscribe message to
    /// re-issue when the publisher asked for a different alias.
    pub fn recv_error(
        &mut self,
        msg: &message::SubscribeError,
        retry_id: u64,
    ) -> Result<Option<message::Subscribe>, ServeError> {
        if msg.error_code == subscribe_error_code::RETRY_TRACK_ALIAS && !self.retried {
            self.retried = true;

            let mut state = self.state.lock_mut().ok_or(ServeError::Cancel)?;
            state.status = SubscribeStatus::Retrying;
            state.request_id = retry_id;
            state.track_alias = msg.track_alias;

            self.msg.id = retry_id;
            self.msg.track_alias = msg.track_alias;
            return Ok(Some(self.msg.clone()));
        }

        self.close(ServeError::Closed(msg.error_code))?;
        Ok(None)
    }

    /// Terminal close: SubscribeDone, a fatal error, or session teardown.
    pub fn close(&mut self, err: ServeError) -> Result<(), ServeError> {
        if let Some(mut state) = self.state.lock_mut() {
            state.status = SubscribeStatus::Closed;
            if state.closed.is_ok() {
                state.closed = Err(err.clone());
            }
        }

        self.producer.close(err);
        Ok(())
    }

    /// Route one received object into the track.
    pub fn recv_object(&mut self, headers: crate::track::ObjectHeaders, payload: bytes::Bytes) {
        {
            let mut metrics = self.metrics.lock().unwrap();
            metrics.objects_received += 1;
            metrics.bytes_received += payload.len() as u64;
        }

        if let Some(mut state) = self.state.lock_mut() {
            let location = headers.location();
            if state.largest.map_or(true, |largest| location > largest) {
                state.largest = Some(location);
            }
        }

        self.producer.insert(headers, payload);
    }
}
