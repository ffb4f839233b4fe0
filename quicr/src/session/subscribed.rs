use std::ops;
use std::sync::{Arc, Mutex};

use bytes::BytesMut;

use crate::coding::{Encode, Location};
use crate::data;
use crate::message::{self, subscribe_done_code, subscribe_error_code, FilterType, GroupOrder};
use crate::metrics::PublishTrackMetrics;
use crate::serve::{ServeError, SubscribeFilter, TrackProducer};
use crate::setup::ParameterType;
use crate::transport::{DataContextId, EnqueueFlags, StreamAction};
use crate::watch::State;

use super::{SessionError, Publisher, SubscribeUpdateInfo};

pub(super) struct SubscribedState {
    closed: Result<(), ServeError>,

    /// Priority override from SubscribeUpdate.
    priority: Option<u8>,
    /// False pauses object delivery.
    forward: bool,
    /// Set by NewGroupRequest; the next object opens a fresh stream.
    force_new_stream: bool,

    largest: Option<Location>,
    ctx: Option<DataContextId>,

    /// Latest update, for a relay forwarding it upstream.
    pending_update: Option<SubscribeUpdateInfo>,
}

impl Default for SubscribedState {
    fn default() -> Self {
        Self {
            closed: Ok(()),
            priority: None,
            forward: true,
            force_new_stream: false,
            largest: None,
            ctx: None,
            pending_update: None,
        }
    }
}

/// A subscription received from the peer; serving it pulls objects from a
/// [TrackProducer] and pushes them into the egress scheduler with this
/// subscriber's transform (priority, TTL, stream mode).
pub struct Subscribed {
    publisher: Publisher,
    state: State<SubscribedState>,
    metrics: Arc<Mutex<PublishTrackMetrics>>,
    producer: Arc<Mutex<Option<TrackProducer>>>,
    ok: bool,
    errored: bool,

    pub msg: message::Subscribe,
}

impl Subscribed {
    pub(super) fn new(publisher: Publisher, msg: message::Subscribe) -> (Self, SubscribedRecv) {
        let (send, recv) = State::default().split();
        let metrics = Arc::new(Mutex::new(PublishTrackMetrics::default()));
        let producer = Arc::new(Mutex::new(None));

        let send = Self {
            publisher,
            state: send,
            metrics: metrics.clone(),
            producer: producer.clone(),
            ok: false,
            errored: false,
            msg,
        };

        let recv = SubscribedRecv {
            state: recv,
            metrics,
            producer,
        };

        (send, recv)
    }

    /// The subscriber's requested filter.
    pub fn filter(&self) -> SubscribeFilter {
        match self.msg.filter_type {
            FilterType::LatestObject => SubscribeFilter::LatestObject,
            FilterType::LatestGroup => SubscribeFilter::LatestGroup,
            FilterType::AbsoluteStart => {
                SubscribeFilter::AbsoluteStart(self.msg.start_location.unwrap_or_default())
            }
            FilterType::AbsoluteRange => SubscribeFilter::AbsoluteRange(
                self.msg.start_location.unwrap_or_default(),
                self.msg.end_group.unwrap_or_default(),
            ),
        }
    }

    /// Watch SubscribeUpdates, so a relay can propagate them upstream.
    pub fn update_watch(&self) -> UpdateWatch {
        UpdateWatch {
            state: self.state.clone(),
        }
    }

    /// Reject with an error reply.
    pub fn reject(mut self, err: ServeError) -> Result<(), SessionError> {
        self.errored = true;
        let id = self.msg.id;
        let code = err.code();
        self.publisher.send_message(message::SubscribeError {
            id,
            error_code: code,
            reason: crate::coding::ReasonPhrase(err.to_string()),
            track_alias: self.msg.track_alias,
        });
        Ok(())
    }

    /// Serve the subscription from the given track until it ends or the
    /// subscriber goes away.
    pub async fn serve(mut self, producer: TrackProducer) -> Result<(), SessionError> {
        let res = self.serve_inner(&producer).await;
        if let Err(err) = &res {
            self.close(err.clone().into()).ok();
        }
        res
    }

    async fn serve_inner(&mut self, producer: &TrackProducer) -> Result<(), SessionError> {
        // The relay policy for aliases: the hash-derived alias is required.
        let expected_alias = producer.hash().fullname;
        if self.msg.track_alias != expected_alias {
            self.errored = true;
            let id = self.msg.id;
            self.publisher.send_message(message::SubscribeError {
                id,
                error_code: subscribe_error_code::RETRY_TRACK_ALIAS,
                reason: crate::coding::ReasonPhrase("retry with the hashed alias".to_string()),
                track_alias: expected_alias,
            });
            return Ok(());
        }

        let group_order = match self.msg.group_order {
            GroupOrder::Publisher => GroupOrder::Ascending,
            order => order,
        };

        // Joining fetches resolve through this slot.
        *self.producer.lock().unwrap() = Some(producer.clone());

        let largest = producer.latest();
        self.publisher.send_message(message::SubscribeOk {
            id: self.msg.id,
            track_alias: self.msg.track_alias,
            expires: 0,
            group_order,
            content_exists: largest.is_some(),
            largest_location: largest,
            params: Default::default(),
        });
        self.ok = true;

        let mut consumer = producer.subscribe(self.filter());

        let ctx = self
            .publisher
            .transport()
            .create_data_context(true, self.msg.subscriber_priority);
        if let Some(mut state) = self.state.lock_mut() {
            state.ctx = Some(ctx);
        }

        // The stream currently carrying objects: (group, subgroup, type).
        let mut current: Option<(u64, u64, data::StreamHeaderType)> = None;

        loop {
            tokio::select! {
                object = consumer.next_object() => match object? {
                    Some(object) => self.send_object(ctx, &mut current, object)?,
                    None => break,
                },
                res = self.closed() => {
                    res?;
                    break;
                }
            }
        }

        Ok(())
    }

    fn send_object(
        &mut self,
        ctx: DataContextId,
        current: &mut Option<(u64, u64, data::StreamHeaderType)>,
        object: crate::cache::CacheObject,
    ) -> Result<(), SessionError> {
        let (forward, priority_override, force_new_stream) = {
            let state = self.state.lock();
            (state.forward, state.priority, state.force_new_stream)
        };

        if !forward {
            return Ok(());
        }

        let headers = object.headers;
        let priority = priority_override.unwrap_or(self.msg.subscriber_priority);
        let ttl = headers.ttl.or_else(|| {
            self.msg
                .params
                .get_int(ParameterType::DeliveryTimeout.into())
                .map(|ms| ms as u32)
        });

        let payload_len = object.payload.len() as u64;

        match headers.subgroup_id {
            Some(subgroup_id) => {
                let has_extensions = headers.extensions.is_some();
                let header_type =
                    data::StreamHeaderType::select_subgroup(Some(subgroup_id), has_extensions);

                let new_stream = force_new_stream
                    || match *current {
                        Some((group, subgroup, stream_type)) => {
                            group != headers.group_id
                                || subgroup != subgroup_id
                                || (has_extensions && !stream_type.has_extensions())
                        }
                        None => true,
                    };

                let stream_type = match (new_stream, *current) {
                    (false, Some((_, _, stream_type))) => stream_type,
                    _ => header_type,
                };

                let mut buf = BytesMut::new();
                if new_stream {
                    data::SubgroupHeader {
                        header_type: stream_type,
                        track_alias: self.msg.track_alias,
                        group_id: headers.group_id,
                        subgroup_id: stream_type.has_subgroup_id().then_some(subgroup_id),
                        publisher_priority: priority,
                    }
                    .encode(&mut buf)?;
                }
                data::SubgroupObject {
                    object_id: headers.object_id,
                    extension_headers: headers.extensions.clone(),
                    status: Some(headers.status),
                    payload: object.payload,
                }
                .encode_tail(stream_type, &mut buf)?;

                *current = Some((headers.group_id, subgroup_id, stream_type));

                self.publisher.transport().enqueue(
                    ctx,
                    headers.group_id,
                    subgroup_id,
                    buf.freeze(),
                    priority,
                    ttl,
                    0,
                    EnqueueFlags {
                        use_reliable: true,
                        new_stream,
                        clear_tx_queue: false,
                        use_reset: false,
                    },
                )?;
            }
            None => {
                let is_status =
                    object.payload.is_empty() && headers.status != data::ObjectStatus::Available;
                let datagram_type = data::DatagramType::select(
                    headers.extensions.is_some(),
                    headers.status == data::ObjectStatus::EndOfGroup,
                    is_status,
                );

                let mut buf = BytesMut::new();
                data::Datagram {
                    datagram_type,
                    track_alias: self.msg.track_alias,
                    group_id: headers.group_id,
                    object_id: headers.object_id,
                    publisher_priority: priority,
                    extension_headers: headers.extensions.clone(),
                    status: is_status.then_some(headers.status),
                    payload: (!is_status).then_some(object.payload),
                }
                .encode(&mut buf)?;

                self.publisher.transport().enqueue(
                    ctx,
                    headers.group_id,
                    0,
                    buf.freeze(),
                    priority,
                    ttl,
                    0,
                    EnqueueFlags::default(),
                )?;
            }
        }

        if let Some(mut state) = self.state.lock_mut() {
            state.force_new_stream = false;
            let location = headers.location();
            if state.largest.map_or(true, |largest| location > largest) {
                state.largest = Some(location);
            }
        }

        let mut metrics = self.metrics.lock().unwrap();
        metrics.objects_published += 1;
        metrics.bytes_published += payload_len;

        Ok(())
    }

    pub fn close(&mut self, err: ServeError) -> Result<(), ServeError> {
        let state = self.state.lock();
        state.closed.clone()?;

        let mut state = state.into_mut().ok_or(ServeError::Done)?;
        state.closed = Err(err);

        Ok(())
    }

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
}

impl ops::Deref for Subscribed {
    type Target = message::Subscribe;

    fn deref(&self) -> &Self::Target {
        &self.msg
    }
}

impl Drop for Subscribed {
    fn drop(&mut self) {
        let (err, largest, ctx) = {
            let state = self.state.lock();
            let err = state
                .closed
                .as_ref()
                .err()
                .cloned()
                .unwrap_or(ServeError::Done);
            (err, state.largest, state.ctx)
        };

        // Settle the state so update watchers stop waiting.
        if let Some(mut state) = self.state.lock_mut() {
            if state.closed.is_ok() {
                state.closed = Err(err.clone());
            }
        }

        if let Some(ctx) = ctx {
            let action = match err {
                ServeError::Done | ServeError::Cancel => StreamAction::ReplaceWithFin,
                _ => StreamAction::ReplaceWithReset,
            };
            let dropped = self.publisher.transport().close_context(ctx, action);
            self.metrics.lock().unwrap().quic.tx_queue_discards += dropped as u64;
        }

        if self.ok {
            let status_code = match err {
                ServeError::Done => subscribe_done_code::TRACK_ENDED,
                ServeError::Cancel => subscribe_done_code::SUBSCRIPTION_ENDED,
                _ => err.code(),
            };
            self.publisher.send_message(message::SubscribeDone {
                id: self.msg.id,
                status_code,
                stream_count: largest.map_or(0, |l| l.group_id + 1),
                reason: crate::coding::ReasonPhrase(err.to_string()),
            });
        } else if !self.errored {
            self.publisher.send_message(message::SubscribeError {
                id: self.msg.id,
                error_code: err.code(),
                reason: crate::coding::ReasonPhrase(err.to_string()),
                track_alias: self.msg.track_alias,
            });
        } else {
            // An explicit error reply already went out; just unregister.
            self.publisher.drop_subscribed(self.msg.id, self.msg.track_alias);
        }
    }
}

/// The registry half: applies control messages to the live subscription.
pub(super) struct SubscribedRecv {
    state: State<SubscribedState>,
    metrics: Arc<Mutex<PublishTrackMetrics>>,
    producer: Arc<Mutex<Option<TrackProducer>>>,
}

impl SubscribedRecv {
    /// The track being served, once serve() has started.
    pub fn producer(&self) -> Option<TrackProducer> {
        self.producer.lock().unwrap().clone()
    }

    pub fn recv_unsubscribe(&mut self) -> Result<(), ServeError> {
        let state = self.state.lock();
        state.closed.clone()?;

        if let Some(mut state) = state.into_mut() {
            state.closed = Err(ServeError::Cancel);
        }

        Ok(())
    }

    pub fn recv_update(&mut self, msg: &message::SubscribeUpdate) -> Result<(), ServeError> {
        let mut state = self.state.lock_mut().ok_or(ServeError::Done)?;

        state.priority = Some(msg.subscriber_priority);
        state.forward = msg.forward;
        state.pending_update = Some(SubscribeUpdateInfo {
            start_location: msg.start_location,
            end_group: msg.end_group,
            priority: msg.subscriber_priority,
            forward: msg.forward,
        });

        Ok(())
    }

    pub fn recv_new_group(&mut self) -> Result<(), ServeError> {
        let mut state = self.state.lock_mut().ok_or(ServeError::Done)?;
        state.force_new_stream = true;
        Ok(())
    }

    pub fn metrics(&self) -> Arc<Mutex<PublishTrackMetrics>> {
        self.metrics.clone()
    }

    pub fn ctx(&self) -> Option<DataContextId> {
        self.state.lock().ctx
    }
}

/// Watches a subscription for SubscribeUpdates; used by relays to forward
/// them upstream (with damping applied on the upstream handle).
pub struct UpdateWatch {
    state: State<SubscribedState>,
}

impl UpdateWatch {
    /// The next update, or None once the subscription ends.
    pub async fn next(&mut self) -> Option<SubscribeUpdateInfo> {
        loop {
            {
                let state = self.state.lock();
                if state.pending_update.is_some() {
                    return state.into_mut()?.pending_update.take();
                }
                state.closed.as_ref().ok()?;

                state.modified()?
            }
            .await;
        }
    }
}
