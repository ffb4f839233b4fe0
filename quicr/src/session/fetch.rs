use crate::cache::CacheObject;
use crate::coding::Location;
use crate::message::{self, FetchType, GroupOrder};
use crate::serve::ServeError;
use crate::watch::{Queue, State};

use super::Subscriber;

/// Range selection for a new fetch.
#[derive(Clone, Debug)]
pub enum FetchRange {
    /// An explicit [start, end] over a named track.
    Standalone {
        start_location: Location,
        end_location: Location,
    },
    /// Groups preceding a live subscription's current group.
    RelativeJoining {
        joining_request_id: u64,
        preceding_group_offset: u64,
    },
    /// From an absolute group up to a live subscription's current location.
    AbsoluteJoining {
        joining_request_id: u64,
        start_group: u64,
    },
}

/// Knobs for a new fetch.
#[derive(Clone, Debug)]
pub struct FetchOptions {
    pub priority: u8,
    pub group_order: GroupOrder,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            priority: 127,
            group_order: GroupOrder::Ascending,
        }
    }
}

/// What the publisher accepted, from FetchOk.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FetchInfo {
    pub group_order: GroupOrder,
    pub end_of_track: bool,
    pub end_location: Location,
}

pub(super) struct FetchState {
    pub ok: Option<FetchInfo>,
    pub closed: Result<(), ServeError>,
}

impl Default for FetchState {
    fn default() -> Self {
        Self {
            ok: None,
            closed: Ok(()),
        }
    }
}

/// An outbound fetch: a request for historical objects, answered by a
/// dedicated stream that FINs when the range is done. Cancels on drop.
#[must_use = "fetch cancel on drop"]
pub struct Fetch {
    state: State<FetchState>,
    subscriber: Subscriber,
    objects: Queue<CacheObject>,

    pub request_id: u64,
}

impl Fetch {
    pub(super) fn new(
        mut subscriber: Subscriber,
        request_id: u64,
        range: FetchRange,
        options: &FetchOptions,
        track: Option<(crate::coding::TrackNamespace, Vec<u8>)>,
    ) -> (Fetch, FetchRecv) {
        let (fetch_type, standalone, joining) = match range {
            FetchRange::Standalone {
                start_location,
                end_location,
            } => {
                let (track_namespace, track_name) = track.unwrap_or_default();
                (
                    FetchType::Standalone,
                    Some(message::StandaloneFetch {
                        track_namespace,
                        track_name,
                        start_location,
                        end_location,
                    }),
                    None,
                )
            }
            FetchRange::RelativeJoining {
                joining_request_id,
                preceding_group_offset,
            } => (
                FetchType::RelativeJoining,
                None,
                Some(message::JoiningFetch {
                    joining_request_id,
                    joining_start: preceding_group_offset,
                }),
            ),
            FetchRange::AbsoluteJoining {
                joining_request_id,
                start_group,
            } => (
                FetchType::AbsoluteJoining,
                None,
                Some(message::JoiningFetch {
                    joining_request_id,
                    joining_start: start_group,
                }),
            ),
        };

        subscriber.send_message(message::Fetch {
            id: request_id,
            subscriber_priority: options.priority,
            group_order: options.group_order,
            fetch_type,
            standalone,
            joining,
            params: Default::default(),
        });

        let (state, recv_state) = State::default().split();
        let (objects_tx, objects_rx) = Queue::default().split();

        let send = Fetch {
            state,
            subscriber,
            objects: objects_rx,
            request_id,
        };

        let recv = FetchRecv {
            state: recv_state,
            objects: Some(objects_tx),
        };

        (send, recv)
    }

    /// Wait for the publisher's FetchOk.
    pub async fn ok(&self) -> Result<FetchInfo, ServeError> {
        loop {
            {
                let state = self.state.lock();
                if let Some(info) = state.ok {
                    return Ok(info);
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

    /// The next fetched object, in range order. None after the final object
    /// (stream FIN).
    pub async fn next_object(&mut self) -> Result<Option<CacheObject>, ServeError> {
        if let Some(object) = self.objects.pop().await {
            return Ok(Some(object));
        }

        match self.state.lock().closed.clone() {
            Ok(()) | Err(ServeError::Done) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl Drop for Fetch {
    fn drop(&mut self) {
        let done = self.state.lock().closed.is_err();
        if !done {
            self.subscriber.send_message(message::FetchCancel {
                id: self.request_id,
            });
        }
        self.subscriber.drop_fetch(self.request_id);
    }
}

/// The registry half: routes the reply and the fetch stream's objects.
pub(super) struct FetchRecv {
    state: State<FetchState>,
    objects: Option<Queue<CacheObject>>,
}

impl FetchRecv {
    pub fn recv_ok(&mut self, msg: &message::FetchOk) -> Result<(), ServeError> {
        let mut state = self.state.lock_mut().ok_or(ServeError::Cancel)?;
        if state.ok.is_some() {
            return Err(ServeError::Duplicate);
        }

        state.ok = Some(FetchInfo {
            group_order: msg.group_order,
            end_of_track: msg.end_of_track,
            end_location: msg.end_location,
        });

        Ok(())
    }

    pub fn recv_error(&mut self, err: ServeError) -> Result<(), ServeError> {
        self.objects.take();

        let mut state = self.state.lock_mut().ok_or(ServeError::Cancel)?;
        if state.closed.is_ok() {
            state.closed = Err(err);
        }
        Ok(())
    }

    pub fn recv_object(&mut self, object: CacheObject) {
        if let Some(objects) = &mut self.objects {
            objects.push(object).ok();
        }
    }

    /// The fetch stream finished cleanly; the queue closes so the reader
    /// sees the end after draining.
    pub fn recv_fin(&mut self) {
        self.objects.take();

        if let Some(mut state) = self.state.lock_mut() {
            if state.closed.is_ok() {
                state.closed = Err(ServeError::Done);
            }
        }
    }
}
